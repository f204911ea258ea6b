use sqlx::PgConnection;

use crate::models::module::ModuleConfig;

const SELECT_COLUMNS: &str = "name, enabled, config, updated_at";

pub async fn list_module_configs(
    conn: &mut PgConnection,
) -> Result<Vec<ModuleConfig>, sqlx::Error> {
    let query = format!("SELECT {} FROM module_configs ORDER BY name", SELECT_COLUMNS);
    sqlx::query_as::<_, ModuleConfig>(&query)
        .fetch_all(conn)
        .await
}

/// Row-locks the module for the rest of the transaction.
pub async fn fetch_module_config(
    conn: &mut PgConnection,
    name: &str,
) -> Result<Option<ModuleConfig>, sqlx::Error> {
    let query = format!(
        "SELECT {} FROM module_configs WHERE name = $1 FOR UPDATE",
        SELECT_COLUMNS
    );
    sqlx::query_as::<_, ModuleConfig>(&query)
        .bind(name)
        .fetch_optional(conn)
        .await
}

pub async fn upsert_module_config(
    conn: &mut PgConnection,
    config: &ModuleConfig,
) -> Result<ModuleConfig, sqlx::Error> {
    let query = format!(
        "INSERT INTO module_configs (name, enabled, config, updated_at) \
         VALUES ($1, $2, $3, NOW()) \
         ON CONFLICT (name) DO UPDATE \
         SET enabled = EXCLUDED.enabled, config = EXCLUDED.config, \
             updated_at = EXCLUDED.updated_at \
         RETURNING {}",
        SELECT_COLUMNS
    );
    sqlx::query_as::<_, ModuleConfig>(&query)
        .bind(&config.name)
        .bind(config.enabled)
        .bind(&config.config)
        .fetch_one(conn)
        .await
}
