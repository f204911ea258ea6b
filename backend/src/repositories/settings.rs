use serde_json::Value;
use sqlx::{types::Json, PgConnection, Row};
use std::collections::BTreeMap;

use crate::models::settings::SettingsCategory;

pub async fn load_settings(
    conn: &mut PgConnection,
    category: SettingsCategory,
) -> Result<BTreeMap<String, Value>, sqlx::Error> {
    let rows = sqlx::query("SELECT key, value FROM settings WHERE category = $1")
        .bind(category.as_str())
        .fetch_all(conn)
        .await?;

    let mut settings = BTreeMap::new();
    for row in rows {
        let key: String = row.try_get("key")?;
        let value: Json<Value> = row.try_get("value")?;
        settings.insert(key, value.0);
    }
    Ok(settings)
}

pub async fn upsert_setting(
    conn: &mut PgConnection,
    category: SettingsCategory,
    key: &str,
    value: &Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO settings (category, key, value, updated_at) VALUES ($1, $2, $3, NOW()) \
         ON CONFLICT (category, key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
    )
    .bind(category.as_str())
    .bind(key)
    .bind(Json(value))
    .execute(conn)
    .await
    .map(|_| ())
}
