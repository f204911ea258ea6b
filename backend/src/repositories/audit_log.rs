use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgConnection, PgPool, Postgres, QueryBuilder};

use crate::models::audit_log::{ActionType, AuditRecord, NewAuditRecord};

const SELECT_COLUMNS: &str = "id, actor_id, action_type, object_type, object_id, before_state, \
     after_state, description, reverts_id, request_id, created_at";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditLogFilters {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub actor_id: Option<String>,
    /// Canonical wire name when known; an unknown name is kept as given and matches nothing.
    pub action_type: Option<String>,
    pub object_type: Option<String>,
    pub object_id: Option<String>,
}

impl AuditLogFilters {
    /// In-process equivalent of the SQL `WHERE` clause built by `apply_audit_log_filters`.
    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.from.map_or(true, |from| record.created_at >= from)
            && self.to.map_or(true, |to| record.created_at <= to)
            && self
                .actor_id
                .as_deref()
                .map_or(true, |actor| record.actor_id == actor)
            && self
                .action_type
                .as_deref()
                .map_or(true, |action| record.action_type.as_str() == action)
            && self
                .object_type
                .as_deref()
                .map_or(true, |object_type| record.object_type.as_deref() == Some(object_type))
            && self
                .object_id
                .as_deref()
                .map_or(true, |object_id| record.object_id.as_deref() == Some(object_id))
    }
}

pub async fn insert_audit_record(
    conn: &mut PgConnection,
    record: &NewAuditRecord,
) -> Result<AuditRecord, sqlx::Error> {
    let query = format!(
        "INSERT INTO audit_records \
         (actor_id, action_type, object_type, object_id, before_state, after_state, description, \
         reverts_id, request_id, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW()) \
         RETURNING {}",
        SELECT_COLUMNS
    );
    sqlx::query_as::<_, AuditRecord>(&query)
        .bind(&record.actor_id)
        .bind(record.action_type.as_str())
        .bind(&record.object_type)
        .bind(&record.object_id)
        .bind(record.before_state.clone().map(Json))
        .bind(record.after_state.clone().map(Json))
        .bind(&record.description)
        .bind(record.reverts_id)
        .bind(&record.request_id)
        .fetch_one(conn)
        .await
}

pub async fn fetch_audit_record(
    conn: &mut PgConnection,
    id: i64,
) -> Result<Option<AuditRecord>, sqlx::Error> {
    let query = format!("SELECT {} FROM audit_records WHERE id = $1", SELECT_COLUMNS);
    sqlx::query_as::<_, AuditRecord>(&query)
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn list_audit_records(
    pool: &PgPool,
    filters: &AuditLogFilters,
    per_page: i64,
    offset: i64,
) -> Result<(Vec<AuditRecord>, i64), sqlx::Error> {
    let items = query_audit_records(pool, filters, Some((per_page, offset))).await?;

    let mut count_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM audit_records");
    let mut count_has_clause = false;
    apply_audit_log_filters(&mut count_builder, &mut count_has_clause, filters);
    let total = count_builder
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    Ok((items, total))
}

pub async fn export_audit_records(
    pool: &PgPool,
    filters: &AuditLogFilters,
    max_rows: i64,
) -> Result<Vec<AuditRecord>, sqlx::Error> {
    query_audit_records(pool, filters, Some((max_rows, 0))).await
}

async fn query_audit_records(
    pool: &PgPool,
    filters: &AuditLogFilters,
    pagination: Option<(i64, i64)>,
) -> Result<Vec<AuditRecord>, sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {} FROM audit_records", SELECT_COLUMNS));
    let mut has_clause = false;
    apply_audit_log_filters(&mut builder, &mut has_clause, filters);
    builder.push(" ORDER BY created_at DESC, id DESC");

    if let Some((per_page, offset)) = pagination {
        builder
            .push(" LIMIT ")
            .push_bind(per_page)
            .push(" OFFSET ")
            .push_bind(offset);
    }

    builder.build_query_as::<AuditRecord>().fetch_all(pool).await
}

fn apply_audit_log_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    filters: &AuditLogFilters,
) {
    if let Some(from) = filters.from {
        push_clause(builder, has_clause);
        builder.push("created_at >= ").push_bind(from);
    }
    if let Some(to) = filters.to {
        push_clause(builder, has_clause);
        builder.push("created_at <= ").push_bind(to);
    }
    if let Some(actor_id) = filters.actor_id.as_ref() {
        push_clause(builder, has_clause);
        builder.push("actor_id = ").push_bind(actor_id.clone());
    }
    if let Some(action_type) = filters.action_type.as_ref() {
        push_clause(builder, has_clause);
        builder.push("action_type = ").push_bind(action_type.clone());
    }
    if let Some(object_type) = filters.object_type.as_ref() {
        push_clause(builder, has_clause);
        builder.push("object_type = ").push_bind(object_type.clone());
    }
    if let Some(object_id) = filters.object_id.as_ref() {
        push_clause(builder, has_clause);
        builder.push("object_id = ").push_bind(object_id.clone());
    }
}

pub(crate) fn push_clause(builder: &mut QueryBuilder<'_, Postgres>, has_clause: &mut bool) {
    if *has_clause {
        builder.push(" AND ");
    } else {
        builder.push(" WHERE ");
        *has_clause = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn record(action_type: ActionType, object_type: &str) -> AuditRecord {
        AuditRecord {
            id: 1,
            actor_id: "admin-1".into(),
            action_type,
            object_type: Some(object_type.into()),
            object_id: Some("payroll".into()),
            before_state: Some(Json(json!({"enabled": false}))),
            after_state: Some(Json(json!({"enabled": true}))),
            description: "Enabled payroll".into(),
            reverts_id: None,
            request_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn audit_log_filters_default_matches_everything() {
        let filters = AuditLogFilters::default();
        assert!(filters.matches(&record(ActionType::ModuleToggle, "module")));
    }

    #[test]
    fn audit_log_filters_match_each_field() {
        let r = record(ActionType::ModuleToggle, "module");
        let by_action = AuditLogFilters {
            action_type: Some(ActionType::RoleUpdate.to_string()),
            ..Default::default()
        };
        assert!(!by_action.matches(&r));

        let by_object = AuditLogFilters {
            object_type: Some("module".into()),
            object_id: Some("payroll".into()),
            actor_id: Some("admin-1".into()),
            ..Default::default()
        };
        assert!(by_object.matches(&r));

        let unknown = AuditLogFilters {
            action_type: Some("login".into()),
            ..Default::default()
        };
        assert!(!unknown.matches(&r));

        let future = AuditLogFilters {
            from: Some(Utc::now() + Duration::days(1)),
            ..Default::default()
        };
        assert!(!future.matches(&r));
    }

    #[test]
    fn filters_render_where_clause() {
        let filters = AuditLogFilters {
            actor_id: Some("admin-1".into()),
            action_type: Some(ActionType::RevertChange.to_string()),
            ..Default::default()
        };
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM audit_records");
        let mut has_clause = false;
        apply_audit_log_filters(&mut builder, &mut has_clause, &filters);
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM audit_records WHERE actor_id = $1 AND action_type = $2"
        );
    }
}
