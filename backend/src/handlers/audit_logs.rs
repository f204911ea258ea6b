//! Audit log query and export.

use axum::{
    body::Body,
    extract::{Extension, Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderValue,
    },
    response::Response,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    handlers::common::{normalize_filter, parse_datetime_value},
    middleware::AdminSession,
    models::{
        audit_log::{ActionType, AuditRecord},
        role::capabilities,
        Pagination,
    },
    repositories::{AuditLogFilters, Store},
    state::AppState,
    utils::{csv::append_csv_row, time},
};

/// Filters shared by `get_logs` and `export_logs`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LogFilterParams {
    pub actor: Option<String>,
    pub action_type: Option<String>,
    pub object_type: Option<String>,
    pub object_id: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LogQuery {
    pub page: Option<i64>,
    #[serde(flatten)]
    pub filters: LogFilterParams,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(flatten)]
    pub filters: LogFilterParams,
}

#[derive(Debug, Serialize)]
pub struct LogPage {
    pub logs: Vec<AuditRecord>,
    pub pagination: Pagination,
}

pub fn build_filters(params: &LogFilterParams, tz: &Tz) -> Result<AuditLogFilters, AppError> {
    let from = params
        .date_from
        .as_deref()
        .and_then(|v| normalize_filter(Some(v)))
        .map(|v| {
            parse_datetime_value(&v, tz, true).ok_or_else(|| {
                AppError::BadRequest("`date_from` must be a valid date or datetime".into())
            })
        })
        .transpose()?;
    let to = params
        .date_to
        .as_deref()
        .and_then(|v| normalize_filter(Some(v)))
        .map(|v| {
            parse_datetime_value(&v, tz, false).ok_or_else(|| {
                AppError::BadRequest("`date_to` must be a valid date or datetime".into())
            })
        })
        .transpose()?;

    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(AppError::BadRequest(
                "`date_from` must be before or equal to `date_to`".into(),
            ));
        }
    }

    let action_type = normalize_filter(params.action_type.as_deref()).map(|raw| {
        raw.parse::<ActionType>()
            .map(|action| action.as_str().to_string())
            .unwrap_or(raw)
    });

    Ok(AuditLogFilters {
        from,
        to,
        actor_id: normalize_filter(params.actor.as_deref()),
        action_type,
        object_type: normalize_filter(params.object_type.as_deref()),
        object_id: normalize_filter(params.object_id.as_deref()),
    })
}

/// Newest-first page of audit records. A page past the end yields an empty list.
pub async fn get_logs(
    store: &dyn Store,
    query: &LogQuery,
    per_page: i64,
    tz: &Tz,
) -> Result<LogPage, AppError> {
    let filters = build_filters(&query.filters, tz)?;
    let page = query.page.unwrap_or(1).max(1);
    let offset = Pagination::new(0, page, per_page).offset();
    let (logs, total) = store.list_audit_records(&filters, per_page, offset).await?;
    Ok(LogPage {
        logs,
        pagination: Pagination::new(total, page, per_page),
    })
}

pub async fn export_logs(
    store: &dyn Store,
    query: &ExportQuery,
    max_rows: i64,
    tz: &Tz,
) -> Result<Response, AppError> {
    let filters = build_filters(&query.filters, tz)?;
    let records = store.export_audit_records(&filters, max_rows).await?;
    tracing::info!(rows = records.len(), format = ?query.format, "audit log exported");

    let (body, content_type, extension) = match query.format {
        ExportFormat::Csv => (render_csv(&records).into_bytes(), "text/csv; charset=utf-8", "csv"),
        ExportFormat::Json => (
            serde_json::to_vec_pretty(&records)
                .map_err(|e| AppError::InternalServerError(e.into()))?,
            "application/json",
            "json",
        ),
    };

    let filename = time::export_filename(tz, extension);
    let mut response = Response::new(Body::from(body));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response.headers_mut().insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    Ok(response)
}

/// `GET /api/admin/console/export`
pub async fn export_audit_logs(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    session.require(capabilities::VIEW_AUDIT_LOG)?;
    export_logs(
        state.store.as_ref(),
        &query,
        state.config.audit_log_export_max_rows,
        &state.config.time_zone,
    )
    .await
}

const CSV_HEADER: [&str; 11] = [
    "id",
    "created_at",
    "actor_id",
    "action_type",
    "object_type",
    "object_id",
    "description",
    "before_state",
    "after_state",
    "reverts_id",
    "request_id",
];

fn render_csv(records: &[AuditRecord]) -> String {
    let mut buffer = String::new();
    append_csv_row(&mut buffer, &CSV_HEADER);
    for record in records {
        let state = |value: Option<&serde_json::Value>| {
            value.map(|v| v.to_string()).unwrap_or_default()
        };
        append_csv_row(
            &mut buffer,
            &[
                record.id.to_string(),
                record.created_at.to_rfc3339(),
                record.actor_id.clone(),
                record.action_type.to_string(),
                record.object_type.clone().unwrap_or_default(),
                record.object_id.clone().unwrap_or_default(),
                record.description.clone(),
                state(record.before()),
                state(record.after()),
                record.reverts_id.map(|id| id.to_string()).unwrap_or_default(),
                record.request_id.clone().unwrap_or_default(),
            ],
        );
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use sqlx::types::Json;

    #[test]
    fn build_filters_parses_action_type_and_dates() {
        let params = LogFilterParams {
            actor: Some(" admin-1 ".into()),
            action_type: Some("MODULE_TOGGLE".into()),
            object_type: Some("Employees".into()),
            date_from: Some("2026-01-01".into()),
            date_to: Some("2026-01-31".into()),
            ..Default::default()
        };
        let filters = build_filters(&params, &chrono_tz::UTC).expect("filters");
        assert_eq!(filters.actor_id.as_deref(), Some("admin-1"));
        assert_eq!(filters.action_type.as_deref(), Some("module_toggle"));
        assert_eq!(filters.object_type.as_deref(), Some("Employees"));
        assert!(filters.from < filters.to);
    }

    #[test]
    fn build_filters_keeps_unknown_action_type_as_given() {
        let unknown_action = LogFilterParams {
            action_type: Some("drop_table".into()),
            ..Default::default()
        };
        let filters = build_filters(&unknown_action, &chrono_tz::UTC).expect("filters");
        assert_eq!(filters.action_type.as_deref(), Some("drop_table"));
    }

    #[test]
    fn build_filters_rejects_inverted_dates() {
        let inverted = LogFilterParams {
            date_from: Some("2026-02-01".into()),
            date_to: Some("2026-01-01".into()),
            ..Default::default()
        };
        assert!(build_filters(&inverted, &chrono_tz::UTC).is_err());
    }

    #[test]
    fn csv_export_guards_formula_cells() {
        let record = AuditRecord {
            id: 7,
            actor_id: "=HYPERLINK(\"x\")".into(),
            action_type: ActionType::PageEdit,
            object_type: Some("page".into()),
            object_id: Some("about.html".into()),
            before_state: Some(Json(json!({"content": "a"}))),
            after_state: None,
            description: "Edited page about.html".into(),
            reverts_id: None,
            request_id: None,
            created_at: Utc::now(),
        };
        let csv = render_csv(&[record]);
        let mut lines = csv.lines();
        assert!(lines.next().expect("header").starts_with("\"id\",\"created_at\""));
        let row = lines.next().expect("row");
        assert!(row.contains("\"'=HYPERLINK(\"\"x\"\")\""));
        assert!(row.contains("\"{\"\"content\"\":\"\"a\"\"}\""));
    }
}
