use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::models::module::ConflictDescription;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    BadRequest(String),
    InternalServerError(anyhow::Error),
    Validation(Vec<String>),
    DependencyConflict {
        module: String,
        conflicts: Vec<ConflictDescription>,
    },
    NotReversible(String),
    RollbackNotSupported(String),
    PersistFailure(anyhow::Error),
}

impl AppError {
    /// Stable machine-readable kind, also used as the `code` field of the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::DependencyConflict { .. } => "DEPENDENCY_CONFLICT",
            AppError::NotReversible(_) => "NOT_REVERSIBLE",
            AppError::RollbackNotSupported(_) => "ROLLBACK_NOT_SUPPORTED",
            AppError::PersistFailure(_) => "PERSIST_FAILURE",
        }
    }

    pub fn persist(err: impl Into<anyhow::Error>) -> Self {
        AppError::PersistFailure(err.into())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg)
            | AppError::BadRequest(msg)
            | AppError::NotReversible(msg)
            | AppError::RollbackNotSupported(msg) => write!(f, "{}", msg),
            AppError::InternalServerError(err) => write!(f, "internal error: {}", err),
            AppError::PersistFailure(err) => write!(f, "persist failure: {}", err),
            AppError::Validation(errors) => write!(f, "validation failed: {}", errors.join(", ")),
            AppError::DependencyConflict { module, conflicts } => {
                let names = conflicts
                    .iter()
                    .map(|c| c.module.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "module `{}` blocked by: {}", module, names)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code().to_string();
        let (status, error_message, details) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::PersistFailure(err) => {
                tracing::error!("Persist failure: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "The change could not be saved".to_string(),
                    None,
                )
            }
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                Some(serde_json::json!({ "errors": errors })),
            ),
            AppError::DependencyConflict { module, conflicts } => {
                let message = conflicts
                    .iter()
                    .map(|c| c.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                (
                    StatusCode::CONFLICT,
                    message,
                    Some(serde_json::json!({ "module": module, "conflicts": conflicts })),
                )
            }
            AppError::NotReversible(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg, None),
            AppError::RollbackNotSupported(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg, None),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code,
            details,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            _ => AppError::PersistFailure(err.into()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let code = e.code.as_ref();
                    format!("{}: {}", field, code)
                })
            })
            .collect();
        AppError::Validation(messages)
    }
}
