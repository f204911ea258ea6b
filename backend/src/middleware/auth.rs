use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::collections::BTreeSet;

use crate::{
    error::AppError,
    models::role::{ADMIN_ROLE, SUPER_ADMIN_ROLE},
    state::AppState,
    utils::{
        csrf,
        jwt::{verify_session_token, Claims},
    },
};

/// The authenticated administrator behind a console request.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub actor_id: String,
    pub role: String,
    pub capabilities: BTreeSet<String>,
    pub csrf_token: String,
}

impl AdminSession {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            actor_id: claims.sub,
            role: claims.role.to_ascii_lowercase(),
            capabilities: claims.capabilities.into_iter().collect(),
            csrf_token: claims.csrf,
        }
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == SUPER_ADMIN_ROLE
    }

    pub fn require(&self, capability: &str) -> Result<(), AppError> {
        if self.is_super_admin() || self.capabilities.contains(capability) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Missing capability '{}'",
                capability
            )))
        }
    }

    pub fn verify_csrf(&self, headers: &HeaderMap) -> Result<(), AppError> {
        match csrf::token_from_headers(headers) {
            Some(submitted) if csrf::tokens_match(submitted, &self.csrf_token) => Ok(()),
            _ => Err(AppError::Forbidden("Invalid CSRF token".to_string())),
        }
    }
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_bearer_token)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = verify_session_token(token, &state.config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired session".to_string()))?;
    let session = AdminSession::from_claims(claims);
    if session.role != ADMIN_ROLE && !session.is_super_admin() {
        tracing::warn!(
            actor_id = %session.actor_id,
            role = %session.role,
            "non-admin session refused"
        );
        return Err(AppError::Forbidden("Administrator access required".to_string()));
    }

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(rest.trim()).filter(|t| !t.is_empty())
    } else {
        None
    }
}
