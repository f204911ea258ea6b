#![allow(dead_code)]
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response},
    Router,
};
use chrono::Utc;
use console_backend::{
    app::build_router,
    config::Config,
    models::role::{capabilities, Role},
    repositories::MemoryStore,
    services::{module_registry::ModuleRegistry, pages::FsPageStore},
    state::AppState,
    types::RoleId,
    utils::jwt::{create_session_token, Claims},
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "a_secure_token_that_is_long_enough_123";

pub const ALL_CAPABILITIES: [&str; 6] = [
    capabilities::MANAGE_MODULES,
    capabilities::MANAGE_SETTINGS,
    capabilities::MANAGE_ROLES,
    capabilities::MANAGE_PAGES,
    capabilities::VIEW_AUDIT_LOG,
    capabilities::ROLLBACK_CHANGES,
];

pub fn test_config(pages_root: &std::path::Path) -> Config {
    Config {
        database_url: "postgres://unused".into(),
        jwt_secret: JWT_SECRET.into(),
        time_zone: chrono_tz::UTC,
        bind_addr: "127.0.0.1:0".into(),
        pages_root: pages_root.to_path_buf(),
        module_registry_path: None,
        audit_log_per_page: 5,
        audit_log_export_max_rows: 100,
    }
}

/// In-memory console wired the same way `main` wires the Postgres one.
pub struct TestConsole {
    pub store: MemoryStore,
    pub state: AppState,
    pub pages_dir: TempDir,
}

impl TestConsole {
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        for name in ALL_CAPABILITIES {
            store.add_capability(name, name).await;
        }
        let pages_dir = TempDir::new().expect("pages dir");
        let pages = Arc::new(FsPageStore::new(pages_dir.path()));
        let registry = ModuleRegistry::builtin().expect("builtin registry");
        let state = AppState::new(
            Arc::new(store.clone()),
            registry,
            pages,
            test_config(pages_dir.path()),
        );
        Self {
            store,
            state,
            pages_dir,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn seed_role(&self, name: &str, is_system: bool, caps: &[&str]) -> Role {
        let now = Utc::now();
        let role = Role {
            id: RoleId::new(),
            name: name.into(),
            display_name: name.to_uppercase(),
            description: String::new(),
            is_system,
            created_at: now,
            updated_at: now,
        };
        self.store.seed_role(role.clone(), caps).await;
        role
    }
}

pub struct Session {
    pub token: String,
    pub csrf: String,
}

pub fn session(role: &str, caps: &[&str]) -> Session {
    let claims = Claims::new(
        "admin-1".into(),
        role.into(),
        caps.iter().map(|c| c.to_string()).collect(),
        1,
    );
    let token = create_session_token(&claims, JWT_SECRET).expect("token");
    Session {
        token,
        csrf: claims.csrf,
    }
}

pub fn admin() -> Session {
    session("admin", &ALL_CAPABILITIES)
}

pub fn console_request(session: &Session, body: Value, with_csrf: bool) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/admin/console")
        .header(header::AUTHORIZATION, format!("Bearer {}", session.token))
        .header(header::CONTENT_TYPE, "application/json");
    if with_csrf {
        builder = builder.header("x-csrf-token", &session.csrf);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub async fn send(router: &Router, request: Request<Body>) -> (u16, Value) {
    let response: Response<Body> = router.clone().oneshot(request).await.expect("response");
    let status = response.status().as_u16();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}
