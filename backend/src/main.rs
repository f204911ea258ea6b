use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use console_backend::{
    app::build_router,
    config::Config,
    db::connection::create_pool,
    repositories::postgres::PgStore,
    services::{module_registry::ModuleRegistry, pages::FsPageStore},
    state::AppState,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "console_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        database_url = %config.database_url,
        jwt_secret = %mask_secret(&config.jwt_secret),
        time_zone = %config.time_zone,
        pages_root = %config.pages_root.display(),
        audit_log_per_page = config.audit_log_per_page,
        "Loaded configuration from environment/.env"
    );

    let registry = match &config.module_registry_path {
        Some(path) => ModuleRegistry::load(path)?,
        None => ModuleRegistry::builtin()?,
    };
    tracing::info!(modules = registry.modules().len(), "module registry loaded");

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let store = Arc::new(PgStore::new(pool));
    let pages = Arc::new(FsPageStore::new(config.pages_root.clone()));
    let bind_addr = config.bind_addr.clone();
    let app = build_router(AppState::new(store, registry, pages, config));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
