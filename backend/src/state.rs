use std::sync::Arc;

use crate::{
    config::Config,
    repositories::Store,
    services::{
        module_registry::ModuleRegistry, pages::PageStore, rollback::RollbackDispatcher,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub registry: Arc<ModuleRegistry>,
    pub pages: Arc<dyn PageStore>,
    pub rollback: Arc<RollbackDispatcher>,
    pub config: Config,
}

impl AppState {
    /// Wires the rollback dispatcher with the default handlers over `pages`.
    pub fn new(
        store: Arc<dyn Store>,
        registry: ModuleRegistry,
        pages: Arc<dyn PageStore>,
        config: Config,
    ) -> Self {
        let rollback = RollbackDispatcher::with_default_handlers(pages.clone());
        Self {
            store,
            registry: Arc::new(registry),
            pages,
            rollback: Arc::new(rollback),
            config,
        }
    }
}
