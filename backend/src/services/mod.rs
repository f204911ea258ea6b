pub mod audit_log;
pub mod dependency;
pub mod module_control;
pub mod module_registry;
pub mod navigation;
pub mod pages;
pub mod roles;
pub mod rollback;
pub mod settings;
