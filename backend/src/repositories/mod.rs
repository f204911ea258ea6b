//! Storage seam.
//!
//! Every mutation runs inside a [`UnitOfWork`]: the state change and its audit record are
//! written through the same unit and become visible together on [`UnitOfWork::commit`].
//! Dropping a unit without committing discards everything written through it.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    error::AppError,
    models::{
        audit_log::{AuditRecord, NewAuditRecord},
        module::ModuleConfig,
        role::{Role, UserRoleAssignment},
        settings::SettingsCategory,
    },
    types::{RoleId, UserId},
};

pub mod audit_log;
pub mod memory;
pub mod module_config;
pub mod postgres;
pub mod role;
pub mod settings;
pub mod transaction;

pub use audit_log::AuditLogFilters;
pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a unit of work. Reads through it observe its own uncommitted writes.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError>;

    /// Newest-first page of audit records plus the total matching `filters`.
    async fn list_audit_records(
        &self,
        filters: &AuditLogFilters,
        per_page: i64,
        offset: i64,
    ) -> Result<(Vec<AuditRecord>, i64), AppError>;

    /// Newest-first audit records matching `filters`, at most `max_rows`.
    async fn export_audit_records(
        &self,
        filters: &AuditLogFilters,
        max_rows: i64,
    ) -> Result<Vec<AuditRecord>, AppError>;
}

#[async_trait]
pub trait UnitOfWork: Send {
    async fn insert_audit_record(&mut self, record: &NewAuditRecord)
        -> Result<AuditRecord, AppError>;
    async fn fetch_audit_record(&mut self, id: i64) -> Result<Option<AuditRecord>, AppError>;

    async fn module_configs(&mut self) -> Result<Vec<ModuleConfig>, AppError>;
    async fn module_config(&mut self, name: &str) -> Result<Option<ModuleConfig>, AppError>;
    /// Upserts the flag and config blob together and stamps `updated_at`.
    async fn save_module_config(&mut self, config: &ModuleConfig)
        -> Result<ModuleConfig, AppError>;

    async fn settings(
        &mut self,
        category: SettingsCategory,
    ) -> Result<BTreeMap<String, Value>, AppError>;
    async fn save_setting(
        &mut self,
        category: SettingsCategory,
        key: &str,
        value: &Value,
    ) -> Result<(), AppError>;

    async fn role(&mut self, id: RoleId) -> Result<Option<Role>, AppError>;
    async fn role_by_name(&mut self, name: &str) -> Result<Option<Role>, AppError>;
    async fn insert_role(&mut self, role: &Role) -> Result<(), AppError>;
    async fn update_role(&mut self, role: &Role) -> Result<(), AppError>;
    async fn delete_role(&mut self, id: RoleId) -> Result<(), AppError>;
    async fn role_capabilities(&mut self, id: RoleId) -> Result<BTreeSet<String>, AppError>;
    /// Clears the role's capability rows and inserts `capabilities`.
    async fn replace_role_capabilities(
        &mut self,
        id: RoleId,
        capabilities: &BTreeSet<String>,
    ) -> Result<(), AppError>;
    /// Returns the subset of `names` that exist as capabilities.
    async fn existing_capabilities(
        &mut self,
        names: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, AppError>;

    async fn role_assignments(&mut self, role_id: RoleId)
        -> Result<Vec<UserRoleAssignment>, AppError>;
    async fn assignment(
        &mut self,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<Option<UserRoleAssignment>, AppError>;
    async fn save_assignment(&mut self, assignment: &UserRoleAssignment) -> Result<(), AppError>;
    async fn delete_assignment(&mut self, user_id: UserId, role_id: RoleId)
        -> Result<(), AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
