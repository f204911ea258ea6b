//! PostgreSQL-backed [`Store`]. Each unit of work is one database transaction.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgTransaction, PgPool};
use std::collections::{BTreeMap, BTreeSet};

use super::{
    audit_log, module_config, role, settings, transaction, AuditLogFilters, Store, UnitOfWork,
};
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

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError> {
        let tx = transaction::begin_transaction(&self.pool).await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn list_audit_records(
        &self,
        filters: &AuditLogFilters,
        per_page: i64,
        offset: i64,
    ) -> Result<(Vec<AuditRecord>, i64), AppError> {
        audit_log::list_audit_records(&self.pool, filters, per_page, offset)
            .await
            .map_err(|e| AppError::InternalServerError(e.into()))
    }

    async fn export_audit_records(
        &self,
        filters: &AuditLogFilters,
        max_rows: i64,
    ) -> Result<Vec<AuditRecord>, AppError> {
        audit_log::export_audit_records(&self.pool, filters, max_rows)
            .await
            .map_err(|e| AppError::InternalServerError(e.into()))
    }
}

pub struct PgUnitOfWork {
    tx: PgTransaction<'static>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn insert_audit_record(
        &mut self,
        record: &NewAuditRecord,
    ) -> Result<AuditRecord, AppError> {
        audit_log::insert_audit_record(&mut self.tx, record)
            .await
            .map_err(AppError::persist)
    }

    async fn fetch_audit_record(&mut self, id: i64) -> Result<Option<AuditRecord>, AppError> {
        Ok(audit_log::fetch_audit_record(&mut self.tx, id).await?)
    }

    async fn module_configs(&mut self) -> Result<Vec<ModuleConfig>, AppError> {
        Ok(module_config::list_module_configs(&mut self.tx).await?)
    }

    async fn module_config(&mut self, name: &str) -> Result<Option<ModuleConfig>, AppError> {
        Ok(module_config::fetch_module_config(&mut self.tx, name).await?)
    }

    async fn save_module_config(
        &mut self,
        config: &ModuleConfig,
    ) -> Result<ModuleConfig, AppError> {
        module_config::upsert_module_config(&mut self.tx, config)
            .await
            .map_err(AppError::persist)
    }

    async fn settings(
        &mut self,
        category: SettingsCategory,
    ) -> Result<BTreeMap<String, Value>, AppError> {
        Ok(settings::load_settings(&mut self.tx, category).await?)
    }

    async fn save_setting(
        &mut self,
        category: SettingsCategory,
        key: &str,
        value: &Value,
    ) -> Result<(), AppError> {
        settings::upsert_setting(&mut self.tx, category, key, value)
            .await
            .map_err(AppError::persist)
    }

    async fn role(&mut self, id: RoleId) -> Result<Option<Role>, AppError> {
        Ok(role::fetch_role(&mut self.tx, id).await?)
    }

    async fn role_by_name(&mut self, name: &str) -> Result<Option<Role>, AppError> {
        Ok(role::fetch_role_by_name(&mut self.tx, name).await?)
    }

    async fn insert_role(&mut self, item: &Role) -> Result<(), AppError> {
        role::insert_role(&mut self.tx, item)
            .await
            .map_err(AppError::persist)
    }

    async fn update_role(&mut self, item: &Role) -> Result<(), AppError> {
        role::update_role(&mut self.tx, item)
            .await
            .map_err(AppError::persist)
    }

    async fn delete_role(&mut self, id: RoleId) -> Result<(), AppError> {
        role::delete_role(&mut self.tx, id)
            .await
            .map_err(AppError::persist)
    }

    async fn role_capabilities(&mut self, id: RoleId) -> Result<BTreeSet<String>, AppError> {
        Ok(role::fetch_role_capabilities(&mut self.tx, id).await?)
    }

    async fn replace_role_capabilities(
        &mut self,
        id: RoleId,
        capabilities: &BTreeSet<String>,
    ) -> Result<(), AppError> {
        role::replace_role_capabilities(&mut self.tx, id, capabilities)
            .await
            .map_err(AppError::persist)
    }

    async fn existing_capabilities(
        &mut self,
        names: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, AppError> {
        Ok(role::existing_capabilities(&mut self.tx, names).await?)
    }

    async fn role_assignments(
        &mut self,
        role_id: RoleId,
    ) -> Result<Vec<UserRoleAssignment>, AppError> {
        Ok(role::list_role_assignments(&mut self.tx, role_id).await?)
    }

    async fn assignment(
        &mut self,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<Option<UserRoleAssignment>, AppError> {
        Ok(role::fetch_assignment(&mut self.tx, user_id, role_id).await?)
    }

    async fn save_assignment(&mut self, assignment: &UserRoleAssignment) -> Result<(), AppError> {
        role::upsert_assignment(&mut self.tx, assignment)
            .await
            .map_err(AppError::persist)
    }

    async fn delete_assignment(
        &mut self,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), AppError> {
        role::delete_assignment(&mut self.tx, user_id, role_id)
            .await
            .map_err(AppError::persist)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        transaction::commit_transaction(self.tx).await
    }
}
