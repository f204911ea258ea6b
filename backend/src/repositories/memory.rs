//! In-process [`Store`] for tests and local demos.
//!
//! Units of work are serialised: `begin` takes the store lock and works on a copy of the
//! state, `commit` swaps the copy in. Dropping an uncommitted unit discards the copy.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::types::Json;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{AuditLogFilters, Store, UnitOfWork};
use crate::{
    error::AppError,
    models::{
        audit_log::{AuditRecord, NewAuditRecord},
        module::ModuleConfig,
        role::{Capability, Role, UserRoleAssignment},
        settings::SettingsCategory,
    },
    types::{RoleId, UserId},
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    audit_records: Vec<AuditRecord>,
    modules: BTreeMap<String, ModuleConfig>,
    settings: BTreeMap<SettingsCategory, BTreeMap<String, Value>>,
    roles: BTreeMap<RoleId, Role>,
    role_capabilities: BTreeMap<RoleId, BTreeSet<String>>,
    capabilities: BTreeMap<String, Capability>,
    assignments: BTreeMap<(UserId, RoleId), UserRoleAssignment>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_audit_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent audit insert fail with a persist error.
    pub fn set_audit_writes_failing(&self, failing: bool) {
        self.fail_audit_writes.store(failing, Ordering::SeqCst);
    }

    pub async fn add_capability(&self, name: &str, description: &str) {
        let mut state = self.state.lock().await;
        state.capabilities.insert(
            name.to_string(),
            Capability {
                name: name.to_string(),
                description: description.to_string(),
            },
        );
    }

    pub async fn seed_role(&self, role: Role, capabilities: &[&str]) {
        let mut state = self.state.lock().await;
        state.role_capabilities.insert(
            role.id,
            capabilities.iter().map(|c| c.to_string()).collect(),
        );
        state.roles.insert(role.id, role);
    }

    /// Inserts an audit record verbatim, bypassing the recorder. Returns its id.
    pub async fn seed_audit_record(&self, record: NewAuditRecord) -> i64 {
        let mut state = self.state.lock().await;
        state.push_audit_record(&record).id
    }

    pub async fn audit_records(&self) -> Vec<AuditRecord> {
        self.state.lock().await.audit_records.clone()
    }

    pub async fn settings_snapshot(&self, category: SettingsCategory) -> BTreeMap<String, Value> {
        self.state
            .lock()
            .await
            .settings
            .get(&category)
            .cloned()
            .unwrap_or_default()
    }
}

impl MemoryState {
    fn push_audit_record(&mut self, record: &NewAuditRecord) -> AuditRecord {
        let id = self.audit_records.last().map_or(1, |last| last.id + 1);
        let stored = AuditRecord {
            id,
            actor_id: record.actor_id.clone(),
            action_type: record.action_type,
            object_type: record.object_type.clone(),
            object_id: record.object_id.clone(),
            before_state: record.before_state.clone().map(Json),
            after_state: record.after_state.clone().map(Json),
            description: record.description.clone(),
            reverts_id: record.reverts_id,
            request_id: record.request_id.clone(),
            created_at: Utc::now(),
        };
        self.audit_records.push(stored.clone());
        stored
    }

    fn filtered(&self, filters: &AuditLogFilters) -> Vec<AuditRecord> {
        let mut records: Vec<AuditRecord> = self
            .audit_records
            .iter()
            .filter(|record| filters.matches(record))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        records
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            working,
            fail_audit_writes: self.fail_audit_writes.load(Ordering::SeqCst),
        }))
    }

    async fn list_audit_records(
        &self,
        filters: &AuditLogFilters,
        per_page: i64,
        offset: i64,
    ) -> Result<(Vec<AuditRecord>, i64), AppError> {
        let state = self.state.lock().await;
        let records = state.filtered(filters);
        let total = records.len() as i64;
        let page = records
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(per_page.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn export_audit_records(
        &self,
        filters: &AuditLogFilters,
        max_rows: i64,
    ) -> Result<Vec<AuditRecord>, AppError> {
        let state = self.state.lock().await;
        let mut records = state.filtered(filters);
        records.truncate(max_rows.max(0) as usize);
        Ok(records)
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_audit_writes: bool,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn insert_audit_record(
        &mut self,
        record: &NewAuditRecord,
    ) -> Result<AuditRecord, AppError> {
        if self.fail_audit_writes {
            return Err(AppError::persist(anyhow::anyhow!("audit store unavailable")));
        }
        Ok(self.working.push_audit_record(record))
    }

    async fn fetch_audit_record(&mut self, id: i64) -> Result<Option<AuditRecord>, AppError> {
        Ok(self
            .working
            .audit_records
            .iter()
            .find(|record| record.id == id)
            .cloned())
    }

    async fn module_configs(&mut self) -> Result<Vec<ModuleConfig>, AppError> {
        Ok(self.working.modules.values().cloned().collect())
    }

    async fn module_config(&mut self, name: &str) -> Result<Option<ModuleConfig>, AppError> {
        Ok(self.working.modules.get(name).cloned())
    }

    async fn save_module_config(
        &mut self,
        config: &ModuleConfig,
    ) -> Result<ModuleConfig, AppError> {
        let mut saved = config.clone();
        saved.updated_at = Some(Utc::now());
        self.working
            .modules
            .insert(saved.name.clone(), saved.clone());
        Ok(saved)
    }

    async fn settings(
        &mut self,
        category: SettingsCategory,
    ) -> Result<BTreeMap<String, Value>, AppError> {
        Ok(self
            .working
            .settings
            .get(&category)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_setting(
        &mut self,
        category: SettingsCategory,
        key: &str,
        value: &Value,
    ) -> Result<(), AppError> {
        self.working
            .settings
            .entry(category)
            .or_default()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn role(&mut self, id: RoleId) -> Result<Option<Role>, AppError> {
        Ok(self.working.roles.get(&id).cloned())
    }

    async fn role_by_name(&mut self, name: &str) -> Result<Option<Role>, AppError> {
        Ok(self
            .working
            .roles
            .values()
            .find(|role| role.name == name)
            .cloned())
    }

    async fn insert_role(&mut self, role: &Role) -> Result<(), AppError> {
        if self.working.roles.values().any(|r| r.name == role.name) {
            return Err(AppError::persist(anyhow::anyhow!(
                "duplicate role name {}",
                role.name
            )));
        }
        self.working.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn update_role(&mut self, role: &Role) -> Result<(), AppError> {
        match self.working.roles.get_mut(&role.id) {
            Some(existing) => {
                *existing = role.clone();
                Ok(())
            }
            None => Err(AppError::persist(anyhow::anyhow!("role {} vanished", role.id))),
        }
    }

    async fn delete_role(&mut self, id: RoleId) -> Result<(), AppError> {
        self.working.roles.remove(&id);
        self.working.role_capabilities.remove(&id);
        self.working
            .assignments
            .retain(|(_, role_id), _| *role_id != id);
        Ok(())
    }

    async fn role_capabilities(&mut self, id: RoleId) -> Result<BTreeSet<String>, AppError> {
        Ok(self
            .working
            .role_capabilities
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_role_capabilities(
        &mut self,
        id: RoleId,
        capabilities: &BTreeSet<String>,
    ) -> Result<(), AppError> {
        self.working
            .role_capabilities
            .insert(id, capabilities.clone());
        Ok(())
    }

    async fn existing_capabilities(
        &mut self,
        names: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, AppError> {
        Ok(names
            .iter()
            .filter(|name| self.working.capabilities.contains_key(*name))
            .cloned()
            .collect())
    }

    async fn role_assignments(
        &mut self,
        role_id: RoleId,
    ) -> Result<Vec<UserRoleAssignment>, AppError> {
        Ok(self
            .working
            .assignments
            .values()
            .filter(|assignment| assignment.role_id == role_id)
            .cloned()
            .collect())
    }

    async fn assignment(
        &mut self,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<Option<UserRoleAssignment>, AppError> {
        Ok(self.working.assignments.get(&(user_id, role_id)).cloned())
    }

    async fn save_assignment(&mut self, assignment: &UserRoleAssignment) -> Result<(), AppError> {
        self.working
            .assignments
            .insert((assignment.user_id, assignment.role_id), assignment.clone());
        Ok(())
    }

    async fn delete_assignment(
        &mut self,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), AppError> {
        self.working.assignments.remove(&(user_id, role_id));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryUnitOfWork {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audit_log::ActionType;

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let store = MemoryStore::new();
        {
            let mut uow = store.begin().await.expect("begin");
            uow.save_module_config(&ModuleConfig::implicit("payroll"))
                .await
                .expect("save");
        }
        let mut uow = store.begin().await.expect("begin");
        assert!(uow.module_config("payroll").await.expect("read").is_none());
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.expect("begin");
        uow.save_setting(SettingsCategory::Tts, "tts_voice", &Value::from("alloy"))
            .await
            .expect("save");
        uow.commit().await.expect("commit");

        let settings = store.settings_snapshot(SettingsCategory::Tts).await;
        assert_eq!(settings.get("tts_voice"), Some(&Value::from("alloy")));
    }

    #[tokio::test]
    async fn audit_ids_are_monotonic() {
        let store = MemoryStore::new();
        let first = store
            .seed_audit_record(NewAuditRecord::new("a", ActionType::PageEdit, "page", "x"))
            .await;
        let second = store
            .seed_audit_record(NewAuditRecord::new("a", ActionType::PageEdit, "page", "y"))
            .await;
        assert!(second > first);
    }

    #[tokio::test]
    async fn failing_audit_writes_surface_persist_failure() {
        let store = MemoryStore::new();
        store.set_audit_writes_failing(true);
        let mut uow = store.begin().await.expect("begin");
        let err = uow
            .insert_audit_record(&NewAuditRecord::new("a", ActionType::PageEdit, "page", "x"))
            .await
            .expect_err("should fail");
        assert_eq!(err.code(), "PERSIST_FAILURE");
    }
}
