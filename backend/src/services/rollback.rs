//! Audit-log driven rollback.
//!
//! The dispatcher looks up a record, picks the [`RestoreHandler`] registered for its object
//! type, applies the record's before state, and audits the reversal as a `revert_change`
//! record in the same unit of work. Adding a reversible object type means registering a
//! handler; the dispatcher itself never changes.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::types::Json;
use std::{collections::HashMap, sync::Arc};

use crate::{
    error::AppError,
    models::{
        audit_log::{object_types, ActionType, NewAuditRecord},
        module::{ModuleConfig, ModuleSnapshot},
        role::{Role, RoleSnapshot},
        settings::{SettingsCategory, TtsSettingKey},
    },
    repositories::{Store, UnitOfWork},
    services::{
        audit_log::{Actor, AuditRecorder},
        pages::{normalize_page_path, page_snapshot, PageStore},
    },
    types::RoleId,
};

#[async_trait]
pub trait RestoreHandler: Send + Sync {
    /// Writes `before` back onto the live object and returns the state it overwrote, in the
    /// same snapshot shape.
    async fn restore(
        &self,
        uow: &mut dyn UnitOfWork,
        object_id: &str,
        before: &Value,
    ) -> Result<Value, AppError>;

    /// Reverts side effects that live outside the unit of work when the rollback is aborted
    /// after `restore` returned.
    async fn compensate(&self, _object_id: &str, _previous: &Value) -> Result<(), AppError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RollbackOutcome {
    /// The record that was rolled back.
    pub reverted_id: i64,
    /// The new `revert_change` record.
    pub revert_id: i64,
    pub object_type: String,
    pub object_id: String,
    pub restored: Value,
}

#[derive(Clone, Default)]
pub struct RollbackDispatcher {
    handlers: HashMap<String, Arc<dyn RestoreHandler>>,
}

impl RollbackDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher with the handlers for settings, modules, roles and pages.
    pub fn with_default_handlers(pages: Arc<dyn PageStore>) -> Self {
        let mut dispatcher = Self::new();
        dispatcher
            .register(
                SettingsCategory::Tts.object_type(),
                Arc::new(TtsSettingsRestore),
            )
            .register(object_types::MODULE, Arc::new(ModuleRestore))
            .register(object_types::ROLE, Arc::new(RoleRestore))
            .register(object_types::PAGE, Arc::new(PageRestore { pages }));
        dispatcher
    }

    pub fn register(&mut self, object_type: &str, handler: Arc<dyn RestoreHandler>) -> &mut Self {
        self.handlers.insert(object_type.to_string(), handler);
        self
    }

    pub fn supports(&self, object_type: &str) -> bool {
        self.handlers.contains_key(object_type)
    }

    pub async fn rollback(
        &self,
        store: &dyn Store,
        log_id: i64,
        actor: &Actor,
    ) -> Result<RollbackOutcome, AppError> {
        let mut uow = store.begin().await?;
        let record = uow
            .fetch_audit_record(log_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Audit log entry {} not found", log_id)))?;

        let before = record
            .before()
            .filter(|state| !state.is_null())
            .cloned()
            .ok_or_else(|| {
                AppError::NotReversible(format!(
                    "Audit log entry {} has no previous state to restore",
                    log_id
                ))
            })?;
        let (object_type, object_id) = match (
            record.object_type.as_deref().filter(|s| !s.is_empty()),
            record.object_id.as_deref().filter(|s| !s.is_empty()),
        ) {
            (Some(object_type), Some(object_id)) => (object_type, object_id),
            _ => {
                return Err(AppError::NotReversible(format!(
                    "Audit log entry {} does not identify the changed object",
                    log_id
                )))
            }
        };
        let handler = self.handlers.get(object_type).ok_or_else(|| {
            AppError::RollbackNotSupported(format!(
                "Rollback is not supported for '{}' changes",
                object_type
            ))
        })?;

        let previous = handler.restore(uow.as_mut(), object_id, &before).await?;
        // Every revert carries both sides: fall back to the overwritten live state when the
        // reverted record has no after state.
        let revert_before = record
            .after()
            .filter(|state| !state.is_null())
            .cloned()
            .unwrap_or_else(|| previous.clone());

        let description = if record.description.is_empty() {
            format!("Reverted change #{}", log_id)
        } else {
            format!("Reverted change #{}: {}", log_id, record.description)
        };
        let written = AuditRecorder::record(
            uow.as_mut(),
            NewAuditRecord::new(&actor.id, ActionType::RevertChange, object_type, object_id)
                .before(Some(revert_before))
                .after(Some(before.clone()))
                .description(description)
                .reverts(log_id)
                .request_id(actor.request_id.clone()),
        )
        .await;
        let committed = match written {
            Ok(revert) => uow.commit().await.map(|()| revert),
            Err(err) => Err(err),
        };

        match committed {
            Ok(revert) => {
                tracing::info!(
                    actor_id = %actor.id,
                    reverted_id = log_id,
                    revert_id = revert.id,
                    object_type,
                    object_id,
                    "change rolled back"
                );
                Ok(RollbackOutcome {
                    reverted_id: log_id,
                    revert_id: revert.id,
                    object_type: object_type.to_string(),
                    object_id: object_id.to_string(),
                    restored: before,
                })
            }
            Err(err) => {
                if let Err(undo_err) = handler.compensate(object_id, &previous).await {
                    tracing::error!(
                        object_type,
                        object_id,
                        error = %undo_err,
                        "failed to undo restore after aborted rollback"
                    );
                }
                Err(err)
            }
        }
    }
}

fn malformed(what: &str, err: impl std::fmt::Display) -> AppError {
    AppError::NotReversible(format!("{} snapshot is malformed: {}", what, err))
}

/// Partial-key restore: only the keys present in the snapshot are written back. A `null`
/// value unsets the key.
pub struct TtsSettingsRestore;

#[async_trait]
impl RestoreHandler for TtsSettingsRestore {
    async fn restore(
        &self,
        uow: &mut dyn UnitOfWork,
        _object_id: &str,
        before: &Value,
    ) -> Result<Value, AppError> {
        let category = SettingsCategory::Tts;
        let entries = before
            .as_object()
            .ok_or_else(|| malformed("settings", "expected an object"))?;

        let mut parsed = Vec::with_capacity(entries.len());
        for (raw_key, value) in entries {
            let key: TtsSettingKey = raw_key.parse().map_err(|e| malformed("settings", e))?;
            if !value.is_null() {
                key.validate(value).map_err(|e| malformed("settings", e))?;
            }
            parsed.push((key, value));
        }

        let stored = uow.settings(category).await?;
        let mut previous = Map::new();
        for (key, value) in parsed {
            previous.insert(
                key.to_string(),
                stored.get(key.as_str()).cloned().unwrap_or(Value::Null),
            );
            uow.save_setting(category, key.as_str(), value).await?;
        }
        Ok(Value::Object(previous))
    }
}

/// Restores the enabled flag and config blob in one write. The dependency graph is not
/// consulted.
pub struct ModuleRestore;

#[async_trait]
impl RestoreHandler for ModuleRestore {
    async fn restore(
        &self,
        uow: &mut dyn UnitOfWork,
        object_id: &str,
        before: &Value,
    ) -> Result<Value, AppError> {
        let snapshot: ModuleSnapshot =
            serde_json::from_value(before.clone()).map_err(|e| malformed("module", e))?;
        let current = uow
            .module_config(object_id)
            .await?
            .unwrap_or_else(|| ModuleConfig::implicit(object_id));

        let restored = ModuleConfig {
            enabled: snapshot.enabled,
            config: Json(snapshot.config),
            ..current.clone()
        };
        uow.save_module_config(&restored).await?;
        Ok(current.snapshot())
    }
}

/// Restores name, display name, description and the full capability set of a role that
/// still exists.
pub struct RoleRestore;

#[async_trait]
impl RestoreHandler for RoleRestore {
    async fn restore(
        &self,
        uow: &mut dyn UnitOfWork,
        object_id: &str,
        before: &Value,
    ) -> Result<Value, AppError> {
        let role_id: RoleId = object_id.parse().map_err(|e| malformed("role", e))?;
        let snapshot: RoleSnapshot =
            serde_json::from_value(before.clone()).map_err(|e| malformed("role", e))?;

        let current = uow
            .role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Role no longer exists".to_string()))?;
        let current_capabilities = uow.role_capabilities(role_id).await?;

        if snapshot.name != current.name {
            if current.is_system {
                return Err(AppError::Forbidden(
                    "System roles cannot be renamed".to_string(),
                ));
            }
            if uow.role_by_name(&snapshot.name).await?.is_some() {
                return Err(AppError::Conflict(format!(
                    "Role '{}' already exists",
                    snapshot.name
                )));
            }
        }

        let known = uow.existing_capabilities(&snapshot.capabilities).await?;
        if let Some(missing) = snapshot.capabilities.difference(&known).next() {
            return Err(AppError::NotReversible(format!(
                "Capability '{}' no longer exists",
                missing
            )));
        }

        let previous = RoleSnapshot::of(&current, current_capabilities);
        let restored = Role {
            name: snapshot.name,
            display_name: snapshot.display_name,
            description: snapshot.description,
            updated_at: Utc::now(),
            ..current
        };
        uow.update_role(&restored).await?;
        uow.replace_role_capabilities(role_id, &snapshot.capabilities)
            .await?;
        Ok(previous.to_value())
    }
}

/// Writes `before.content` back to the page path. The write happens outside the unit of
/// work, so an aborted rollback rewrites the overwritten content.
pub struct PageRestore {
    pages: Arc<dyn PageStore>,
}

impl PageRestore {
    pub fn new(pages: Arc<dyn PageStore>) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl RestoreHandler for PageRestore {
    async fn restore(
        &self,
        _uow: &mut dyn UnitOfWork,
        object_id: &str,
        before: &Value,
    ) -> Result<Value, AppError> {
        let content = before
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("page", "missing content"))?;
        let path = normalize_page_path(object_id).map_err(|e| malformed("page", e))?;

        let previous = self.pages.read(&path).await?;
        self.pages.write(&path, content).await?;
        Ok(previous.as_deref().map(page_snapshot).unwrap_or(Value::Null))
    }

    async fn compensate(&self, object_id: &str, previous: &Value) -> Result<(), AppError> {
        let path = normalize_page_path(object_id)?;
        match previous.get("content").and_then(Value::as_str) {
            Some(content) => self.pages.write(&path, content).await,
            None => self.pages.remove(&path).await,
        }
    }
}
