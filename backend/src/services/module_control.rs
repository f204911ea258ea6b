//! Module toggles and configuration updates.
//!
//! Every write reads the persisted state inside its own unit of work, re-runs the dependency
//! check against it, then writes the config and its audit record before committing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use std::collections::BTreeMap;

use crate::{
    error::AppError,
    models::{
        audit_log::{object_types, ActionType, NewAuditRecord},
        module::{ConflictDescription, Direction, ModuleConfig},
    },
    repositories::{Store, UnitOfWork},
    services::{
        audit_log::{Actor, AuditRecorder},
        dependency::{self, EnabledSet},
        module_registry::ModuleRegistry,
        navigation::{self, NavItem},
    },
    validation::rules::validate_identifier,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    EnableAll,
    DisableAll,
}

impl BulkAction {
    fn direction(self) -> Direction {
        match self {
            BulkAction::EnableAll => Direction::Enable,
            BulkAction::DisableAll => Direction::Disable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: &AppError) -> Self {
        Self {
            success: false,
            error: Some(operator_message(error)),
        }
    }
}

/// A registered module together with its persisted state and the conflicts flipping it
/// would raise right now.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleStatus {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub icon: Option<String>,
    pub route: Option<String>,
    pub enabled: bool,
    pub config: Value,
    pub updated_at: Option<DateTime<Utc>>,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
    pub conflicts: Vec<ConflictDescription>,
}

pub struct ModuleService<'a> {
    store: &'a dyn Store,
    registry: &'a ModuleRegistry,
}

impl<'a> ModuleService<'a> {
    pub fn new(store: &'a dyn Store, registry: &'a ModuleRegistry) -> Self {
        Self { store, registry }
    }

    /// Flips one module, optionally replacing its config blob in the same write.
    pub async fn toggle_module(
        &self,
        actor: &Actor,
        name: &str,
        enabled: bool,
        config_data: Option<Value>,
    ) -> Result<ModuleConfig, AppError> {
        let name = checked_name(name)?;
        if let Some(config) = &config_data {
            checked_config(config)?;
        }

        let mut uow = self.store.begin().await?;
        let saved = self
            .apply_toggle(uow.as_mut(), actor, name, enabled, config_data)
            .await?;
        uow.commit().await?;
        Ok(saved)
    }

    /// Enables or disables every registered module, one unit of work per module.
    ///
    /// `enable_all` walks prerequisites first and `disable_all` walks dependents first, so a
    /// module blocked only by an earlier entry of the same batch still succeeds. Modules
    /// already in the target state succeed without writing anything.
    pub async fn bulk_toggle(
        &self,
        actor: &Actor,
        action: BulkAction,
    ) -> BTreeMap<String, BulkOutcome> {
        let direction = action.direction();
        let order: Vec<&str> = match direction {
            Direction::Enable => self
                .registry
                .dependency_order()
                .map(|m| m.name.as_str())
                .collect(),
            Direction::Disable => self
                .registry
                .dependency_order()
                .rev()
                .map(|m| m.name.as_str())
                .collect(),
        };

        let mut results = BTreeMap::new();
        for name in order {
            let outcome = match self.bulk_step(actor, name, direction).await {
                Ok(()) => BulkOutcome::ok(),
                Err(err) => {
                    tracing::warn!(module = name, error = %err, "bulk toggle step refused");
                    BulkOutcome::failed(&err)
                }
            };
            results.insert(name.to_string(), outcome);
        }

        let failed = results.values().filter(|o| !o.success).count();
        tracing::info!(
            actor_id = %actor.id,
            action = ?action,
            modules = results.len(),
            failed,
            "bulk toggle finished"
        );
        results
    }

    /// Replaces a module's config blob without touching its enabled flag.
    pub async fn update_config(
        &self,
        actor: &Actor,
        name: &str,
        config: Value,
    ) -> Result<ModuleConfig, AppError> {
        let name = checked_name(name)?;
        checked_config(&config)?;

        let mut uow = self.store.begin().await?;
        let current = match uow.module_config(name).await? {
            Some(current) => current,
            None if self.registry.contains(name) => ModuleConfig::implicit(name),
            None => return Err(AppError::NotFound(format!("Module '{}' not found", name))),
        };

        let updated = ModuleConfig {
            config: Json(config),
            ..current.clone()
        };
        let saved = uow.save_module_config(&updated).await?;
        AuditRecorder::record(
            uow.as_mut(),
            NewAuditRecord::new(
                &actor.id,
                ActionType::ModuleConfigUpdate,
                object_types::MODULE,
                name,
            )
            .before(Some(current.snapshot()))
            .after(Some(saved.snapshot()))
            .description(format!("Updated configuration of {}", self.label(name)))
            .request_id(actor.request_id.clone()),
        )
        .await?;
        uow.commit().await?;

        tracing::info!(actor_id = %actor.id, module = name, "module config updated");
        Ok(saved)
    }

    /// Every registered module in declaration order.
    pub async fn list_modules(&self) -> Result<Vec<ModuleStatus>, AppError> {
        let configs = self.persisted_configs().await?;
        let enabled = dependency::enabled_set(configs.values());

        Ok(self
            .registry
            .modules()
            .iter()
            .map(|module| {
                let config = configs
                    .get(&module.name)
                    .cloned()
                    .unwrap_or_else(|| ModuleConfig::implicit(&module.name));
                let flip = Direction::from_enabled(!config.enabled);
                ModuleStatus {
                    name: module.name.clone(),
                    display_name: module.display_name.clone(),
                    description: module.description.clone(),
                    icon: module.icon.clone(),
                    route: module.route.clone(),
                    enabled: config.enabled,
                    config: config.config.0,
                    updated_at: config.updated_at,
                    dependencies: module.dependencies.clone(),
                    dependents: self.registry.dependents_of(&module.name).to_vec(),
                    conflicts: dependency::check_transition(
                        self.registry,
                        &enabled,
                        &module.name,
                        flip,
                    ),
                }
            })
            .collect())
    }

    /// Speculative dependency check against the persisted state. Writes nothing.
    pub async fn check_transition(
        &self,
        name: &str,
        direction: Direction,
    ) -> Result<Vec<ConflictDescription>, AppError> {
        let name = checked_name(name)?;
        let enabled = self.enabled_modules().await?;
        Ok(dependency::check_transition(
            self.registry,
            &enabled,
            name,
            direction,
        ))
    }

    pub async fn navigation(&self) -> Result<Vec<NavItem>, AppError> {
        let enabled = self.enabled_modules().await?;
        Ok(navigation::project(self.registry, &enabled))
    }

    async fn bulk_step(
        &self,
        actor: &Actor,
        name: &str,
        direction: Direction,
    ) -> Result<(), AppError> {
        let mut uow = self.store.begin().await?;
        let currently_enabled = uow
            .module_config(name)
            .await?
            .map_or(false, |current| current.enabled);
        if currently_enabled == direction.target_enabled() {
            return Ok(());
        }
        self.apply_toggle(uow.as_mut(), actor, name, direction.target_enabled(), None)
            .await?;
        uow.commit().await
    }

    async fn apply_toggle(
        &self,
        uow: &mut dyn UnitOfWork,
        actor: &Actor,
        name: &str,
        enabled: bool,
        config_data: Option<Value>,
    ) -> Result<ModuleConfig, AppError> {
        let current = uow
            .module_config(name)
            .await?
            .unwrap_or_else(|| ModuleConfig::implicit(name));
        let live = dependency::enabled_set(uow.module_configs().await?.iter());

        let direction = Direction::from_enabled(enabled);
        let conflicts = dependency::check_transition(self.registry, &live, name, direction);
        if !conflicts.is_empty() {
            tracing::warn!(
                actor_id = %actor.id,
                module = name,
                direction = ?direction,
                conflicts = conflicts.len(),
                "module transition refused"
            );
            return Err(AppError::DependencyConflict {
                module: name.to_string(),
                conflicts,
            });
        }

        let next = ModuleConfig {
            enabled,
            config: config_data.map(Json).unwrap_or_else(|| current.config.clone()),
            ..current.clone()
        };
        let saved = uow.save_module_config(&next).await?;
        let verb = if enabled { "Enabled" } else { "Disabled" };
        AuditRecorder::record(
            uow,
            NewAuditRecord::new(&actor.id, ActionType::ModuleToggle, object_types::MODULE, name)
                .before(Some(current.snapshot()))
                .after(Some(saved.snapshot()))
                .description(format!("{} module {}", verb, self.label(name)))
                .request_id(actor.request_id.clone()),
        )
        .await?;

        tracing::info!(actor_id = %actor.id, module = name, enabled, "module toggled");
        Ok(saved)
    }

    async fn persisted_configs(&self) -> Result<BTreeMap<String, ModuleConfig>, AppError> {
        let mut uow = self.store.begin().await?;
        let configs = uow.module_configs().await?;
        Ok(configs
            .into_iter()
            .map(|config| (config.name.clone(), config))
            .collect())
    }

    async fn enabled_modules(&self) -> Result<EnabledSet, AppError> {
        let configs = self.persisted_configs().await?;
        Ok(dependency::enabled_set(configs.values()))
    }

    fn label<'n>(&'n self, name: &'n str) -> &'n str {
        self.registry
            .get(name)
            .map(|m| m.display_name.as_str())
            .unwrap_or(name)
    }
}

fn checked_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation(vec![
            "module_name: is required".to_string()
        ]));
    }
    validate_identifier(name)
        .map_err(|reason| AppError::Validation(vec![format!("module_name: {}", reason)]))?;
    Ok(name)
}

fn checked_config(config: &Value) -> Result<(), AppError> {
    if config.is_object() {
        Ok(())
    } else {
        Err(AppError::Validation(vec![
            "config_data: must be a JSON object".to_string()
        ]))
    }
}

/// Message shown per module in bulk results.
fn operator_message(error: &AppError) -> String {
    match error {
        AppError::DependencyConflict { conflicts, .. } => conflicts
            .iter()
            .map(|c| c.message.as_str())
            .collect::<Vec<_>>()
            .join("; "),
        AppError::PersistFailure(_) | AppError::InternalServerError(_) => {
            "The change could not be saved".to_string()
        }
        other => other.to_string(),
    }
}
