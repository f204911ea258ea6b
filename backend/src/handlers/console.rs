//! `POST /api/admin/console`: one JSON endpoint dispatching on the `action` field.
//!
//! State-changing actions must carry the session's CSRF token in `x-csrf-token`; the token
//! is checked before the payload is even decoded. Each action then checks its capability.

use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::AppError,
    handlers::audit_logs::{self, ExportQuery, LogQuery},
    middleware::{AdminSession, RequestId},
    models::{
        module::Direction,
        role::{capabilities, AssignRole, CreateRole, RemoveRole, UpdateRole},
    },
    services::{
        audit_log::Actor,
        module_control::{BulkAction, ModuleService},
        pages::PageService,
        roles::RoleService,
        settings::SettingsService,
    },
    state::AppState,
    types::RoleId,
};

/// Actions that only read state and therefore skip the CSRF check.
const READ_ONLY_ACTIONS: [&str; 5] = [
    "get_logs",
    "export_logs",
    "get_modules",
    "check_transition",
    "get_navigation",
];

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ConsoleAction {
    ToggleModule {
        module_name: String,
        enabled: bool,
        #[serde(default)]
        config_data: Option<Value>,
    },
    BulkToggle {
        bulk_action: BulkAction,
    },
    UpdateConfig {
        module_name: String,
        config_data: Value,
    },
    CheckTransition {
        module_name: String,
        direction: Direction,
    },
    GetModules,
    GetNavigation,
    RollbackChange {
        log_id: i64,
    },
    GetLogs(LogQuery),
    ExportLogs(ExportQuery),
    UpdateSettings {
        settings: Value,
    },
    CreateRole(CreateRole),
    UpdateRole(UpdateRole),
    DeleteRole {
        role_id: RoleId,
    },
    AssignRole(AssignRole),
    RemoveRole(RemoveRole),
    EditPage {
        path: String,
        content: String,
    },
}

impl ConsoleAction {
    fn required_capability(&self) -> Option<&'static str> {
        match self {
            ConsoleAction::ToggleModule { .. }
            | ConsoleAction::BulkToggle { .. }
            | ConsoleAction::UpdateConfig { .. }
            | ConsoleAction::CheckTransition { .. }
            | ConsoleAction::GetModules => Some(capabilities::MANAGE_MODULES),
            ConsoleAction::GetNavigation => None,
            ConsoleAction::RollbackChange { .. } => Some(capabilities::ROLLBACK_CHANGES),
            ConsoleAction::GetLogs(_) | ConsoleAction::ExportLogs(_) => {
                Some(capabilities::VIEW_AUDIT_LOG)
            }
            ConsoleAction::UpdateSettings { .. } => Some(capabilities::MANAGE_SETTINGS),
            ConsoleAction::CreateRole(_)
            | ConsoleAction::UpdateRole(_)
            | ConsoleAction::DeleteRole { .. }
            | ConsoleAction::AssignRole(_)
            | ConsoleAction::RemoveRole(_) => Some(capabilities::MANAGE_ROLES),
            ConsoleAction::EditPage { .. } => Some(capabilities::MANAGE_PAGES),
        }
    }
}

pub async fn dispatch(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let action_name = body
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("Missing `action`".to_string()))?
        .to_string();

    if !READ_ONLY_ACTIONS.contains(&action_name.as_str()) {
        session.verify_csrf(&headers).map_err(|err| {
            tracing::warn!(
                actor_id = %session.actor_id,
                action = %action_name,
                "CSRF check failed"
            );
            err
        })?;
    }

    let action: ConsoleAction = serde_json::from_value(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid `{}` request: {}", action_name, e)))?;
    if let Some(capability) = action.required_capability() {
        session.require(capability)?;
    }

    let actor = Actor::new(session.actor_id.clone()).with_request_id(Some(request_id.0));
    tracing::debug!(actor_id = %actor.id, action = %action_name, "console action");
    run(&state, &actor, action).await
}

async fn run(state: &AppState, actor: &Actor, action: ConsoleAction) -> Result<Response, AppError> {
    let store = state.store.as_ref();
    let modules = ModuleService::new(store, &state.registry);

    let body = match action {
        ConsoleAction::ToggleModule {
            module_name,
            enabled,
            config_data,
        } => {
            let saved = modules
                .toggle_module(actor, &module_name, enabled, config_data)
                .await?;
            let verb = if saved.enabled { "enabled" } else { "disabled" };
            json!({
                "message": format!("Module {} {}", module_name.trim(), verb),
                "module": saved,
                "navigation": modules.navigation().await?,
            })
        }
        ConsoleAction::BulkToggle { bulk_action } => {
            let results = modules.bulk_toggle(actor, bulk_action).await;
            json!({ "results": results, "navigation": modules.navigation().await? })
        }
        ConsoleAction::UpdateConfig {
            module_name,
            config_data,
        } => {
            modules
                .update_config(actor, &module_name, config_data)
                .await?;
            json!({ "message": format!("Configuration of {} updated", module_name.trim()) })
        }
        ConsoleAction::CheckTransition {
            module_name,
            direction,
        } => {
            let conflicts = modules.check_transition(&module_name, direction).await?;
            json!({
                "module": module_name.trim(),
                "direction": direction,
                "allowed": conflicts.is_empty(),
                "conflicts": conflicts,
            })
        }
        ConsoleAction::GetModules => json!({ "modules": modules.list_modules().await? }),
        ConsoleAction::GetNavigation => json!({ "navigation": modules.navigation().await? }),
        ConsoleAction::RollbackChange { log_id } => {
            let outcome = state.rollback.rollback(store, log_id, actor).await?;
            json!({
                "message": format!("Change #{} rolled back", log_id),
                "revert_id": outcome.revert_id,
                "object_type": outcome.object_type,
                "object_id": outcome.object_id,
                "restored": outcome.restored,
            })
        }
        ConsoleAction::GetLogs(query) => {
            let page = audit_logs::get_logs(
                store,
                &query,
                state.config.audit_log_per_page,
                &state.config.time_zone,
            )
            .await?;
            json!(page)
        }
        ConsoleAction::ExportLogs(query) => {
            return audit_logs::export_logs(
                store,
                &query,
                state.config.audit_log_export_max_rows,
                &state.config.time_zone,
            )
            .await;
        }
        ConsoleAction::UpdateSettings { settings } => {
            let changed = SettingsService::new(store)
                .update_tts(actor, &settings)
                .await?;
            let message = if changed.is_empty() {
                "No settings changed"
            } else {
                "Settings updated"
            };
            let changed: Vec<&str> = changed.iter().map(|key| key.as_str()).collect();
            json!({ "message": message, "changed": changed })
        }
        ConsoleAction::CreateRole(payload) => {
            let role = RoleService::new(store).create_role(actor, payload).await?;
            json!({ "message": format!("Role {} created", role.name), "role": role })
        }
        ConsoleAction::UpdateRole(payload) => {
            let role = RoleService::new(store).update_role(actor, payload).await?;
            json!({ "message": format!("Role {} updated", role.name), "role": role })
        }
        ConsoleAction::DeleteRole { role_id } => {
            RoleService::new(store).delete_role(actor, role_id).await?;
            json!({ "message": "Role deleted" })
        }
        ConsoleAction::AssignRole(payload) => {
            let assignment = RoleService::new(store).assign_role(actor, payload).await?;
            json!({ "message": "Role assigned", "assignment": assignment })
        }
        ConsoleAction::RemoveRole(payload) => {
            RoleService::new(store).remove_role(actor, payload).await?;
            json!({ "message": "Role removed" })
        }
        ConsoleAction::EditPage { path, content } => {
            let changed = PageService::new(store, state.pages.as_ref())
                .edit_page(actor, &path, &content)
                .await?;
            let message = if changed { "Page saved" } else { "Page unchanged" };
            json!({ "message": message, "changed": changed })
        }
    };

    Ok(Json(body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_decode_from_tagged_json() {
        let action: ConsoleAction = serde_json::from_value(json!({
            "action": "toggle_module",
            "module_name": "payroll",
            "enabled": true
        }))
        .expect("toggle");
        assert!(matches!(
            action,
            ConsoleAction::ToggleModule { ref module_name, enabled: true, config_data: None }
                if module_name == "payroll"
        ));

        let action: ConsoleAction = serde_json::from_value(json!({
            "action": "bulk_toggle",
            "bulk_action": "disable_all"
        }))
        .expect("bulk");
        assert!(matches!(
            action,
            ConsoleAction::BulkToggle { bulk_action: BulkAction::DisableAll }
        ));

        let action: ConsoleAction = serde_json::from_value(json!({
            "action": "get_logs",
            "page": 2,
            "object_type": "module"
        }))
        .expect("logs");
        match action {
            ConsoleAction::GetLogs(query) => {
                assert_eq!(query.page, Some(2));
                assert_eq!(query.filters.object_type.as_deref(), Some("module"));
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn read_only_actions_need_no_capability_for_navigation() {
        let action: ConsoleAction =
            serde_json::from_value(json!({"action": "get_navigation"})).expect("nav");
        assert_eq!(action.required_capability(), None);
        let action: ConsoleAction =
            serde_json::from_value(json!({"action": "rollback_change", "log_id": 3}))
                .expect("rollback");
        assert_eq!(action.required_capability(), Some(capabilities::ROLLBACK_CHANGES));
    }
}
