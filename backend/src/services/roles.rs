//! Role and capability editor. Every change is audited with full role snapshots; the
//! capability set in a snapshot is always the complete set.

use std::collections::BTreeSet;

use chrono::Utc;

use crate::{
    error::AppError,
    models::{
        audit_log::{object_types, ActionType, NewAuditRecord},
        role::{
            AssignRole, CreateRole, RemoveRole, Role, RoleSnapshot, UpdateRole,
            UserRoleAssignment,
        },
    },
    repositories::{Store, UnitOfWork},
    services::audit_log::{Actor, AuditRecorder},
    types::RoleId,
    validation::Validate,
};

pub struct RoleService<'a> {
    store: &'a dyn Store,
}

impl<'a> RoleService<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn create_role(&self, actor: &Actor, payload: CreateRole) -> Result<Role, AppError> {
        payload.validate()?;
        let capabilities = capability_set(&payload.capabilities);

        let mut uow = self.store.begin().await?;
        if uow.role_by_name(&payload.name).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Role '{}' already exists",
                payload.name
            )));
        }
        ensure_capabilities(uow.as_mut(), &capabilities).await?;

        let now = Utc::now();
        let role = Role {
            id: RoleId::new(),
            name: payload.name,
            display_name: payload.display_name,
            description: payload.description,
            is_system: false,
            created_at: now,
            updated_at: now,
        };
        uow.insert_role(&role).await?;
        uow.replace_role_capabilities(role.id, &capabilities).await?;

        let after = RoleSnapshot::of(&role, capabilities);
        AuditRecorder::record(
            uow.as_mut(),
            NewAuditRecord::new(
                &actor.id,
                ActionType::RoleCreate,
                object_types::ROLE,
                &role.id.to_string(),
            )
            .after(Some(after.to_value()))
            .description(format!("Created role {}", role.display_name))
            .request_id(actor.request_id.clone()),
        )
        .await?;
        uow.commit().await?;

        tracing::info!(actor_id = %actor.id, role_id = %role.id, name = %role.name, "role created");
        Ok(role)
    }

    /// Updates role metadata and replaces its whole capability set.
    pub async fn update_role(&self, actor: &Actor, payload: UpdateRole) -> Result<Role, AppError> {
        payload.validate()?;
        let capabilities = capability_set(&payload.capabilities);

        let mut uow = self.store.begin().await?;
        let current = uow
            .role(payload.role_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Role not found".to_string()))?;

        let name = match payload.name {
            Some(name) if name != current.name => {
                if current.is_system {
                    return Err(AppError::Forbidden(
                        "System roles cannot be renamed".to_string(),
                    ));
                }
                if uow.role_by_name(&name).await?.is_some() {
                    return Err(AppError::Conflict(format!("Role '{}' already exists", name)));
                }
                name
            }
            _ => current.name.clone(),
        };
        ensure_capabilities(uow.as_mut(), &capabilities).await?;

        let before = RoleSnapshot::of(&current, uow.role_capabilities(current.id).await?);
        let updated = Role {
            name,
            display_name: payload.display_name,
            description: payload.description,
            updated_at: Utc::now(),
            ..current
        };
        uow.update_role(&updated).await?;
        uow.replace_role_capabilities(updated.id, &capabilities).await?;
        let after = RoleSnapshot::of(&updated, capabilities);

        AuditRecorder::record(
            uow.as_mut(),
            NewAuditRecord::new(
                &actor.id,
                ActionType::RoleUpdate,
                object_types::ROLE,
                &updated.id.to_string(),
            )
            .before(Some(before.to_value()))
            .after(Some(after.to_value()))
            .description(format!("Updated role {}", updated.display_name))
            .request_id(actor.request_id.clone()),
        )
        .await?;
        uow.commit().await?;

        tracing::info!(actor_id = %actor.id, role_id = %updated.id, "role updated");
        Ok(updated)
    }

    pub async fn delete_role(&self, actor: &Actor, role_id: RoleId) -> Result<(), AppError> {
        let mut uow = self.store.begin().await?;
        let current = uow
            .role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Role not found".to_string()))?;
        if current.is_system {
            return Err(AppError::Forbidden(
                "System roles cannot be deleted".to_string(),
            ));
        }

        let now = Utc::now();
        let active = uow
            .role_assignments(role_id)
            .await?
            .iter()
            .filter(|assignment| assignment.is_active_at(now))
            .count();
        if active > 0 {
            return Err(AppError::Conflict(format!(
                "Role is still assigned to {} user(s)",
                active
            )));
        }

        let before = RoleSnapshot::of(&current, uow.role_capabilities(role_id).await?);
        uow.delete_role(role_id).await?;
        AuditRecorder::record(
            uow.as_mut(),
            NewAuditRecord::new(
                &actor.id,
                ActionType::RoleDelete,
                object_types::ROLE,
                &role_id.to_string(),
            )
            .before(Some(before.to_value()))
            .description(format!("Deleted role {}", current.display_name))
            .request_id(actor.request_id.clone()),
        )
        .await?;
        uow.commit().await?;

        tracing::info!(actor_id = %actor.id, role_id = %role_id, "role deleted");
        Ok(())
    }

    /// Grants a role to a user, replacing the expiry of an existing assignment.
    pub async fn assign_role(
        &self,
        actor: &Actor,
        payload: AssignRole,
    ) -> Result<UserRoleAssignment, AppError> {
        let now = Utc::now();
        if payload.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(AppError::Validation(vec![
                "expires_at: must be in the future".to_string()
            ]));
        }

        let mut uow = self.store.begin().await?;
        let role = uow
            .role(payload.role_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Role not found".to_string()))?;
        let existing = uow.assignment(payload.user_id, payload.role_id).await?;

        let assignment = UserRoleAssignment {
            user_id: payload.user_id,
            role_id: payload.role_id,
            expires_at: payload.expires_at,
            assigned_by: actor.id.clone(),
            created_at: existing.as_ref().map_or(now, |a| a.created_at),
        };
        uow.save_assignment(&assignment).await?;
        AuditRecorder::record(
            uow.as_mut(),
            NewAuditRecord::new(
                &actor.id,
                ActionType::RoleAssign,
                object_types::USER_ROLE,
                &assignment.object_id(),
            )
            .before(existing.as_ref().map(UserRoleAssignment::snapshot))
            .after(Some(assignment.snapshot()))
            .description(format!(
                "Assigned role {} to user {}",
                role.display_name, assignment.user_id
            ))
            .request_id(actor.request_id.clone()),
        )
        .await?;
        uow.commit().await?;

        tracing::info!(
            actor_id = %actor.id,
            user_id = %assignment.user_id,
            role_id = %assignment.role_id,
            "role assigned"
        );
        Ok(assignment)
    }

    pub async fn remove_role(&self, actor: &Actor, payload: RemoveRole) -> Result<(), AppError> {
        let mut uow = self.store.begin().await?;
        let existing = uow
            .assignment(payload.user_id, payload.role_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Role assignment not found".to_string()))?;

        uow.delete_assignment(payload.user_id, payload.role_id)
            .await?;
        AuditRecorder::record(
            uow.as_mut(),
            NewAuditRecord::new(
                &actor.id,
                ActionType::RoleRemove,
                object_types::USER_ROLE,
                &existing.object_id(),
            )
            .before(Some(existing.snapshot()))
            .description(format!("Removed role from user {}", existing.user_id))
            .request_id(actor.request_id.clone()),
        )
        .await?;
        uow.commit().await?;

        tracing::info!(actor_id = %actor.id, object_id = %existing.object_id(), "role removed");
        Ok(())
    }
}

fn capability_set(raw: &[String]) -> BTreeSet<String> {
    raw.iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

async fn ensure_capabilities(
    uow: &mut dyn UnitOfWork,
    requested: &BTreeSet<String>,
) -> Result<(), AppError> {
    let known = uow.existing_capabilities(requested).await?;
    let unknown: Vec<String> = requested
        .difference(&known)
        .map(|name| format!("capabilities: unknown capability `{}`", name))
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(unknown))
    }
}
