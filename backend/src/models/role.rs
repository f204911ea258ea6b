//! Roles, capabilities, and user-role assignments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::collections::BTreeSet;
use validator::Validate;

use crate::{
    types::{RoleId, UserId},
    validation::rules,
};

/// Capabilities checked by the console actions.
pub mod capabilities {
    pub const MANAGE_MODULES: &str = "manage_modules";
    pub const MANAGE_SETTINGS: &str = "manage_settings";
    pub const MANAGE_ROLES: &str = "manage_roles";
    pub const MANAGE_PAGES: &str = "manage_pages";
    pub const VIEW_AUDIT_LOG: &str = "view_audit_log";
    pub const ROLLBACK_CHANGES: &str = "rollback_changes";
}

/// Session roles allowed into the console. `super_admin` holds every capability.
pub const ADMIN_ROLE: &str = "admin";
pub const SUPER_ADMIN_ROLE: &str = "super_admin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: RoleId,
    /// Machine name. Immutable for system roles.
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// System roles can be neither renamed nor deleted.
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Capability {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserRoleAssignment {
    pub user_id: UserId,
    pub role_id: RoleId,
    pub expires_at: Option<DateTime<Utc>>,
    pub assigned_by: String,
    pub created_at: DateTime<Utc>,
}

impl UserRoleAssignment {
    /// An assignment whose expiry has passed no longer grants the role.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }

    pub fn object_id(&self) -> String {
        format!("{}:{}", self.user_id, self.role_id)
    }

    pub fn snapshot(&self) -> Value {
        serde_json::json!({
            "user_id": self.user_id,
            "role_id": self.role_id,
            "expires_at": self.expires_at,
        })
    }
}

/// Audit snapshot of a role. The capability set is always complete, never a delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSnapshot {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
}

impl RoleSnapshot {
    pub fn of(role: &Role, capabilities: BTreeSet<String>) -> Self {
        Self {
            name: role.name.clone(),
            display_name: role.display_name.clone(),
            description: role.description.clone(),
            capabilities,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateRole {
    #[validate(custom(function = "rules::validate_role_name"))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct UpdateRole {
    pub role_id: RoleId,
    #[validate(custom(function = "rules::validate_role_name"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub description: String,
    /// Replaces the whole capability set.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssignRole {
    pub user_id: UserId,
    pub role_id: RoleId,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoveRole {
    pub user_id: UserId,
    pub role_id: RoleId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn assignment(expires_at: Option<DateTime<Utc>>) -> UserRoleAssignment {
        UserRoleAssignment {
            user_id: UserId::new(),
            role_id: RoleId::new(),
            expires_at,
            assigned_by: "admin".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn assignment_without_expiry_is_active() {
        assert!(assignment(None).is_active_at(Utc::now()));
    }

    #[test]
    fn expired_assignment_is_inactive() {
        let now = Utc::now();
        assert!(!assignment(Some(now - Duration::hours(1))).is_active_at(now));
        assert!(assignment(Some(now + Duration::hours(1))).is_active_at(now));
    }

    #[test]
    fn assignment_object_id_is_composite() {
        let a = assignment(None);
        assert_eq!(a.object_id(), format!("{}:{}", a.user_id, a.role_id));
    }

    #[test]
    fn create_role_validates_name() {
        let payload = CreateRole {
            name: "Bad Name!".into(),
            display_name: "Bad".into(),
            description: String::new(),
            capabilities: vec![],
        };
        assert!(payload.validate().is_err());
    }
}
