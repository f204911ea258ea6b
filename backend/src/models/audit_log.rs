use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow};
use std::{fmt, str::FromStr};

/// Object types with a fixed meaning. `database_edit` records use the edited table name instead.
pub mod object_types {
    pub const TTS_SETTINGS: &str = "tts_settings";
    pub const MODULE: &str = "module";
    pub const ROLE: &str = "role";
    pub const PAGE: &str = "page";
    pub const USER_ROLE: &str = "user_role";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    SettingsUpdate,
    ModuleToggle,
    ModuleConfigUpdate,
    RoleUpdate,
    RoleCreate,
    RoleDelete,
    RoleAssign,
    RoleRemove,
    PageEdit,
    RevertChange,
    DatabaseEdit,
}

impl ActionType {
    pub const ALL: [ActionType; 11] = [
        ActionType::SettingsUpdate,
        ActionType::ModuleToggle,
        ActionType::ModuleConfigUpdate,
        ActionType::RoleUpdate,
        ActionType::RoleCreate,
        ActionType::RoleDelete,
        ActionType::RoleAssign,
        ActionType::RoleRemove,
        ActionType::PageEdit,
        ActionType::RevertChange,
        ActionType::DatabaseEdit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::SettingsUpdate => "settings_update",
            ActionType::ModuleToggle => "module_toggle",
            ActionType::ModuleConfigUpdate => "module_config_update",
            ActionType::RoleUpdate => "role_update",
            ActionType::RoleCreate => "role_create",
            ActionType::RoleDelete => "role_delete",
            ActionType::RoleAssign => "role_assign",
            ActionType::RoleRemove => "role_remove",
            ActionType::PageEdit => "page_edit",
            ActionType::RevertChange => "revert_change",
            ActionType::DatabaseEdit => "database_edit",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .iter()
            .copied()
            .find(|action| action.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown action type `{}`", s))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown action type `{0}`")]
pub struct UnknownActionType(pub String);

impl TryFrom<String> for ActionType {
    type Error = UnknownActionType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse().map_err(|_| UnknownActionType(value))
    }
}

impl Serialize for ActionType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Immutable, append-only ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AuditRecord {
    pub id: i64,
    pub actor_id: String,
    #[sqlx(try_from = "String")]
    pub action_type: ActionType,
    pub object_type: Option<String>,
    pub object_id: Option<String>,
    pub before_state: Option<Json<Value>>,
    pub after_state: Option<Json<Value>>,
    pub description: String,
    /// For `revert_change` records, the id of the record that was reverted.
    pub reverts_id: Option<i64>,
    pub request_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn before(&self) -> Option<&Value> {
        self.before_state.as_ref().map(|json| &json.0)
    }

    pub fn after(&self) -> Option<&Value> {
        self.after_state.as_ref().map(|json| &json.0)
    }
}

/// Everything the caller supplies for a new record; id and timestamp are assigned on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditRecord {
    pub actor_id: String,
    pub action_type: ActionType,
    pub object_type: Option<String>,
    pub object_id: Option<String>,
    pub before_state: Option<Value>,
    pub after_state: Option<Value>,
    pub description: String,
    pub reverts_id: Option<i64>,
    pub request_id: Option<String>,
}

impl NewAuditRecord {
    pub fn new(
        actor_id: &str,
        action_type: ActionType,
        object_type: &str,
        object_id: &str,
    ) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            action_type,
            object_type: Some(object_type.to_string()),
            object_id: Some(object_id.to_string()),
            before_state: None,
            after_state: None,
            description: String::new(),
            reverts_id: None,
            request_id: None,
        }
    }

    pub fn before(mut self, state: Option<Value>) -> Self {
        self.before_state = state;
        self
    }

    pub fn after(mut self, state: Option<Value>) -> Self {
        self.after_state = state;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn reverts(mut self, record_id: i64) -> Self {
        self.reverts_id = Some(record_id);
        self
    }

    pub fn request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }
}
