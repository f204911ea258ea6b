//! Toggleable modules: registry descriptors, persisted configuration, and the
//! conflict descriptions produced when a transition would break the dependency graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow};

/// Static description of a module, shared read-only through the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Presentation only.
    #[serde(default)]
    pub icon: Option<String>,
    /// Route used by the navigation projection. Modules without one never appear in navigation.
    #[serde(default)]
    pub route: Option<String>,
}

impl ModuleDescriptor {
    pub fn new(name: &str, display_name: &str, dependencies: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            description: String::new(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            icon: None,
            route: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    pub fn with_route(mut self, route: &str) -> Self {
        self.route = Some(route.to_string());
        self
    }
}

/// Persisted enabled flag and free-form configuration for one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ModuleConfig {
    pub name: String,
    pub enabled: bool,
    pub config: Json<Value>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ModuleConfig {
    /// Implicit state of a module that has never been written: disabled, empty config.
    pub fn implicit(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: false,
            config: Json(Value::Object(Default::default())),
            updated_at: None,
        }
    }

    pub fn snapshot(&self) -> Value {
        ModuleSnapshot {
            enabled: self.enabled,
            config: self.config.0.clone(),
        }
        .into_value()
    }
}

/// Audit snapshot shape of a module: the enabled flag and config blob always travel together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSnapshot {
    pub enabled: bool,
    #[serde(default = "empty_object")]
    pub config: Value,
}

impl ModuleSnapshot {
    pub fn into_value(self) -> Value {
        serde_json::json!({ "enabled": self.enabled, "config": self.config })
    }
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Enable,
    Disable,
}

impl Direction {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            Direction::Enable
        } else {
            Direction::Disable
        }
    }

    pub fn target_enabled(self) -> bool {
        matches!(self, Direction::Enable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// The module being enabled requires this module, which is disabled.
    MissingDependency,
    /// The module being disabled is required by this enabled module.
    ActiveDependent,
}

/// One reason a transition is refused. `module` names the blocking module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDescription {
    pub module: String,
    pub kind: ConflictKind,
    pub message: String,
}

impl ConflictDescription {
    pub fn new(module: &str, kind: ConflictKind, message: &str) -> Self {
        Self {
            module: module.to_string(),
            kind,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_config_is_disabled_and_empty() {
        let config = ModuleConfig::implicit("payroll");
        assert!(!config.enabled);
        assert_eq!(config.snapshot(), serde_json::json!({"enabled": false, "config": {}}));
    }

    #[test]
    fn snapshot_defaults_missing_config_to_empty_object() {
        let snapshot: ModuleSnapshot =
            serde_json::from_value(serde_json::json!({"enabled": true})).expect("snapshot");
        assert!(snapshot.enabled);
        assert_eq!(snapshot.config, serde_json::json!({}));
    }

    #[test]
    fn direction_round_trips_enabled_flag() {
        assert_eq!(Direction::from_enabled(true), Direction::Enable);
        assert!(!Direction::Disable.target_enabled());
    }
}
