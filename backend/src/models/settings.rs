//! Typed settings keys.
//!
//! The store keeps settings as `(category, key, json value)` rows; everything above the
//! store works with the closed key enums below so a misspelled key is a parse error
//! instead of a silently ignored row.

use serde_json::{Map, Value};
use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::models::audit_log::object_types;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingsCategory {
    Tts,
}

impl SettingsCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsCategory::Tts => "tts",
        }
    }

    pub fn object_type(&self) -> &'static str {
        match self {
            SettingsCategory::Tts => object_types::TTS_SETTINGS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TtsSettingKey {
    Enabled,
    Voice,
    Language,
    Rate,
    Pitch,
    Volume,
}

impl TtsSettingKey {
    pub const ALL: [TtsSettingKey; 6] = [
        TtsSettingKey::Enabled,
        TtsSettingKey::Voice,
        TtsSettingKey::Language,
        TtsSettingKey::Rate,
        TtsSettingKey::Pitch,
        TtsSettingKey::Volume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TtsSettingKey::Enabled => "tts_enabled",
            TtsSettingKey::Voice => "tts_voice",
            TtsSettingKey::Language => "tts_language",
            TtsSettingKey::Rate => "tts_rate",
            TtsSettingKey::Pitch => "tts_pitch",
            TtsSettingKey::Volume => "tts_volume",
        }
    }

    /// Checks that `value` has the shape this key stores.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        let ok = match self {
            TtsSettingKey::Enabled => value.is_boolean(),
            TtsSettingKey::Voice | TtsSettingKey::Language => value
                .as_str()
                .map(|s| !s.trim().is_empty() && s.len() <= 64)
                .unwrap_or(false),
            TtsSettingKey::Rate => in_range(value, 0.1, 10.0),
            TtsSettingKey::Pitch => in_range(value, 0.0, 2.0),
            TtsSettingKey::Volume => in_range(value, 0.0, 1.0),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("{}: invalid value {}", self.as_str(), value))
        }
    }
}

fn in_range(value: &Value, min: f64, max: f64) -> bool {
    value
        .as_f64()
        .map(|v| (min..=max).contains(&v))
        .unwrap_or(false)
}

impl fmt::Display for TtsSettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TtsSettingKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TtsSettingKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown setting `{}`", s))
    }
}

/// A partial set of TTS settings. Only keys present in the map are read or written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TtsSettings(pub BTreeMap<TtsSettingKey, Value>);

impl TtsSettings {
    /// Parses a JSON object, rejecting unknown keys and malformed values.
    pub fn from_json(value: &Value) -> Result<Self, Vec<String>> {
        let object = value
            .as_object()
            .ok_or_else(|| vec!["settings must be a JSON object".to_string()])?;
        let mut errors = Vec::new();
        let mut map = BTreeMap::new();
        for (raw_key, raw_value) in object {
            match raw_key.parse::<TtsSettingKey>() {
                Ok(key) => match key.validate(raw_value) {
                    Ok(()) => {
                        map.insert(key, raw_value.clone());
                    }
                    Err(err) => errors.push(err),
                },
                Err(err) => errors.push(err),
            }
        }
        if errors.is_empty() {
            Ok(Self(map))
        } else {
            Err(errors)
        }
    }

    /// Builds the typed view over raw stored rows. Rows with unknown keys are ignored and a
    /// stored `null` means the key is unset.
    pub fn from_stored(rows: &BTreeMap<String, Value>) -> Self {
        Self(
            rows.iter()
                .filter(|(_, value)| !value.is_null())
                .filter_map(|(key, value)| key.parse().ok().map(|k| (k, value.clone())))
                .collect(),
        )
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(key, value)| (key.as_str().to_string(), value.clone()))
            .collect();
        Value::Object(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_keys() {
        let settings =
            TtsSettings::from_json(&json!({"tts_voice": "alloy", "tts_rate": 1.5})).expect("parse");
        assert_eq!(settings.0.get(&TtsSettingKey::Voice), Some(&json!("alloy")));
        assert_eq!(settings.0.len(), 2);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        let errors = TtsSettings::from_json(&json!({"tts_voise": "x", "tts_volume": 3}))
            .expect_err("should fail");
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("tts_voise")));
        assert!(errors.iter().any(|e| e.contains("tts_volume")));
    }

    #[test]
    fn from_stored_skips_foreign_rows() {
        let mut rows = BTreeMap::new();
        rows.insert("tts_enabled".to_string(), json!(true));
        rows.insert("legacy_key".to_string(), json!("x"));
        let settings = TtsSettings::from_stored(&rows);
        assert_eq!(settings.to_json(), json!({"tts_enabled": true}));
    }
}
