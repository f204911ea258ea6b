use serde_json::{Map, Value};

use crate::{
    error::AppError,
    models::{
        audit_log::{ActionType, NewAuditRecord},
        settings::{SettingsCategory, TtsSettingKey, TtsSettings},
    },
    repositories::Store,
    services::audit_log::{Actor, AuditRecorder},
};

pub struct SettingsService<'a> {
    store: &'a dyn Store,
}

impl<'a> SettingsService<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn tts_settings(&self) -> Result<TtsSettings, AppError> {
        let mut uow = self.store.begin().await?;
        let rows = uow.settings(SettingsCategory::Tts).await?;
        Ok(TtsSettings::from_stored(&rows))
    }

    /// Writes the submitted keys that differ from the stored values and returns them.
    ///
    /// The audit snapshots hold only the changed keys; a key that was never set appears as
    /// `null` in the before state. A submission that changes nothing records nothing.
    pub async fn update_tts(
        &self,
        actor: &Actor,
        payload: &Value,
    ) -> Result<Vec<TtsSettingKey>, AppError> {
        let submitted = TtsSettings::from_json(payload).map_err(AppError::Validation)?;
        let category = SettingsCategory::Tts;

        let mut uow = self.store.begin().await?;
        let stored = TtsSettings::from_stored(&uow.settings(category).await?);

        let mut before = Map::new();
        let mut after = Map::new();
        let mut changed = Vec::new();
        for (key, value) in &submitted.0 {
            let previous = stored.0.get(key);
            if previous == Some(value) {
                continue;
            }
            before.insert(key.to_string(), previous.cloned().unwrap_or(Value::Null));
            after.insert(key.to_string(), value.clone());
            changed.push(*key);
        }

        if changed.is_empty() {
            tracing::debug!(actor_id = %actor.id, "settings submission changed nothing");
            return Ok(changed);
        }

        for key in &changed {
            if let Some(value) = after.get(key.as_str()) {
                uow.save_setting(category, key.as_str(), value).await?;
            }
        }

        let names: Vec<&str> = changed.iter().map(|k| k.as_str()).collect();
        AuditRecorder::record(
            uow.as_mut(),
            NewAuditRecord::new(
                &actor.id,
                ActionType::SettingsUpdate,
                category.object_type(),
                category.as_str(),
            )
            .before(Some(Value::Object(before)))
            .after(Some(Value::Object(after)))
            .description(format!("Updated TTS settings: {}", names.join(", ")))
            .request_id(actor.request_id.clone()),
        )
        .await?;
        uow.commit().await?;

        tracing::info!(actor_id = %actor.id, keys = ?names, "settings updated");
        Ok(changed)
    }
}
