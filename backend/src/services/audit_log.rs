use crate::{
    error::AppError,
    models::audit_log::{AuditRecord, NewAuditRecord},
    repositories::UnitOfWork,
};

/// Who is performing a mutation, carried into every audit record it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub request_id: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }
}

/// The single write path into the audit ledger.
///
/// Records go through the caller's unit of work, so they commit (or vanish) together with
/// the state change they describe.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuditRecorder;

impl AuditRecorder {
    pub async fn record(
        uow: &mut dyn UnitOfWork,
        entry: NewAuditRecord,
    ) -> Result<AuditRecord, AppError> {
        let record = uow.insert_audit_record(&entry).await.map_err(|err| {
            tracing::error!(
                actor_id = %entry.actor_id,
                action_type = %entry.action_type,
                error = %err,
                "failed to write audit record"
            );
            err
        })?;

        tracing::info!(
            audit_id = record.id,
            actor_id = %record.actor_id,
            action_type = %record.action_type,
            object_type = record.object_type.as_deref().unwrap_or("-"),
            object_id = record.object_id.as_deref().unwrap_or("-"),
            "audit record written"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::audit_log::ActionType,
        repositories::{MemoryStore, Store},
    };
    use serde_json::json;

    #[tokio::test]
    async fn record_persists_before_and_after() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.expect("begin");
        let record = AuditRecorder::record(
            uow.as_mut(),
            NewAuditRecord::new("admin-1", ActionType::ModuleToggle, "module", "payroll")
                .before(Some(json!({"enabled": false, "config": {}})))
                .after(Some(json!({"enabled": true, "config": {}})))
                .description("Enabled payroll"),
        )
        .await
        .expect("record");
        uow.commit().await.expect("commit");

        assert_eq!(record.action_type, ActionType::ModuleToggle);
        assert_eq!(record.before(), Some(&json!({"enabled": false, "config": {}})));
        let stored = store.audit_records().await;
        assert_eq!(stored, vec![record]);
    }

    #[test]
    fn actor_carries_request_id() {
        let actor = Actor::new("admin-1").with_request_id(Some("req-9".into()));
        assert_eq!(actor.request_id.as_deref(), Some("req-9"));
    }
}
