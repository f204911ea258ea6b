//! Page content edits. Files live under a root directory and are addressed by a relative
//! path, which is also the audit object id.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};

use crate::{
    error::AppError,
    models::audit_log::{object_types, ActionType, NewAuditRecord},
    repositories::Store,
    services::audit_log::{Actor, AuditRecorder},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageStore: Send + Sync {
    /// `None` when no page exists at `path`.
    async fn read(&self, path: &str) -> Result<Option<String>, AppError>;
    async fn write(&self, path: &str, content: &str) -> Result<(), AppError>;
    async fn remove(&self, path: &str) -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
pub struct FsPageStore {
    root: PathBuf,
}

impl FsPageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, AppError> {
        Ok(self.root.join(normalize_page_path(path)?))
    }
}

#[async_trait]
impl PageStore for FsPageStore {
    async fn read(&self, path: &str) -> Result<Option<String>, AppError> {
        let full = self.resolve(path)?;
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AppError::InternalServerError(
                anyhow::Error::new(err).context(format!("reading page {}", full.display())),
            )),
        }
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), AppError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(AppError::persist)?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(AppError::persist)
    }

    async fn remove(&self, path: &str) -> Result<(), AppError> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AppError::persist(err)),
        }
    }
}

/// Canonical relative form of a page path. Absolute paths, parent components, and hidden
/// files are rejected.
pub fn normalize_page_path(raw: &str) -> Result<String, AppError> {
    let invalid = |reason: &str| AppError::Validation(vec![format!("path: {}", reason)]);

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("is required"));
    }
    if trimmed.contains('\\') || trimmed.contains('\0') {
        return Err(invalid("contains forbidden characters"));
    }

    let mut parts = Vec::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| invalid("is not valid UTF-8"))?;
                if part.starts_with('.') {
                    return Err(invalid("must not name hidden files"));
                }
                parts.push(part);
            }
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("must not leave the pages directory")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("must be relative"))
            }
        }
    }
    if parts.is_empty() {
        return Err(invalid("is required"));
    }
    Ok(parts.join("/"))
}

pub fn page_snapshot(content: &str) -> Value {
    json!({ "content": content })
}

pub struct PageService<'a> {
    store: &'a dyn Store,
    pages: &'a dyn PageStore,
}

impl<'a> PageService<'a> {
    pub fn new(store: &'a dyn Store, pages: &'a dyn PageStore) -> Self {
        Self { store, pages }
    }

    /// Replaces a page's content. Returns `false` when the content was already identical.
    ///
    /// The audit record is staged first and committed after the file write; if the commit
    /// fails the previous content is written back.
    pub async fn edit_page(
        &self,
        actor: &Actor,
        path: &str,
        content: &str,
    ) -> Result<bool, AppError> {
        let path = normalize_page_path(path)?;
        let previous = self.pages.read(&path).await?;
        if previous.as_deref() == Some(content) {
            return Ok(false);
        }

        let mut uow = self.store.begin().await?;
        AuditRecorder::record(
            uow.as_mut(),
            NewAuditRecord::new(&actor.id, ActionType::PageEdit, object_types::PAGE, &path)
                .before(previous.as_deref().map(page_snapshot))
                .after(Some(page_snapshot(content)))
                .description(format!("Edited page {}", path))
                .request_id(actor.request_id.clone()),
        )
        .await?;

        self.pages.write(&path, content).await?;
        if let Err(err) = uow.commit().await {
            let undo = match &previous {
                Some(old) => self.pages.write(&path, old).await,
                None => self.pages.remove(&path).await,
            };
            if let Err(undo_err) = undo {
                tracing::error!(
                    path = %path,
                    error = %undo_err,
                    "failed to restore page after aborted edit"
                );
            }
            return Err(err);
        }

        tracing::info!(actor_id = %actor.id, path = %path, "page edited");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryStore;
    use mockall::predicate::eq;

    #[test]
    fn normalizes_relative_paths() {
        assert_eq!(normalize_page_path("./about/index.html").expect("path"), "about/index.html");
        assert!(normalize_page_path("/etc/passwd").is_err());
        assert!(normalize_page_path("../secrets.html").is_err());
        assert!(normalize_page_path("a/../../b.html").is_err());
        assert!(normalize_page_path(".env").is_err());
        assert!(normalize_page_path("  ").is_err());
        assert!(normalize_page_path("pages\\index.html").is_err());
    }

    #[tokio::test]
    async fn edit_writes_and_audits_previous_content() {
        let store = MemoryStore::new();
        let mut pages = MockPageStore::new();
        pages
            .expect_read()
            .with(eq("about.html"))
            .returning(|_| Ok(Some("old".to_string())));
        pages
            .expect_write()
            .with(eq("about.html"), eq("new"))
            .times(1)
            .returning(|_, _| Ok(()));

        let service = PageService::new(&store, &pages);
        let changed = service
            .edit_page(&Actor::new("admin-1"), "about.html", "new")
            .await
            .expect("edit");
        assert!(changed);

        let records = store.audit_records().await;
        assert_eq!(records[0].before(), Some(&json!({"content": "old"})));
        assert_eq!(records[0].after(), Some(&json!({"content": "new"})));
        assert_eq!(records[0].object_id.as_deref(), Some("about.html"));
    }

    #[tokio::test]
    async fn failed_write_leaves_no_audit_record() {
        let store = MemoryStore::new();
        let mut pages = MockPageStore::new();
        pages.expect_read().returning(|_| Ok(None));
        pages
            .expect_write()
            .returning(|_, _| Err(AppError::persist(anyhow::anyhow!("read-only"))));

        let service = PageService::new(&store, &pages);
        let err = service
            .edit_page(&Actor::new("admin-1"), "new.html", "hello")
            .await
            .expect_err("should fail");
        assert_eq!(err.code(), "PERSIST_FAILURE");
        assert!(store.audit_records().await.is_empty());
    }

    #[tokio::test]
    async fn identical_content_is_a_no_op() {
        let store = MemoryStore::new();
        let mut pages = MockPageStore::new();
        pages
            .expect_read()
            .returning(|_| Ok(Some("same".to_string())));
        pages.expect_write().never();

        let service = PageService::new(&store, &pages);
        let changed = service
            .edit_page(&Actor::new("admin-1"), "a.html", "same")
            .await
            .expect("edit");
        assert!(!changed);
        assert!(store.audit_records().await.is_empty());
    }

    #[tokio::test]
    async fn fs_store_round_trips_under_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pages = FsPageStore::new(dir.path());
        assert_eq!(pages.read("docs/a.html").await.expect("read"), None);
        pages.write("docs/a.html", "<p>hi</p>").await.expect("write");
        assert_eq!(
            pages.read("docs/a.html").await.expect("read").as_deref(),
            Some("<p>hi</p>")
        );
        pages.remove("docs/a.html").await.expect("remove");
        assert_eq!(pages.read("docs/a.html").await.expect("read"), None);
        assert!(pages.write("../escape.html", "x").await.is_err());
    }
}
