//! JSON document store for hosts without browser storage.
//!
//! Every mutation rewrites the whole document under an async lock.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{Store, StoreError, StoreResult};

type Document = BTreeMap<String, String>;

/// Store persisting entries to a single JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileStore {
    /// Construct a store backed by `path`. The file is created lazily.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self, operation: &'static str) -> StoreResult<Document> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    operation,
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if data.trim().is_empty() {
            return Ok(Document::new());
        }

        serde_json::from_str(&data).map_err(|source| StoreError::Serialize { operation, source })
    }

    async fn save(&self, operation: &'static str, document: &Document) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    operation,
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let json = serde_json::to_string_pretty(document)
            .map_err(|source| StoreError::Serialize { operation, source })?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|source| StoreError::Io {
                operation,
                path: self.path.clone(),
                source,
            })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            if let Err(err) = tokio::fs::set_permissions(&self.path, perms).await {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to restrict store permissions");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Store for FileStore {
    async fn read(&self, key: &str) -> StoreResult<Option<String>> {
        let _guard = self.guard.lock().await;
        let mut document = self.load("file_store.read").await?;
        Ok(document.remove(key))
    }

    async fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        let _guard = self.guard.lock().await;
        let mut document = self.load("file_store.write").await?;
        let _ = document.insert(key.to_string(), value.to_string());
        self.save("file_store.write", &document).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let _guard = self.guard.lock().await;
        let mut document = self.load("file_store.delete").await?;
        if document.remove(key).is_none() {
            return Ok(());
        }
        self.save("file_store.delete", &document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileStore {
        FileStore::new(dir.path().join("nested").join("credentials.json"))
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.get_item("app1-accessToken").await.unwrap(), "");
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn values_survive_a_new_instance() {
        let dir = TempDir::new().unwrap();
        store_in(&dir)
            .set_item("app1-refreshToken", "refresh")
            .await
            .unwrap();

        let reopened = store_in(&dir);
        assert_eq!(
            reopened.get_item("app1-refreshToken").await.unwrap(),
            "refresh"
        );
    }

    #[tokio::test]
    async fn empty_value_removes_entry_from_document() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set_item("a", "1").await.unwrap();
        store.set_item("b", "2").await.unwrap();
        store.set_item("a", "").await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let document: Document = serde_json::from_str(&raw).unwrap();
        assert!(!document.contains_key("a"));
        assert_eq!(document.get("b").map(String::as_str), Some("2"));
    }

    #[tokio::test]
    async fn corrupt_document_reports_serialize_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();

        let err = store.read("a").await.unwrap_err();
        assert!(matches!(err, StoreError::Serialize { .. }));
        assert_eq!(err.operation(), "file_store.read");
    }
}
