use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{DocumentId, RemoteStore, StoreError};

/// Store backed by a local directory, one file per document id.
///
/// Writes go through a temporary sibling file and a rename, so a failed
/// write never leaves a truncated document behind.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `id` inside the root, or `None` if `id` could escape it.
    fn path_for(&self, id: &DocumentId) -> Option<PathBuf> {
        let name = id.as_str();
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0']);
        if invalid {
            return None;
        }
        Some(self.root.join(name))
    }
}

fn transport(err: &std::io::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

#[async_trait]
impl RemoteStore for DirectoryStore {
    async fn read(&self, id: &DocumentId) -> Result<String, StoreError> {
        let path = self
            .path_for(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!(%id, bytes = bytes.len(), "directory store read");
                // Lossy decoding would be written back by the next save.
                String::from_utf8(bytes).map_err(|err| {
                    StoreError::Transport(format!("{id} is not valid UTF-8: {}", err.utf8_error()))
                })
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id.clone())),
            Err(err) => Err(transport(&err)),
        }
    }

    async fn write(&self, id: &DocumentId, content: &str) -> Result<(), StoreError> {
        let path = self
            .path_for(id)
            .ok_or_else(|| StoreError::Transport(format!("invalid document id {id:?}")))?;
        let tmp = self.root.join(format!(".{id}.marksync-tmp"));
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|err| transport(&err))?;
        if let Err(err) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(transport(&err));
        }
        debug!(%id, bytes = content.len(), "directory store write");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_read_existing_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# A").unwrap();
        let store = DirectoryStore::new(dir.path());
        assert_eq!(store.read(&DocumentId::new("a.md")).await.unwrap(), "# A");
    }

    #[tokio::test]
    async fn test_read_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let store = DirectoryStore::new(dir.path());
        let id = DocumentId::new("nope.md");
        assert_eq!(store.read(&id).await, Err(StoreError::NotFound(id)));
    }

    #[tokio::test]
    async fn test_read_non_utf8_file_is_rejected_and_left_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin1.md");
        std::fs::write(&path, b"caf\xe9 notes").unwrap();
        let store = DirectoryStore::new(dir.path());

        let result = store.read(&DocumentId::new("latin1.md")).await;
        assert!(matches!(result, Err(StoreError::Transport(_))));
        assert_eq!(std::fs::read(&path).unwrap(), b"caf\xe9 notes");
    }

    #[tokio::test]
    async fn test_write_replaces_content_without_leftovers() {
        let dir = tempdir().unwrap();
        let store = DirectoryStore::new(dir.path());
        let id = DocumentId::new("a.md");
        store.write(&id, "one").await.unwrap();
        store.write(&id, "two").await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("a.md")).unwrap(), "two");
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1, "temporary file should be renamed away");
    }

    #[tokio::test]
    async fn test_ids_cannot_escape_root() {
        let dir = tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("docs"));
        for bad in ["", ".", "..", "../x", "a/b", "a\\b"] {
            let id = DocumentId::new(bad);
            assert_eq!(
                store.read(&id).await,
                Err(StoreError::NotFound(id.clone())),
                "read {bad:?}"
            );
            assert!(
                matches!(store.write(&id, "x").await, Err(StoreError::Transport(_))),
                "write {bad:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_write_into_missing_root_is_transport_error() {
        let dir = tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("missing"));
        let result = store.write(&DocumentId::new("a.md"), "x").await;
        assert!(matches!(result, Err(StoreError::Transport(_))));
    }
}
