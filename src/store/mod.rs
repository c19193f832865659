//! Remote document store contract.
//!
//! The core only ever sees an already-authorized store handle: a keyed
//! `read`/`write` pair. Authentication, listing and metadata belong to the
//! concrete store.

mod directory;
mod memory;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

pub use directory::DirectoryStore;
pub use memory::MemoryStore;

/// Opaque identifier of a document in a remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Failure reported by a remote store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(DocumentId),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Async key to content store.
///
/// `write` has no partial-write semantics: callers treat any error as
/// "not saved".
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Fetch the current content of `id`.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] for unknown ids and
    /// [`StoreError::Transport`] for any other failure.
    async fn read(&self, id: &DocumentId) -> Result<String, StoreError>;

    /// Replace the content of `id`.
    ///
    /// # Errors
    /// Returns [`StoreError::Transport`] if the content was not stored.
    async fn write(&self, id: &DocumentId, content: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_display_and_conversions() {
        let id = DocumentId::from("notes.md");
        assert_eq!(id.to_string(), "notes.md");
        assert_eq!(id.as_str(), "notes.md");
        assert_eq!(DocumentId::from("notes.md".to_string()), id);
    }

    #[test]
    fn test_store_error_messages() {
        let err = StoreError::NotFound(DocumentId::new("a"));
        assert_eq!(err.to_string(), "document not found: a");
        let err = StoreError::Transport("reset".to_string());
        assert_eq!(err.to_string(), "transport error: reset");
    }
}
