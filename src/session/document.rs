//! The open document owned by a session.

use crate::store::DocumentId;

/// Monotonic count of writes the store has confirmed for a document.
///
/// Starts at zero when the document is loaded and only moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RevisionStamp(u64);

impl RevisionStamp {
    pub const INITIAL: Self = Self(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

/// A document open for editing.
///
/// `content` changes only through edits; `base_revision` changes only when
/// the store confirms a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    id: DocumentId,
    content: String,
    base_revision: RevisionStamp,
}

impl Document {
    pub const fn new(id: DocumentId, content: String) -> Self {
        Self {
            id,
            content,
            base_revision: RevisionStamp::INITIAL,
        }
    }

    pub const fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub const fn base_revision(&self) -> RevisionStamp {
        self.base_revision
    }

    pub(crate) fn set_content(&mut self, content: String) {
        self.content = content;
    }

    /// Advance the confirmed revision; older stamps are ignored.
    pub(crate) fn confirm(&mut self, revision: RevisionStamp) {
        self.base_revision = self.base_revision.max(revision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_starts_at_initial_revision() {
        let doc = Document::new(DocumentId::new("a"), "x".to_string());
        assert_eq!(doc.base_revision(), RevisionStamp::INITIAL);
        assert_eq!(doc.content(), "x");
        assert_eq!(doc.id().as_str(), "a");
    }

    #[test]
    fn test_confirm_never_moves_backwards() {
        let mut doc = Document::new(DocumentId::new("a"), String::new());
        doc.confirm(RevisionStamp::new(3));
        doc.confirm(RevisionStamp::new(2));
        assert_eq!(doc.base_revision().get(), 3);
    }

    #[test]
    fn test_set_content_keeps_revision() {
        let mut doc = Document::new(DocumentId::new("a"), String::new());
        doc.confirm(RevisionStamp::new(1));
        doc.set_content("new".to_string());
        assert_eq!(doc.content(), "new");
        assert_eq!(doc.base_revision().get(), 1);
    }
}
