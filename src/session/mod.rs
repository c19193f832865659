//! Editing sessions for remotely stored documents.
//!
//! A [`DocumentSession`] binds one open [`Document`] to the renderer and to
//! one save actor:
//! - every accepted edit is rendered synchronously, before the call returns
//! - every accepted edit is forwarded to the save actor, which coalesces
//!   bursts and keeps at most one write in flight
//!
//! Sessions start in a loading state and reject edits until the initial
//! read succeeds. Different sessions share nothing and run independently.

mod actor;
mod document;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::render::{RenderedOutput, render};
use crate::scheduler::{DEFAULT_DEBOUNCE_MS, SaveStateKind};
use crate::store::{DocumentId, RemoteStore, StoreError};

use actor::SaveHandle;
pub use actor::SaveStatus;
pub use document::{Document, RevisionStamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Quiet period after the last edit before saving
    pub debounce_ms: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("document {0} is not open for editing")]
    NotReady(DocumentId),
    #[error("failed to load document: {0}")]
    Load(#[source] StoreError),
    #[error("session is closed")]
    Closed,
}

/// Observable lifecycle of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Initial read not finished; edits are rejected
    Loading,
    /// Initial read failed; edits are rejected until a retry succeeds
    LoadFailed(StoreError),
    /// Open for editing
    Ready,
    /// Torn down
    Closed,
}

struct OpenDocument {
    document: Document,
    preview: RenderedOutput,
    saver: SaveHandle,
    edits_sent: u64,
}

enum Phase {
    Loading,
    LoadFailed(StoreError),
    Ready(OpenDocument),
    Closed,
}

pub struct DocumentSession<S: RemoteStore> {
    id: DocumentId,
    store: Arc<S>,
    options: SessionOptions,
    phase: Phase,
}

impl<S: RemoteStore> DocumentSession<S> {
    /// Create a session in the loading state. Nothing is read until
    /// [`Self::load`] is called.
    pub const fn new(id: DocumentId, store: Arc<S>, options: SessionOptions) -> Self {
        Self {
            id,
            store,
            options,
            phase: Phase::Loading,
        }
    }

    /// Fetch the initial content and open the document for editing.
    ///
    /// Must run inside a tokio runtime; the save actor is spawned here.
    /// Calling this on a ready session returns the current preview.
    ///
    /// # Errors
    /// Returns [`SessionError::Load`] if the read fails (the session then
    /// stays non-editable until a retry succeeds) and
    /// [`SessionError::Closed`] after [`Self::close`].
    pub async fn load(&mut self) -> Result<&RenderedOutput, SessionError> {
        match self.phase {
            Phase::Closed => return Err(SessionError::Closed),
            Phase::Ready(_) => {}
            Phase::Loading | Phase::LoadFailed(_) => {
                self.phase = Phase::Loading;
                match self.store.read(&self.id).await {
                    Ok(content) => {
                        debug!(id = %self.id, bytes = content.len(), "document loaded");
                        let preview = render(&content);
                        let saver = SaveHandle::spawn(
                            self.id.clone(),
                            Arc::clone(&self.store),
                            self.options.debounce_ms,
                        );
                        self.phase = Phase::Ready(OpenDocument {
                            document: Document::new(self.id.clone(), content),
                            preview,
                            saver,
                            edits_sent: 0,
                        });
                    }
                    Err(err) => {
                        warn!(id = %self.id, error = %err, "document load failed");
                        self.phase = Phase::LoadFailed(err.clone());
                        return Err(SessionError::Load(err));
                    }
                }
            }
        }
        let open = self.open_mut()?;
        Ok(&open.preview)
    }

    /// Re-run the initial read after a failed load.
    ///
    /// # Errors
    /// Same as [`Self::load`].
    pub async fn retry_load(&mut self) -> Result<&RenderedOutput, SessionError> {
        self.load().await
    }

    /// Apply an edit: render it now and hand it to the save pipeline.
    ///
    /// # Errors
    /// Returns [`SessionError::NotReady`] while loading or after a failed
    /// load, and [`SessionError::Closed`] after [`Self::close`].
    pub fn on_content_changed(&mut self, content: String) -> Result<&RenderedOutput, SessionError> {
        let open = self.open_mut()?;
        open.preview = render(&content);
        if open.saver.edit(content.clone()) {
            open.edits_sent += 1;
        } else {
            warn!(id = %open.document.id(), "save actor stopped; edit will not be saved");
        }
        open.document.set_content(content);
        open.sync_revision();
        Ok(&open.preview)
    }

    /// Save the latest content now, skipping the debounce. Also serves as
    /// the manual retry after a failed save.
    ///
    /// # Errors
    /// Returns [`SessionError::NotReady`] or [`SessionError::Closed`] when
    /// the document is not open.
    pub fn save_now(&mut self) -> Result<(), SessionError> {
        let open = self.open_mut()?;
        if !open.saver.save_now() {
            warn!(id = %open.document.id(), "save actor stopped; save request dropped");
        }
        Ok(())
    }

    /// Save the latest content now and wait until the store has answered.
    ///
    /// Every edit accepted so far is taken into account, even ones the save
    /// actor had not yet seen when this was called. Returns the settled
    /// status; check `unsaved` and `last_error` for the outcome.
    ///
    /// # Errors
    /// Returns [`SessionError::NotReady`] or [`SessionError::Closed`] when
    /// the document is not open, and [`SessionError::Closed`] if the save
    /// actor stops while waiting.
    pub async fn flush(&mut self) -> Result<SaveStatus, SessionError> {
        let open = self.open_mut()?;
        let mut rx = open.saver.subscribe();
        let edits_sent = open.edits_sent;
        let finished_before = rx.borrow().writes_finished;
        if !open.saver.save_now() {
            return Err(SessionError::Closed);
        }
        let status = rx
            .wait_for(|s| {
                s.edits_received >= edits_sent
                    && s.state == SaveStateKind::Idle
                    && (!s.unsaved || s.writes_finished > finished_before)
            })
            .await
            .map_err(|_| SessionError::Closed)?
            .clone();
        open.sync_revision();
        Ok(status)
    }

    /// Tear the session down.
    ///
    /// Any armed save timer is cancelled. A write already in flight is left
    /// to finish on its own, but its result is discarded.
    pub fn close(&mut self) {
        if let Phase::Ready(open) = std::mem::replace(&mut self.phase, Phase::Closed) {
            open.saver.close();
            debug!(id = %self.id, "session closed");
        }
    }

    pub const fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn phase(&self) -> SessionPhase {
        match &self.phase {
            Phase::Loading => SessionPhase::Loading,
            Phase::LoadFailed(err) => SessionPhase::LoadFailed(err.clone()),
            Phase::Ready(_) => SessionPhase::Ready,
            Phase::Closed => SessionPhase::Closed,
        }
    }

    pub const fn is_editable(&self) -> bool {
        matches!(self.phase, Phase::Ready(_))
    }

    /// The open document, with its revision brought up to date.
    pub fn document(&mut self) -> Option<&Document> {
        let Phase::Ready(open) = &mut self.phase else {
            return None;
        };
        open.sync_revision();
        Some(&open.document)
    }

    /// Preview of the latest content.
    pub fn preview(&self) -> Option<&RenderedOutput> {
        match &self.phase {
            Phase::Ready(open) => Some(&open.preview),
            _ => None,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match &self.phase {
            Phase::Ready(open) => Some(open.document.content()),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<SaveStatus> {
        match &self.phase {
            Phase::Ready(open) => Some(open.saver.status()),
            _ => None,
        }
    }

    /// Watch save status changes, including failures.
    pub fn subscribe(&self) -> Option<watch::Receiver<SaveStatus>> {
        match &self.phase {
            Phase::Ready(open) => Some(open.saver.subscribe()),
            _ => None,
        }
    }

    fn open_mut(&mut self) -> Result<&mut OpenDocument, SessionError> {
        match &mut self.phase {
            Phase::Ready(open) => Ok(open),
            Phase::Closed => Err(SessionError::Closed),
            Phase::Loading | Phase::LoadFailed(_) => Err(SessionError::NotReady(self.id.clone())),
        }
    }
}

impl OpenDocument {
    fn sync_revision(&mut self) {
        let confirmed = self.saver.status().confirmed_revision;
        self.document.confirm(RevisionStamp::new(confirmed));
    }
}

impl<S: RemoteStore> Drop for DocumentSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}
