//! Debounced save scheduling for one document.
//!
//! [`SaveScheduler`] is a pure state machine: it owns no clock and performs
//! no I/O. Callers feed it edits and completions with a millisecond
//! timestamp and poll it for the next [`SaveJob`] to write. This keeps every
//! transition testable with explicit times; the session actor supplies the
//! real clock and the store.
//!
//! States:
//! - `Idle`: nothing armed, nothing in flight
//! - `Pending`: a single debounce deadline is armed; each edit pushes it out
//! - `Saving`: exactly one write is in flight
//! - `PendingWhileSaving`: a write is in flight and newer edits are waiting;
//!   they get a fresh deadline when the write completes

use crate::store::StoreError;

/// Quiet period after the last edit before a save is dispatched.
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// A write of one content snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveJob {
    /// Content to write
    pub target_content: String,
    /// Sequence number, strictly increasing from 1 per scheduler
    pub attempt: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveState {
    Idle,
    Pending { deadline_ms: u64 },
    Saving { job: SaveJob },
    PendingWhileSaving { job: SaveJob },
}

impl SaveState {
    pub const fn kind(&self) -> SaveStateKind {
        match self {
            Self::Idle => SaveStateKind::Idle,
            Self::Pending { .. } => SaveStateKind::Pending,
            Self::Saving { .. } => SaveStateKind::Saving,
            Self::PendingWhileSaving { .. } => SaveStateKind::PendingWhileSaving,
        }
    }
}

/// Payload-free view of [`SaveState`] for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStateKind {
    #[default]
    Idle,
    Pending,
    Saving,
    PendingWhileSaving,
}

/// What a write completion did to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The write was confirmed; `revision` is the new confirmed revision
    Saved { revision: u64 },
    /// The write failed; content stays unsaved until the next edit or retry
    Failed { error: StoreError },
    /// The completion did not belong to the in-flight job and was ignored
    Stale,
}

#[derive(Debug)]
pub struct SaveScheduler {
    debounce_ms: u64,
    state: SaveState,
    latest: String,
    unsaved: bool,
    next_attempt: u64,
    confirmed_revision: u64,
    last_error: Option<StoreError>,
}

impl SaveScheduler {
    pub const fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            state: SaveState::Idle,
            latest: String::new(),
            unsaved: false,
            next_attempt: 1,
            confirmed_revision: 0,
            last_error: None,
        }
    }

    /// Record an edit and (re)arm the debounce deadline.
    ///
    /// While a write is in flight the edit is only recorded; it is
    /// scheduled when that write completes.
    pub fn notify_edit(&mut self, content: String, now_ms: u64) {
        self.latest = content;
        self.unsaved = true;
        self.state = match std::mem::replace(&mut self.state, SaveState::Idle) {
            SaveState::Idle | SaveState::Pending { .. } => SaveState::Pending {
                deadline_ms: now_ms.saturating_add(self.debounce_ms),
            },
            SaveState::Saving { job } | SaveState::PendingWhileSaving { job } => {
                SaveState::PendingWhileSaving { job }
            }
        };
    }

    /// Dispatch a save once the debounce deadline has passed.
    pub fn take_ready(&mut self, now_ms: u64) -> Option<SaveJob> {
        match self.state {
            SaveState::Pending { deadline_ms } if now_ms >= deadline_ms => Some(self.dispatch()),
            _ => None,
        }
    }

    /// Dispatch a save immediately, skipping the debounce.
    ///
    /// Used for explicit saves and for retrying after a failure. Returns
    /// `None` when there is nothing unsaved or a write is already in flight
    /// (any newer content is then saved when that write completes).
    pub fn save_now(&mut self) -> Option<SaveJob> {
        match self.state {
            SaveState::Pending { .. } => Some(self.dispatch()),
            SaveState::Idle if self.unsaved => Some(self.dispatch()),
            _ => None,
        }
    }

    /// Apply the result of the write for `attempt`.
    pub fn complete(
        &mut self,
        attempt: u64,
        result: Result<(), StoreError>,
        now_ms: u64,
    ) -> Completion {
        let (job, follow_up) = match std::mem::replace(&mut self.state, SaveState::Idle) {
            SaveState::Saving { job } if job.attempt == attempt => (job, false),
            SaveState::PendingWhileSaving { job } if job.attempt == attempt => (job, true),
            other => {
                self.state = other;
                return Completion::Stale;
            }
        };

        let completion = match result {
            Ok(()) => {
                self.confirmed_revision += 1;
                self.last_error = None;
                if !follow_up && job.target_content == self.latest {
                    self.unsaved = false;
                }
                Completion::Saved {
                    revision: self.confirmed_revision,
                }
            }
            Err(error) => {
                self.last_error = Some(error.clone());
                Completion::Failed { error }
            }
        };

        self.state = if follow_up {
            SaveState::Pending {
                deadline_ms: now_ms.saturating_add(self.debounce_ms),
            }
        } else {
            SaveState::Idle
        };
        completion
    }

    /// Disarm a pending deadline. Returns true if one was armed.
    ///
    /// An in-flight write is not affected.
    pub fn cancel_pending(&mut self) -> bool {
        match std::mem::replace(&mut self.state, SaveState::Idle) {
            SaveState::Pending { .. } => true,
            SaveState::PendingWhileSaving { job } => {
                self.state = SaveState::Saving { job };
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    fn dispatch(&mut self) -> SaveJob {
        let job = SaveJob {
            target_content: self.latest.clone(),
            attempt: self.next_attempt,
        };
        self.next_attempt += 1;
        self.state = SaveState::Saving { job: job.clone() };
        job
    }

    pub const fn state(&self) -> &SaveState {
        &self.state
    }

    /// Deadline of the armed debounce, if any.
    pub const fn next_deadline(&self) -> Option<u64> {
        match self.state {
            SaveState::Pending { deadline_ms } => Some(deadline_ms),
            _ => None,
        }
    }

    pub const fn is_saving(&self) -> bool {
        matches!(
            self.state,
            SaveState::Saving { .. } | SaveState::PendingWhileSaving { .. }
        )
    }

    /// Whether the latest edit has not been confirmed by the store.
    pub const fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    pub fn latest_content(&self) -> &str {
        &self.latest
    }

    /// Number of confirmed writes so far.
    pub const fn confirmed_revision(&self) -> u64 {
        self.confirmed_revision
    }

    pub const fn last_error(&self) -> Option<&StoreError> {
        self.last_error.as_ref()
    }

    pub const fn debounce_ms(&self) -> u64 {
        self.debounce_ms
    }
}

impl Default for SaveScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_MS)
    }
}
