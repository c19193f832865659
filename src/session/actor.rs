//! Per-document save actor.
//!
//! One tokio task per open document owns the [`SaveScheduler`] and is the
//! only place its transitions run, so no two transitions for a document are
//! ever concurrent. Writes run in their own detached tasks and report back
//! over a channel: closing the session never waits for a write, and a
//! write that finishes after teardown has nowhere to report to.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use crate::scheduler::{Completion, SaveJob, SaveScheduler, SaveStateKind};
use crate::store::{DocumentId, RemoteStore, StoreError};

/// Snapshot of a document's save pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveStatus {
    pub state: SaveStateKind,
    /// Writes confirmed by the store so far
    pub confirmed_revision: u64,
    /// Latest edit not yet confirmed
    pub unsaved: bool,
    /// Error of the most recent failed write, cleared by the next success
    pub last_error: Option<StoreError>,
    /// Completed write attempts, successful or not
    pub writes_finished: u64,
    /// Edits the actor has taken in, in send order
    pub edits_received: u64,
    pub closed: bool,
}

#[derive(Debug)]
enum Command {
    Edit(String),
    SaveNow,
    Close,
}

#[derive(Debug)]
struct WriteDone {
    attempt: u64,
    result: Result<(), StoreError>,
}

/// Session-side handle to a running save actor.
#[derive(Debug)]
pub(super) struct SaveHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SaveStatus>,
}

impl SaveHandle {
    /// Spawn the actor for `id` on the current runtime.
    pub(super) fn spawn<S: RemoteStore>(id: DocumentId, store: Arc<S>, debounce_ms: u64) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SaveStatus::default());

        let actor = SaveActor {
            id,
            store,
            scheduler: SaveScheduler::new(debounce_ms),
            epoch: Instant::now(),
            status: status_tx,
            done_tx,
            writes_finished: 0,
            edits_received: 0,
            closed: false,
        };
        tokio::spawn(actor.run(commands_rx, done_rx));

        Self {
            commands: commands_tx,
            status: status_rx,
        }
    }

    /// Forward an edit. Returns false if the actor is gone.
    pub(super) fn edit(&self, content: String) -> bool {
        self.commands.send(Command::Edit(content)).is_ok()
    }

    pub(super) fn save_now(&self) -> bool {
        self.commands.send(Command::SaveNow).is_ok()
    }

    pub(super) fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    pub(super) fn status(&self) -> SaveStatus {
        self.status.borrow().clone()
    }

    pub(super) fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.status.clone()
    }
}

struct SaveActor<S> {
    id: DocumentId,
    store: Arc<S>,
    scheduler: SaveScheduler,
    epoch: Instant,
    status: watch::Sender<SaveStatus>,
    done_tx: mpsc::UnboundedSender<WriteDone>,
    writes_finished: u64,
    edits_received: u64,
    closed: bool,
}

impl<S: RemoteStore> SaveActor<S> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut done: mpsc::UnboundedReceiver<WriteDone>,
    ) {
        debug!(id = %self.id, debounce_ms = self.scheduler.debounce_ms(), "save actor started");
        while !self.closed {
            let deadline = self
                .scheduler
                .next_deadline()
                .map(|ms| self.epoch + Duration::from_millis(ms));

            tokio::select! {
                biased;
                command = commands.recv() => self.handle_command(command),
                Some(finished) = done.recv() => self.handle_done(finished),
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(job) = self.scheduler.take_ready(self.now_ms()) {
                        self.dispatch(job);
                    }
                }
            }
            self.publish();
        }
        debug!(id = %self.id, "save actor stopped");
    }

    fn handle_command(&mut self, command: Option<Command>) {
        match command {
            Some(Command::Edit(content)) => {
                self.edits_received += 1;
                let now = self.now_ms();
                self.scheduler.notify_edit(content, now);
            }
            Some(Command::SaveNow) => {
                if let Some(job) = self.scheduler.save_now() {
                    self.dispatch(job);
                }
            }
            Some(Command::Close) | None => self.teardown(),
        }
    }

    fn handle_done(&mut self, finished: WriteDone) {
        self.writes_finished += 1;
        let now = self.now_ms();
        match self
            .scheduler
            .complete(finished.attempt, finished.result, now)
        {
            Completion::Saved { revision } => {
                debug!(id = %self.id, attempt = finished.attempt, revision, "save confirmed");
            }
            Completion::Failed { error } => {
                warn!(id = %self.id, attempt = finished.attempt, %error, "save failed");
            }
            Completion::Stale => {
                debug!(id = %self.id, attempt = finished.attempt, "ignoring stale save completion");
            }
        }
        crate::perf::log_event(
            "save.complete",
            format!(
                "id={} attempt={} state={:?}",
                self.id,
                finished.attempt,
                self.scheduler.state().kind()
            ),
        );
    }

    fn dispatch(&self, job: SaveJob) {
        debug!(
            id = %self.id,
            attempt = job.attempt,
            bytes = job.target_content.len(),
            "dispatching save"
        );
        let store = Arc::clone(&self.store);
        let id = self.id.clone();
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let result = store.write(&id, &job.target_content).await;
            let _ = done.send(WriteDone {
                attempt: job.attempt,
                result,
            });
        });
    }

    fn teardown(&mut self) {
        let disarmed = self.scheduler.cancel_pending();
        if self.scheduler.has_unsaved_changes() {
            warn!(
                id = %self.id,
                disarmed,
                in_flight = self.scheduler.is_saving(),
                "closing document with unsaved changes"
            );
        }
        self.closed = true;
    }

    fn publish(&self) {
        let next = SaveStatus {
            state: self.scheduler.state().kind(),
            confirmed_revision: self.scheduler.confirmed_revision(),
            unsaved: self.scheduler.has_unsaved_changes(),
            last_error: self.scheduler.last_error().cloned(),
            writes_finished: self.writes_finished,
            edits_received: self.edits_received,
            closed: self.closed,
        };
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
