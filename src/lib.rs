// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. store::StoreError)
    clippy::module_name_repetitions
)]

//! # Marksync
//!
//! Markdown editing against a remote document store, with a live HTML
//! preview and debounced auto-save.
//!
//! Every edit is rendered to a complete HTML page right away. Saving is
//! debounced: a burst of edits produces one write of the latest content,
//! at most one write per document is in flight, and edits made during a
//! write are saved once it completes.
//!
//! ## Modules
//!
//! - [`render`]: Markdown subset to HTML
//! - [`scheduler`]: Pure debounced save state machine
//! - [`session`]: Open documents, their save actor and status
//! - [`store`]: Remote store contract and implementations
//! - [`watcher`]: Working-file watching for the CLI
//! - [`config`]: Flag-file configuration
//! - [`perf`]: Timing and the debug event log

pub mod config;
pub mod perf;
pub mod render;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod watcher;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::render::{RenderedOutput, render};
    pub use crate::session::{DocumentSession, SaveStatus, SessionError, SessionOptions};
    pub use crate::store::{DirectoryStore, DocumentId, MemoryStore, RemoteStore, StoreError};
}
