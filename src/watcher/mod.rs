//! Working-file watching for the `edit` command.
//!
//! The CLI has no editor of its own: the user edits a plain file and every
//! settled change becomes one edit event for the document session. Uses the
//! notify crate for cross-platform file system events.
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::warn;

/// Watches one working file and yields its content once changes settle.
pub struct WorkingFileWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    watch_root: PathBuf,
    target_path: PathBuf,
    target_name: Option<OsString>,
    settle: Duration,
    pending_since: Option<Instant>,
    last_seen: Option<String>,
}

impl WorkingFileWatcher {
    /// Watch `path`, reporting a change once no further events arrived for
    /// `settle`.
    ///
    /// # Errors
    /// Returns an error if the file watcher cannot be created or the path cannot be watched.
    pub fn new(path: impl AsRef<Path>, settle: Duration) -> notify::Result<Self> {
        // Event paths from the OS are absolute and canonical.
        let target_path = path
            .as_ref()
            .canonicalize()
            .unwrap_or_else(|_| path.as_ref().to_path_buf());
        let target_name = target_path.file_name().map(std::ffi::OsStr::to_os_string);
        let watch_root = watch_root_for(&target_path);

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&watch_root, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            rx,
            watch_root,
            target_path,
            target_name,
            settle,
            pending_since: None,
            last_seen: None,
        })
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Record content already known to the caller, so that rewriting it
    /// (for example the initial download) is not reported as an edit.
    pub fn mark_seen(&mut self, content: impl Into<String>) {
        self.last_seen = Some(content.into());
    }

    /// New file content once a change has settled, or `None`.
    ///
    /// Events that leave the content identical to the last reported (or
    /// marked) content produce nothing.
    pub fn poll_change(&mut self) -> Option<String> {
        if self.drain_events() {
            self.pending_since = Some(Instant::now());
        }
        if !settled(self.pending_since, Instant::now(), self.settle) {
            return None;
        }
        self.pending_since = None;

        let content = match std::fs::read(&self.target_path).map(String::from_utf8) {
            Ok(Ok(content)) => content,
            Ok(Err(err)) => {
                warn!(
                    path = %self.target_path.display(),
                    error = %err.utf8_error(),
                    "working file is not valid UTF-8; change ignored"
                );
                return None;
            }
            Err(err) => {
                warn!(path = %self.target_path.display(), error = %err, "cannot read working file");
                return None;
            }
        };
        if self.last_seen.as_deref() == Some(content.as_str()) {
            crate::perf::log_event("watcher.unchanged", self.target_path.display().to_string());
            return None;
        }
        self.last_seen = Some(content.clone());
        Some(content)
    }

    /// Drain queued events; true if any concerned the working file.
    fn drain_events(&self) -> bool {
        let mut relevant = 0u32;
        let mut total = 0u32;
        while let Ok(event) = self.rx.try_recv() {
            total += 1;
            match event {
                Ok(ev) if self.is_relevant(&ev) => relevant += 1,
                Ok(ev) => {
                    crate::perf::log_event(
                        "watcher.irrelevant",
                        format!("kind={:?} paths={:?}", ev.kind, ev.paths),
                    );
                }
                Err(err) => {
                    warn!(error = %err, "file watcher error");
                    crate::perf::log_event("watcher.error", format!("{err}"));
                }
            }
        }
        if total > 0 {
            crate::perf::log_event(
                "watcher.poll",
                format!(
                    "total={total} relevant={relevant} target={} root={}",
                    self.target_path.display(),
                    self.watch_root.display(),
                ),
            );
        }
        relevant > 0
    }

    fn is_relevant(&self, event: &Event) -> bool {
        event.paths.iter().any(|path| {
            path == &self.watch_root
                || path == &self.target_path
                || self
                    .target_name
                    .as_ref()
                    .is_some_and(|name| path.file_name().is_some_and(|f| f == name))
        })
    }
}

fn settled(pending_since: Option<Instant>, now: Instant, settle: Duration) -> bool {
    pending_since.is_some_and(|since| now.saturating_duration_since(since) >= settle)
}

fn watch_root_for(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::EventKind;
    use tempfile::tempdir;

    fn poll_for_change(watcher: &mut WorkingFileWatcher, within: Duration) -> Option<String> {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if let Some(content) = watcher.poll_change() {
                return Some(content);
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        None
    }

    #[test]
    fn test_settled_waits_for_quiet_period() {
        let start = Instant::now();
        let settle = Duration::from_millis(200);
        assert!(!settled(None, start, settle));
        assert!(!settled(Some(start), start + Duration::from_millis(199), settle));
        assert!(settled(Some(start), start + settle, settle));
    }

    #[test]
    fn test_directory_level_event_is_relevant_for_working_file() {
        let dir = tempdir().expect("tempdir");
        let canonical_dir = dir.path().canonicalize().expect("canonicalize");
        let path = canonical_dir.join("notes.md");
        std::fs::write(&path, "hi").expect("write");
        let watcher = WorkingFileWatcher::new(&path, Duration::from_millis(10)).expect("watcher");

        // Some backends (FSEvents) only report the directory.
        let event = Event {
            kind: EventKind::Any,
            paths: vec![canonical_dir],
            attrs: notify::event::EventAttributes::new(),
        };
        assert!(watcher.is_relevant(&event));
    }

    #[test]
    fn test_sibling_file_event_is_irrelevant() {
        let dir = tempdir().expect("tempdir");
        let canonical_dir = dir.path().canonicalize().expect("canonicalize");
        let path = canonical_dir.join("notes.md");
        std::fs::write(&path, "hi").expect("write");
        let watcher = WorkingFileWatcher::new(&path, Duration::from_millis(10)).expect("watcher");

        let event = Event {
            kind: EventKind::Any,
            paths: vec![canonical_dir.join("preview.html")],
            attrs: notify::event::EventAttributes::new(),
        };
        assert!(!watcher.is_relevant(&event));
    }

    #[test]
    fn test_watch_root_for_relative_file_is_dot() {
        assert_eq!(watch_root_for(Path::new("notes.md")), PathBuf::from("."));
    }

    #[test]
    fn test_real_modification_yields_new_content() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().canonicalize().expect("canonicalize").join("notes.md");
        std::fs::write(&path, "original").expect("write");

        let mut watcher = WorkingFileWatcher::new(&path, Duration::from_millis(100)).expect("watcher");
        watcher.mark_seen("original");
        std::thread::sleep(Duration::from_millis(500));

        std::fs::write(&path, "# edited").expect("write");
        assert_eq!(
            poll_for_change(&mut watcher, Duration::from_secs(5)).as_deref(),
            Some("# edited")
        );
    }

    #[test]
    fn test_non_utf8_change_is_ignored() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().canonicalize().expect("canonicalize").join("notes.md");
        std::fs::write(&path, "cafe").expect("write");

        let mut watcher = WorkingFileWatcher::new(&path, Duration::from_millis(50)).expect("watcher");
        watcher.mark_seen("cafe");
        std::thread::sleep(Duration::from_millis(500));

        std::fs::write(&path, b"caf\xe9").expect("write");
        assert_eq!(poll_for_change(&mut watcher, Duration::from_secs(1)), None);

        std::fs::write(&path, "caf\u{e9}").expect("write");
        assert_eq!(
            poll_for_change(&mut watcher, Duration::from_secs(5)).as_deref(),
            Some("caf\u{e9}")
        );
    }

    #[test]
    fn test_rewriting_same_content_is_not_a_change() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().canonicalize().expect("canonicalize").join("notes.md");
        std::fs::write(&path, "same").expect("write");

        let mut watcher = WorkingFileWatcher::new(&path, Duration::from_millis(50)).expect("watcher");
        watcher.mark_seen("same");
        std::thread::sleep(Duration::from_millis(500));

        std::fs::write(&path, "same").expect("write");
        assert_eq!(poll_for_change(&mut watcher, Duration::from_secs(1)), None);
    }
}
