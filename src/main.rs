//! Marksync - markdown editing with live HTML preview and debounced auto-save.
//!
//! # Usage
//!
//! ```bash
//! marksync render README.md -o README.html
//! marksync --store docs edit notes.md --working notes.md --preview notes.html
//! marksync --debounce-ms 500 --save
//! ```

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use marksync::config::{
    ConfigFlags, clear_config_flags, global_config_path, load_config_flags, local_override_path,
    parse_flag_tokens, save_config_flags,
};
use marksync::perf;
use marksync::render::{render, render_body};
use marksync::scheduler::DEFAULT_DEBOUNCE_MS;
use marksync::session::{DocumentSession, SaveStatus, SessionOptions};
use marksync::store::{DirectoryStore, DocumentId, RemoteStore};
use marksync::watcher::WorkingFileWatcher;

/// Quiet period before a working-file change counts as an edit
const WATCH_SETTLE_MS: u64 = 100;
/// How often the working file is polled for settled changes
const WATCH_POLL_MS: u64 = 50;
/// Upper bound on waiting for the final save at exit
const EXIT_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Markdown editing with live HTML preview and debounced auto-save
#[derive(Parser, Debug)]
#[command(name = "marksync", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quiet period after the last edit before saving, in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    debounce_ms: Option<u64>,

    /// Directory holding the stored documents
    #[arg(long, global = true, value_name = "DIR")]
    store: Option<PathBuf>,

    /// Print render timings to stderr
    #[arg(long, global = true)]
    perf: bool,

    /// Write render, watcher and save events to a file
    #[arg(long, global = true, value_name = "PATH")]
    render_debug_log: Option<PathBuf>,

    /// Save current command-line flags as defaults
    #[arg(long, global = true)]
    save: bool,

    /// Clear saved defaults
    #[arg(long, global = true)]
    clear: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a markdown file (or stdin) to HTML
    Render {
        /// Markdown file to render; stdin when omitted
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Output file; stdout when omitted
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,

        /// Emit only the body fragment, without the page shell
        #[arg(long)]
        body_only: bool,
    },
    /// Edit a stored document through a working file
    Edit {
        /// Document id inside the store directory
        #[arg(value_name = "ID")]
        id: String,

        /// File to edit; overwritten with the stored content on start
        #[arg(long, value_name = "FILE")]
        working: PathBuf,

        /// HTML preview, rewritten after every change
        #[arg(long, value_name = "OUT")]
        preview: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    perf::set_enabled(effective.perf);
    let debug_log_path = effective
        .render_debug_log
        .clone()
        .or_else(|| std::env::var_os("MARKSYNC_RENDER_DEBUG_LOG").map(PathBuf::from));
    if let Err(err) = perf::set_debug_log_path(debug_log_path.as_deref()) {
        eprintln!(
            "[warn] Failed to initialize render debug log {}: {}",
            debug_log_path
                .as_ref()
                .map_or_else(|| "<unset>".to_string(), |p| p.display().to_string()),
            err
        );
    }

    match cli.command {
        Some(Command::Render {
            file,
            output,
            body_only,
        }) => render_command(file.as_deref(), output.as_deref(), body_only),
        Some(Command::Edit {
            id,
            working,
            preview,
        }) => {
            let store_dir = effective.store.unwrap_or_else(|| PathBuf::from("."));
            let options = SessionOptions {
                debounce_ms: effective.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS),
            };
            edit_command(store_dir, DocumentId::new(id), &working, &preview, options).await
        }
        None if cli.save || cli.clear => Ok(()),
        None => anyhow::bail!("no command given; try `marksync --help`"),
    }
}

fn render_command(file: Option<&Path>, output: Option<&Path>, body_only: bool) -> Result<()> {
    let markdown = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let html = if body_only {
        render_body(&markdown)
    } else {
        render(&markdown).into_html()
    };

    match output {
        Some(path) => std::fs::write(path, html)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(html.as_bytes()).context("Failed to write stdout")?;
            stdout.flush().context("Failed to write stdout")
        }
    }
}

async fn edit_command(
    store_dir: PathBuf,
    id: DocumentId,
    working: &Path,
    preview: &Path,
    options: SessionOptions,
) -> Result<()> {
    let store = Arc::new(DirectoryStore::new(store_dir));
    let mut session = DocumentSession::new(id.clone(), store, options);

    let html = session
        .load()
        .await
        .with_context(|| format!("Failed to open document {id}"))?
        .html()
        .to_owned();
    write_preview(preview, html).await?;
    let content = session.content().unwrap_or_default().to_owned();
    tokio::fs::write(working, &content)
        .await
        .with_context(|| format!("Failed to write working file {}", working.display()))?;

    let mut watcher = WorkingFileWatcher::new(working, Duration::from_millis(WATCH_SETTLE_MS))
        .with_context(|| format!("Failed to watch {}", working.display()))?;
    watcher.mark_seen(content);
    let mut status_rx = session
        .subscribe()
        .context("Session closed before editing started")?;
    let mut reported = SaveStatus::default();

    eprintln!(
        "Editing {id} via {}; preview at {}. Press Ctrl-C to finish.",
        working.display(),
        preview.display()
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut poll = tokio::time::interval(Duration::from_millis(WATCH_POLL_MS));

    loop {
        tokio::select! {
            res = &mut shutdown => {
                res.context("Failed to listen for Ctrl-C")?;
                break;
            }
            _ = poll.tick() => {
                if let Some(content) = watcher.poll_change() {
                    let html = session.on_content_changed(content)?.html().to_owned();
                    write_preview(preview, html).await?;
                }
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = status_rx.borrow_and_update().clone();
                report_status(&id, &reported, &status);
                reported = status;
            }
        }
    }

    flush_before_exit(&mut session, &id).await;
    session.close();
    Ok(())
}

async fn write_preview(path: &Path, html: String) -> Result<()> {
    tokio::fs::write(path, html)
        .await
        .with_context(|| format!("Failed to write preview {}", path.display()))
}

fn report_status(id: &DocumentId, previous: &SaveStatus, status: &SaveStatus) {
    if status.writes_finished == previous.writes_finished {
        return;
    }
    match &status.last_error {
        Some(err) => eprintln!("[warn] Saving {id} failed: {err}. Edit again to retry."),
        None => info!(%id, revision = status.confirmed_revision, "saved"),
    }
}

/// Save anything still unsaved instead of dropping it with the armed timer.
async fn flush_before_exit<S: RemoteStore>(session: &mut DocumentSession<S>, id: &DocumentId) {
    match tokio::time::timeout(EXIT_FLUSH_TIMEOUT, session.flush()).await {
        Ok(Ok(status)) if !status.unsaved => {}
        Ok(Ok(status)) => match status.last_error {
            Some(err) => eprintln!("[warn] {id} closed with unsaved changes: {err}"),
            None => eprintln!("[warn] {id} closed with unsaved changes"),
        },
        Ok(Err(err)) => eprintln!("[warn] {id} closed with unsaved changes: {err}"),
        Err(_) => eprintln!("[warn] {id} closed with unsaved changes: final save timed out"),
    }
}
