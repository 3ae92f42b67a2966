use crate::workspace::{is_hidden, to_workspace_path, Workspace};
use anchormark_engine::ReconcileUpdate;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

const NOTIFY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Reconcile files as they change until Ctrl-C
pub async fn run(workspace: &Workspace) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::channel::<notify::Result<Event>>(1024);
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = event_tx.blocking_send(res);
        },
        NotifyConfig::default().with_poll_interval(NOTIFY_POLL_INTERVAL),
    )
    .context("Watcher init failed")?;
    watcher
        .watch(workspace.root(), RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", workspace.root().display()))?;

    let mut updates = workspace.session().updates();
    info!("Watching {} (Ctrl-C to stop)", workspace.root().display());

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => handle_event(workspace, event),
            update = updates.recv() => match update {
                Ok(update) => report(&update),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Missed {skipped} reconcile updates");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watcher");
                break;
            }
        }
    }
    Ok(())
}

fn report(update: &ReconcileUpdate) {
    if update.is_structural_noop() {
        return;
    }
    println!(
        "{}: +{} -{} ~{} ({} bookmarks)",
        update.file_path, update.added, update.removed, update.moved, update.bookmarks
    );
}

fn handle_event(workspace: &Workspace, event: notify::Result<Event>) {
    let event = match event {
        Ok(event) => event,
        Err(e) => {
            warn!("Watch error: {e}");
            return;
        }
    };
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return;
    }

    for path in event.paths {
        let Some(relative) = to_workspace_path(workspace.root(), &path) else {
            continue;
        };
        if is_hidden(&relative) || !path.is_file() {
            continue;
        }
        // Overlapping passes for one file are coalesced by the session.
        let workspace = workspace.clone();
        tokio::spawn(async move {
            let doc = match workspace.load(Path::new(&relative)).await {
                Ok(doc) => doc,
                Err(e) => {
                    debug!("Skipping {relative}: {e:#}");
                    return;
                }
            };
            if let Err(e) = workspace.reconcile(doc).await {
                warn!("{e:#}");
            }
        });
    }
}
