pub mod event;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::RecursiveMode;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};

use crate::graph::{self, BuildState};
use crate::store::Store;
use event::{WatchEvent, classify_event};

/// Quiescent window before a batch of file events is applied.
const DEBOUNCE: Duration = Duration::from_millis(300);

/// Watch `root` and keep the graph current with per-file deltas.
///
/// Blocks until the event channel closes (the process is interrupted).
/// Each changed file is one delta transaction; config changes trigger a full
/// rebuild. The writer stays single-threaded: events are applied on this
/// thread in arrival order.
pub fn watch(root: &Path, store: &mut Store, state: &mut BuildState) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel::<DebounceEventResult>();

    let mut debouncer = new_debouncer(DEBOUNCE, move |result| {
        let _ = tx.send(result);
    })
    .context("failed to start file watcher")?;
    debouncer
        .watcher()
        .watch(root, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", root.display()))?;

    eprintln!("watching {} (Ctrl-C to stop)", root.display());

    while let Ok(result) = rx.recv() {
        let events = match result {
            Ok(events) => events,
            Err(err) => {
                eprintln!("warning: watch error: {err}");
                continue;
            }
        };

        let mut rebuild = false;
        let mut touched: Vec<std::path::PathBuf> = Vec::new();
        for debounced in events {
            match classify_event(&debounced.path) {
                Some(WatchEvent::ConfigChanged) => rebuild = true,
                Some(WatchEvent::Modified(path)) | Some(WatchEvent::Deleted(path)) => {
                    if !touched.contains(&path) {
                        touched.push(path);
                    }
                }
                None => {}
            }
        }

        if rebuild {
            eprintln!("config changed, rebuilding graph");
            let (new_state, stats) = graph::build_graph(root, store, state.caps, false)?;
            *state = new_state;
            eprintln!("rebuilt: {} files, {} nodes, {} edges", stats.files, stats.nodes, stats.edges);
            continue;
        }

        for path in touched {
            if let Err(err) = graph::apply_file_delta(store, state, &path) {
                eprintln!("warning: incremental update failed for {}: {err}", path.display());
            } else {
                eprintln!("updated {}", path.display());
            }
        }
    }

    Ok(())
}
