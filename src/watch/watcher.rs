// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::fs::FileSystem;
use crate::watch::event_handler::rules_for_batch;
use crate::watch::hash::ContentFilter;
use crate::watch::patterns::WatchRule;

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle stops file watching and ends the
/// batching loop.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    batcher: tokio::task::JoinHandle<()>,
}

impl WatcherHandle {
    /// Stop watching and wait for the batching loop to end.
    pub async fn stop(self) {
        let WatcherHandle { _inner, batcher } = self;
        drop(_inner);
        batcher.abort();
        let _ = batcher.await;
        debug!("file watcher stopped");
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish_non_exhaustive()
    }
}

fn is_relevant(event: &Event) -> bool {
    !matches!(event.kind, EventKind::Access(_))
}

/// Spawn a filesystem watcher that observes `source_root` recursively and
/// sends `RuntimeEvent::RuleTriggered` for every rule a changed path fires.
///
/// Events are collected until `debounce` has passed since the first event of
/// a batch; each rule fires at most once per batch.
pub fn spawn_watcher(
    source_root: impl Into<PathBuf>,
    rules: Vec<WatchRule>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    debounce: Duration,
    fs: Arc<dyn FileSystem>,
) -> Result<WatcherHandle> {
    let root = source_root.into();
    let root = root.canonicalize().unwrap_or(root);

    let mut filter = ContentFilter::new(fs);
    if let Err(e) = filter.seed(&root, &rules) {
        warn!(error = %e, "failed to seed content hashes");
    }

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("assetpipe: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("assetpipe: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!(path = %root.display(), debounce_ms = debounce.as_millis() as u64, "file watcher started");

    let batcher = tokio::spawn(async move {
        while let Some(first) = event_rx.recv().await {
            let mut paths: BTreeSet<PathBuf> = BTreeSet::new();
            if is_relevant(&first) {
                paths.extend(first.paths);
            }

            let window = tokio::time::sleep(debounce);
            tokio::pin!(window);
            loop {
                tokio::select! {
                    _ = &mut window => break,
                    next = event_rx.recv() => match next {
                        Some(event) if is_relevant(&event) => paths.extend(event.paths),
                        Some(_) => {}
                        None => break,
                    },
                }
            }

            if paths.is_empty() {
                continue;
            }
            debug!(paths = paths.len(), "processing change batch");

            for rule in rules_for_batch(&root, &paths, &rules, &mut filter) {
                info!(rule = %rule, "watch rule triggered");
                if runtime_tx
                    .send(RuntimeEvent::RuleTriggered { rule })
                    .await
                    .is_err()
                {
                    debug!("runtime channel closed; stopping watcher loop");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        batcher,
    })
}
