// src/engine/orchestrator.rs

//! The two top-level runs: one-shot `build` and `dev` (build, serve, watch).

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::model::ConfigFile;
use crate::dag::Pipeline;
use crate::engine::core::CoreRuntime;
use crate::engine::runtime::Runtime;
use crate::engine::stage_executor::{PipelineReport, run_pipeline};
use crate::engine::{RuntimeEvent, TaskName};
use crate::errors::Result;
use crate::exec::TaskRunner;
use crate::fs::FileSystem;
use crate::serve::{LiveReload, PreviewServer, ReloadNotifier};
use crate::types::Mode;
use crate::watch::{WatchRule, spawn_watcher};

/// Absolute locations of the source and build trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub source_root: PathBuf,
    pub build_root: PathBuf,
}

impl Project {
    /// Resolve `[config] source` / `build` against the project root.
    pub fn from_config(root: &Path, cfg: &ConfigFile) -> Self {
        let section = cfg.config_section();
        Self {
            source_root: root.join(&section.source),
            build_root: root.join(&section.build),
        }
    }
}

/// Settings of the dev run that do not come from the pipeline.
#[derive(Debug, Clone)]
pub struct DevOptions {
    pub host: String,
    /// `0` binds a free port.
    pub port: u16,
    pub debounce: Duration,
}

impl DevOptions {
    pub fn from_config(cfg: &ConfigFile, port_override: Option<u16>) -> Self {
        Self {
            host: cfg.server_section().host.clone(),
            port: port_override.unwrap_or(cfg.server_section().port),
            debounce: Duration::from_millis(cfg.config_section().debounce_ms),
        }
    }
}

/// One-shot build: every stage, in order, failing on the first fatal error.
pub async fn run_build<R: TaskRunner>(pipeline: &Pipeline, runner: Arc<R>) -> Result<PipelineReport> {
    let report = run_pipeline(pipeline, runner).await?;
    info!(files = report.written().len(), "build complete");
    Ok(report)
}

/// Tasks whose failures the dev watch loop survives.
fn recoverable_tasks(pipeline: &Pipeline) -> Vec<TaskName> {
    pipeline
        .tasks()
        .filter(|t| !t.failure_is_fatal(Mode::Dev))
        .map(|t| t.name.clone())
        .collect()
}

/// Dev run: build once, serve the build dir, then re-run watch rules until
/// `shutdown` resolves or a task fails fatally.
pub async fn run_dev<R, S>(
    pipeline: Arc<Pipeline>,
    rules: Vec<WatchRule>,
    project: &Project,
    options: &DevOptions,
    runner: Arc<R>,
    fs: Arc<dyn FileSystem>,
    shutdown: S,
) -> Result<()>
where
    R: TaskRunner,
    S: Future<Output = ()> + Send + 'static,
{
    let initial = run_pipeline(&pipeline, Arc::clone(&runner)).await?;
    for (task, message) in initial.recovered.iter() {
        warn!(task = %task, error = %message, "initial build finished with a recovered failure");
    }
    info!(files = initial.written().len(), "initial build complete");

    let live = LiveReload::default();
    let server = PreviewServer::start(
        &options.host,
        options.port,
        project.build_root.clone(),
        live.clone(),
    )
    .await?;

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let watcher = match spawn_watcher(
        project.source_root.clone(),
        rules.clone(),
        rt_tx.clone(),
        options.debounce,
        fs,
    ) {
        Ok(w) => w,
        Err(e) => {
            server.shutdown().await?;
            return Err(e.into());
        }
    };

    // Shutdown signal → graceful stop of the runtime loop.
    let shutdown_listener = {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            shutdown.await;
            info!("shutdown requested");
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        })
    };

    let core = CoreRuntime::new(&rules, recoverable_tasks(&pipeline));
    let notifier: Arc<dyn ReloadNotifier> = Arc::new(live);
    let runtime = Runtime::new(core, pipeline, rt_rx, rt_tx, runner, notifier);
    let result = runtime.run().await;

    shutdown_listener.abort();
    watcher.stop().await;
    server.shutdown().await?;
    info!("dev run stopped");
    result
}
