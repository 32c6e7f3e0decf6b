// src/exec/backend.rs

//! Pluggable task runner abstraction.
//!
//! The stage executor and the watch runtime talk to a [`TaskRunner`] instead
//! of touching files themselves. This keeps orchestration testable with a
//! fake runner while production uses [`TransformRunner`].
//!
//! - `TransformRunner` collects a task's inputs, pipes them through the
//!   optional filter command, applies the transform and writes the outputs
//!   after checking them against the task's declared outputs.
//! - Tests can provide their own `TaskRunner` that records start/finish order
//!   or fails on demand.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info};

use crate::dag::{SideEffect, Task};
use crate::engine::TaskName;
use crate::errors::{AssetpipeError, Result};
use crate::fs::FileSystem;
use crate::patterns::collect_matching_files;
use crate::transform::{self, Asset};

use super::filter::run_filter;

/// What a finished task did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskReport {
    pub task: TaskName,
    /// Build-relative paths written, sorted.
    pub written: Vec<String>,
    /// Whether the build root was cleared.
    pub cleared: bool,
}

/// Trait abstracting how a single task is executed.
pub trait TaskRunner: Send + Sync + 'static {
    fn run_task<'a>(
        &'a self,
        task: &'a Task,
    ) -> Pin<Box<dyn Future<Output = Result<TaskReport>> + Send + 'a>>;
}

/// Real runner used by `build` and `dev`.
#[derive(Debug, Clone)]
pub struct TransformRunner {
    source_root: PathBuf,
    build_root: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl TransformRunner {
    pub fn new(
        source_root: impl Into<PathBuf>,
        build_root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            build_root: build_root.into(),
            fs,
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    async fn clear(&self, task: &Task) -> Result<TaskReport> {
        let fs = self.fs.clone();
        let root = self.build_root.clone();
        info!(task = %task.name, path = %root.display(), "clearing build directory");
        blocking(&task.name, move || fs.remove_dir_all(&root).map_err(AssetpipeError::from))
            .await?;
        Ok(TaskReport {
            task: task.name.clone(),
            written: Vec::new(),
            cleared: true,
        })
    }

    async fn write_outputs(&self, task: &Task) -> Result<TaskReport> {
        let sources = task.sources.clone().ok_or_else(|| AssetpipeError::TaskFailed {
            task: task.name.clone(),
            message: "task has no sources".to_string(),
        })?;

        // Collect and read inputs.
        let fs = self.fs.clone();
        let root = self.source_root.clone();
        let inputs: Vec<(PathBuf, Asset)> = blocking(&task.name, move || {
            let files = collect_matching_files(fs.as_ref(), &root, &sources)?;
            files
                .into_iter()
                .map(|(abs, rel)| {
                    let bytes = fs.read(&abs)?;
                    Ok((abs, Asset::new(rel, bytes)))
                })
                .collect::<Result<Vec<_>>>()
        })
        .await?;

        debug!(task = %task.name, inputs = inputs.len(), "collected inputs");
        if inputs.is_empty() {
            info!(task = %task.name, "no matching inputs");
        }

        let mut assets = Vec::with_capacity(inputs.len());
        for (abs, mut asset) in inputs {
            if let Some(filter) = task.filter.as_deref() {
                asset.bytes =
                    run_filter(&task.name, filter, &self.source_root, &abs, asset.bytes).await?;
            }
            assets.push(asset);
        }

        let owned = task.clone();
        let outputs = blocking(&task.name, move || transform::apply(&owned, assets)).await?;

        // Every output must fall inside the declared outputs before anything
        // is written.
        let mut placed: Vec<(String, Vec<u8>)> = Vec::with_capacity(outputs.len());
        for out in outputs {
            let rel = task.output_path(&out.rel);
            if !task.outputs.is_match(&rel) {
                return Err(AssetpipeError::UndeclaredOutput {
                    task: task.name.clone(),
                    path: self.build_root.join(&rel),
                });
            }
            placed.push((rel, out.bytes));
        }
        placed.sort_by(|a, b| a.0.cmp(&b.0));

        let fs = self.fs.clone();
        let root = self.build_root.clone();
        let written = blocking(&task.name, move || {
            let mut written = Vec::with_capacity(placed.len());
            for (rel, bytes) in placed {
                fs.write(&root.join(&rel), &bytes)?;
                written.push(rel);
            }
            Ok(written)
        })
        .await?;

        info!(task = %task.name, files = written.len(), "task wrote outputs");
        Ok(TaskReport {
            task: task.name.clone(),
            written,
            cleared: false,
        })
    }
}

impl TaskRunner for TransformRunner {
    fn run_task<'a>(
        &'a self,
        task: &'a Task,
    ) -> Pin<Box<dyn Future<Output = Result<TaskReport>> + Send + 'a>> {
        Box::pin(async move {
            match task.side_effect() {
                SideEffect::Clear => self.clear(task).await,
                SideEffect::Write => self.write_outputs(task).await,
            }
        })
    }
}

/// Run blocking file I/O or a CPU-bound transform off the async workers.
async fn blocking<T, F>(task: &str, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AssetpipeError::TaskFailed {
            task: task.to_string(),
            message: format!("worker thread failed: {e}"),
        })?
}
