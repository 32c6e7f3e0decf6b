// src/engine/stage_executor.rs

//! Run a composed pipeline stage by stage.
//!
//! Every task of a stage is spawned onto one `JoinSet`; the next stage starts
//! only after the set is drained. The first fatal failure aborts the rest of
//! the stage and ends the run.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::dag::{Pipeline, Stage, Task};
use crate::engine::TaskName;
use crate::errors::{AssetpipeError, Result};
use crate::exec::{TaskReport, TaskRunner};

/// Summary of a finished pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// Reports of the successful tasks, in completion order.
    pub tasks: Vec<TaskReport>,
    /// Tasks whose failure was survived (dev mode only).
    pub recovered: Vec<(TaskName, String)>,
}

impl PipelineReport {
    /// Every build-relative path written, sorted.
    pub fn written(&self) -> Vec<&str> {
        let mut all: Vec<&str> = self
            .tasks
            .iter()
            .flat_map(|t| t.written.iter().map(String::as_str))
            .collect();
        all.sort_unstable();
        all
    }
}

/// Run all stages of `pipeline` in order.
pub async fn run_pipeline<R: TaskRunner>(pipeline: &Pipeline, runner: Arc<R>) -> Result<PipelineReport> {
    let started = Instant::now();
    let mut report = PipelineReport::default();

    info!(mode = %pipeline.mode, stages = pipeline.stages.len(), "running pipeline");
    for stage in pipeline.stages.iter() {
        run_stage(pipeline, stage, &runner, &mut report).await?;
    }

    info!(
        mode = %pipeline.mode,
        files = report.written().len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "pipeline finished"
    );
    Ok(report)
}

async fn run_stage<R: TaskRunner>(
    pipeline: &Pipeline,
    stage: &Stage,
    runner: &Arc<R>,
    report: &mut PipelineReport,
) -> Result<()> {
    info!(stage = stage.index, tasks = ?stage.task_names(), execution = ?stage.execution, "starting stage");

    let mut set: JoinSet<(Arc<Task>, Result<TaskReport>)> = JoinSet::new();
    for task in stage.tasks.iter() {
        let task = Arc::clone(task);
        let runner = Arc::clone(runner);
        set.spawn(async move {
            let result = runner.run_task(&task).await;
            (task, result)
        });
    }

    while let Some(joined) = set.join_next().await {
        let failure = match joined {
            Ok((task, Ok(task_report))) => {
                info!(stage = stage.index, task = %task.name, "task succeeded");
                report.tasks.push(task_report);
                continue;
            }
            Ok((task, Err(e))) => {
                if !task.failure_is_fatal(pipeline.mode) {
                    warn!(stage = stage.index, task = %task.name, error = %e, "task failed; continuing");
                    report.recovered.push((task.name.clone(), e.to_string()));
                    continue;
                }
                error!(stage = stage.index, task = %task.name, error = %e, "task failed");
                e
            }
            Err(join_err) => {
                error!(stage = stage.index, error = %join_err, "task aborted unexpectedly");
                AssetpipeError::TaskFailed {
                    task: format!("stage {}", stage.index),
                    message: join_err.to_string(),
                }
            }
        };

        set.abort_all();
        while set.join_next().await.is_some() {}
        return Err(failure);
    }

    Ok(())
}
