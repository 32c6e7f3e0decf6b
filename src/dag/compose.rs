// src/dag/compose.rs

//! Turn a validated config into the [`Pipeline`] of one mode.
//!
//! Stages are the levels of the mode's dependency graph; composition rejects
//! any stage in which two tasks could write the same output path, and any
//! clean task that would run after a writer.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::model::ConfigFile;
use crate::dag::graph::DagGraph;
use crate::dag::outputs::find_overlap;
use crate::dag::pipeline::{Pipeline, SideEffect, Stage, Task};
use crate::errors::{AssetpipeError, Result};
use crate::types::Mode;

/// Compose the pipeline of `mode`. Performs no file I/O.
pub fn compose_pipeline(cfg: &ConfigFile, mode: Mode) -> Result<Pipeline> {
    let graph = DagGraph::for_mode(cfg, mode)?;
    let levels = graph.levels();

    let mut grouped: BTreeMap<usize, Vec<Arc<Task>>> = BTreeMap::new();
    for name in graph.tasks() {
        let task_cfg = cfg
            .tasks()
            .get(name)
            .ok_or_else(|| AssetpipeError::TaskNotFound(name.to_string()))?;
        let task = Task::from_config(name, task_cfg)
            .map_err(|e| AssetpipeError::ConfigError(format!("{e:#}")))?;
        let level = levels.get(name).copied().unwrap_or(0);
        grouped.entry(level).or_default().push(Arc::new(task));
    }

    let stages: Vec<Stage> = grouped
        .into_values()
        .enumerate()
        .map(|(index, mut tasks)| {
            tasks.sort_by(|a, b| a.name.cmp(&b.name));
            Stage::new(index, tasks)
        })
        .collect();

    if stages.is_empty() {
        return Err(AssetpipeError::ConfigError(format!(
            "no task is enabled in {mode} mode"
        )));
    }

    for stage in stages.iter() {
        validate_stage_outputs(mode, stage)?;
    }
    validate_clear_before_writers(mode, &stages)?;

    for stage in stages.iter() {
        debug!(
            %mode,
            stage = stage.index,
            tasks = ?stage.task_names(),
            execution = ?stage.execution,
            "composed stage"
        );
    }
    info!(%mode, stages = stages.len(), "pipeline composed");

    Ok(Pipeline { mode, stages })
}

/// Pairwise disjointness of declared outputs inside one stage.
pub fn validate_stage_outputs(mode: Mode, stage: &Stage) -> Result<()> {
    for (i, first) in stage.tasks.iter().enumerate() {
        for second in stage.tasks.iter().skip(i + 1) {
            if let Some(witness) = find_overlap(&first.outputs, &second.outputs) {
                return Err(AssetpipeError::OutputOverlap {
                    mode,
                    stage: stage.index,
                    first: first.name.clone(),
                    second: second.name.clone(),
                    witness,
                });
            }
        }
    }
    Ok(())
}

/// A clean task must come before every stage that writes; otherwise it would
/// erase output produced earlier in the same run.
fn validate_clear_before_writers(mode: Mode, stages: &[Stage]) -> Result<()> {
    let mut first_writer: Option<(usize, &str)> = None;
    for stage in stages {
        for task in stage.tasks.iter() {
            match task.side_effect() {
                SideEffect::Write => {
                    if first_writer.is_none() {
                        first_writer = Some((stage.index, task.name.as_str()));
                    }
                }
                SideEffect::Clear => {
                    if let Some((writer_stage, writer)) = first_writer {
                        if writer_stage < stage.index {
                            return Err(AssetpipeError::ConfigError(format!(
                                "clean task '{}' runs in {mode} stage {} after writer '{}' (stage {}); add it to `after` of the writers",
                                task.name, stage.index, writer, writer_stage
                            )));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
