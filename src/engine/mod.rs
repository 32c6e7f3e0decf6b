// src/engine/mod.rs

//! Orchestration engine for assetpipe.
//!
//! This module ties together:
//! - the stage executor that runs a composed pipeline with hard barriers
//! - the per-rule watch state (what happens when triggers arrive while a
//!   rule is already running)
//! - the main runtime event loop of the dev server that reacts to:
//!   - watch rule triggers
//!   - task completion events
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]. [`orchestrator`] wires everything into the
//! `build` and `dev` runs.

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Watch rule name.
pub type RuleName = String;

/// Outcome of a task for the watch core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(String),
}

/// Events flowing into the runtime from the watcher, tasks and Ctrl-C.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// A changed file matched this watch rule.
    RuleTriggered { rule: RuleName },
    /// A task dispatched on behalf of `rule` finished.
    TaskCompleted {
        rule: RuleName,
        task: TaskName,
        outcome: TaskOutcome,
    },
    /// The notification of `rule` was handed to the preview clients.
    NotifyDelivered { rule: RuleName },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod orchestrator;
pub mod rules;
pub mod runtime;
pub mod stage_executor;

pub use core::{CoreCommand, CoreRuntime, CoreStep};
pub use orchestrator::{run_build, run_dev};
pub use rules::{RulePhase, RuleState};
pub use runtime::Runtime;
pub use stage_executor::{PipelineReport, run_pipeline};
