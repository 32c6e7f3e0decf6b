// src/dag/mod.rs

//! Dependency graph and pipeline composition.
//!
//! - [`graph`] holds the per-mode task graph built from `after` edges.
//! - [`outputs`] derives declared outputs and proves them disjoint.
//! - [`pipeline`] defines tasks, stages and the pipeline itself.
//! - [`compose`] layers the graph into barrier stages and validates them.

pub mod compose;
pub mod graph;
pub mod outputs;
pub mod pipeline;

pub use compose::compose_pipeline;
pub use graph::DagGraph;
pub use pipeline::{ExecutionMode, Pipeline, SideEffect, Stage, Task};
