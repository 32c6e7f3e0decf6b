// src/exec/mod.rs

//! Task execution layer.
//!
//! This module is responsible for actually running tasks: collecting their
//! inputs, piping them through filter commands via `tokio::process::Command`
//! and writing the transformed outputs.
//!
//! - [`backend`] provides the `TaskRunner` trait and the production
//!   `TransformRunner`; tests replace it with a fake implementation.
//! - [`filter`] runs a task's external filter command over one file.

pub mod backend;
pub mod filter;

pub use backend::{TaskReport, TaskRunner, TransformRunner};
