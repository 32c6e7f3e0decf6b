// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetpipeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error(
        "Output overlap in {mode} stage {stage}: tasks '{first}' and '{second}' may both write {witness}"
    )]
    OutputOverlap {
        mode: crate::types::Mode,
        stage: usize,
        first: String,
        second: String,
        witness: String,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Transform failed in task '{task}': {message}")]
    Transform { task: String, message: String },

    #[error("Task '{task}' tried to write {path:?}, which is outside its declared outputs")]
    UndeclaredOutput { task: String, path: PathBuf },

    #[error("Filter command `{cmd}` failed for task '{task}': {message}")]
    FilterCommand {
        task: String,
        cmd: String,
        message: String,
    },

    #[error("Task '{task}' failed: {message}")]
    TaskFailed { task: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AssetpipeError {
    pub fn transform(task: impl Into<String>, message: impl ToString) -> Self {
        AssetpipeError::Transform {
            task: task.into(),
            message: message.to_string(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AssetpipeError>;
