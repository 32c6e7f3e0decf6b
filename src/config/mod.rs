// src/config/mod.rs

//! Configuration loading and validation for assetpipe.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk, or fall back to the built-in pipeline
//!   (`loader.rs`, `defaults.rs`).
//! - Validate invariants like known dependencies and acyclicity (`validate.rs`).

pub mod defaults;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config, load_and_validate, load_from_path, parse_str, resolve};
pub use model::{
    ConfigFile, ConfigSection, RawConfigFile, ServerSection, TaskConfig, WatchRuleConfig,
};
