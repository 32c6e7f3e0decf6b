// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling `[[watch]]` rules into glob matchers.
//! - Wiring up a cross-platform filesystem watcher (`notify`) with a debounce
//!   window that batches bursts of events.
//! - Optionally filtering out saves that did not change a file's contents.
//!
//! It does **not** run tasks; it only turns filesystem changes into
//! rule-level triggers for the engine.

pub mod event_handler;
pub mod hash;
pub mod patterns;
pub mod watcher;

pub use hash::ContentFilter;
pub use patterns::{WatchRule, build_rules_from_config};
pub use watcher::{WatcherHandle, spawn_watcher};
