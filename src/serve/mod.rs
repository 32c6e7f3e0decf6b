// src/serve/mod.rs

//! Live preview: static server over the build directory plus live reload.
//!
//! - [`server`] serves files (axum + tower-http) and the reload socket.
//! - [`client`] holds the injected browser script.
//! - [`notifier`] fans reload/css messages out to connected clients.

pub mod client;
pub mod notifier;
pub mod server;

pub use notifier::{LiveReload, ReloadMessage, ReloadNotifier};
pub use server::{PreviewServer, router};
