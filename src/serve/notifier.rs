// src/serve/notifier.rs

//! Fan-out of reload notifications to connected preview clients.

use tokio::sync::broadcast;
use tracing::debug;

use crate::types::NotifyAction;

/// Frame sent to the browser over the live-reload socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadMessage {
    /// Full page reload.
    Reload,
    /// Re-request style sheets in place.
    Css,
}

impl ReloadMessage {
    pub fn as_str(self) -> &'static str {
        match self {
            ReloadMessage::Reload => "reload",
            ReloadMessage::Css => "css",
        }
    }

    pub fn for_action(action: NotifyAction) -> Option<Self> {
        match action {
            NotifyAction::None => None,
            NotifyAction::Inject => Some(ReloadMessage::Css),
            NotifyAction::Reload => Some(ReloadMessage::Reload),
        }
    }
}

/// Something that can tell preview clients to refresh.
///
/// The watch runtime depends on this trait only; tests plug in a recorder.
pub trait ReloadNotifier: Send + Sync + 'static {
    fn notify(&self, action: NotifyAction);
}

/// Broadcast-backed notifier shared by the preview server and the runtime.
#[derive(Debug, Clone)]
pub struct LiveReload {
    tx: broadcast::Sender<ReloadMessage>,
}

impl LiveReload {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.tx.subscribe()
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new(16)
    }
}

impl ReloadNotifier for LiveReload {
    fn notify(&self, action: NotifyAction) {
        let Some(message) = ReloadMessage::for_action(action) else {
            return;
        };
        match self.tx.send(message) {
            Ok(clients) => debug!(message = message.as_str(), clients, "sent live-reload message"),
            Err(_) => debug!(message = message.as_str(), "no live-reload clients connected"),
        }
    }
}
