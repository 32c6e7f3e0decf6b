// src/serve/server.rs

//! Live-preview HTTP server over the build directory.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use super::client::{CLIENT_JS, SCRIPT_PATH, SOCKET_PATH, inject_client};
use super::notifier::{LiveReload, ReloadMessage};

/// How long shutdown waits for open connections.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct AppState {
    root: Arc<PathBuf>,
    live: LiveReload,
    /// Flips to `true` when the server shuts down.
    closing: watch::Receiver<bool>,
}

/// Router serving `build_root` with live reload wired in. Live-reload
/// sessions end once `closing` turns `true` or its sender is dropped.
pub fn router(build_root: PathBuf, live: LiveReload, closing: watch::Receiver<bool>) -> Router {
    let state = AppState {
        root: Arc::new(build_root),
        live,
        closing,
    };
    Router::new()
        .route(SOCKET_PATH, get(socket_handler))
        .route(SCRIPT_PATH, get(client_script))
        .fallback(serve_file)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn client_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        CLIENT_JS,
    )
}

fn is_html(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
}

/// HTML pages get the client script injected; everything else is served
/// untouched by `ServeDir`.
async fn serve_file(State(state): State<AppState>, req: Request) -> Response {
    let path = req.uri().path().to_string();
    if path.split('/').any(|c| c == "..") {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let rel = path.trim_start_matches('/');
    let mut candidate = state.root.join(rel);
    if rel.is_empty() || rel.ends_with('/') || candidate.is_dir() {
        candidate = candidate.join("index.html");
    }

    if is_html(&candidate) {
        match tokio::fs::read_to_string(&candidate).await {
            Ok(html) => return Html(inject_client(&html)).into_response(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %candidate.display(), error = %e, "failed to read page");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    match ServeDir::new(state.root.as_path()).oneshot(req).await {
        Ok(res) => res.into_response(),
        Err(never) => match never {},
    }
}

async fn socket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let rx = state.live.subscribe();
    let closing = state.closing.clone();
    ws.on_upgrade(move |socket| client_session(socket, rx, closing))
}

async fn client_session(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<ReloadMessage>,
    mut closing: watch::Receiver<bool>,
) {
    debug!("live-reload client connected");
    let mut closed = *closing.borrow_and_update();
    while !closed {
        tokio::select! {
            changed = closing.changed() => {
                closed = changed.is_err() || *closing.borrow_and_update();
            }
            msg = rx.recv() => {
                let message = match msg {
                    Ok(message) => message,
                    // Missed frames: a full reload covers anything dropped.
                    Err(broadcast::error::RecvError::Lagged(_)) => ReloadMessage::Reload,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if socket.send(Message::Text(message.as_str().into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    if closed {
        let _ = socket.send(Message::Close(None)).await;
    }
    debug!("live-reload client disconnected");
}

/// A running preview server.
#[derive(Debug)]
pub struct PreviewServer {
    addr: SocketAddr,
    closing: watch::Sender<bool>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl PreviewServer {
    /// Bind `host:port` (port 0 picks a free one) and start serving.
    pub async fn start(host: &str, port: u16, build_root: PathBuf, live: LiveReload) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind((host, port))
            .await
            .with_context(|| format!("binding preview server to {host}:{port}"))?;
        let addr = listener.local_addr()?;

        let (closing, closing_rx) = watch::channel(false);
        let app = router(build_root.clone(), live, closing_rx.clone());
        let handle = tokio::spawn(async move {
            let mut closing_rx = closing_rx;
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = closing_rx.wait_for(|closing| *closing).await;
                })
                .await
        });

        info!(url = %format!("http://{addr}"), root = %build_root.display(), "preview server listening");
        Ok(Self {
            addr,
            closing,
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections, close live-reload sessions and wait
    /// (bounded) for the server task.
    pub async fn shutdown(self) -> Result<()> {
        self.closing.send_replace(true);
        match tokio::time::timeout(SHUTDOWN_GRACE, self.handle).await {
            Ok(joined) => joined.context("preview server task failed")??,
            Err(_) => warn!("preview server did not stop within the grace period"),
        }
        info!("preview server stopped");
        Ok(())
    }
}
