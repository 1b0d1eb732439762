//! HTTP/SSE transport implementation
//!
//! `GET /sse` opens a session. The first event (`endpoint`) names the URL the
//! client must POST its JSON-RPC messages to; every response is pushed back on
//! the session's stream as a `message` event.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{RwLock, broadcast, watch};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{McpMessage, MessageHandler};

pub const SSE_PATH: &str = "/sse";
pub const MESSAGES_PATH: &str = "/messages/";

const SESSION_BUFFER: usize = 100;

type Sessions = Arc<RwLock<HashMap<String, broadcast::Sender<SseMessage>>>>;

/// HTTP transport serving MCP over server-sent events
pub struct SseTransport {
    host: String,
    port: u16,
    sessions: Sessions,
    shutdown_signal: watch::Sender<bool>,
}

/// Event pushed to one session's stream
#[derive(Debug, Clone)]
pub struct SseMessage {
    pub event: &'static str,
    pub data: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    session_id: String,
}

/// Application state for HTTP handlers
#[derive(Clone)]
struct AppState {
    handler: Arc<dyn MessageHandler + Send + Sync>,
    sessions: Sessions,
}

/// Removes the session once its event stream is dropped
struct SessionGuard {
    session_id: String,
    sessions: Sessions,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let session_id = std::mem::take(&mut self.session_id);
        let sessions = self.sessions.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                if sessions.write().await.remove(&session_id).is_some() {
                    info!("SSE session {} closed", session_id);
                }
            });
        }
    }
}

impl SseTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let (shutdown_signal, _) = watch::channel(false);
        Self {
            host: host.into(),
            port,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            shutdown_signal,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Number of open SSE sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Create the Axum router with all routes and middleware
    pub fn router(&self, handler: Arc<dyn MessageHandler + Send + Sync>) -> Router {
        let state = AppState {
            handler,
            sessions: self.sessions.clone(),
        };

        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
            .allow_origin(Any);

        Router::new()
            .route(SSE_PATH, get(handle_sse_connection))
            .route(MESSAGES_PATH, post(handle_post_message))
            .route("/messages", post(handle_post_message))
            .route("/health", get(handle_health_check))
            .layer(cors)
            .with_state(state)
    }

    /// Serve on an already bound listener until shutdown is requested.
    pub async fn serve(
        &self,
        listener: TcpListener,
        handler: Arc<dyn MessageHandler + Send + Sync>,
    ) -> Result<()> {
        let app = self.router(handler);
        let mut shutdown = self.shutdown_signal.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|requested| *requested).await;
            })
            .await
            .context("HTTP server error")
    }
}

#[async_trait]
impl super::Transport for SseTransport {
    /// Start the HTTP server
    async fn start(&self, handler: Arc<dyn MessageHandler + Send + Sync>) -> Result<()> {
        let addr = self.address();
        info!("Starting SSE transport on {}", addr);

        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind HTTP server to {addr}"))?;

        info!("  SSE endpoint: http://{}{}", addr, SSE_PATH);
        info!("  Messages endpoint: http://{}{}", addr, MESSAGES_PATH);

        self.shutdown_signal.send_replace(false);
        self.serve(listener, handler).await
    }

    /// Stop accepting connections and close every open session
    async fn shutdown(&self) -> Result<()> {
        info!("Shutting down SSE transport");
        self.shutdown_signal.send_replace(true);
        let closed = {
            let mut sessions = self.sessions.write().await;
            let closed = sessions.len();
            sessions.clear();
            closed
        };
        debug!("Closed {} SSE session(s)", closed);
        Ok(())
    }
}

/// Open a session and stream its responses
async fn handle_sse_connection(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let session_id = Uuid::new_v4().simple().to_string();
    let (sender, receiver) = broadcast::channel(SESSION_BUFFER);
    state
        .sessions
        .write()
        .await
        .insert(session_id.clone(), sender);

    info!("SSE session {} opened", session_id);

    let endpoint = format!("{MESSAGES_PATH}?session_id={session_id}");
    let guard = SessionGuard {
        session_id,
        sessions: state.sessions.clone(),
    };

    let stream = async_stream::stream! {
        let guard = guard;
        let mut rx = receiver;

        yield Ok::<Event, axum::Error>(Event::default().event("endpoint").data(endpoint));

        loop {
            match rx.recv().await {
                Ok(msg) => {
                    yield Ok(Event::default().event(msg.event).data(msg.data));
                }
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("SSE session {} lagged behind by {} message(s)", guard.session_id, skipped);
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Accept one JSON-RPC message for a session; the reply goes out on its stream
async fn handle_post_message(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    body: String,
) -> Response {
    let Some(sender) = state.sessions.read().await.get(&query.session_id).cloned() else {
        warn!("Message for unknown SSE session {}", query.session_id);
        return (StatusCode::NOT_FOUND, "Could not find session").into_response();
    };

    let message = match McpMessage::parse(&body) {
        Ok(message) => message,
        Err(e) => {
            warn!("Rejecting message for session {}: {}", query.session_id, e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    debug!("SSE message for session {}: {:?}", query.session_id, message);

    let handler = state.handler.clone();
    let session_id = query.session_id;
    tokio::spawn(async move {
        let response = match handler.handle_message(message).await {
            Ok(Some(response)) => response,
            Ok(None) => return,
            Err(e) => {
                error!("Failed to handle MCP message: {}", e);
                return;
            }
        };
        let data = match response.to_json_string() {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to serialize response: {}", e);
                return;
            }
        };
        if sender.send(SseMessage { event: "message", data }).is_err() {
            warn!("SSE session {} closed before its response was sent", session_id);
        }
    });

    StatusCode::ACCEPTED.into_response()
}

async fn handle_health_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: crate::VERSION.to_string(),
        sessions: state.sessions.read().await.len(),
        timestamp: chrono::Utc::now(),
    };
    (StatusCode::OK, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Transport;
    use serde_json::{Value, json};

    struct PingHandler;

    #[async_trait]
    impl MessageHandler for PingHandler {
        async fn handle_message(&self, message: McpMessage) -> Result<Option<McpMessage>> {
            match message {
                McpMessage::Ping { id } => Ok(Some(McpMessage::result(id, json!({})))),
                _ => Ok(None),
            }
        }
    }

    async fn spawn_server() -> (Arc<SseTransport>, String) {
        let transport = Arc::new(SseTransport::new("127.0.0.1", 0));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let server = transport.clone();
        tokio::spawn(async move { server.serve(listener, Arc::new(PingHandler)).await });
        (transport, base)
    }

    /// Read the SSE body until an event of `kind` arrives and return its data.
    async fn next_event(response: &mut reqwest::Response, buffer: &mut String, kind: &str) -> String {
        loop {
            if let Some(end) = buffer.find("\n\n") {
                let block: String = buffer.drain(..end + 2).collect();
                let mut event = None;
                let mut data = String::new();
                for line in block.lines() {
                    if let Some(name) = line.strip_prefix("event:") {
                        event = Some(name.trim().to_string());
                    } else if let Some(value) = line.strip_prefix("data:") {
                        data.push_str(value.trim_start());
                    }
                }
                if event.as_deref() == Some(kind) {
                    return data;
                }
                continue;
            }
            let chunk = response.chunk().await.unwrap().expect("stream ended");
            buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (_transport, base) = spawn_server().await;
        let health: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(health["status"], "healthy");
        assert_eq!(health["version"], crate::VERSION);
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let (transport, base) = spawn_server().await;
        let client = reqwest::Client::new();

        let mut stream = client.get(format!("{base}/sse")).send().await.unwrap();
        let mut buffer = String::new();
        let endpoint = next_event(&mut stream, &mut buffer, "endpoint").await;
        assert!(endpoint.starts_with("/messages/?session_id="));
        assert_eq!(transport.session_count().await, 1);

        let status = client
            .post(format!("{base}{endpoint}"))
            .body(r#"{"jsonrpc":"2.0","id":42,"method":"ping"}"#)
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status, StatusCode::ACCEPTED);

        let data = next_event(&mut stream, &mut buffer, "message").await;
        let response: Value = serde_json::from_str(&data).unwrap();
        assert_eq!(response["id"], 42);
        assert_eq!(response["result"], json!({}));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (_transport, base) = spawn_server().await;
        let status = reqwest::Client::new()
            .post(format!("{base}/messages/?session_id=missing"))
            .body(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_shutdown_clears_sessions() {
        let (transport, base) = spawn_server().await;
        let mut stream = reqwest::get(format!("{base}/sse")).await.unwrap();
        let mut buffer = String::new();
        next_event(&mut stream, &mut buffer, "endpoint").await;

        transport.shutdown().await.unwrap();
        assert_eq!(transport.session_count().await, 0);
    }
}
