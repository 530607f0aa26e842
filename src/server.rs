//! Agent-facing HTTP surface.
//!
//! - `GET /` returns the server's own base URL.
//! - `GET /message` drains the relay queue.
//! - `POST /send` forwards a reply to the chat platform.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::{error, info, warn};

use crate::materialize::Materializer;
use crate::platform::{ChatSender, MessageRecord};
use crate::relay::RelayQueue;

const NO_MESSAGES: &str = "No messages\n";

#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<RelayQueue>,
    pub materializer: Arc<Materializer>,
    pub sender: Arc<dyn ChatSender>,
    pub base_url: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(base_url))
        .route("/message", get(poll_messages))
        .route("/send", post(send_message))
        .with_state(state)
}

/// Serve on the loopback interface until `shutdown` resolves.
pub async fn serve(
    port: u16,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Relay HTTP server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")
}

async fn base_url(State(state): State<AppState>) -> String {
    state.base_url.clone()
}

async fn poll_messages(State(state): State<AppState>) -> Result<String, (StatusCode, String)> {
    let records = state.queue.drain().await;
    if records.is_empty() {
        return Ok(NO_MESSAGES.to_string());
    }

    info!("Delivering {} message(s) to agent", records.len());
    let mut body = String::new();
    for record in records {
        let record = state.materializer.annotate(record).await.map_err(|e| {
            error!("{:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

        let json = serde_json::to_string(&record).map_err(|e| {
            error!("Failed to marshal message: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to marshal message".to_string(),
            )
        })?;
        body.push_str(&json);
        body.push('\n');
    }

    Ok(body)
}

async fn send_message(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, (StatusCode, String)> {
    let request: MessageRecord = serde_json::from_slice(&body).map_err(|e| {
        warn!(
            "Failed to parse send request: {} (body: {})",
            e,
            String::from_utf8_lossy(&body)
        );
        bad_request(format!("Failed to parse request: {}", e))
    })?;

    let chat_id: i64 = request.chat_id.parse().map_err(|_| {
        warn!("Invalid chat ID: {:?}", request.chat_id);
        bad_request(format!("Invalid chat ID: {}", request.chat_id))
    })?;

    let reply_to = match request.msg_id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => Some(id.parse::<i32>().map_err(|_| {
            warn!("Invalid message ID: {:?}", id);
            bad_request(format!("Invalid message ID: {}", id))
        })?),
        None => None,
    };

    state
        .sender
        .send_text(chat_id, &request.text, reply_to)
        .await
        .map_err(|e| {
            error!("Failed to send message to chat {}: {:#}", chat_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to send message".to_string(),
            )
        })?;

    Ok(StatusCode::OK)
}

fn bad_request(message: String) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message)
}
