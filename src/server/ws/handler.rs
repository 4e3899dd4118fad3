//! WebSocket chat loop.
//!
//! Runs the same turn pipeline as the HTTP API, but emits the settled
//! answer as simple word-level chunks followed by a `done` frame, the way
//! the frontend renders a streaming reply.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};

use super::protocol::{WsIncomingMessage, WS_APP_PROTOCOL};
use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.protocols([WS_APP_PROTOCOL])
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<WsIncomingMessage>();

    tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Ok(incoming) = serde_json::from_str::<WsIncomingMessage>(&text) {
                        let _ = tx.send(incoming);
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    while let Some(incoming) = rx.recv().await {
        if let Err(err) = handle_message(&mut sender, &state, incoming).await {
            let _ = send_json(
                &mut sender,
                json!({"type": "error", "message": err.to_string()}),
            )
            .await;
        }
    }
}

async fn handle_message(
    sender: &mut SplitSink<WebSocket, Message>,
    state: &Arc<AppState>,
    data: WsIncomingMessage,
) -> Result<(), ApiError> {
    match data.msg_type.as_deref().unwrap_or("") {
        "get_history" => send_history(sender, state).await,
        "message" => {
            let text = data.message.unwrap_or_default();
            let Some(outcome) = state.orchestrator.send_message(&text).await? else {
                // Empty input: no turn started, nothing to emit.
                return Ok(());
            };

            if !outcome.sources.is_empty() {
                send_json(
                    sender,
                    json!({"type": "sources", "sources": outcome.sources}),
                )
                .await?;
            }

            for word in outcome.message.content.split_inclusive(' ') {
                send_json(sender, json!({"type": "chunk", "message": word})).await?;
            }

            send_json(sender, json!({"type": "done", "cached": outcome.cached})).await?;
            Ok(())
        }
        other => {
            tracing::debug!("Ignoring unknown ws message type: {:?}", other);
            Ok(())
        }
    }
}

async fn send_history(
    sender: &mut SplitSink<WebSocket, Message>,
    state: &Arc<AppState>,
) -> Result<(), ApiError> {
    send_json(
        sender,
        json!({"type": "history", "messages": state.orchestrator.messages()}),
    )
    .await
}

async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    value: Value,
) -> Result<(), ApiError> {
    sender
        .send(Message::Text(value.to_string()))
        .await
        .map_err(ApiError::internal)
}
