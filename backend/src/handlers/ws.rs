//! WebSocket relay of kitchen events
//!
//! Browsers cannot set an Authorization header on the upgrade request, so the
//! token is passed as `?token=`. Each connection receives every event
//! published after it subscribed, as a JSON text frame.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::{error::RecvError, Receiver};

use crate::error::AppError;
use crate::middleware::{authenticate, Actor};
use crate::AppState;
use shared::KitchenEvent;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

pub async fn events_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Response {
    let actor = match query
        .token
        .as_deref()
        .map(|token| authenticate(token, &state.config.jwt.secret))
    {
        Some(Ok(actor)) => actor,
        Some(Err(msg)) => return reject(&msg),
        None => return reject("Missing token"),
    };

    let events = state.events.subscribe();
    tracing::info!(user_id = %actor.user_id, "WebSocket client connected");

    ws.on_upgrade(move |socket| relay(socket, events, actor))
}

fn reject(message: &str) -> Response {
    AppError::Unauthorized {
        message: message.to_string(),
        message_uz: "Ruxsat berilmagan".to_string(),
    }
    .into_response()
}

async fn relay(socket: WebSocket, mut events: Receiver<KitchenEvent>, actor: Actor) {
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "WebSocket client lagging, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize event");
                    continue;
                }
            };

            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Inbound frames are ignored; only a close (or error) ends the session
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::info!(user_id = %actor.user_id, "WebSocket client disconnected");
}
