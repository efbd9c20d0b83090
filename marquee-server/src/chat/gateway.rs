//! `GET /ws`: the chat websocket.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, header},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use marquee_model::{SendMessage, WsEnvelope};

use crate::{
    infra::{app_state::AppState, websocket::Connection},
    users::auth::AuthService,
};

/// Outgoing frames buffered per connection.
const OUTBOX_CAPACITY: usize = 100;

/// Upgrade to a chat socket. The handshake must carry an access token in
/// `Authorization: Bearer`; without one the socket is closed right away.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    match handshake_user(&state.auth, &headers) {
        Ok(user_id) => ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)),
        Err(reason) => {
            warn!(%reason, "rejecting chat handshake");
            ws.on_upgrade(|mut socket| async move {
                let _ = socket.send(Message::Close(None)).await;
            })
        }
    }
}

/// The user behind the handshake's access token.
fn handshake_user(auth: &AuthService, headers: &HeaderMap) -> Result<i64, String> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| "missing authorization header".to_string())?;
    auth.parse_bearer_token(raw, false)
        .map(|claims| claims.sub)
        .map_err(|err| err.message)
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: i64) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<WsEnvelope>(OUTBOX_CAPACITY);

    let connection = Arc::new(Connection::new(user_id, tx));
    if let Err(err) = state.chat.register_client(connection.clone()).await {
        error!(user_id, error = %err, "failed to register chat client");
        let _ = ws_sender.send(Message::Close(None)).await;
        state.chat.remove_client(&connection);
        return;
    }

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else {
                continue;
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_frame(&state, &connection, text.as_str()).await;
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                debug!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    state.chat.remove_client(&connection);
    writer.abort();
}

async fn handle_frame(state: &AppState, connection: &Connection, text: &str) {
    let frame = match serde_json::from_str::<WsEnvelope>(text) {
        Ok(frame) => frame,
        Err(_) => {
            reply(connection, WsEnvelope::exception("frames must be {\"event\", \"data\"} JSON")).await;
            return;
        }
    };

    match frame.event.as_str() {
        WsEnvelope::SEND_MESSAGE => {
            let payload = match serde_json::from_value::<SendMessage>(frame.data) {
                Ok(payload) => payload,
                Err(err) => {
                    reply(connection, WsEnvelope::exception(format!("invalid sendMessage payload: {err}"))).await;
                    return;
                }
            };
            if let Err(err) = state.chat.send_message(connection.user_id, payload).await {
                reply(connection, WsEnvelope::exception(err.message)).await;
            }
        }
        other => {
            reply(connection, WsEnvelope::exception(format!("unknown event '{other}'"))).await;
        }
    }
}

async fn reply(connection: &Connection, frame: WsEnvelope) {
    if let Err(e) = connection.send(frame).await {
        debug!("Failed to reply on chat socket: {}", e);
    }
}
