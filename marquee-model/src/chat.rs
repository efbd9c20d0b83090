use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: i64,
    pub author_id: i64,
    pub chat_room_id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

/// Payload of the `sendMessage` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub message: String,
    #[serde(default)]
    pub room_id: Option<i64>,
}

/// Every websocket frame in either direction is `{"event": .., "data": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl WsEnvelope {
    pub const SEND_MESSAGE: &'static str = "sendMessage";
    pub const NEW_MESSAGE: &'static str = "newMessage";
    pub const ROOM_CREATED: &'static str = "roomCreated";
    pub const EXCEPTION: &'static str = "exception";

    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn exception(message: impl Into<String>) -> Self {
        Self::new(
            Self::EXCEPTION,
            serde_json::json!({ "status": "error", "message": message.into() }),
        )
    }
}
