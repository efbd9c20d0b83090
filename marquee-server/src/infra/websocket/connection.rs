use std::fmt;

use anyhow::Result;
use tokio::sync::mpsc;
use uuid::Uuid;

use marquee_model::WsEnvelope;

/// One open chat socket. Frames pushed through [`Connection::send`] are
/// written to the socket by the connection's writer task.
#[derive(Clone)]
pub struct Connection {
    pub id: Uuid,
    pub user_id: i64,
    sender: mpsc::Sender<WsEnvelope>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("channel_closed", &self.sender.is_closed())
            .finish()
    }
}

impl Connection {
    pub fn new(user_id: i64, sender: mpsc::Sender<WsEnvelope>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            sender,
        }
    }

    pub async fn send(&self, frame: WsEnvelope) -> Result<()> {
        self.sender
            .send(frame)
            .await
            .map_err(|_| anyhow::anyhow!("Failed to send frame: channel closed"))
    }
}
