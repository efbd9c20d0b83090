use std::{collections::HashSet, fmt, sync::Arc};

use dashmap::DashMap;
use tracing::{debug, error};
use uuid::Uuid;

use marquee_model::WsEnvelope;

use super::connection::Connection;

/// Connected chat clients and the rooms they listen to.
#[derive(Clone, Default)]
pub struct ConnectionManager {
    /// Current connection of every connected user. A newer connection
    /// replaces an older one.
    clients: Arc<DashMap<i64, Arc<Connection>>>,
    /// Chat room id to the users joined to it.
    rooms: Arc<DashMap<i64, HashSet<i64>>>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connection_count", &self.clients.len())
            .field("room_count", &self.rooms.len())
            .finish()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, returning the one it replaced.
    pub fn add_connection(&self, connection: Arc<Connection>) -> Option<Arc<Connection>> {
        self.clients.insert(connection.user_id, connection)
    }

    /// Remove a connection and its room memberships. Does nothing when the
    /// user has since reconnected.
    pub fn remove_connection(&self, user_id: i64, conn_id: Uuid) {
        let removed = self
            .clients
            .remove_if(&user_id, |_, current| current.id == conn_id)
            .is_some();
        if !removed {
            return;
        }

        for mut room in self.rooms.iter_mut() {
            room.value_mut().remove(&user_id);
        }
        self.rooms.retain(|_, members| !members.is_empty());
    }

    pub fn join_room(&self, room_id: i64, user_id: i64) {
        self.rooms.entry(room_id).or_default().insert(user_id);
    }

    pub fn get_connection(&self, user_id: i64) -> Option<Arc<Connection>> {
        self.clients.get(&user_id).map(|c| c.clone())
    }

    pub fn is_connected(&self, user_id: i64) -> bool {
        self.clients.contains_key(&user_id)
    }

    pub fn room_members(&self, room_id: i64) -> Vec<i64> {
        let mut members: Vec<i64> = self
            .rooms
            .get(&room_id)
            .map(|room| room.iter().copied().collect())
            .unwrap_or_default();
        members.sort_unstable();
        members
    }

    pub fn connection_count(&self) -> usize {
        self.clients.len()
    }

    pub async fn send_to_user(&self, user_id: i64, frame: WsEnvelope) {
        if let Some(conn) = self.get_connection(user_id)
            && let Err(e) = conn.send(frame).await
        {
            error!("Failed to send frame to user {}: {}", user_id, e);
        }
    }

    /// Send `frame` to every connected member of `room_id` except `except`.
    pub async fn broadcast_to_room(&self, room_id: i64, frame: WsEnvelope, except: Option<i64>) {
        let recipients: Vec<Arc<Connection>> = self
            .room_members(room_id)
            .into_iter()
            .filter(|user_id| Some(*user_id) != except)
            .filter_map(|user_id| self.get_connection(user_id))
            .collect();

        debug!(room_id, recipients = recipients.len(), event = %frame.event, "broadcasting");
        for conn in recipients {
            if let Err(e) = conn.send(frame.clone()).await {
                error!("Failed to send frame to connection: {}", e);
            }
        }
    }
}
