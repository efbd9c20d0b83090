use std::sync::Arc;

use serde_json::json;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use marquee_model::{Chat, SendMessage, WsEnvelope};

use crate::{
    db::{
        TxScope,
        repositories::{PostgresChatRepository, PostgresUserRepository},
    },
    infra::{
        errors::{AppError, AppResult},
        websocket::{Connection, ConnectionManager},
    },
};

/// Result of a `sendMessage` transaction. Notifications go out only after
/// it committed.
#[derive(Debug)]
struct SentMessage {
    chat: Chat,
    /// Members of a room opened for this message.
    created_room: Option<Vec<i64>>,
}

#[derive(Debug, Clone)]
pub struct ChatService {
    pool: PgPool,
    chats: PostgresChatRepository,
    users: PostgresUserRepository,
    manager: Arc<ConnectionManager>,
}

impl ChatService {
    pub fn new(pool: PgPool, manager: Arc<ConnectionManager>) -> Self {
        Self {
            chats: PostgresChatRepository::new(pool.clone()),
            users: PostgresUserRepository::new(pool.clone()),
            pool,
            manager,
        }
    }

    /// Register a socket and join it to every room its user belongs to.
    pub async fn register_client(&self, connection: Arc<Connection>) -> AppResult<()> {
        let user_id = connection.user_id;
        self.manager.add_connection(connection);

        let rooms = self.chats.room_ids_for_user(user_id).await?;
        for room_id in &rooms {
            self.manager.join_room(*room_id, user_id);
        }
        info!(user_id, rooms = rooms.len(), "chat client connected");
        Ok(())
    }

    pub fn remove_client(&self, connection: &Connection) {
        self.manager
            .remove_connection(connection.user_id, connection.id);
        info!(user_id = connection.user_id, "chat client disconnected");
    }

    /// Persist a message and deliver it to the other members of its room.
    ///
    /// Admins must name the room. Other users always talk in their own room,
    /// which is opened together with an admin on their first message.
    pub async fn send_message(&self, user_id: i64, payload: SendMessage) -> AppResult<Chat> {
        if payload.message.trim().is_empty() {
            return Err(AppError::bad_request("message must not be empty"));
        }

        let mut tx = TxScope::begin(&self.pool, "chat.send_message").await?;
        let result = self.send_in(tx.conn(), user_id, &payload).await;
        let sent = tx.finish(result).await?;

        deliver(&self.manager, user_id, &sent).await?;
        Ok(sent.chat)
    }

    async fn send_in(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        payload: &SendMessage,
    ) -> AppResult<SentMessage> {
        let user = self
            .users
            .find_by_id_in(conn, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user does not exist"))?;

        let (room, created_room) = if user.role.is_admin() {
            let room_id = payload
                .room_id
                .ok_or_else(|| AppError::bad_request("admins must choose a roomId"))?;
            let room = self
                .chats
                .find_room_in(conn, room_id)
                .await?
                .ok_or_else(|| AppError::not_found("chat room does not exist"))?;
            (room, None)
        } else {
            match self.chats.find_room_for_user_in(conn, user.id).await? {
                Some(room) => (room, None),
                None => {
                    let admin = self
                        .users
                        .find_any_admin_in(conn)
                        .await?
                        .ok_or_else(|| AppError::not_found("no admin is available to chat"))?;
                    let members = vec![user.id, admin.id];
                    let room = self.chats.create_room_in(conn, &members).await?;
                    info!(room_id = room.id, user_id = user.id, admin_id = admin.id, "opened chat room");
                    (room, Some(members))
                }
            }
        };

        let chat = self
            .chats
            .insert_chat_in(conn, user.id, room.id, &payload.message)
            .await?;
        Ok(SentMessage { chat, created_room })
    }
}

/// Push a committed message to the sockets of its room. Members of a new
/// room hear `roomCreated` first; only connected members join the room in
/// memory, the rest pick it up when they connect.
async fn deliver(manager: &ConnectionManager, sender: i64, sent: &SentMessage) -> AppResult<()> {
    let room_id = sent.chat.chat_room_id;
    if let Some(members) = &sent.created_room {
        for member in members {
            if !manager.is_connected(*member) {
                continue;
            }
            manager.join_room(room_id, *member);
            manager
                .send_to_user(*member, WsEnvelope::new(WsEnvelope::ROOM_CREATED, json!(room_id)))
                .await;
        }
    }

    let frame = WsEnvelope::new(
        WsEnvelope::NEW_MESSAGE,
        serde_json::to_value(&sent.chat)
            .map_err(|err| AppError::internal(format!("failed to encode chat: {err}")))?,
    );
    manager.broadcast_to_room(room_id, frame, Some(sender)).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tokio::sync::mpsc;

    use super::*;

    fn connect(manager: &ConnectionManager, user_id: i64) -> mpsc::Receiver<WsEnvelope> {
        let (tx, rx) = mpsc::channel(8);
        manager.add_connection(Arc::new(Connection::new(user_id, tx)));
        rx
    }

    fn sent(author_id: i64, room_id: i64, created_room: Option<Vec<i64>>) -> SentMessage {
        let now = Utc::now();
        SentMessage {
            chat: Chat {
                id: 1,
                author_id,
                chat_room_id: room_id,
                message: "hello".into(),
                created_at: now,
                updated_at: now,
                version: 1,
            },
            created_room,
        }
    }

    #[tokio::test]
    async fn new_room_is_announced_before_the_message() {
        let manager = ConnectionManager::new();
        let mut user = connect(&manager, 1);
        let mut admin = connect(&manager, 2);

        deliver(&manager, 1, &sent(1, 30, Some(vec![1, 2]))).await.unwrap();

        let created = user.recv().await.unwrap();
        assert_eq!(created.event, WsEnvelope::ROOM_CREATED);
        assert_eq!(created.data, json!(30));
        assert!(user.try_recv().is_err());

        assert_eq!(admin.recv().await.unwrap().event, WsEnvelope::ROOM_CREATED);
        let message = admin.recv().await.unwrap();
        assert_eq!(message.event, WsEnvelope::NEW_MESSAGE);
        assert_eq!(message.data["message"], "hello");
        assert_eq!(message.data["chatRoomId"], 30);
        assert_eq!(manager.room_members(30), vec![1, 2]);
    }

    #[tokio::test]
    async fn offline_members_are_not_tracked() {
        let manager = ConnectionManager::new();
        let _user = connect(&manager, 1);

        deliver(&manager, 1, &sent(1, 31, Some(vec![1, 2]))).await.unwrap();

        assert_eq!(manager.room_members(31), vec![1]);
    }

    #[tokio::test]
    async fn existing_room_reaches_everyone_but_the_author() {
        let manager = ConnectionManager::new();
        let mut user = connect(&manager, 1);
        let mut admin = connect(&manager, 2);
        let mut outsider = connect(&manager, 3);
        manager.join_room(40, 1);
        manager.join_room(40, 2);

        deliver(&manager, 2, &sent(2, 40, None)).await.unwrap();

        assert_eq!(user.recv().await.unwrap().event, WsEnvelope::NEW_MESSAGE);
        assert!(admin.try_recv().is_err());
        assert!(outsider.try_recv().is_err());
    }
}
