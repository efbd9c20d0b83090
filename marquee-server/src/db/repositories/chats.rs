use sqlx::{PgConnection, PgPool};

use marquee_model::{Chat, ChatRoom};

use crate::infra::errors::AppResult;

const ROOM_COLUMNS: &str = "r.id, r.created_at, r.updated_at, r.version";
const CHAT_COLUMNS: &str = "id, author_id, chat_room_id, message, created_at, updated_at, version";

#[derive(Debug, Clone)]
pub struct PostgresChatRepository {
    pool: PgPool,
}

impl PostgresChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn room_ids_for_user(&self, user_id: i64) -> AppResult<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT chat_room_id FROM chat_room_users WHERE user_id = $1 ORDER BY chat_room_id",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(ids)
    }

    pub async fn find_room_in(&self, conn: &mut PgConnection, room_id: i64) -> AppResult<Option<ChatRoom>> {
        let room = sqlx::query_as::<_, ChatRoom>(&format!(
            "SELECT {ROOM_COLUMNS} FROM chat_rooms r WHERE r.id = $1"
        ))
        .bind(room_id)
        .fetch_optional(conn)
        .await?;
        Ok(room)
    }

    /// The (oldest) room the user participates in.
    pub async fn find_room_for_user_in(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
    ) -> AppResult<Option<ChatRoom>> {
        let room = sqlx::query_as::<_, ChatRoom>(&format!(
            "SELECT {ROOM_COLUMNS} FROM chat_rooms r \
             JOIN chat_room_users cru ON cru.chat_room_id = r.id \
             WHERE cru.user_id = $1 ORDER BY r.id LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
        Ok(room)
    }

    pub async fn create_room_in(&self, conn: &mut PgConnection, member_ids: &[i64]) -> AppResult<ChatRoom> {
        let room = sqlx::query_as::<_, ChatRoom>(
            "INSERT INTO chat_rooms DEFAULT VALUES RETURNING id, created_at, updated_at, version",
        )
        .fetch_one(&mut *conn)
        .await?;
        sqlx::query(
            "INSERT INTO chat_room_users (chat_room_id, user_id) \
             SELECT $1, user_id FROM UNNEST($2::BIGINT[]) AS user_id \
             ON CONFLICT DO NOTHING",
        )
        .bind(room.id)
        .bind(member_ids)
        .execute(conn)
        .await?;
        Ok(room)
    }

    pub async fn insert_chat_in(
        &self,
        conn: &mut PgConnection,
        author_id: i64,
        room_id: i64,
        message: &str,
    ) -> AppResult<Chat> {
        let chat = sqlx::query_as::<_, Chat>(&format!(
            "INSERT INTO chats (author_id, chat_room_id, message) VALUES ($1, $2, $3) \
             RETURNING {CHAT_COLUMNS}"
        ))
        .bind(author_id)
        .bind(room_id)
        .bind(message)
        .fetch_one(conn)
        .await?;
        Ok(chat)
    }
}
