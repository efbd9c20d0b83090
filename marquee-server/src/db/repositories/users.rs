use sqlx::{PgConnection, PgPool};

use marquee_model::{Role, User};

use crate::infra::errors::AppResult;

const USER_COLUMNS: &str = "id, email, password, role, created_at, updated_at, version";

#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn find_all(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(self.pool())
        .await?;
        Ok(users)
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let mut conn = self.pool().acquire().await?;
        self.find_by_id_in(&mut conn, id).await
    }

    pub async fn find_by_id_in(&self, conn: &mut PgConnection, id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;
        Ok(user)
    }

    /// Lock the user's row until the surrounding transaction ends, so writes
    /// made on the user's behalf are serialised. `false` when there is no
    /// such user.
    pub async fn lock_in(&self, conn: &mut PgConnection, id: i64) -> AppResult<bool> {
        let locked: Option<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR NO KEY UPDATE")
                .bind(id)
                .fetch_optional(conn)
                .await?;
        Ok(locked.is_some())
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool())
        .await?;
        Ok(user)
    }

    /// Any admin account; chat rooms opened by regular users are shared
    /// with it.
    pub async fn find_any_admin_in(&self, conn: &mut PgConnection) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY id LIMIT 1"
        ))
        .bind(Role::Admin)
        .fetch_optional(conn)
        .await?;
        Ok(user)
    }

    pub async fn create(&self, email: &str, password_hash: &str, role: Role) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password, role) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(self.pool())
        .await?;
        Ok(user)
    }

    /// Returns `None` when no user has `id`.
    pub async fn update(
        &self,
        id: i64,
        email: Option<&str>,
        password_hash: Option<&str>,
    ) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
                email = COALESCE($2, email), \
                password = COALESCE($3, password), \
                updated_at = NOW(), \
                version = version + 1 \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .fetch_optional(self.pool())
        .await?;
        Ok(user)
    }

    pub async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
