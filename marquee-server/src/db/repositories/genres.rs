use sqlx::{PgConnection, PgPool};

use marquee_model::Genre;

use crate::infra::errors::AppResult;

const GENRE_COLUMNS: &str = "id, name, created_at, updated_at, version";

#[derive(Debug, Clone)]
pub struct PostgresGenreRepository {
    pool: PgPool,
}

impl PostgresGenreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn find_all(&self) -> AppResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>(&format!(
            "SELECT {GENRE_COLUMNS} FROM genres ORDER BY id"
        ))
        .fetch_all(self.pool())
        .await?;
        Ok(genres)
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<Genre>> {
        let genre = sqlx::query_as::<_, Genre>(&format!(
            "SELECT {GENRE_COLUMNS} FROM genres WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(genre)
    }

    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<Genre>> {
        let genre = sqlx::query_as::<_, Genre>(&format!(
            "SELECT {GENRE_COLUMNS} FROM genres WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(self.pool())
        .await?;
        Ok(genre)
    }

    pub async fn find_by_ids_in(&self, conn: &mut PgConnection, ids: &[i64]) -> AppResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>(&format!(
            "SELECT {GENRE_COLUMNS} FROM genres WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(ids)
        .fetch_all(conn)
        .await?;
        Ok(genres)
    }

    pub async fn create(&self, name: &str) -> AppResult<Genre> {
        let genre = sqlx::query_as::<_, Genre>(&format!(
            "INSERT INTO genres (name) VALUES ($1) RETURNING {GENRE_COLUMNS}"
        ))
        .bind(name)
        .fetch_one(self.pool())
        .await?;
        Ok(genre)
    }

    pub async fn update(&self, id: i64, name: Option<&str>) -> AppResult<Option<Genre>> {
        let genre = sqlx::query_as::<_, Genre>(&format!(
            "UPDATE genres SET \
                name = COALESCE($2, name), \
                updated_at = NOW(), \
                version = version + 1 \
             WHERE id = $1 \
             RETURNING {GENRE_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .fetch_optional(self.pool())
        .await?;
        Ok(genre)
    }

    pub async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM genres WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
