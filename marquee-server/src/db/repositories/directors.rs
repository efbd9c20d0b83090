use sqlx::{PgConnection, PgPool};

use marquee_model::{CreateDirector, Director, UpdateDirector};

use crate::infra::errors::AppResult;

const DIRECTOR_COLUMNS: &str = "id, name, dob, nationality, created_at, updated_at, version";

#[derive(Debug, Clone)]
pub struct PostgresDirectorRepository {
    pool: PgPool,
}

impl PostgresDirectorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn find_all(&self) -> AppResult<Vec<Director>> {
        let directors = sqlx::query_as::<_, Director>(&format!(
            "SELECT {DIRECTOR_COLUMNS} FROM directors ORDER BY id"
        ))
        .fetch_all(self.pool())
        .await?;
        Ok(directors)
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<Director>> {
        let mut conn = self.pool().acquire().await?;
        self.find_by_id_in(&mut conn, id).await
    }

    pub async fn find_by_id_in(
        &self,
        conn: &mut PgConnection,
        id: i64,
    ) -> AppResult<Option<Director>> {
        let director = sqlx::query_as::<_, Director>(&format!(
            "SELECT {DIRECTOR_COLUMNS} FROM directors WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;
        Ok(director)
    }

    pub async fn create(&self, dto: &CreateDirector) -> AppResult<Director> {
        let director = sqlx::query_as::<_, Director>(&format!(
            "INSERT INTO directors (name, dob, nationality) VALUES ($1, $2, $3) \
             RETURNING {DIRECTOR_COLUMNS}"
        ))
        .bind(&dto.name)
        .bind(dto.dob)
        .bind(&dto.nationality)
        .fetch_one(self.pool())
        .await?;
        Ok(director)
    }

    pub async fn update(&self, id: i64, dto: &UpdateDirector) -> AppResult<Option<Director>> {
        let director = sqlx::query_as::<_, Director>(&format!(
            "UPDATE directors SET \
                name = COALESCE($2, name), \
                dob = COALESCE($3, dob), \
                nationality = COALESCE($4, nationality), \
                updated_at = NOW(), \
                version = version + 1 \
             WHERE id = $1 \
             RETURNING {DIRECTOR_COLUMNS}"
        ))
        .bind(id)
        .bind(dto.name.as_deref())
        .bind(dto.dob)
        .bind(dto.nationality.as_deref())
        .fetch_optional(self.pool())
        .await?;
        Ok(director)
    }

    pub async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM directors WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
