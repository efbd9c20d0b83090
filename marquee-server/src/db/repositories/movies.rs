use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use marquee_model::{Director, Genre, Movie, MovieDetail, User};

use crate::{
    infra::errors::{AppError, AppResult},
    pagination::{ColumnKind, CursorPlan, SortColumn},
};

/// Columns `GET /movie` may be ordered by.
pub const MOVIE_SORT_COLUMNS: &[SortColumn] = &[
    SortColumn::new("id", "m.id", ColumnKind::Int),
    SortColumn::new("likeCount", "m.like_count", ColumnKind::Int),
    SortColumn::new("dislikeCount", "m.dislike_count", ColumnKind::Int),
    SortColumn::new("title", "m.title", ColumnKind::Text),
    SortColumn::new("createdAt", "m.created_at", ColumnKind::Timestamp),
];

const MOVIE_SELECT: &str = "SELECT m.id, m.title, m.detail_id, md.detail, m.director_id, \
     m.creator_id, m.like_count, m.dislike_count, m.movie_file_path, \
     m.created_at, m.updated_at, m.version \
     FROM movies m JOIN movie_details md ON md.id = m.detail_id";

#[derive(Debug, Clone, sqlx::FromRow)]
struct MovieRow {
    id: i64,
    title: String,
    detail_id: i64,
    detail: String,
    director_id: i64,
    creator_id: Option<i64>,
    like_count: i32,
    dislike_count: i32,
    movie_file_path: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct MovieGenreRow {
    movie_id: i64,
    id: i64,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i32,
}

#[derive(Debug, Clone, Default)]
pub struct MovieListFilter {
    /// Substring match on the title.
    pub title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PostgresMovieRepository {
    pool: PgPool,
}

impl PostgresMovieRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// One page of movies plus the number of rows matching the filter and
    /// cursor (ignoring the page size).
    pub async fn list(
        &self,
        filter: &MovieListFilter,
        plan: &CursorPlan,
    ) -> AppResult<(Vec<Movie>, i64)> {
        let mut conn = self.pool().acquire().await?;

        let mut qb = QueryBuilder::<Postgres>::new(MOVIE_SELECT);
        push_list_filters(&mut qb, filter, plan)?;
        plan.push_order_and_limit(&mut qb);
        let rows: Vec<MovieRow> = qb.build_query_as().fetch_all(&mut *conn).await?;

        let mut count_qb = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM movies m JOIN movie_details md ON md.id = m.detail_id",
        );
        push_list_filters(&mut count_qb, filter, plan)?;
        let count: i64 = count_qb.build_query_scalar().fetch_one(&mut *conn).await?;

        let movies = self.hydrate(&mut conn, rows, false).await?;
        Ok((movies, count))
    }

    pub async fn recent(&self, limit: i64) -> AppResult<Vec<Movie>> {
        let mut conn = self.pool().acquire().await?;
        let rows: Vec<MovieRow> = sqlx::query_as(&format!(
            "{MOVIE_SELECT} ORDER BY m.created_at DESC, m.id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;
        self.hydrate(&mut conn, rows, false).await
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<Movie>> {
        let mut conn = self.pool().acquire().await?;
        self.find_by_id_in(&mut conn, id).await
    }

    /// Movie with detail, director, genres and creator.
    pub async fn find_by_id_in(&self, conn: &mut PgConnection, id: i64) -> AppResult<Option<Movie>> {
        let row: Option<MovieRow> = sqlx::query_as(&format!("{MOVIE_SELECT} WHERE m.id = $1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut movies = self.hydrate(conn, vec![row], true).await?;
        Ok(movies.pop())
    }

    pub async fn exists_in(&self, conn: &mut PgConnection, id: i64) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM movies WHERE id = $1)")
            .bind(id)
            .fetch_one(conn)
            .await?;
        Ok(exists)
    }

    pub async fn detail_id_in(&self, conn: &mut PgConnection, id: i64) -> AppResult<Option<i64>> {
        let detail_id: Option<i64> = sqlx::query_scalar("SELECT detail_id FROM movies WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(detail_id)
    }

    pub async fn insert_detail_in(&self, conn: &mut PgConnection, detail: &str) -> AppResult<i64> {
        let id: i64 = sqlx::query_scalar("INSERT INTO movie_details (detail) VALUES ($1) RETURNING id")
            .bind(detail)
            .fetch_one(conn)
            .await?;
        Ok(id)
    }

    pub async fn insert_movie_in(
        &self,
        conn: &mut PgConnection,
        title: &str,
        detail_id: i64,
        director_id: i64,
        creator_id: i64,
        movie_file_path: &str,
    ) -> AppResult<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO movies (title, detail_id, director_id, creator_id, movie_file_path) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(title)
        .bind(detail_id)
        .bind(director_id)
        .bind(creator_id)
        .bind(movie_file_path)
        .fetch_one(conn)
        .await?;
        Ok(id)
    }

    pub async fn update_movie_in(
        &self,
        conn: &mut PgConnection,
        id: i64,
        title: Option<&str>,
        director_id: Option<i64>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE movies SET \
                title = COALESCE($2, title), \
                director_id = COALESCE($3, director_id), \
                updated_at = NOW(), \
                version = version + 1 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(title)
        .bind(director_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn update_detail_in(
        &self,
        conn: &mut PgConnection,
        detail_id: i64,
        detail: &str,
    ) -> AppResult<()> {
        sqlx::query("UPDATE movie_details SET detail = $2 WHERE id = $1")
            .bind(detail_id)
            .bind(detail)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Replace the genre set of a movie.
    pub async fn set_genres_in(
        &self,
        conn: &mut PgConnection,
        movie_id: i64,
        genre_ids: &[i64],
    ) -> AppResult<()> {
        sqlx::query("DELETE FROM movie_genres WHERE movie_id = $1")
            .bind(movie_id)
            .execute(&mut *conn)
            .await?;
        sqlx::query(
            "INSERT INTO movie_genres (movie_id, genre_id) \
             SELECT $1, genre_id FROM UNNEST($2::BIGINT[]) AS genre_id \
             ON CONFLICT DO NOTHING",
        )
        .bind(movie_id)
        .bind(genre_ids)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Delete the movie and then its detail row.
    pub async fn delete_in(&self, conn: &mut PgConnection, id: i64) -> AppResult<bool> {
        let detail_id: Option<i64> =
            sqlx::query_scalar("DELETE FROM movies WHERE id = $1 RETURNING detail_id")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        let Some(detail_id) = detail_id else {
            return Ok(false);
        };
        sqlx::query("DELETE FROM movie_details WHERE id = $1")
            .bind(detail_id)
            .execute(conn)
            .await?;
        Ok(true)
    }

    /// `movie_id -> is_like` for the given user.
    pub async fn like_statuses(
        &self,
        user_id: i64,
        movie_ids: &[i64],
    ) -> AppResult<HashMap<i64, bool>> {
        let rows: Vec<(i64, bool)> = sqlx::query_as(
            "SELECT movie_id, is_like FROM movie_user_likes \
             WHERE user_id = $1 AND movie_id = ANY($2)",
        )
        .bind(user_id)
        .bind(movie_ids)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn find_like_in(
        &self,
        conn: &mut PgConnection,
        movie_id: i64,
        user_id: i64,
    ) -> AppResult<Option<bool>> {
        let is_like: Option<bool> = sqlx::query_scalar(
            "SELECT is_like FROM movie_user_likes WHERE movie_id = $1 AND user_id = $2",
        )
        .bind(movie_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
        Ok(is_like)
    }

    pub async fn insert_like_in(
        &self,
        conn: &mut PgConnection,
        movie_id: i64,
        user_id: i64,
        is_like: bool,
    ) -> AppResult<()> {
        sqlx::query("INSERT INTO movie_user_likes (movie_id, user_id, is_like) VALUES ($1, $2, $3)")
            .bind(movie_id)
            .bind(user_id)
            .bind(is_like)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn update_like_in(
        &self,
        conn: &mut PgConnection,
        movie_id: i64,
        user_id: i64,
        is_like: bool,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE movie_user_likes SET is_like = $3 WHERE movie_id = $1 AND user_id = $2",
        )
        .bind(movie_id)
        .bind(user_id)
        .bind(is_like)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn delete_like_in(
        &self,
        conn: &mut PgConnection,
        movie_id: i64,
        user_id: i64,
    ) -> AppResult<()> {
        sqlx::query("DELETE FROM movie_user_likes WHERE movie_id = $1 AND user_id = $2")
            .bind(movie_id)
            .bind(user_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Recompute the denormalised like/dislike counters from
    /// `movie_user_likes`. Returns the number of movies touched.
    pub async fn recount_likes(&self) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE movies m SET \
                like_count = COALESCE(c.likes, 0), \
                dislike_count = COALESCE(c.dislikes, 0) \
             FROM movies m2 \
             LEFT JOIN ( \
                SELECT movie_id, \
                       COUNT(*) FILTER (WHERE is_like) AS likes, \
                       COUNT(*) FILTER (WHERE NOT is_like) AS dislikes \
                FROM movie_user_likes GROUP BY movie_id \
             ) c ON c.movie_id = m2.id \
             WHERE m.id = m2.id \
               AND (m.like_count <> COALESCE(c.likes, 0) \
                    OR m.dislike_count <> COALESCE(c.dislikes, 0))",
        )
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn hydrate(
        &self,
        conn: &mut PgConnection,
        rows: Vec<MovieRow>,
        with_creator: bool,
    ) -> AppResult<Vec<Movie>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let movie_ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut director_ids: Vec<i64> = rows.iter().map(|row| row.director_id).collect();
        director_ids.sort_unstable();
        director_ids.dedup();

        let directors: HashMap<i64, Director> = sqlx::query_as::<_, Director>(
            "SELECT id, name, dob, nationality, created_at, updated_at, version \
             FROM directors WHERE id = ANY($1)",
        )
        .bind(&director_ids)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|director| (director.id, director))
        .collect();

        let genre_rows: Vec<MovieGenreRow> = sqlx::query_as(
            "SELECT mg.movie_id, g.id, g.name, g.created_at, g.updated_at, g.version \
             FROM movie_genres mg JOIN genres g ON g.id = mg.genre_id \
             WHERE mg.movie_id = ANY($1) ORDER BY g.id",
        )
        .bind(&movie_ids)
        .fetch_all(&mut *conn)
        .await?;
        let mut genres: HashMap<i64, Vec<Genre>> = HashMap::new();
        for row in genre_rows {
            genres.entry(row.movie_id).or_default().push(Genre {
                id: row.id,
                name: row.name,
                created_at: row.created_at,
                updated_at: row.updated_at,
                version: row.version,
            });
        }

        let mut creators: HashMap<i64, User> = HashMap::new();
        if with_creator {
            let creator_ids: Vec<i64> = rows.iter().filter_map(|row| row.creator_id).collect();
            if !creator_ids.is_empty() {
                creators = sqlx::query_as::<_, User>(
                    "SELECT id, email, password, role, created_at, updated_at, version \
                     FROM users WHERE id = ANY($1)",
                )
                .bind(&creator_ids)
                .fetch_all(&mut *conn)
                .await?
                .into_iter()
                .map(|user| (user.id, user))
                .collect();
            }
        }

        rows.into_iter()
            .map(|row| {
                let director = directors.get(&row.director_id).cloned().ok_or_else(|| {
                    AppError::internal(format!("director {} missing for movie {}", row.director_id, row.id))
                })?;
                Ok(Movie {
                    id: row.id,
                    title: row.title,
                    detail: MovieDetail {
                        id: row.detail_id,
                        detail: row.detail,
                    },
                    director,
                    genres: genres.remove(&row.id).unwrap_or_default(),
                    creator: row.creator_id.and_then(|id| creators.get(&id).cloned()),
                    like_count: row.like_count,
                    dislike_count: row.dislike_count,
                    movie_file_path: row.movie_file_path,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                    version: row.version,
                    like_status: None,
                })
            })
            .collect()
    }
}

fn push_list_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    filter: &MovieListFilter,
    plan: &CursorPlan,
) -> AppResult<()> {
    qb.push(" WHERE TRUE");
    if let Some(title) = &filter.title {
        qb.push(" AND m.title LIKE ");
        qb.push_bind(format!("%{}%", escape_like(title)));
    }
    if plan.has_cursor() {
        qb.push(" AND ");
        plan.push_cursor_filter(qb)?;
    }
    Ok(())
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
