//! Movie catalog operations. Writes that touch several tables run inside a
//! [`TxScope`].

use std::{collections::BTreeSet, io, sync::Arc, time::Duration};

use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};

use marquee_model::{
    CreateMovie, CursorPage, DeletedId, GetMoviesQuery, Genre, LikeResult, Movie, UpdateMovie,
};

use super::director_service::director_not_found;
use crate::{
    db::{
        TxScope,
        repositories::{
            MovieListFilter, PostgresDirectorRepository, PostgresGenreRepository,
            PostgresMovieRepository, PostgresUserRepository, movies::MOVIE_SORT_COLUMNS,
        },
    },
    infra::{
        cache::{CacheExt, CacheKeys, CacheStore},
        config::StorageConfig,
        errors::{AppError, AppResult},
    },
    pagination::CursorPlan,
};

/// Number of movies served by `GET /movie/recent`.
const RECENT_MOVIES: i64 = 10;

#[derive(Clone)]
pub struct MovieService {
    pool: PgPool,
    movies: PostgresMovieRepository,
    directors: PostgresDirectorRepository,
    genres: PostgresGenreRepository,
    users: PostgresUserRepository,
    cache: Arc<dyn CacheStore>,
    cache_ttl: Duration,
    storage: StorageConfig,
}

impl std::fmt::Debug for MovieService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieService")
            .field("cache_ttl", &self.cache_ttl)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl MovieService {
    pub fn new(
        pool: PgPool,
        cache: Arc<dyn CacheStore>,
        cache_ttl: Duration,
        storage: StorageConfig,
    ) -> Self {
        Self {
            movies: PostgresMovieRepository::new(pool.clone()),
            directors: PostgresDirectorRepository::new(pool.clone()),
            genres: PostgresGenreRepository::new(pool.clone()),
            users: PostgresUserRepository::new(pool.clone()),
            pool,
            cache,
            cache_ttl,
            storage,
        }
    }

    /// One cursor page of movies. When `user_id` is given every movie
    /// carries that user's like status.
    pub async fn find_many(
        &self,
        query: GetMoviesQuery,
        user_id: Option<i64>,
    ) -> AppResult<CursorPage<Movie>> {
        query.validate()?;
        let plan = CursorPlan::build(&query.pagination(), MOVIE_SORT_COLUMNS)?;
        let filter = MovieListFilter {
            title: query.title,
        };

        let (mut movies, count) = self.movies.list(&filter, &plan).await?;
        let next_cursor = plan.next_cursor(&movies)?;

        if let Some(user_id) = user_id {
            let ids: Vec<i64> = movies.iter().map(|movie| movie.id).collect();
            let statuses = self.movies.like_statuses(user_id, &ids).await?;
            for movie in &mut movies {
                movie.like_status = Some(statuses.get(&movie.id).copied());
            }
        }

        Ok(CursorPage {
            data: movies,
            next_cursor,
            count,
        })
    }

    pub async fn find_recent(&self) -> AppResult<Vec<Movie>> {
        if let Some(cached) = self
            .cache
            .get_json::<Vec<Movie>>(CacheKeys::MOVIE_RECENT)
            .await?
        {
            return Ok(cached);
        }

        let movies = self.movies.recent(RECENT_MOVIES).await?;
        self.cache
            .set_json(CacheKeys::MOVIE_RECENT, &movies, self.cache_ttl)
            .await?;
        Ok(movies)
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Movie> {
        self.movies
            .find_by_id(id)
            .await?
            .ok_or_else(|| movie_not_found(id))
    }

    pub async fn create(&self, dto: CreateMovie, creator_id: i64) -> AppResult<Movie> {
        dto.validate()?;

        let mut tx = TxScope::begin(&self.pool, "movie.create").await?;
        let result = self.create_in(tx.conn(), &dto, creator_id).await;
        let movie = tx.finish(result).await?;

        info!(movie_id = movie.id, title = %movie.title, "created movie");
        Ok(movie)
    }

    async fn create_in(
        &self,
        conn: &mut PgConnection,
        dto: &CreateMovie,
        creator_id: i64,
    ) -> AppResult<Movie> {
        let director = self
            .directors
            .find_by_id_in(conn, dto.director_id)
            .await?
            .ok_or_else(|| director_not_found(dto.director_id))?;
        let genres = self.load_genres(conn, &dto.genre_ids).await?;

        let detail_id = self.movies.insert_detail_in(conn, &dto.detail).await?;
        let movie_id = self
            .movies
            .insert_movie_in(
                conn,
                &dto.title,
                detail_id,
                director.id,
                creator_id,
                &StorageConfig::movie_file_path(&dto.movie_file_name),
            )
            .await?;

        let genre_ids: Vec<i64> = genres.iter().map(|genre| genre.id).collect();
        self.movies.set_genres_in(conn, movie_id, &genre_ids).await?;

        let movie = self
            .movies
            .find_by_id_in(conn, movie_id)
            .await?
            .ok_or_else(|| AppError::internal("created movie could not be read back"))?;

        self.move_upload(&dto.movie_file_name).await?;
        Ok(movie)
    }

    pub async fn update(&self, id: i64, dto: UpdateMovie) -> AppResult<Movie> {
        dto.validate()?;

        let mut tx = TxScope::begin(&self.pool, "movie.update").await?;
        let result = self.update_in(tx.conn(), id, &dto).await;
        tx.finish(result).await
    }

    async fn update_in(
        &self,
        conn: &mut PgConnection,
        id: i64,
        dto: &UpdateMovie,
    ) -> AppResult<Movie> {
        let detail_id = self
            .movies
            .detail_id_in(conn, id)
            .await?
            .ok_or_else(|| movie_not_found(id))?;

        if let Some(director_id) = dto.director_id {
            self.directors
                .find_by_id_in(conn, director_id)
                .await?
                .ok_or_else(|| director_not_found(director_id))?;
        }

        let genre_ids = dto.genre_ids.as_deref().unwrap_or_default();
        let genres = if genre_ids.is_empty() {
            None
        } else {
            Some(self.load_genres(conn, genre_ids).await?)
        };

        self.movies
            .update_movie_in(conn, id, dto.title.as_deref(), dto.director_id)
            .await?;

        if let Some(detail) = dto.detail.as_deref() {
            self.movies.update_detail_in(conn, detail_id, detail).await?;
        }

        if let Some(genres) = genres {
            let ids: Vec<i64> = genres.iter().map(|genre| genre.id).collect();
            self.movies.set_genres_in(conn, id, &ids).await?;
        }

        self.movies
            .find_by_id_in(conn, id)
            .await?
            .ok_or_else(|| movie_not_found(id))
    }

    pub async fn remove(&self, id: i64) -> AppResult<DeletedId> {
        let mut tx = TxScope::begin(&self.pool, "movie.remove").await?;
        let result = match self.movies.delete_in(tx.conn(), id).await {
            Ok(true) => Ok(DeletedId { id }),
            Ok(false) => Err(movie_not_found(id)),
            Err(err) => Err(err),
        };
        let deleted = tx.finish(result).await?;
        info!(movie_id = id, "deleted movie");
        Ok(deleted)
    }

    /// Like or dislike a movie. Repeating the same reaction withdraws it;
    /// the opposite reaction replaces it.
    /// Set, flip or clear the user's reaction to a movie. Toggles by the
    /// same user are serialised on the user's row.
    pub async fn toggle_like(
        &self,
        movie_id: i64,
        user_id: i64,
        is_like: bool,
    ) -> AppResult<LikeResult> {
        let mut tx = TxScope::begin(&self.pool, "movie.toggle_like").await?;
        let result = self.toggle_like_in(tx.conn(), movie_id, user_id, is_like).await;
        let is_like = tx.finish(result).await?;

        debug!(movie_id, user_id, ?is_like, "like status changed");
        Ok(LikeResult { is_like })
    }

    async fn toggle_like_in(
        &self,
        conn: &mut PgConnection,
        movie_id: i64,
        user_id: i64,
        is_like: bool,
    ) -> AppResult<Option<bool>> {
        if !self.movies.exists_in(conn, movie_id).await? {
            return Err(movie_not_found(movie_id));
        }
        if !self.users.lock_in(conn, user_id).await? {
            return Err(AppError::unauthorized("user does not exist"));
        }

        match self.movies.find_like_in(conn, movie_id, user_id).await? {
            None => {
                self.movies
                    .insert_like_in(conn, movie_id, user_id, is_like)
                    .await?
            }
            Some(current) if current == is_like => {
                self.movies.delete_like_in(conn, movie_id, user_id).await?
            }
            Some(_) => {
                self.movies
                    .update_like_in(conn, movie_id, user_id, is_like)
                    .await?
            }
        }

        self.movies.find_like_in(conn, movie_id, user_id).await
    }

    /// Every requested genre must exist. The error lists the ids that do.
    async fn load_genres(&self, conn: &mut PgConnection, ids: &[i64]) -> AppResult<Vec<Genre>> {
        let requested: BTreeSet<i64> = ids.iter().copied().collect();
        let requested: Vec<i64> = requested.into_iter().collect();
        let genres = self.genres.find_by_ids_in(conn, &requested).await?;

        if genres.len() != requested.len() {
            let existing: Vec<String> = genres.iter().map(|genre| genre.id.to_string()).collect();
            return Err(AppError::not_found(format!(
                "some genres do not exist; existing ids: [{}]",
                existing.join(",")
            )));
        }
        Ok(genres)
    }

    /// Move an upload from the temp folder into the movie folder.
    async fn move_upload(&self, file_name: &str) -> AppResult<()> {
        let from = self.storage.temp_dir().join(file_name);
        let to = self.storage.movie_dir().join(file_name);

        match tokio::fs::rename(&from, &to).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(AppError::not_found(
                format!("uploaded file {file_name} does not exist"),
            )),
            Err(err) => Err(err.into()),
        }
    }
}

fn movie_not_found(id: i64) -> AppError {
    AppError::not_found(format!("movie {id} does not exist"))
}
