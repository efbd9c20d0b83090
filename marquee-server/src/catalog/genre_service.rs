use tracing::info;

use marquee_model::{CreateGenre, DeletedId, Genre, UpdateGenre};

use crate::{
    db::repositories::PostgresGenreRepository,
    infra::errors::{AppError, AppResult},
};

#[derive(Debug, Clone)]
pub struct GenreService {
    genres: PostgresGenreRepository,
}

impl GenreService {
    pub fn new(genres: PostgresGenreRepository) -> Self {
        Self { genres }
    }

    pub async fn create(&self, dto: CreateGenre) -> AppResult<Genre> {
        dto.validate()?;
        if self.genres.find_by_name(&dto.name).await?.is_some() {
            return Err(AppError::conflict("genre already exists"));
        }
        let genre = self.genres.create(&dto.name).await?;
        info!(genre_id = genre.id, name = %genre.name, "created genre");
        Ok(genre)
    }

    pub async fn find_all(&self) -> AppResult<Vec<Genre>> {
        self.genres.find_all().await
    }

    pub async fn find_one(&self, id: i64) -> AppResult<Genre> {
        self.genres
            .find_by_id(id)
            .await?
            .ok_or_else(|| genre_not_found(id))
    }

    pub async fn update(&self, id: i64, dto: UpdateGenre) -> AppResult<Genre> {
        dto.validate()?;
        self.genres
            .update(id, dto.name.as_deref())
            .await?
            .ok_or_else(|| genre_not_found(id))
    }

    pub async fn remove(&self, id: i64) -> AppResult<DeletedId> {
        if !self.genres.delete(id).await? {
            return Err(genre_not_found(id));
        }
        Ok(DeletedId { id })
    }
}

fn genre_not_found(id: i64) -> AppError {
    AppError::not_found(format!("genre {id} does not exist"))
}
