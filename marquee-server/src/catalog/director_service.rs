use tracing::info;

use marquee_model::{CreateDirector, DeletedId, Director, UpdateDirector};

use crate::{
    db::repositories::PostgresDirectorRepository,
    infra::errors::{AppError, AppResult},
};

#[derive(Debug, Clone)]
pub struct DirectorService {
    directors: PostgresDirectorRepository,
}

impl DirectorService {
    pub fn new(directors: PostgresDirectorRepository) -> Self {
        Self { directors }
    }

    pub async fn find_many(&self) -> AppResult<Vec<Director>> {
        self.directors.find_all().await
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Director> {
        self.directors
            .find_by_id(id)
            .await?
            .ok_or_else(|| director_not_found(id))
    }

    pub async fn create(&self, dto: CreateDirector) -> AppResult<Director> {
        dto.validate()?;
        let director = self.directors.create(&dto).await?;
        info!(director_id = director.id, "created director");
        Ok(director)
    }

    pub async fn update(&self, id: i64, dto: UpdateDirector) -> AppResult<Director> {
        dto.validate()?;
        self.directors
            .update(id, &dto)
            .await?
            .ok_or_else(|| director_not_found(id))
    }

    pub async fn remove(&self, id: i64) -> AppResult<DeletedId> {
        if !self.directors.delete(id).await? {
            return Err(director_not_found(id));
        }
        Ok(DeletedId { id })
    }
}

pub(crate) fn director_not_found(id: i64) -> AppError {
    AppError::not_found(format!("director {id} does not exist"))
}
