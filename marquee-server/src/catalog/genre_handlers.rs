use axum::{
    Json,
    extract::State,
    http::StatusCode,
};

use marquee_model::{CreateGenre, DeletedId, Genre, UpdateGenre};

use crate::infra::{app_state::AppState, errors::AppResult, extract::{AppJson, AppPath}};

pub async fn list_genres_handler(State(state): State<AppState>) -> AppResult<Json<Vec<Genre>>> {
    Ok(Json(state.genres.find_all().await?))
}

pub async fn get_genre_handler(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<Genre>> {
    Ok(Json(state.genres.find_one(id).await?))
}

pub async fn create_genre_handler(
    State(state): State<AppState>,
    AppJson(dto): AppJson<CreateGenre>,
) -> AppResult<(StatusCode, Json<Genre>)> {
    let genre = state.genres.create(dto).await?;
    Ok((StatusCode::CREATED, Json(genre)))
}

pub async fn update_genre_handler(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(dto): AppJson<UpdateGenre>,
) -> AppResult<Json<Genre>> {
    Ok(Json(state.genres.update(id, dto).await?))
}

pub async fn delete_genre_handler(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<DeletedId>> {
    Ok(Json(state.genres.remove(id).await?))
}
