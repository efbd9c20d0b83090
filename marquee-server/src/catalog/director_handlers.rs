use axum::{
    Json,
    extract::State,
    http::StatusCode,
};

use marquee_model::{CreateDirector, DeletedId, Director, UpdateDirector};

use crate::infra::{app_state::AppState, errors::AppResult, extract::{AppJson, AppPath}};

pub async fn list_directors_handler(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Director>>> {
    Ok(Json(state.directors.find_many().await?))
}

pub async fn get_director_handler(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<Director>> {
    Ok(Json(state.directors.find_by_id(id).await?))
}

pub async fn create_director_handler(
    State(state): State<AppState>,
    AppJson(dto): AppJson<CreateDirector>,
) -> AppResult<(StatusCode, Json<Director>)> {
    let director = state.directors.create(dto).await?;
    Ok((StatusCode::CREATED, Json(director)))
}

pub async fn update_director_handler(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(dto): AppJson<UpdateDirector>,
) -> AppResult<Json<Director>> {
    Ok(Json(state.directors.update(id, dto).await?))
}

pub async fn delete_director_handler(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<DeletedId>> {
    Ok(Json(state.directors.remove(id).await?))
}
