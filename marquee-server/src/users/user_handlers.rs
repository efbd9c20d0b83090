use axum::{
    Json,
    extract::State,
    http::StatusCode,
};

use marquee_model::{CreateUser, DeletedId, UpdateUser, User};

use crate::infra::{app_state::AppState, errors::AppResult, extract::{AppJson, AppPath}};

pub async fn create_user_handler(
    State(state): State<AppState>,
    AppJson(dto): AppJson<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.users.create(dto).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users_handler(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.users.find_all().await?))
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.find_one(id).await?))
}

pub async fn update_user_handler(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(dto): AppJson<UpdateUser>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.update(id, dto).await?))
}

pub async fn delete_user_handler(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<DeletedId>> {
    Ok(Json(state.users.remove(id).await?))
}
