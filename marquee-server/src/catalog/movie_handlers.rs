use axum::{
    Json,
    extract::State,
    http::StatusCode,
};

use marquee_model::{
    CreateMovie, CursorPage, DeletedId, GetMoviesQuery, LikeResult, Movie, UpdateMovie,
};

use crate::{
    infra::{app_state::AppState, errors::AppResult, extract::{AppJson, AppPath, AppQuery}},
    users::auth::{CurrentUser, MaybeUser},
};

/// List movies with cursor pagination
///
/// # Query
///
/// - `title`: substring filter, at least 3 characters
/// - `order`: comma separated `column_ASC|DESC` terms, default `id_DESC`
/// - `take`: page size, default 5
/// - `cursor`: `nextCursor` of the previous page; overrides `order`
///
/// Signed-in callers get `likeStatus` on every movie.
pub async fn list_movies_handler(
    State(state): State<AppState>,
    user: MaybeUser,
    AppQuery(query): AppQuery<GetMoviesQuery>,
) -> AppResult<Json<CursorPage<Movie>>> {
    Ok(Json(state.movies.find_many(query, user.id()).await?))
}

pub async fn recent_movies_handler(State(state): State<AppState>) -> AppResult<Json<Vec<Movie>>> {
    Ok(Json(state.movies.find_recent().await?))
}

pub async fn get_movie_handler(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<Movie>> {
    Ok(Json(state.movies.find_by_id(id).await?))
}

/// Create a movie from a previously uploaded video
///
/// `movieFileName` is the `fileName` returned by `POST /common/video`; the
/// file is moved out of the temp folder as part of the transaction.
pub async fn create_movie_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(dto): AppJson<CreateMovie>,
) -> AppResult<(StatusCode, Json<Movie>)> {
    let movie = state.movies.create(dto, user.id()).await?;
    Ok((StatusCode::CREATED, Json(movie)))
}

pub async fn update_movie_handler(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(dto): AppJson<UpdateMovie>,
) -> AppResult<Json<Movie>> {
    Ok(Json(state.movies.update(id, dto).await?))
}

pub async fn delete_movie_handler(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<DeletedId>> {
    Ok(Json(state.movies.remove(id).await?))
}

pub async fn like_movie_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<LikeResult>> {
    Ok(Json(state.movies.toggle_like(id, user.id(), true).await?))
}

pub async fn dislike_movie_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<LikeResult>> {
    Ok(Json(state.movies.toggle_like(id, user.id(), false).await?))
}
