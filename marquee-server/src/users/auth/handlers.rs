use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
};

use marquee_model::{AccessTokenResponse, BlockTokenRequest, Claims, TokenPair, User};

use super::middleware::{CurrentUser, MaybeUser};
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
    extract::AppJson,
};

fn authorization(headers: &HeaderMap) -> &str {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// Register a new account from `Authorization: Basic base64(email:password)`.
///
/// # Response
///
/// - `201 Created` with the new user
/// - `400 Bad Request` for a malformed Basic header
/// - `409 Conflict` when the email is taken
pub async fn register_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.auth.register(authorization(&headers)).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchange Basic credentials for a refresh and an access token.
pub async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<TokenPair>> {
    Ok(Json(state.auth.login(authorization(&headers)).await?))
}

pub async fn block_token_handler(
    State(state): State<AppState>,
    AppJson(request): AppJson<BlockTokenRequest>,
) -> AppResult<Json<bool>> {
    Ok(Json(state.auth.token_block(&request.token).await?))
}

/// Issue a fresh access token for the refresh token in the `Bearer`
/// header.
pub async fn rotate_access_token_handler(
    State(state): State<AppState>,
    MaybeUser(claims): MaybeUser,
) -> AppResult<Json<AccessTokenResponse>> {
    let claims = claims.ok_or_else(|| AppError::unauthorized("a refresh token is required"))?;
    Ok(Json(state.auth.rotate_access_token(&claims)?))
}

pub async fn private_handler(CurrentUser(claims): CurrentUser) -> Json<Claims> {
    Json(claims)
}
