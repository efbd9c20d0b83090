use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use marquee_model::Role;

use crate::{
    catalog::{director_handlers, genre_handlers, movie_handlers},
    chat::gateway,
    common::upload,
    infra::{
        app_state::AppState,
        errors::AppError,
        middleware::{ThrottleRule, forbidden_details, response_time, throttle},
    },
    users::{
        auth::{
            handlers as auth_handlers,
            middleware::{bearer_token_middleware, require_access_token, require_role},
        },
        user_handlers,
    },
};

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Successful `GET /movie` calls allowed per user and minute.
const MOVIE_LIST_THROTTLE: ThrottleRule = ThrottleRule::per_minute(5);

/// Assemble the HTTP surface.
///
/// Layers from the outside in: CORS, request tracing, response timing,
/// forbidden details, bearer token, access guard, role guard, throttle.
/// `/auth/register`, `/auth/login` and `/ws` read the `Authorization`
/// header themselves and skip the bearer layer.
pub fn create_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .merge(public_routes(&state))
        .merge(protected_routes())
        .merge(admin_routes(&state))
        .layer(from_fn_with_state(state.clone(), bearer_token_middleware));

    Router::new()
        .route("/auth/register", post(auth_handlers::register_handler))
        .route("/auth/login", post(auth_handlers::login_handler))
        .route("/ws", get(gateway::websocket_handler))
        .merge(authenticated)
        .nest_service("/public", ServeDir::new(&state.config.storage.public_dir))
        .fallback(|| async { AppError::not_found("route not found") })
        .layer(from_fn(forbidden_details))
        .layer(from_fn(response_time(state.config.slow_request_threshold)))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors.allowed_origins))
        .with_state(state)
}

fn public_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/movie",
            get(movie_handlers::list_movies_handler)
                .layer(from_fn(throttle(state.cache.clone(), MOVIE_LIST_THROTTLE))),
        )
        .route("/movie/recent", get(movie_handlers::recent_movies_handler))
        .route("/movie/{id}", get(movie_handlers::get_movie_handler))
        .route(
            "/auth/token/access",
            post(auth_handlers::rotate_access_token_handler),
        )
}

/// Any valid access token.
fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/token/block", post(auth_handlers::block_token_handler))
        .route("/auth/private", get(auth_handlers::private_handler))
        .route("/director", get(director_handlers::list_directors_handler))
        .route("/director/{id}", get(director_handlers::get_director_handler))
        .route("/genre", get(genre_handlers::list_genres_handler))
        .route("/genre/{id}", get(genre_handlers::get_genre_handler))
        .route("/movie/{id}/like", post(movie_handlers::like_movie_handler))
        .route(
            "/movie/{id}/dislike",
            post(movie_handlers::dislike_movie_handler),
        )
        .route_layer(from_fn(require_access_token))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    let upload_limit = state.config.storage.upload_max_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route(
            "/user",
            get(user_handlers::list_users_handler).post(user_handlers::create_user_handler),
        )
        .route(
            "/user/{id}",
            get(user_handlers::get_user_handler)
                .patch(user_handlers::update_user_handler)
                .delete(user_handlers::delete_user_handler),
        )
        .route("/director", post(director_handlers::create_director_handler))
        .route(
            "/director/{id}",
            axum::routing::patch(director_handlers::update_director_handler)
                .delete(director_handlers::delete_director_handler),
        )
        .route("/genre", post(genre_handlers::create_genre_handler))
        .route(
            "/genre/{id}",
            axum::routing::patch(genre_handlers::update_genre_handler)
                .delete(genre_handlers::delete_genre_handler),
        )
        .route("/movie", post(movie_handlers::create_movie_handler))
        .route(
            "/movie/{id}",
            axum::routing::patch(movie_handlers::update_movie_handler)
                .delete(movie_handlers::delete_movie_handler),
        )
        .route(
            "/common/video",
            post(upload::upload_video_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route_layer(from_fn(require_role(Role::Admin)))
        .route_layer(from_fn(require_access_token))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
