use std::{future::Future, pin::Pin};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::error;

use marquee_model::{Claims, Role};

use crate::infra::{app_state::AppState, errors::AppError};

/// Attach verified JWT claims to the request when an `Authorization`
/// header is present. Requests without the header pass through untouched.
pub async fn bearer_token_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(raw) = request.headers().get(header::AUTHORIZATION) else {
        return next.run(request).await;
    };
    let Ok(raw) = raw.to_str() else {
        return AppError::unauthorized("invalid token format").into_response();
    };

    match state.auth.authenticate_bearer(raw).await {
        Ok(Some(claims)) => {
            request.extensions_mut().insert(claims);
        }
        Ok(None) => {}
        Err(err) => return err.into_response(),
    }

    next.run(request).await
}

/// Guard for every non-public route: an access token must have been
/// attached by [`bearer_token_middleware`].
pub async fn require_access_token(request: Request, next: Next) -> Response {
    match request.extensions().get::<Claims>() {
        Some(claims) if claims.is_access() => next.run(request).await,
        _ => AppError::forbidden("access denied").into_response(),
    }
}

/// Middleware that rejects users whose role is weaker than `required`.
/// Must run after [`require_access_token`].
pub fn require_role(
    required: Role,
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send>>
+ Clone
+ Send
+ Sync
+ 'static {
    move |request: Request, next: Next| Box::pin(check_role(request, next, required))
}

async fn check_role(request: Request, next: Next, required: Role) -> Response {
    let Some(claims) = request.extensions().get::<Claims>() else {
        // Guards are layered in the wrong order if this happens.
        error!(path = %request.uri().path(), "role check ran without claims");
        return AppError::internal("user not authenticated").into_response();
    };

    if !claims.role.satisfies(required) {
        return AppError::forbidden(format!("{required} role required")).into_response();
    }

    next.run(request).await
}

/// Claims of the authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Claims);

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.0.sub
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Claims>() {
            Some(claims) if claims.sub > 0 => Ok(CurrentUser(claims.clone())),
            _ => Err(AppError::unauthorized("authentication required")),
        }
    }
}

/// Claims of the caller when one is authenticated. Used by public routes
/// that personalise their output.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Claims>);

impl MaybeUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|claims| claims.sub)
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<Claims>()
                .filter(|claims| claims.sub > 0)
                .cloned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware::from_fn,
        routing::get,
    };
    use marquee_model::TokenType;
    use tower::ServiceExt;

    use super::*;

    fn claims(role: Role, token_type: TokenType) -> Claims {
        Claims {
            sub: 1,
            role,
            token_type,
            iat: 0,
            exp: i64::MAX,
        }
    }

    /// Router guarded by `require_access_token` and `require_role`, with a
    /// test layer that plays the part of the bearer middleware.
    fn guarded(required: Role, attached: Option<Claims>) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn(require_role(required)))
            .layer(from_fn(require_access_token))
            .layer(from_fn(move |mut request: Request, next: Next| {
                let attached = attached.clone();
                async move {
                    if let Some(claims) = attached {
                        request.extensions_mut().insert(claims);
                    }
                    next.run(request).await
                }
            }))
    }

    async fn status(router: Router) -> StatusCode {
        router
            .oneshot(HttpRequest::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn missing_claims_are_forbidden() {
        assert_eq!(status(guarded(Role::User, None)).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn refresh_tokens_do_not_pass_the_access_guard() {
        let router = guarded(Role::User, Some(claims(Role::Admin, TokenType::Refresh)));
        assert_eq!(status(router).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn weaker_roles_are_forbidden() {
        let router = guarded(Role::Admin, Some(claims(Role::User, TokenType::Access)));
        assert_eq!(status(router).await, StatusCode::FORBIDDEN);

        let router = guarded(Role::PaidUser, Some(claims(Role::PaidUser, TokenType::Access)));
        assert_eq!(status(router).await, StatusCode::OK);

        let router = guarded(Role::User, Some(claims(Role::Admin, TokenType::Access)));
        assert_eq!(status(router).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn role_check_without_claims_is_a_server_error() {
        let router = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn(require_role(Role::User)));
        assert_eq!(status(router).await, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
