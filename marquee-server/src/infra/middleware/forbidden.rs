use axum::{
    Json,
    body::to_bytes,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use tracing::info;

/// Forbidden bodies are small JSON documents.
const MAX_FORBIDDEN_BODY: usize = 64 * 1024;

/// Rewrite every 403 response so it names the request path and the time it
/// was rejected.
pub async fn forbidden_details(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());

    let response = next.run(request).await;
    if response.status() != StatusCode::FORBIDDEN {
        return response;
    }

    info!("[Forbidden] {} {}", method, path);

    let message = match to_bytes(response.into_body(), MAX_FORBIDDEN_BODY).await {
        Ok(bytes) => forbidden_message(&bytes),
        Err(_) => None,
    }
    .unwrap_or_else(|| "access to this resource is forbidden".to_string());

    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": {
                "message": message,
                "status": StatusCode::FORBIDDEN.as_u16(),
                "path": path,
                "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            }
        })),
    )
        .into_response()
}

fn forbidden_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use axum::{Router, body::Body, http::Request as HttpRequest, middleware::from_fn, routing::get};
    use tower::ServiceExt;

    use super::*;
    use crate::infra::errors::AppError;

    #[tokio::test]
    async fn adds_path_and_timestamp_to_forbidden_responses() {
        let router = Router::new()
            .route(
                "/secret",
                get(|| async { AppError::forbidden("admin role required") }),
            )
            .layer(from_fn(forbidden_details));

        let response = router
            .oneshot(HttpRequest::get("/secret?x=1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["message"], "admin role required");
        assert_eq!(json["error"]["path"], "/secret?x=1");
        assert_eq!(json["error"]["status"], 403);
        assert!(json["error"]["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn other_responses_pass_through() {
        let router = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn(forbidden_details));
        let response = router
            .oneshot(HttpRequest::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }
}
