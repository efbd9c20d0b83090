//! Per-user request throttling for selected routes.

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Timelike, Utc};
use tracing::{debug, warn};

use marquee_model::Claims;

use crate::infra::{cache::CacheStore, errors::AppError};

/// Counters live for one window after their last increment.
const WINDOW: Duration = Duration::from_secs(60);

/// Maximum number of successful requests per user and minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleRule {
    pub count: i64,
}

impl ThrottleRule {
    pub const fn per_minute(count: i64) -> Self {
        Self { count }
    }
}

/// `{METHOD}_{path}_{userId}_{minute}`, `minute` being the minute of the
/// hour.
pub fn throttle_key(method: &str, path: &str, user_id: i64, minute: u32) -> String {
    format!("{method}_{path}_{user_id}_{minute}")
}

/// Reject authenticated callers that already reached `rule.count` successful
/// requests this minute. Anonymous requests are not throttled.
pub fn throttle(
    cache: Arc<dyn CacheStore>,
    rule: ThrottleRule,
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send>>
+ Clone
+ Send
+ Sync
+ 'static {
    move |request: Request, next: Next| Box::pin(check_throttle(cache.clone(), rule, request, next))
}

async fn check_throttle(
    cache: Arc<dyn CacheStore>,
    rule: ThrottleRule,
    request: Request,
    next: Next,
) -> Response {
    let Some(user_id) = request.extensions().get::<Claims>().map(|claims| claims.sub) else {
        return next.run(request).await;
    };

    let key = throttle_key(
        request.method().as_str(),
        request.uri().path(),
        user_id,
        Utc::now().minute(),
    );

    // Counter storage failures let the request through.
    let current = match cache.get(&key).await {
        Ok(value) => value.and_then(|raw| raw.parse::<i64>().ok()).unwrap_or(0),
        Err(err) => {
            warn!(error = %err, "throttle counter unavailable");
            0
        }
    };
    debug!(key = %key, current, limit = rule.count, "throttle check");

    if current >= rule.count {
        return AppError::forbidden("request limit exceeded").into_response();
    }

    let response = next.run(request).await;
    if response.status().is_success()
        && let Err(err) = cache.incr(&key, WINDOW).await
    {
        warn!(error = %err, "failed to increment throttle counter");
    }
    response
}
