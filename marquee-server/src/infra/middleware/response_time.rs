use std::{
    future::Future,
    pin::Pin,
    time::{Duration, Instant},
};

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{info, warn};

/// Log `METHOD path Nms` for every request, as a warning once it took longer
/// than `threshold`.
pub fn response_time(
    threshold: Duration,
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send>>
+ Clone
+ Send
+ Sync
+ 'static {
    move |request: Request, next: Next| {
        Box::pin(async move {
            let method = request.method().clone();
            let path = request.uri().path().to_owned();
            let started = Instant::now();

            let response = next.run(request).await;

            let elapsed = started.elapsed();
            if elapsed > threshold {
                warn!("TIMEOUT {} {} {}ms", method, path, elapsed.as_millis());
            } else {
                info!("{} {} {}ms", method, path, elapsed.as_millis());
            }
            response
        })
    }
}
