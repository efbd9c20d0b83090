//! Queue between the upload endpoint and the thumbnail worker.
//!
//! [`InProcessQueue`] hands jobs to a worker task over a tokio channel.
//! [`RedisQueue`] pushes them onto a Redis list so a separate
//! `marquee-server worker` process can consume them.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use marquee_model::ThumbnailJob;

use crate::infra::errors::AppError;

/// Redis list holding pending thumbnail jobs.
pub const THUMBNAIL_QUEUE: &str = "thumbnail-generation";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job queue is closed")]
    Closed,
    #[error("queue backend error: {0}")]
    Backend(#[from] redis::RedisError),
    #[error("job payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        tracing::error!(error = %err, "failed to enqueue job");
        AppError::internal("Failed to schedule background job")
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync + fmt::Debug {
    async fn enqueue(&self, job: ThumbnailJob) -> Result<(), QueueError>;
}

#[derive(Debug, Clone)]
pub struct InProcessQueue {
    sender: mpsc::Sender<ThumbnailJob>,
}

impl InProcessQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ThumbnailJob>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl JobQueue for InProcessQueue {
    async fn enqueue(&self, job: ThumbnailJob) -> Result<(), QueueError> {
        self.sender.send(job).await.map_err(|_| QueueError::Closed)
    }
}

#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
    queue: String,
}

impl fmt::Debug for RedisQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisQueue")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl RedisQueue {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            queue: THUMBNAIL_QUEUE.to_string(),
        }
    }

    pub async fn connect(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self::new(ConnectionManager::new(client).await?))
    }

    /// Take the oldest job, waiting up to `wait` for one to arrive.
    ///
    /// Polls with `RPOP` rather than blocking in `BRPOP` because the
    /// multiplexed connection enforces a response timeout.
    pub async fn pop(&self, wait: Duration) -> Result<Option<ThumbnailJob>, QueueError> {
        const POLL_INTERVAL: Duration = Duration::from_millis(250);

        let mut conn = self.conn.clone();
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let raw: Option<String> = conn.rpop(&self.queue, None).await?;
            if let Some(raw) = raw {
                return Ok(Some(serde_json::from_str(&raw)?));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn enqueue(&self, job: ThumbnailJob) -> Result<(), QueueError> {
        let payload = serde_json::to_string(&job)?;
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(&self.queue, payload).await?;
        debug!(video_id = %job.video_id, queue = %self.queue, "queued thumbnail job");
        Ok(())
    }
}
