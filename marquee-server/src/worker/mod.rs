//! Background thumbnail generation.

pub mod queue;
pub mod thumbnail;

pub use queue::{InProcessQueue, JobQueue, QueueError, RedisQueue, THUMBNAIL_QUEUE};
pub use thumbnail::{ThumbnailError, ThumbnailWorker};
