//! Process wiring: database, cache, job queue, background tasks.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    common::TaskScheduler,
    db,
    db::repositories::PostgresMovieRepository,
    infra::{
        app_state::AppState,
        cache::{CacheStore, MemoryCache, RedisCache},
        config::Config,
    },
    worker::{InProcessQueue, JobQueue, RedisQueue, ThumbnailWorker},
};

/// Jobs buffered by the in-process thumbnail queue.
const IN_PROCESS_QUEUE_CAPACITY: usize = 64;

/// Application state plus the background tasks started for it.
#[derive(Debug)]
pub struct Runtime {
    pub state: AppState,
    pub background: Vec<JoinHandle<()>>,
}

impl Runtime {
    pub fn shutdown(self) {
        for handle in self.background {
            handle.abort();
        }
    }
}

/// Connect to Postgres (running pending migrations) and Redis when
/// configured, then start the thumbnail worker and maintenance tasks.
pub async fn start(config: Config) -> Result<Runtime> {
    let config = Arc::new(config);

    let pool = db::connect(&config.database)
        .await
        .context("failed to connect to PostgreSQL")?;
    db::run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;
    info!("database ready");

    let mut background = Vec::new();
    let worker = ThumbnailWorker::new(config.worker.ffmpeg_path.clone(), config.storage.clone());

    let (cache, memory_cache, jobs): (Arc<dyn CacheStore>, Option<MemoryCache>, Arc<dyn JobQueue>) =
        match &config.redis {
            Some(redis) => {
                let cache = RedisCache::new(&redis.url)
                    .await
                    .context("failed to connect to Redis")?;
                let queue = RedisQueue::new(cache.connection());
                if config.worker.enabled {
                    let consumer = RedisQueue::connect(&redis.url)
                        .await
                        .context("failed to open the worker queue connection")?;
                    background.push(tokio::spawn(
                        worker.run_redis(consumer, std::future::pending()),
                    ));
                } else {
                    info!("thumbnail jobs go to redis; run `marquee-server worker` to process them");
                }
                let cache: Arc<dyn CacheStore> = Arc::new(cache);
                let queue: Arc<dyn JobQueue> = Arc::new(queue);
                (cache, None, queue)
            }
            None => {
                warn!("REDIS_HOST not set; using in-memory cache and in-process thumbnail worker");
                let cache = MemoryCache::new();
                let (queue, receiver) = InProcessQueue::channel(IN_PROCESS_QUEUE_CAPACITY);
                background.push(worker.spawn(receiver));
                let shared: Arc<dyn CacheStore> = Arc::new(cache.clone());
                let queue: Arc<dyn JobQueue> = Arc::new(queue);
                (shared, Some(cache), queue)
            }
        };

    let state = AppState::new(config.clone(), pool, cache, jobs)?;

    background.extend(
        TaskScheduler::new(
            PostgresMovieRepository::new(state.pool.clone()),
            config.storage.clone(),
            memory_cache,
        )
        .spawn(),
    );

    Ok(Runtime { state, background })
}
