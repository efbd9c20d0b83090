//! Periodic maintenance jobs run on tokio intervals.

use std::{path::Path, time::Duration};

use chrono::Utc;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    db::repositories::PostgresMovieRepository,
    infra::{cache::MemoryCache, config::StorageConfig},
};

const RECOUNT_LIKES_EVERY: Duration = Duration::from_secs(60);
const CLEAN_TEMP_EVERY: Duration = Duration::from_secs(24 * 60 * 60);
const PURGE_CACHE_EVERY: Duration = Duration::from_secs(60);

/// Uploads that were never attached to a movie are removed after this long.
const ORPHAN_MAX_AGE_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone)]
pub struct TaskScheduler {
    movies: PostgresMovieRepository,
    storage: StorageConfig,
    memory_cache: Option<MemoryCache>,
}

impl TaskScheduler {
    pub fn new(
        movies: PostgresMovieRepository,
        storage: StorageConfig,
        memory_cache: Option<MemoryCache>,
    ) -> Self {
        Self {
            movies,
            storage,
            memory_cache,
        }
    }

    /// Start every task. Abort the returned handles to stop them.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let movies = self.movies.clone();
        handles.push(every(RECOUNT_LIKES_EVERY, move || {
            let movies = movies.clone();
            async move {
                match movies.recount_likes().await {
                    Ok(updated) => debug!(updated, "recounted movie likes"),
                    Err(err) => error!(error = %err, "failed to recount movie likes"),
                }
            }
        }));

        let storage = self.storage.clone();
        handles.push(every(CLEAN_TEMP_EVERY, move || {
            let temp_dir = storage.temp_dir();
            async move {
                match delete_orphan_uploads(&temp_dir, Utc::now().timestamp_millis()).await {
                    Ok(0) => {}
                    Ok(deleted) => info!(deleted, "removed orphaned uploads"),
                    Err(err) => error!(error = %err, "failed to clean temp uploads"),
                }
            }
        }));

        if let Some(cache) = self.memory_cache {
            handles.push(every(PURGE_CACHE_EVERY, move || {
                let cache = cache.clone();
                async move {
                    let purged = cache.purge_expired();
                    if purged > 0 {
                        debug!(purged, "purged expired cache entries");
                    }
                }
            }));
        }

        info!(tasks = handles.len(), "scheduled maintenance tasks");
        handles
    }
}

fn every<F, Fut>(period: Duration, mut task: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            task().await;
        }
    })
}

/// Whether a temp upload should be deleted: its stem is not
/// `{uuid}_{unix_millis}`, or it is older than a day.
pub fn is_orphan_upload(file_name: &str, now_millis: i64) -> bool {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name);

    let parts: Vec<&str> = stem.split('_').collect();
    let [id, millis] = parts.as_slice() else {
        return true;
    };
    if Uuid::parse_str(id).is_err() {
        return true;
    }
    match millis.parse::<i64>() {
        Ok(uploaded_at) => now_millis - uploaded_at > ORPHAN_MAX_AGE_MS,
        Err(_) => true,
    }
}

/// Remove orphaned files from `temp_dir`, returning how many were deleted.
pub async fn delete_orphan_uploads(temp_dir: &Path, now_millis: i64) -> std::io::Result<usize> {
    let mut entries = tokio::fs::read_dir(temp_dir).await?;
    let mut deleted = 0;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if is_orphan_upload(name, now_millis) {
            tokio::fs::remove_file(entry.path()).await?;
            deleted += 1;
        }
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn recent_well_formed_uploads_are_kept() {
        let name = format!("{}_{}.mp4", Uuid::new_v4(), NOW - 1000);
        assert!(!is_orphan_upload(&name, NOW));
    }

    #[test]
    fn stale_or_malformed_uploads_are_orphans() {
        let id = Uuid::new_v4();
        assert!(is_orphan_upload(&format!("{id}_{}.mp4", NOW - ORPHAN_MAX_AGE_MS - 1), NOW));
        assert!(is_orphan_upload(&format!("{id}_notanumber.mp4"), NOW));
        assert!(is_orphan_upload("random.mp4", NOW));
        assert!(is_orphan_upload(&format!("{id}_1_2.mp4"), NOW));
        assert!(is_orphan_upload(&format!("not-a-uuid_{NOW}.mp4"), NOW));
    }

    #[tokio::test]
    async fn deletes_only_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let keep = format!("{}_{}.mp4", Uuid::new_v4(), NOW);
        std::fs::write(dir.path().join(&keep), b"a").unwrap();
        std::fs::write(dir.path().join("junk.mp4"), b"b").unwrap();

        let deleted = delete_orphan_uploads(dir.path(), NOW).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(dir.path().join(&keep).exists());
        assert!(!dir.path().join("junk.mp4").exists());
    }
}
