use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use thiserror::Error;
use tokio::{process::Command, sync::mpsc, task::JoinHandle};
use tracing::{error, info, warn};

use marquee_model::ThumbnailJob;

use super::queue::RedisQueue;
use crate::infra::config::StorageConfig;

/// Thumbnail frame size.
const THUMBNAIL_WIDTH: u32 = 320;
const THUMBNAIL_HEIGHT: u32 = 180;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("source video {0} not found")]
    MissingSource(String),
    #[error("failed to spawn ffmpeg: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("ffmpeg exited with {status}: {stderr}")]
    Ffmpeg { status: String, stderr: String },
    #[error("ffmpeg produced no thumbnail at {0}")]
    NoOutput(PathBuf),
}

/// Captures one representative frame of an uploaded video as a PNG.
#[derive(Debug, Clone)]
pub struct ThumbnailWorker {
    ffmpeg_path: String,
    storage: StorageConfig,
}

impl ThumbnailWorker {
    pub fn new(ffmpeg_path: impl Into<String>, storage: StorageConfig) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            storage,
        }
    }

    pub fn output_path(&self, video_id: &str) -> PathBuf {
        self.storage.thumbnail_dir().join(format!("{video_id}.png"))
    }

    /// The upload may already have been moved into the movie folder by the
    /// time the job runs.
    fn resolve_source(&self, video_path: &str) -> Option<PathBuf> {
        let path = PathBuf::from(video_path);
        if path.is_file() {
            return Some(path);
        }
        let moved = self.storage.movie_dir().join(path.file_name()?);
        moved.is_file().then_some(moved)
    }

    pub async fn process(&self, job: &ThumbnailJob) -> Result<PathBuf, ThumbnailError> {
        let source = self
            .resolve_source(&job.video_path)
            .ok_or_else(|| ThumbnailError::MissingSource(job.video_path.clone()))?;
        let output = self.output_path(&job.video_id);

        let filter = format!("thumbnail,scale={THUMBNAIL_WIDTH}:{THUMBNAIL_HEIGHT}");
        let result = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(&source)
            .arg("-vf")
            .arg(&filter)
            .args(["-frames:v", "1"])
            .arg(&output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !result.status.success() {
            return Err(ThumbnailError::Ffmpeg {
                status: result.status.to_string(),
                stderr: last_line(&result.stderr),
            });
        }
        if !Path::new(&output).is_file() {
            return Err(ThumbnailError::NoOutput(output));
        }
        Ok(output)
    }

    /// Process a job, logging the outcome. Never fails.
    pub async fn handle(&self, job: ThumbnailJob) {
        info!(video_id = %job.video_id, "generating thumbnail");
        match self.process(&job).await {
            Ok(path) => info!(video_id = %job.video_id, path = %path.display(), "thumbnail generated"),
            Err(err) => error!(video_id = %job.video_id, error = %err, "thumbnail generation failed"),
        }
    }

    /// Consume jobs from an in-process channel until every sender is gone.
    pub fn spawn(self, mut receiver: mpsc::Receiver<ThumbnailJob>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("thumbnail worker started");
            while let Some(job) = receiver.recv().await {
                self.handle(job).await;
            }
            info!("thumbnail worker stopped (channel closed)");
        })
    }

    /// Consume jobs from Redis until `shutdown` resolves.
    pub async fn run_redis(
        self,
        queue: RedisQueue,
        shutdown: impl std::future::Future<Output = ()>,
    ) {
        const WAIT: Duration = Duration::from_secs(5);
        const BACKOFF: Duration = Duration::from_secs(2);

        tokio::pin!(shutdown);
        info!("thumbnail worker listening on redis");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                popped = queue.pop(WAIT) => match popped {
                    Ok(Some(job)) => self.handle(job).await,
                    Ok(None) => {}
                    Err(err) => {
                        warn!(error = %err, "failed to read job queue");
                        tokio::time::sleep(BACKOFF).await;
                    }
                },
            }
        }
        info!("thumbnail worker stopped");
    }
}

fn last_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(root: &Path) -> StorageConfig {
        let storage = StorageConfig {
            public_dir: root.join("public"),
            log_dir: root.join("logs"),
            upload_max_bytes: 1024,
        };
        storage.ensure_directories().unwrap();
        storage
    }

    #[tokio::test]
    async fn missing_source_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let worker = ThumbnailWorker::new("ffmpeg", storage(dir.path()));
        let err = worker
            .process(&ThumbnailJob {
                video_id: "v1".into(),
                video_path: dir.path().join("nope.mp4").display().to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::MissingSource(_)));
    }

    #[tokio::test]
    async fn falls_back_to_the_movie_folder() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        std::fs::write(storage.movie_dir().join("v1.mp4"), b"video").unwrap();
        let worker = ThumbnailWorker::new("ffmpeg", storage.clone());

        let temp_path = storage.temp_dir().join("v1.mp4");
        assert_eq!(
            worker.resolve_source(&temp_path.display().to_string()),
            Some(storage.movie_dir().join("v1.mp4"))
        );
    }

    #[tokio::test]
    async fn missing_ffmpeg_binary_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let source = storage.temp_dir().join("v1.mp4");
        std::fs::write(&source, b"video").unwrap();
        let worker = ThumbnailWorker::new("/nonexistent/ffmpeg-binary", storage);

        let err = worker
            .process(&ThumbnailJob {
                video_id: "v1".into(),
                video_path: source.display().to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::Spawn(_)));
    }

    #[test]
    fn keeps_the_last_stderr_line() {
        assert_eq!(last_line(b"a\nb: invalid data\n\n"), "b: invalid data");
        assert_eq!(last_line(b""), "");
    }
}
