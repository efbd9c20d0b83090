//! `POST /common/video`: multipart video upload into the temp folder.

use std::path::Path;

use axum::{
    Json,
    extract::{Multipart, State},
};
use chrono::Utc;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{info, warn};
use uuid::Uuid;

use marquee_model::{ThumbnailJob, UploadedVideo};

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

const VIDEO_FIELD: &str = "video";
const VIDEO_CONTENT_TYPE: &str = "video/mp4";
const DEFAULT_EXTENSION: &str = "mp4";

/// `{uuid}_{unix_millis}.{ext}`. The extension comes from the client's file
/// name when it is plain alphanumeric.
pub fn upload_file_name(original: Option<&str>, id: Uuid, now_millis: i64) -> String {
    let extension = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(DEFAULT_EXTENSION);
    format!("{id}_{now_millis}.{extension}")
}

/// Upload an mp4 video
///
/// # Request
///
/// `multipart/form-data` with a `video` field of type `video/mp4`.
///
/// # Response
///
/// - `200 OK` with `{"fileName": "..."}`; pass it as `movieFileName` when
///   creating the movie
/// - `400 Bad Request` when the field is missing, not an mp4 or too large
pub async fn upload_video_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadedVideo>> {
    let max_bytes = state.config.storage.upload_max_bytes;

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        if field.content_type() != Some(VIDEO_CONTENT_TYPE) {
            return Err(AppError::bad_request("upload an mp4 file"));
        }

        let file_name = upload_file_name(
            field.file_name(),
            Uuid::new_v4(),
            Utc::now().timestamp_millis(),
        );
        let path = state.config.storage.temp_dir().join(&file_name);

        let mut file = fs::File::create(&path).await?;
        let mut written = 0usize;
        let copied: AppResult<()> = async {
            while let Some(chunk) = field.chunk().await? {
                written += chunk.len();
                if written > max_bytes {
                    return Err(AppError::bad_request(format!(
                        "file is larger than {max_bytes} bytes"
                    )));
                }
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(err) = copied {
            drop(file);
            if let Err(remove_err) = fs::remove_file(&path).await {
                warn!(error = %remove_err, path = %path.display(), "failed to remove partial upload");
            }
            return Err(err);
        }

        let video_id = file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&file_name)
            .to_string();
        state
            .jobs
            .enqueue(ThumbnailJob {
                video_id,
                video_path: path.display().to_string(),
            })
            .await?;

        info!(file = %file_name, bytes = written, "stored uploaded video");
        return Ok(Json(UploadedVideo { file_name }));
    }

    Err(AppError::bad_request("the video field is required"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_plain_extensions() {
        let id = Uuid::nil();
        assert_eq!(
            upload_file_name(Some("trailer.MP4"), id, 1_700_000_000_000),
            format!("{id}_1700000000000.MP4")
        );
    }

    #[test]
    fn falls_back_to_mp4() {
        let id = Uuid::nil();
        for original in [None, Some("noext"), Some("evil.m p4"), Some("x.")] {
            assert_eq!(
                upload_file_name(original, id, 5),
                format!("{id}_5.mp4"),
                "{original:?}"
            );
        }
    }
}
