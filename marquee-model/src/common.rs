use serde::{Deserialize, Serialize};

/// Response of the video upload endpoint. The name is later passed back as
/// `movieFileName` when the movie is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedVideo {
    pub file_name: String,
}

/// Work item consumed by the thumbnail worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailJob {
    pub video_id: String,
    pub video_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedId {
    pub id: i64,
}
