use anyhow::Result;
use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use serde_json::Value;

use marquee_model::Role;

#[path = "support/mod.rs"]
mod support;
use support::{bearer, build_offline_app};

fn video_form(content_type: &str, bytes: Vec<u8>) -> MultipartForm {
    MultipartForm::new().add_part(
        "video",
        Part::bytes(bytes).file_name("clip.mp4").mime_type(content_type),
    )
}

#[tokio::test]
async fn admin_upload_lands_in_temp_and_queues_thumbnail() -> Result<()> {
    let mut app = build_offline_app().await?;
    let token = app.state.auth.issue_token(1, Role::Admin, false)?;

    let response = app
        .server
        .post("/common/video")
        .add_header("Authorization", bearer(&token))
        .multipart(video_form("video/mp4", b"not really a movie".to_vec()))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    let file_name = body["fileName"].as_str().unwrap_or_default().to_string();
    assert!(file_name.ends_with(".mp4"), "{file_name}");

    let stored = app.state.config.storage.temp_dir().join(&file_name);
    assert_eq!(tokio::fs::read(&stored).await?, b"not really a movie");

    let job = app.jobs.try_recv()?;
    assert_eq!(format!("{}.mp4", job.video_id), file_name);
    assert_eq!(job.video_path, stored.display().to_string());
    Ok(())
}

#[tokio::test]
async fn upload_rejects_other_content_types() -> Result<()> {
    let mut app = build_offline_app().await?;
    let token = app.state.auth.issue_token(1, Role::Admin, false)?;

    let response = app
        .server
        .post("/common/video")
        .add_header("Authorization", bearer(&token))
        .multipart(video_form("image/png", vec![0u8; 16]))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(app.jobs.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn upload_rejects_oversized_files() -> Result<()> {
    let app = build_offline_app().await?;
    let token = app.state.auth.issue_token(1, Role::Admin, false)?;
    let too_big = app.state.config.storage.upload_max_bytes + 1;

    let response = app
        .server
        .post("/common/video")
        .add_header("Authorization", bearer(&token))
        .multipart(video_form("video/mp4", vec![7u8; too_big]))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let mut leftovers = tokio::fs::read_dir(app.state.config.storage.temp_dir()).await?;
    assert!(leftovers.next_entry().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn upload_requires_admin() -> Result<()> {
    let app = build_offline_app().await?;
    let token = app.state.auth.issue_token(2, Role::User, false)?;

    let response = app
        .server
        .post("/common/video")
        .add_header("Authorization", bearer(&token))
        .multipart(video_form("video/mp4", vec![1u8; 4]))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    Ok(())
}
