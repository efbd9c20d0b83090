//! Database-backed flows. Run with `--features e2e` and `DATABASE_URL`
//! pointing at a Postgres the tests may create databases in.
#![cfg(feature = "e2e")]

use std::sync::Arc;

use anyhow::Result;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};
use sqlx::PgPool;
use tokio::sync::mpsc;

use marquee_model::{SendMessage, TokenPair, WsEnvelope};
use marquee_server::infra::websocket::Connection;

#[path = "support/mod.rs"]
mod support;
use support::{TestApp, basic, bearer, build_test_app};

async fn register(server: &TestServer, email: &str, password: &str) -> Value {
    let response = server
        .post("/auth/register")
        .add_header("Authorization", basic(email, password))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

async fn login(server: &TestServer, email: &str, password: &str) -> TokenPair {
    let response = server
        .post("/auth/login")
        .add_header("Authorization", basic(email, password))
        .await;
    response.assert_status_ok();
    response.json()
}

/// Register an account, promote it and return its access token.
async fn admin_token(app: &TestApp, pool: &PgPool) -> Result<String> {
    register(&app.server, "admin@marquee.test", "admin-pass").await;
    sqlx::query("UPDATE users SET role = 0 WHERE email = $1")
        .bind("admin@marquee.test")
        .execute(pool)
        .await?;
    Ok(login(&app.server, "admin@marquee.test", "admin-pass")
        .await
        .access_token)
}

/// Seed a director and a genre, returning their ids.
async fn seed_catalog(app: &TestApp, admin: &str) -> (i64, i64) {
    let director = app
        .server
        .post("/director")
        .add_header("Authorization", bearer(admin))
        .json(&json!({
            "name": "Christopher Nolan",
            "dob": "1970-07-30",
            "nationality": "British"
        }))
        .await;
    director.assert_status(StatusCode::CREATED);
    let director: Value = director.json();

    let genre = app
        .server
        .post("/genre")
        .add_header("Authorization", bearer(admin))
        .json(&json!({ "name": "Thriller" }))
        .await;
    genre.assert_status(StatusCode::CREATED);
    let genre: Value = genre.json();

    (
        director["id"].as_i64().unwrap_or_default(),
        genre["id"].as_i64().unwrap_or_default(),
    )
}

async fn create_movie(
    app: &TestApp,
    admin: &str,
    title: &str,
    director_id: i64,
    genre_id: i64,
) -> Result<Value> {
    let file_name = format!("{}.mp4", title.replace(' ', "-").to_lowercase());
    tokio::fs::write(app.state.config.storage.temp_dir().join(&file_name), b"frames").await?;

    let response = app
        .server
        .post("/movie")
        .add_header("Authorization", bearer(admin))
        .json(&json!({
            "title": title,
            "detail": format!("{title} detail"),
            "directorId": director_id,
            "genreIds": [genre_id],
            "movieFileName": file_name
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    Ok(response.json())
}

#[sqlx::test(migrator = "marquee_server::MIGRATOR")]
async fn register_login_and_private(pool: PgPool) -> Result<()> {
    let app = build_test_app(pool).await?;

    let user = register(&app.server, "viewer@marquee.test", "secret").await;
    assert_eq!(user["role"], 2);
    assert!(user.get("password").is_none());

    let duplicate = app
        .server
        .post("/auth/register")
        .add_header("Authorization", basic("viewer@marquee.test", "other"))
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);

    let wrong = app
        .server
        .post("/auth/login")
        .add_header("Authorization", basic("viewer@marquee.test", "nope"))
        .await;
    wrong.assert_status(StatusCode::UNAUTHORIZED);

    let tokens = login(&app.server, "viewer@marquee.test", "secret").await;
    let private = app
        .server
        .get("/auth/private")
        .add_header("Authorization", bearer(&tokens.access_token))
        .await;
    private.assert_status_ok();
    let claims: Value = private.json();
    assert_eq!(claims["sub"], user["id"]);
    Ok(())
}

#[sqlx::test(migrator = "marquee_server::MIGRATOR")]
async fn admin_builds_the_catalog(pool: PgPool) -> Result<()> {
    let app = build_test_app(pool.clone()).await?;
    let admin = admin_token(&app, &pool).await?;
    let (director_id, genre_id) = seed_catalog(&app, &admin).await;

    let duplicate = app
        .server
        .post("/genre")
        .add_header("Authorization", bearer(&admin))
        .json(&json!({ "name": "Thriller" }))
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);

    let movie = create_movie(&app, &admin, "Memento", director_id, genre_id).await?;
    assert_eq!(movie["director"]["name"], "Christopher Nolan");
    assert_eq!(movie["genres"][0]["name"], "Thriller");
    assert_eq!(movie["detail"]["detail"], "Memento detail");
    assert!(
        app.state
            .config
            .storage
            .movie_dir()
            .join("memento.mp4")
            .exists()
    );
    assert!(!app.state.config.storage.temp_dir().join("memento.mp4").exists());

    let movie_id = movie["id"].as_i64().unwrap_or_default();
    let updated = app
        .server
        .patch(&format!("/movie/{movie_id}"))
        .add_header("Authorization", bearer(&admin))
        .json(&json!({ "title": "Memento (2000)" }))
        .await;
    updated.assert_status_ok();
    let updated: Value = updated.json();
    assert_eq!(updated["title"], "Memento (2000)");

    let unknown_genre = app
        .server
        .patch(&format!("/movie/{movie_id}"))
        .add_header("Authorization", bearer(&admin))
        .json(&json!({ "genreIds": [genre_id, 9999] }))
        .await;
    unknown_genre.assert_status(StatusCode::NOT_FOUND);

    let deleted = app
        .server
        .delete(&format!("/movie/{movie_id}"))
        .add_header("Authorization", bearer(&admin))
        .await;
    deleted.assert_status_ok();
    let deleted: Value = deleted.json();
    assert_eq!(deleted["id"], movie_id);

    app.server
        .get(&format!("/movie/{movie_id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    Ok(())
}

#[sqlx::test(migrator = "marquee_server::MIGRATOR")]
async fn failed_create_leaves_no_rows_behind(pool: PgPool) -> Result<()> {
    let app = build_test_app(pool.clone()).await?;
    let admin = admin_token(&app, &pool).await?;
    let (director_id, genre_id) = seed_catalog(&app, &admin).await;

    // The upload never happened, so the move fails after the inserts.
    let response = app
        .server
        .post("/movie")
        .add_header("Authorization", bearer(&admin))
        .json(&json!({
            "title": "Tenet",
            "detail": "Tenet detail",
            "directorId": director_id,
            "genreIds": [genre_id],
            "movieFileName": "missing.mp4"
        }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let (movies,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movies")
        .fetch_one(&pool)
        .await?;
    let (details,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movie_details")
        .fetch_one(&pool)
        .await?;
    assert_eq!((movies, details), (0, 0));
    Ok(())
}

#[sqlx::test(migrator = "marquee_server::MIGRATOR")]
async fn movies_page_with_cursor(pool: PgPool) -> Result<()> {
    let app = build_test_app(pool.clone()).await?;
    let admin = admin_token(&app, &pool).await?;
    let (director_id, genre_id) = seed_catalog(&app, &admin).await;
    for title in ["Following", "Insomnia", "Interstellar"] {
        create_movie(&app, &admin, title, director_id, genre_id).await?;
    }

    let first = app.server.get("/movie").add_query_param("take", 2).await;
    first.assert_status_ok();
    let first: Value = first.json();
    assert_eq!(first["count"], 3);
    let titles: Vec<&str> = first["data"]
        .as_array()
        .map(|rows| rows.iter().filter_map(|row| row["title"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(titles, ["Interstellar", "Insomnia"]);
    assert!(first["data"][0].get("likeStatus").is_none());

    let cursor = first["nextCursor"].as_str().unwrap_or_default().to_string();
    assert!(!cursor.is_empty());
    let second = app
        .server
        .get("/movie")
        .add_query_param("take", 2)
        .add_query_param("cursor", &cursor)
        .await;
    second.assert_status_ok();
    let second: Value = second.json();
    assert_eq!(second["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(second["data"][0]["title"], "Following");

    let filtered = app
        .server
        .get("/movie")
        .add_query_param("title", "Ins")
        .add_query_param("order", "title_ASC")
        .await;
    filtered.assert_status_ok();
    let filtered: Value = filtered.json();
    assert_eq!(filtered["count"], 1);
    assert_eq!(filtered["data"][0]["title"], "Insomnia");

    app.server
        .get("/movie")
        .add_query_param("title", "in")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    app.server
        .get("/movie")
        .add_query_param("cursor", "not-a-cursor")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[sqlx::test(migrator = "marquee_server::MIGRATOR")]
async fn likes_toggle_and_listing_is_throttled(pool: PgPool) -> Result<()> {
    let app = build_test_app(pool.clone()).await?;
    let admin = admin_token(&app, &pool).await?;
    let (director_id, genre_id) = seed_catalog(&app, &admin).await;
    let movie = create_movie(&app, &admin, "Dunkirk", director_id, genre_id).await?;
    let movie_id = movie["id"].as_i64().unwrap_or_default();

    register(&app.server, "fan@marquee.test", "fan-pass").await;
    let fan = login(&app.server, "fan@marquee.test", "fan-pass")
        .await
        .access_token;

    let mut statuses = Vec::new();
    for path in ["like", "like", "dislike", "like"] {
        let response = app
            .server
            .post(&format!("/movie/{movie_id}/{path}"))
            .add_header("Authorization", bearer(&fan))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        statuses.push(body["isLike"].clone());
    }
    assert_eq!(
        statuses,
        [json!(true), Value::Null, json!(false), json!(true)]
    );

    app.server
        .post("/movie/424242/like")
        .add_header("Authorization", bearer(&fan))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    for _ in 0..5 {
        let response = app
            .server
            .get("/movie")
            .add_header("Authorization", bearer(&fan))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"][0]["likeStatus"], true);
    }
    let limited = app
        .server
        .get("/movie")
        .add_header("Authorization", bearer(&fan))
        .await;
    limited.assert_status(StatusCode::FORBIDDEN);
    let body: Value = limited.json();
    assert_eq!(body["error"]["message"], "request limit exceeded");

    // Anonymous listing is never throttled.
    app.server.get("/movie").await.assert_status_ok();
    Ok(())
}

#[sqlx::test(migrator = "marquee_server::MIGRATOR")]
async fn concurrent_likes_by_one_user_do_not_conflict(pool: PgPool) -> Result<()> {
    let app = build_test_app(pool.clone()).await?;
    let admin = admin_token(&app, &pool).await?;
    let (director_id, genre_id) = seed_catalog(&app, &admin).await;
    let movie = create_movie(&app, &admin, "Tenet", director_id, genre_id).await?;
    let movie_id = movie["id"].as_i64().unwrap_or_default();
    let fan = register(&app.server, "twin@marquee.test", "twin-pass").await;
    let fan_id = fan["id"].as_i64().unwrap_or_default();

    let movies = app.state.movies.clone();
    let (first, second) = tokio::join!(
        movies.toggle_like(movie_id, fan_id, true),
        movies.toggle_like(movie_id, fan_id, true),
    );
    let mut outcomes = vec![first?.is_like, second?.is_like];
    outcomes.sort();
    assert_eq!(outcomes, vec![None, Some(true)]);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM movie_user_likes WHERE movie_id = $1")
        .bind(movie_id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(rows, 0);
    Ok(())
}

#[sqlx::test(migrator = "marquee_server::MIGRATOR")]
async fn admin_manages_users(pool: PgPool) -> Result<()> {
    let app = build_test_app(pool.clone()).await?;
    let admin = admin_token(&app, &pool).await?;

    let created = app
        .server
        .post("/user")
        .add_header("Authorization", bearer(&admin))
        .json(&json!({ "email": "staff@marquee.test", "password": "staff-pass" }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let created: Value = created.json();
    let user_id = created["id"].as_i64().unwrap_or_default();

    app.server
        .post("/user")
        .add_header("Authorization", bearer(&admin))
        .json(&json!({ "email": "not-an-email", "password": "x" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let updated = app
        .server
        .patch(&format!("/user/{user_id}"))
        .add_header("Authorization", bearer(&admin))
        .json(&json!({ "password": "rotated-pass" }))
        .await;
    updated.assert_status_ok();
    login(&app.server, "staff@marquee.test", "rotated-pass").await;

    let listed = app
        .server
        .get("/user")
        .add_header("Authorization", bearer(&admin))
        .await;
    listed.assert_status_ok();
    let listed: Value = listed.json();
    assert_eq!(listed.as_array().map(Vec::len), Some(2));

    app.server
        .delete(&format!("/user/{user_id}"))
        .add_header("Authorization", bearer(&admin))
        .await
        .assert_status_ok();
    app.server
        .get(&format!("/user/{user_id}"))
        .add_header("Authorization", bearer(&admin))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    Ok(())
}

/// Attach an in-memory socket for `user_id` to the chat service.
async fn chat_client(app: &TestApp, user_id: i64) -> Result<mpsc::Receiver<WsEnvelope>> {
    let (tx, rx) = mpsc::channel(16);
    app.state
        .chat
        .register_client(Arc::new(Connection::new(user_id, tx)))
        .await?;
    Ok(rx)
}

fn message(text: &str, room_id: Option<i64>) -> SendMessage {
    SendMessage {
        message: text.into(),
        room_id,
    }
}

#[sqlx::test(migrator = "marquee_server::MIGRATOR")]
async fn chat_opens_a_room_with_an_admin(pool: PgPool) -> Result<()> {
    let app = build_test_app(pool.clone()).await?;
    admin_token(&app, &pool).await?;
    let admin_id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind("admin@marquee.test")
        .fetch_one(&pool)
        .await?;
    let viewer = register(&app.server, "viewer@marquee.test", "secret").await;
    let viewer_id = viewer["id"].as_i64().unwrap_or_default();

    let mut admin_rx = chat_client(&app, admin_id).await?;
    let mut viewer_rx = chat_client(&app, viewer_id).await?;

    let chat = app.state.chat.send_message(viewer_id, message("hi", None)).await?;
    let room_id = chat.chat_room_id;

    let created = viewer_rx.recv().await.unwrap();
    assert_eq!(created.event, WsEnvelope::ROOM_CREATED);
    assert_eq!(created.data, json!(room_id));
    assert_eq!(admin_rx.recv().await.unwrap().event, WsEnvelope::ROOM_CREATED);
    let delivered = admin_rx.recv().await.unwrap();
    assert_eq!(delivered.event, WsEnvelope::NEW_MESSAGE);
    assert_eq!(delivered.data["message"], "hi");
    assert!(viewer_rx.try_recv().is_err());

    // Admins must pick an existing room; failures notify nobody.
    let err = app
        .state
        .chat
        .send_message(admin_id, message("reply", None))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    let err = app
        .state
        .chat
        .send_message(admin_id, message("reply", Some(room_id + 1000)))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
    assert!(viewer_rx.try_recv().is_err());

    app.state
        .chat
        .send_message(admin_id, message("reply", Some(room_id)))
        .await?;
    let reply = viewer_rx.recv().await.unwrap();
    assert_eq!(reply.event, WsEnvelope::NEW_MESSAGE);
    assert_eq!(reply.data["message"], "reply");
    assert!(admin_rx.try_recv().is_err());

    // The viewer keeps talking in the same room.
    let again = app.state.chat.send_message(viewer_id, message("thanks", None)).await?;
    assert_eq!(again.chat_room_id, room_id);
    assert_eq!(admin_rx.recv().await.unwrap().event, WsEnvelope::NEW_MESSAGE);

    let (rooms, chats): (i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM chat_rooms), (SELECT COUNT(*) FROM chats)",
    )
    .fetch_one(&pool)
    .await?;
    assert_eq!((rooms, chats), (1, 3));
    Ok(())
}

#[sqlx::test(migrator = "marquee_server::MIGRATOR")]
async fn chat_without_an_admin_is_rejected(pool: PgPool) -> Result<()> {
    let app = build_test_app(pool.clone()).await?;
    let viewer = register(&app.server, "lonely@marquee.test", "secret").await;
    let viewer_id = viewer["id"].as_i64().unwrap_or_default();
    let mut viewer_rx = chat_client(&app, viewer_id).await?;

    let err = app
        .state
        .chat
        .send_message(viewer_id, message("anyone?", None))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
    assert!(viewer_rx.try_recv().is_err());

    let rooms: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_rooms")
        .fetch_one(&pool)
        .await?;
    assert_eq!(rooms, 0);
    Ok(())
}
