//! Movie catalog backend.
//!
//! REST resources for movies, directors, genres and users behind JWT
//! authentication, a websocket chat between users and admins, and MP4
//! uploads that feed a thumbnail worker.

pub mod catalog;
pub mod chat;
pub mod common;
pub mod db;
pub mod infra;
pub mod pagination;
pub mod routes;
pub mod users;
pub mod worker;

pub use infra::app_state::AppState;
pub use routes::create_router;

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
