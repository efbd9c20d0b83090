//! Core data model definitions shared by the Marquee server and its clients.
#![allow(missing_docs)]

pub use ::chrono;

pub mod auth;
pub mod chat;
pub mod common;
pub mod director;
pub mod error;
pub mod genre;
pub mod movie;
pub mod pagination;
pub mod role;
pub mod user;

pub use auth::{
    AccessTokenResponse, BlockTokenRequest, Claims, TokenPair, TokenType,
};
pub use chat::{Chat, ChatRoom, SendMessage, WsEnvelope};
pub use common::{DeletedId, ThumbnailJob, UploadedVideo};
pub use director::{CreateDirector, Director, UpdateDirector};
pub use error::{ModelError, Result as ModelResult};
pub use genre::{CreateGenre, Genre, UpdateGenre};
pub use movie::{
    CreateMovie, GetMoviesQuery, LikeResult, Movie, MovieDetail, UpdateMovie,
};
pub use pagination::{
    CursorPage, CursorPaginationQuery, CursorPayload, PagePaginationQuery,
    SortDirection, SortTerm,
};
pub use role::Role;
pub use user::{CreateUser, UpdateUser, User};
