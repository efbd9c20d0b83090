pub mod auth;
pub mod user_handlers;
pub mod user_service;

pub use user_service::UserService;
