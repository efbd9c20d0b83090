//! Realtime chat between users and admins.

pub mod gateway;
pub mod service;

pub use service::ChatService;
