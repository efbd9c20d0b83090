pub mod app_state;
pub mod cache;
pub mod config;
pub mod errors;
pub mod extract;
pub mod logging;
pub mod middleware;
pub mod startup;
pub mod websocket;
