pub mod connection;
pub mod manager;

pub use connection::Connection;
pub use manager::ConnectionManager;
