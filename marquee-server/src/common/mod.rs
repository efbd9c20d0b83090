//! Cross-cutting endpoints and background maintenance.

pub mod tasks;
pub mod upload;

pub use tasks::TaskScheduler;
