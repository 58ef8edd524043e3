pub mod action;
pub mod classifier;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod github;
pub mod messages;
pub mod staleness;
pub mod sweep;
pub mod template;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{BotError, Result};
