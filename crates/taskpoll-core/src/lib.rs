//! `taskpoll-core` — configuration and shared error types for taskpoll.

pub mod config;
pub mod error;

pub use config::TaskpollConfig;
pub use error::{Result, TaskpollError};
