// error.rs
use std::io;
use thiserror::Error;

/// Error types for watch, walk and tail operations
///
/// Per-entry walk failures are delivered as events and never abort a walk;
/// this enum covers the failures that surface to callers or travel inside
/// those events.
#[derive(Error, Debug)]
pub enum WatchError {
    /// I/O error from filesystem or subprocess operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Regex compilation error from a translated pattern
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Pattern could not be compiled into a matcher
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

pub type Result<T> = std::result::Result<T, WatchError>;
