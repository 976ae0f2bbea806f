//! Logging error types

use thiserror::Error;

/// Errors from logging initialization.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}
