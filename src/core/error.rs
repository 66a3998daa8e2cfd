//! Error types for the streaming crate
//!
//! Only recoverable failures travel through this enum. Scheduler invariant
//! violations (wrong lock kind, mutations at an impossible resolution) are
//! programming errors and panic at the violation site instead.

use thiserror::Error;

/// Main error type for recoverable failures
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Streaming error: {0}")]
    Streaming(String),
}
