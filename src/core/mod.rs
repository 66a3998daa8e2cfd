//! Core utilities: errors, logging, configuration

pub mod error;
pub mod logging;
pub mod config;

pub use config::StreamingConfig;
pub use error::Error;
