//! Command implementations.

pub mod api;
pub mod store;

use loose_gallery_core::SerialError;
use loose_gallery_designs::config::ConfigError;
use loose_gallery_designs::{ApiError, StoreError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// No API key is configured under the requested name.
    #[error("Unknown credential: {0}")]
    UnknownCredential(String),

    #[error("Invalid serial: {0}")]
    InvalidSerial(#[from] SerialError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Could not read {0}: {1}")]
    Io(String, std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{json}");
    }
    Ok(())
}
