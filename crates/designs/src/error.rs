//! Error type for lifecycle operations.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::store::StoreError;

/// Errors surfaced by [`crate::DesignLifecycle`] operations.
#[derive(Debug, Error)]
pub enum DesignError {
    /// Caller input was rejected (unknown product, bad serial, unchecked box).
    #[error("{0}")]
    InvalidInput(String),

    /// The operation conflicts with current state (locked design, unknown line).
    #[error("{0}")]
    StateConflict(String),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DesignError {
    /// Message suitable for showing to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) | Self::StateConflict(msg) => msg.clone(),
            Self::Api(_) | Self::Store(_) | Self::Config(_) => {
                "Something went wrong with your design. Please try again.".to_string()
            }
        }
    }
}
