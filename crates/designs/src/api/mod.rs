//! Loose Gallery GraphQL API client.
//!
//! # Architecture
//!
//! - One HTTPS endpoint, POST `{query, variables, operationName}` built with
//!   `graphql_client::QueryBody`; the credential travels in `x-api-key`
//! - Every operation returns `Result<T, ApiError>`; nothing panics and
//!   nothing is retried (callers decide whether to retry)
//! - Transport failures, HTTP failures and GraphQL errors inside a 200 are
//!   distinguished by [`ApiErrorKind`]
//! - [`DesignApi`] is the seam the lifecycle talks to, so checkout and the
//!   editor return flow can be exercised against doubles
//!
//! # Example
//!
//! ```rust,ignore
//! use loose_gallery_designs::api::{DesignApi, LooseGalleryClient};
//!
//! let client = LooseGalleryClient::new(&config.api, &config.editor, credential)?;
//! let domain = client.test_connection().await?;
//! let preview = client.get_design_preview(&serial, PreviewSize::Medium).await?;
//! ```

mod client;
pub mod editor;
pub mod queries;
pub mod types;

use std::collections::HashMap;
use std::future::Future;

use loose_gallery_core::{ImageStatus, PreviewSize, Serial};
use thiserror::Error;

use crate::catalog::ProductDesignConfig;
use crate::config::DesignConfig;

pub use client::{LooseGalleryClient, classify_response};
pub use editor::{EditorRequest, build_editor_url};
pub use types::*;

/// Category of an API failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// Network, TLS or timeout failure; no usable response.
    Transport,
    /// The remote API answered with structured GraphQL errors.
    ProtocolError,
    /// The credential was rejected (or missing).
    Unauthorized,
    /// The design or template does not exist remotely.
    NotFound,
    /// Any other non-success response.
    Unknown,
}

impl std::fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport => write!(f, "transport error"),
            Self::ProtocolError => write!(f, "protocol error"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::NotFound => write!(f, "not found"),
            Self::Unknown => write!(f, "unknown error"),
        }
    }
}

/// Error returned by every API operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// Human-readable message, suitable for an order note.
    pub message: String,
    /// HTTP status when a response was received.
    pub http_status: Option<u16>,
}

impl ApiError {
    #[must_use]
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            http_status: None,
        }
    }

    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Transport, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, message)
    }

    /// Whether this is a network-level failure.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        self.kind == ApiErrorKind::Transport
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let mut api_err = Self::transport(err.to_string());
        api_err.http_status = err.status().map(|s| s.as_u16());
        api_err
    }
}

/// Operations the design lifecycle needs from the editor service.
///
/// Implemented by [`LooseGalleryClient`]; tests provide doubles.
pub trait DesignApi: Send + Sync {
    /// Verify the credential; must not mutate remote state.
    fn test_connection(&self) -> impl Future<Output = Result<DomainInfo, ApiError>> + Send;

    /// Fetch preview and thumbnail URLs for a design.
    fn get_design_preview(
        &self,
        serial: &Serial,
        size: PreviewSize,
    ) -> impl Future<Output = Result<DesignPreview, ApiError>> + Send;

    /// Fetch a design's remote state, including whether the service locked it.
    fn get_design_info(
        &self,
        serial: &Serial,
    ) -> impl Future<Output = Result<DesignInfo, ApiError>> + Send;

    /// Ask for a high-resolution render; only confirms acceptance.
    fn request_high_res_image(
        &self,
        serial: &Serial,
        spec: &ImageSpec,
    ) -> impl Future<Output = Result<RenderRequest, ApiError>> + Send;

    /// Poll a previously requested render.
    fn poll_image_status(
        &self,
        serial: &Serial,
        spec: &ImageSpec,
    ) -> impl Future<Output = Result<ImageStatus, ApiError>> + Send;

    /// Make a design non-editable.
    fn lock_design(
        &self,
        serial: &Serial,
    ) -> impl Future<Output = Result<LockOutcome, ApiError>> + Send;

    /// Build an editor deep link. Pure; no network.
    fn build_editor_url(&self, request: &EditorRequest) -> String;
}

/// API clients keyed by credential name.
///
/// Products select a credential by name; products without a selector use
/// the first configured credential.
#[derive(Debug, Clone)]
pub struct ApiClients<A> {
    clients: HashMap<String, A>,
    default: Option<String>,
}

impl<A> Default for ApiClients<A> {
    fn default() -> Self {
        Self {
            clients: HashMap::new(),
            default: None,
        }
    }
}

impl<A: DesignApi> ApiClients<A> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client. The first registered client becomes the default.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, client: A) -> Self {
        let name = name.into();
        if self.default.is_none() {
            self.default = Some(name.clone());
        }
        self.clients.insert(name, client);
        self
    }

    /// Client for a credential name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&A> {
        self.clients.get(name)
    }

    /// The default client.
    #[must_use]
    pub fn default_client(&self) -> Option<&A> {
        self.default.as_deref().and_then(|name| self.clients.get(name))
    }

    /// Client a product's designs are managed through.
    #[must_use]
    pub fn for_product(&self, product: &ProductDesignConfig) -> Option<&A> {
        match product.credential.as_deref() {
            Some(name) => self.get(name),
            None => self.default_client(),
        }
    }

    /// Whether no client is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl ApiClients<LooseGalleryClient> {
    /// Build one HTTP client per configured credential.
    ///
    /// # Errors
    ///
    /// Returns `ApiErrorKind::Transport` if an HTTP client cannot be built.
    pub fn from_config(config: &DesignConfig) -> Result<Self, ApiError> {
        config
            .api
            .credentials
            .iter()
            .try_fold(Self::new(), |clients, credential| {
                let client = LooseGalleryClient::new(&config.api, &config.editor, credential)?;
                Ok(clients.with(credential.name.clone(), client))
            })
    }
}

/// Join GraphQL error messages the way they are shown to merchants.
pub(crate) fn format_graphql_errors(messages: &[String]) -> String {
    if messages.is_empty() {
        return "Unknown error".to_string();
    }

    messages
        .iter()
        .map(|m| {
            if m.trim().is_empty() {
                "Unknown error"
            } else {
                m.as_str()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
