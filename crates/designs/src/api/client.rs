//! HTTP implementation of [`DesignApi`].

use std::sync::Arc;

use graphql_client::{QueryBody, Response};
use loose_gallery_core::{ImageStatus, PreviewSize, Serial};
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};
use url::Url;

use super::editor::{EditorRequest, build_editor_url};
use super::queries::{
    AssetVariables, GET_ASSET, GET_ASSET_PREVIEW, GET_DOMAIN, GetAssetData, GetDomainData,
    IMAGE_STATUS, ImageStatusData, ImageStatusNode, ImageVariables,
    LOCK_ASSET, LockAssetData, REQUEST_IMAGE, RequestImageData, SerialVariables,
};
use super::{
    ApiError, ApiErrorKind, DesignApi, DesignInfo, DesignPreview, DomainInfo, ImageSpec,
    LockOutcome, RenderRequest, format_graphql_errors,
};
use crate::config::{ApiConfig, ApiCredential, EditorConfig, LockCapability};

/// Name reported when the API does not return one.
const UNKNOWN_DOMAIN: &str = "Unknown Domain";

/// Longest body excerpt quoted in an error message.
const BODY_EXCERPT_CHARS: usize = 200;

/// Loose Gallery GraphQL client bound to one credential.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct LooseGalleryClient {
    inner: Arc<LooseGalleryClientInner>,
}

struct LooseGalleryClientInner {
    http: reqwest::Client,
    endpoint: Url,
    credential: String,
    api_key: SecretString,
    lock_capability: LockCapability,
    editor: EditorConfig,
}

impl std::fmt::Debug for LooseGalleryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LooseGalleryClient")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("credential", &self.inner.credential)
            .field("api_key", &"[REDACTED]")
            .field("lock_capability", &self.inner.lock_capability)
            .finish_non_exhaustive()
    }
}

impl LooseGalleryClient {
    /// Create a client for one credential.
    ///
    /// # Errors
    ///
    /// Returns `ApiErrorKind::Transport` if the HTTP client cannot be built.
    pub fn new(
        api: &ApiConfig,
        editor: &EditorConfig,
        credential: &ApiCredential,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(api.timeout).build()?;

        Ok(Self {
            inner: Arc::new(LooseGalleryClientInner {
                http,
                endpoint: api.endpoint.clone(),
                credential: credential.name.clone(),
                api_key: credential.api_key.clone(),
                lock_capability: api.lock_capability,
                editor: editor.clone(),
            }),
        })
    }

    /// Name of the credential this client uses.
    #[must_use]
    pub fn credential(&self) -> &str {
        &self.inner.credential
    }

    /// Execute a GraphQL operation.
    ///
    /// # Errors
    ///
    /// See [`classify_response`]; additionally `Unauthorized` when no API key
    /// is configured and `Transport` on network failures.
    #[instrument(skip(self, query, variables), fields(credential = %self.inner.credential))]
    pub async fn execute<V, T>(
        &self,
        operation_name: &'static str,
        query: &'static str,
        variables: V,
    ) -> Result<T, ApiError>
    where
        V: Serialize + Send,
        T: DeserializeOwned,
    {
        let api_key = self.inner.api_key.expose_secret();
        if api_key.trim().is_empty() {
            return Err(ApiError::new(
                ApiErrorKind::Unauthorized,
                "API key is required",
            ));
        }

        let body = QueryBody {
            variables,
            query,
            operation_name,
        };

        let response = self
            .inner
            .http
            .post(self.inner.endpoint.clone())
            .header("x-api-key", api_key)
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        debug!(status, bytes = text.len(), "GraphQL response received");

        classify_response(status, &text)
    }
}

impl DesignApi for LooseGalleryClient {
    #[instrument(skip(self), fields(credential = %self.inner.credential))]
    async fn test_connection(&self) -> Result<DomainInfo, ApiError> {
        let data: GetDomainData = self
            .execute("GetDomain", GET_DOMAIN, serde_json::json!({}))
            .await?;

        let domain = data.domain.ok_or_else(|| {
            ApiError::new(ApiErrorKind::ProtocolError, "Failed to connect to API")
        })?;

        Ok(DomainInfo {
            id: domain.id,
            name: domain
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_DOMAIN.to_string()),
        })
    }

    #[instrument(skip(self, serial, size), fields(serial = %serial, %size))]
    async fn get_design_preview(
        &self,
        serial: &Serial,
        size: PreviewSize,
    ) -> Result<DesignPreview, ApiError> {
        let variables = AssetVariables {
            serial: serial.as_str(),
        };
        let data: GetAssetData = self
            .execute("GetAsset", GET_ASSET_PREVIEW, variables)
            .await?;

        let asset = data.asset.ok_or_else(|| design_not_found(serial))?;
        Ok(DesignPreview {
            preview_url: asset.preview_url,
            thumbnail_url: asset.thumbnail_url,
        })
    }

    #[instrument(skip(self, serial), fields(serial = %serial))]
    async fn get_design_info(&self, serial: &Serial) -> Result<DesignInfo, ApiError> {
        let variables = AssetVariables {
            serial: serial.as_str(),
        };
        let data: GetAssetData = self.execute("GetAsset", GET_ASSET, variables).await?;

        let asset = data.asset.ok_or_else(|| design_not_found(serial))?;
        Ok(DesignInfo {
            serial: serial.clone(),
            locked: asset.locked.unwrap_or(false),
            preview: DesignPreview {
                preview_url: asset.preview_url,
                thumbnail_url: asset.thumbnail_url,
            },
        })
    }

    #[instrument(
        skip(self, serial, spec),
        fields(serial = %serial, width = spec.width, height = spec.height, format = %spec.format)
    )]
    async fn request_high_res_image(
        &self,
        serial: &Serial,
        spec: &ImageSpec,
    ) -> Result<RenderRequest, ApiError> {
        let data: RequestImageData = self
            .execute("RequestImage", REQUEST_IMAGE, image_variables(serial, spec))
            .await?;

        let node = data.request_image.ok_or_else(|| {
            ApiError::new(
                ApiErrorKind::ProtocolError,
                "Render request was not acknowledged",
            )
        })?;

        if node.accepted == Some(false) {
            return Err(ApiError::new(
                ApiErrorKind::Unknown,
                format!("Render request for design {serial} was rejected"),
            ));
        }

        info!(request_id = ?node.request_id, "High-resolution render requested");
        Ok(RenderRequest {
            accepted: true,
            request_id: node.request_id,
        })
    }

    #[instrument(skip(self, serial, spec), fields(serial = %serial))]
    async fn poll_image_status(
        &self,
        serial: &Serial,
        spec: &ImageSpec,
    ) -> Result<ImageStatus, ApiError> {
        let data: ImageStatusData = self
            .execute("ImageStatus", IMAGE_STATUS, image_variables(serial, spec))
            .await?;

        let node = data.image_status.ok_or_else(|| design_not_found(serial))?;
        image_status_from_node(node)
    }

    #[instrument(skip(self, serial), fields(serial = %serial))]
    async fn lock_design(&self, serial: &Serial) -> Result<LockOutcome, ApiError> {
        if self.inner.lock_capability == LockCapability::LocalOnly {
            info!(mode = "local", "Design locked locally; remote API has no lock");
            return Ok(LockOutcome::LocalOnly);
        }

        let data: LockAssetData = self
            .execute(
                "LockAsset",
                LOCK_ASSET,
                SerialVariables {
                    serial: serial.as_str(),
                },
            )
            .await?;

        let node = data.lock_asset.ok_or_else(|| design_not_found(serial))?;
        if node.locked == Some(false) {
            return Err(ApiError::new(
                ApiErrorKind::ProtocolError,
                format!("Design {serial} was not locked"),
            ));
        }

        info!(mode = "remote", "Design locked");
        Ok(LockOutcome::Remote)
    }

    fn build_editor_url(&self, request: &EditorRequest) -> String {
        build_editor_url(
            &self.inner.editor,
            Some(self.inner.api_key.expose_secret()),
            request,
        )
    }
}

// =============================================================================
// Response Handling
// =============================================================================

/// Turn a raw HTTP response into data or a classified error.
///
/// - non-empty `errors` → `ProtocolError`, or `Unauthorized` / `NotFound`
///   when the status or an `extensions.code` says so
/// - 401/403 → `Unauthorized`, 404 → `NotFound`, other non-2xx → `Unknown`
/// - 2xx without usable `data` → `ProtocolError`
///
/// # Errors
///
/// Returns the classified `ApiError` for any non-success response.
pub fn classify_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ApiError> {
    let parsed: Option<Response<serde_json::Value>> = serde_json::from_str(body).ok();

    if let Some(errors) = parsed
        .as_ref()
        .and_then(|r| r.errors.as_ref())
        .filter(|e| !e.is_empty())
    {
        let messages: Vec<String> = errors.iter().map(|e| e.message.clone()).collect();
        let codes: Vec<&str> = errors
            .iter()
            .filter_map(|e| e.extensions.as_ref())
            .filter_map(|ext| ext.get("code").and_then(serde_json::Value::as_str))
            .collect();

        let kind = if matches!(status, 401 | 403)
            || codes
                .iter()
                .any(|c| matches!(*c, "UNAUTHENTICATED" | "FORBIDDEN"))
        {
            ApiErrorKind::Unauthorized
        } else if status == 404 || codes.contains(&"NOT_FOUND") {
            ApiErrorKind::NotFound
        } else {
            ApiErrorKind::ProtocolError
        };

        return Err(ApiError::new(kind, format_graphql_errors(&messages)).with_status(status));
    }

    if !(200..300).contains(&status) {
        let kind = match status {
            401 | 403 => ApiErrorKind::Unauthorized,
            404 => ApiErrorKind::NotFound,
            _ => ApiErrorKind::Unknown,
        };
        return Err(ApiError::new(kind, http_failure_message(status, body)).with_status(status));
    }

    let Some(response) = parsed else {
        return Err(
            ApiError::new(ApiErrorKind::ProtocolError, "Invalid JSON response").with_status(status),
        );
    };

    match response.data {
        Some(data) if !data.is_null() => serde_json::from_value(data).map_err(|e| {
            ApiError::new(
                ApiErrorKind::ProtocolError,
                format!("Unexpected response shape: {e}"),
            )
            .with_status(status)
        }),
        _ => Err(
            ApiError::new(ApiErrorKind::ProtocolError, "Response contained no data")
                .with_status(status),
        ),
    }
}

/// Message for a non-2xx response without GraphQL errors.
fn http_failure_message(status: u16, body: &str) -> String {
    let base = format!("API request failed with status {status}");
    let decoded: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        decoded
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    };

    if let Some(error) = field("error") {
        format!("{base}: {error}")
    } else if let Some(message) = field("message") {
        message
    } else if body.trim().is_empty() {
        base
    } else {
        let excerpt: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
        format!("{base}: {excerpt}")
    }
}

fn design_not_found(serial: &Serial) -> ApiError {
    ApiError::not_found(format!("Design {serial} not found"))
}

fn image_variables<'a>(serial: &'a Serial, spec: &ImageSpec) -> ImageVariables<'a> {
    ImageVariables {
        serial: serial.as_str(),
        width: spec.width,
        height: spec.height,
        format: spec.format.to_string(),
        dpi: spec.dpi,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn image_status_from_node(node: ImageStatusNode) -> Result<ImageStatus, ApiError> {
    match node.status.to_ascii_uppercase().as_str() {
        "PENDING" | "QUEUED" => Ok(ImageStatus::Pending),
        "IN_PROGRESS" | "PROCESSING" => Ok(ImageStatus::InProgress {
            percent: node.progress.unwrap_or(0.0).clamp(0.0, 100.0).round() as u8,
        }),
        "READY" | "COMPLETED" => node.url.map(|url| ImageStatus::Ready { url }).ok_or_else(|| {
            ApiError::new(
                ApiErrorKind::ProtocolError,
                "Render reported ready without a URL",
            )
        }),
        "FAILED" | "ERROR" => Ok(ImageStatus::Failed { reason: node.error }),
        other => Err(ApiError::new(
            ApiErrorKind::ProtocolError,
            format!("Unknown image status: {other}"),
        )),
    }
}
