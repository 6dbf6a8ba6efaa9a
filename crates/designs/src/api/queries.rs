//! GraphQL documents and wire types for the Loose Gallery API.
//!
//! Documents are sent verbatim inside a `graphql_client::QueryBody`; the
//! response `data` is deserialized into the `*Data` types below.

use serde::{Deserialize, Serialize};

// =============================================================================
// Domain
// =============================================================================

pub const GET_DOMAIN: &str = r"
    query GetDomain {
        domain {
            id
            name
        }
    }
";

#[derive(Debug, Clone, Deserialize)]
pub struct GetDomainData {
    pub domain: Option<DomainNode>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DomainNode {
    pub id: Option<String>,
    pub name: Option<String>,
}

// =============================================================================
// Assets (designs)
// =============================================================================

/// The API serves a single preview rendition; size hints stay client-side.
pub const GET_ASSET_PREVIEW: &str = r"
    query GetAsset($serial: String!) {
        asset(serial: $serial) {
            serial
            previewUrl
            thumbnailUrl
        }
    }
";

pub const GET_ASSET: &str = r"
    query GetAsset($serial: String!) {
        asset(serial: $serial) {
            serial
            locked
            previewUrl
            thumbnailUrl
        }
    }
";

#[derive(Debug, Clone, Serialize)]
pub struct AssetVariables<'a> {
    pub serial: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetAssetData {
    pub asset: Option<AssetNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetNode {
    pub serial: Option<String>,
    #[serde(default)]
    pub locked: Option<bool>,
    pub preview_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

// =============================================================================
// Locking
// =============================================================================

pub const LOCK_ASSET: &str = r"
    mutation LockAsset($serial: String!) {
        lockAsset(serial: $serial) {
            serial
            locked
        }
    }
";

#[derive(Debug, Clone, Serialize)]
pub struct SerialVariables<'a> {
    pub serial: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockAssetData {
    pub lock_asset: Option<LockAssetNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockAssetNode {
    pub serial: Option<String>,
    pub locked: Option<bool>,
}

// =============================================================================
// High-resolution renders
// =============================================================================

pub const REQUEST_IMAGE: &str = r"
    mutation RequestImage(
        $serial: String!
        $width: Int!
        $height: Int!
        $format: ImageFormat!
        $dpi: Int!
    ) {
        requestImage(
            serial: $serial
            width: $width
            height: $height
            format: $format
            dpi: $dpi
        ) {
            accepted
            requestId
        }
    }
";

pub const IMAGE_STATUS: &str = r"
    query ImageStatus(
        $serial: String!
        $width: Int!
        $height: Int!
        $format: ImageFormat!
        $dpi: Int!
    ) {
        imageStatus(
            serial: $serial
            width: $width
            height: $height
            format: $format
            dpi: $dpi
        ) {
            status
            progress
            url
            error
        }
    }
";

#[derive(Debug, Clone, Serialize)]
pub struct ImageVariables<'a> {
    pub serial: &'a str,
    pub width: u32,
    pub height: u32,
    /// `PNG`, `JPG` or `PDF`.
    pub format: String,
    pub dpi: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestImageData {
    pub request_image: Option<RequestImageNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestImageNode {
    #[serde(default)]
    pub accepted: Option<bool>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStatusData {
    pub image_status: Option<ImageStatusNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageStatusNode {
    /// `PENDING`, `IN_PROGRESS`, `READY` or `FAILED`.
    pub status: String,
    pub progress: Option<f64>,
    pub url: Option<String>,
    pub error: Option<String>,
}
