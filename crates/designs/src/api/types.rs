//! Domain types returned by the API client.

use loose_gallery_core::{ImageFormat, LockMode, Serial};
use serde::{Deserialize, Serialize};

/// Account/domain a credential belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainInfo {
    pub id: Option<String>,
    /// Human-readable name; `"Unknown Domain"` when the API omits it.
    pub name: String,
}

/// Rendering URLs for a design.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DesignPreview {
    pub preview_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl DesignPreview {
    /// Whether the API returned any URL at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.preview_url.is_none() && self.thumbnail_url.is_none()
    }
}

/// Remote state of a design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignInfo {
    pub serial: Serial,
    /// Whether the editor service refuses further edits.
    pub locked: bool,
    pub preview: DesignPreview,
}

/// Parameters of a high-resolution render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub dpi: u32,
}

/// Acknowledgement of a render request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub accepted: bool,
    pub request_id: Option<String>,
}

/// Result of a successful lock call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockOutcome {
    /// The editor service locked the design.
    Remote,
    /// Remote locking is not available; the design is locked locally only.
    LocalOnly,
}

impl LockOutcome {
    /// The lock mode recorded on order lines.
    #[must_use]
    pub const fn mode(self) -> LockMode {
        match self {
            Self::Remote => LockMode::Remote,
            Self::LocalOnly => LockMode::LocalOnly,
        }
    }
}
