//! Integration tests for the Loose Gallery design lifecycle.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory scenarios and the canned-response API server
//! cargo test -p loose-gallery-integration-tests
//!
//! # Durable tier tests (need a database)
//! LOOSEGALLERY_DATABASE_URL=postgres://... cargo test -p loose-gallery-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `design_lifecycle` - Editor return, cart, checkout and locking scenarios
//! - `design_store` - Tier merge, hydrate and reap through the lifecycle
//! - `graphql_client` - The HTTP client against a canned GraphQL server
//! - `postgres_tier` - The `PostgreSQL` account tier

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use loose_gallery_core::{
    AccountId, ImageStatus, PreviewSize, ProductId, Serial, Visitor, VisitorToken,
};
use loose_gallery_designs::api::{
    ApiError, DesignInfo, DesignPreview, DomainInfo, EditorRequest, ImageSpec, LockOutcome,
    RenderRequest,
};
use loose_gallery_designs::config::LockTriggers;
use loose_gallery_designs::{
    ApiClients, DesignApi, DesignLifecycle, DesignStore, ProductDesignConfig, StaticCatalog,
};

/// Product with a template in the fixture catalog.
pub const POSTER: ProductId = ProductId::new(42);
/// Second customizable product.
pub const CANVAS: ProductId = ProductId::new(43);
/// Product without personalization.
pub const MUG: ProductId = ProductId::new(5);

pub const POSTER_TEMPLATE: &str = "TPL0042";
pub const CANVAS_TEMPLATE: &str = "TPL0043";

// =============================================================================
// API double
// =============================================================================

#[derive(Debug, Default)]
struct Calls {
    previews: AtomicUsize,
    locks: AtomicUsize,
    offline: AtomicBool,
}

/// In-process `DesignApi` that counts calls.
///
/// Clones share their counters, so a test can keep a handle after moving the
/// double into a lifecycle. While offline every remote call fails with a
/// transport error.
#[derive(Debug, Clone, Default)]
pub struct RecordingApi {
    calls: Arc<Calls>,
}

impl RecordingApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.calls.offline.store(offline, Ordering::SeqCst);
    }

    #[must_use]
    pub fn lock_calls(&self) -> usize {
        self.calls.locks.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn preview_calls(&self) -> usize {
        self.calls.previews.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), ApiError> {
        if self.calls.offline.load(Ordering::SeqCst) {
            return Err(ApiError::transport("connection refused"));
        }
        Ok(())
    }
}

/// Preview URL the double reports for a serial.
#[must_use]
pub fn preview_url(serial: &str) -> String {
    format!("https://cdn.loosegallery.test/{serial}/medium.png")
}

impl DesignApi for RecordingApi {
    async fn test_connection(&self) -> Result<DomainInfo, ApiError> {
        self.check_online()?;
        Ok(DomainInfo {
            id: Some("dom-1".to_string()),
            name: "Test Domain".to_string(),
        })
    }

    async fn get_design_preview(
        &self,
        serial: &Serial,
        _size: PreviewSize,
    ) -> Result<DesignPreview, ApiError> {
        self.calls.previews.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(DesignPreview {
            preview_url: Some(preview_url(serial.as_str())),
            thumbnail_url: Some(format!(
                "https://cdn.loosegallery.test/{serial}/thumbnail.png"
            )),
        })
    }

    async fn get_design_info(&self, serial: &Serial) -> Result<DesignInfo, ApiError> {
        self.check_online()?;
        Ok(DesignInfo {
            serial: serial.clone(),
            locked: false,
            preview: DesignPreview::default(),
        })
    }

    async fn request_high_res_image(
        &self,
        _serial: &Serial,
        _spec: &ImageSpec,
    ) -> Result<RenderRequest, ApiError> {
        self.check_online()?;
        Ok(RenderRequest {
            accepted: true,
            request_id: Some("req-1".to_string()),
        })
    }

    async fn poll_image_status(
        &self,
        _serial: &Serial,
        _spec: &ImageSpec,
    ) -> Result<ImageStatus, ApiError> {
        self.check_online()?;
        Ok(ImageStatus::Pending)
    }

    async fn lock_design(&self, _serial: &Serial) -> Result<LockOutcome, ApiError> {
        self.calls.locks.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(LockOutcome::Remote)
    }

    fn build_editor_url(&self, request: &EditorRequest) -> String {
        let mut url = format!(
            "https://editor.loosegallery.test/?domain={}&template={}",
            request.domain_id, request.template
        );
        if let Some(product_id) = request.product_id {
            url.push_str(&format!("&productId={product_id}"));
        }
        if let Some(design) = &request.design {
            url.push_str(&format!("&p={design}"));
        }
        url
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Parse a serial known to be valid.
///
/// # Panics
///
/// Panics if `s` is not a valid serial.
#[must_use]
pub fn serial(s: &str) -> Serial {
    Serial::parse(s).expect("fixture serial must be valid")
}

/// Catalog with two customizable products and one plain product.
#[must_use]
pub fn catalog() -> StaticCatalog {
    StaticCatalog::new([
        ProductDesignConfig::customizable(POSTER, "Poster", "dom-1", serial(POSTER_TEMPLATE)),
        ProductDesignConfig::customizable(CANVAS, "Canvas", "dom-1", serial(CANVAS_TEMPLATE)),
        ProductDesignConfig::plain(MUG, "Mug"),
    ])
}

/// Lifecycle over an in-memory store, both lock triggers enabled.
#[must_use]
pub fn lifecycle(api: RecordingApi) -> DesignLifecycle<RecordingApi> {
    lifecycle_with_store(
        api,
        DesignStore::in_memory(std::time::Duration::from_secs(3600)),
    )
}

/// Lifecycle over a given store, e.g. one shared by two "requests".
#[must_use]
pub fn lifecycle_with_store(api: RecordingApi, store: DesignStore) -> DesignLifecycle<RecordingApi> {
    DesignLifecycle::new(
        store,
        ApiClients::new().with("default", api),
        Arc::new(catalog()),
        LockTriggers::default(),
    )
}

#[must_use]
pub fn anonymous() -> Visitor {
    Visitor::anonymous(VisitorToken::generate())
}

/// The same session after logging in.
#[must_use]
pub fn logged_in(visitor: &Visitor, account: i64) -> Visitor {
    Visitor::authenticated(visitor.token.clone(), AccountId::new(account))
}
