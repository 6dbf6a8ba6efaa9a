//! Return from the external editor.
//!
//! The editor redirects the visitor back with the serial of the design they
//! just saved. The handshake validates it, works out which product it belongs
//! to and records it in the design store.
//!
//! # Product resolution
//!
//! 1. An explicit `productId` / `product_id` parameter
//! 2. The pending-edit marker stashed when the editor link was generated
//! 3. The template-keyed marker of any customizable product (latest wins)

use std::time::Duration;

use chrono::{DateTime, Utc};
use loose_gallery_core::{
    CartLineKey, PreviewSize, ProductId, Serial, SerialError, Visitor, VisitorToken,
};
use moka::future::Cache;
use tracing::{debug, info, instrument, warn};

use crate::DesignLifecycle;
use crate::api::DesignApi;
use crate::cart::Cart;
use crate::catalog::ProductDesignConfig;
use crate::error::DesignError;
use crate::store::DesignRecord;

/// Parameters that may carry the returned serial, in order of preference.
pub const SERIAL_PARAM_NAMES: [&str; 3] = ["productSerial", "design_serial", "p"];

/// Parameters that may carry the echoed product id, in order of preference.
pub const PRODUCT_PARAM_NAMES: [&str; 2] = ["productId", "product_id"];

/// Marker the return URL carries.
pub const RETURN_MARKER_PARAM: &str = "lg_return";

/// Lifetime of pending-edit and template markers.
pub const PENDING_EDIT_TTL: Duration = Duration::from_secs(60 * 60);

const MAX_PENDING_EDITS: u64 = 100_000;

// =============================================================================
// Return parameters
// =============================================================================

/// Query parameters of an editor return request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReturnParams {
    pairs: Vec<(String, String)>,
}

impl ReturnParams {
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse a raw query string (without the leading `?`).
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()).into_owned())
    }

    /// First non-empty, trimmed value of a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.trim())
            .find(|v| !v.is_empty())
    }

    /// The returned serial, unvalidated.
    #[must_use]
    pub fn serial(&self) -> Option<&str> {
        SERIAL_PARAM_NAMES.iter().find_map(|name| self.get(name))
    }

    /// The echoed product id, if it is a positive integer.
    #[must_use]
    pub fn product_id(&self) -> Option<ProductId> {
        PRODUCT_PARAM_NAMES
            .iter()
            .filter_map(|name| self.get(name))
            .filter_map(|raw| raw.parse::<ProductId>().ok())
            .find(|id| id.as_i64() > 0)
    }

    /// Whether the URL carries `lg_return=1`.
    #[must_use]
    pub fn is_marked_return(&self) -> bool {
        self.get(RETURN_MARKER_PARAM) == Some("1")
    }
}

// =============================================================================
// Pending edits
// =============================================================================

/// Marker stashed when an editor link is handed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    pub product_id: ProductId,
    pub template_serial: Serial,
    /// Cart line being re-edited, if any.
    pub editing: Option<CartLineKey>,
    pub created_at: DateTime<Utc>,
}

/// Template-keyed marker used when the visitor's own marker is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateStash {
    pub product_id: ProductId,
    pub stashed_at: DateTime<Utc>,
}

/// Short-lived editor markers.
#[derive(Clone)]
pub struct PendingEdits {
    by_visitor: Cache<VisitorToken, PendingEdit>,
    by_template: Cache<Serial, TemplateStash>,
}

impl std::fmt::Debug for PendingEdits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingEdits")
            .field("visitors", &self.by_visitor.entry_count())
            .field("templates", &self.by_template.entry_count())
            .finish()
    }
}

impl Default for PendingEdits {
    fn default() -> Self {
        Self::new(PENDING_EDIT_TTL)
    }
}

impl PendingEdits {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            by_visitor: Cache::builder()
                .max_capacity(MAX_PENDING_EDITS)
                .time_to_live(ttl)
                .build(),
            by_template: Cache::builder()
                .max_capacity(MAX_PENDING_EDITS)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Remember which product a visitor is designing.
    pub async fn stash(&self, token: &VisitorToken, edit: PendingEdit) {
        self.by_template
            .insert(
                edit.template_serial.clone(),
                TemplateStash {
                    product_id: edit.product_id,
                    stashed_at: edit.created_at,
                },
            )
            .await;
        self.by_visitor.insert(token.clone(), edit).await;
    }

    /// The visitor's marker, without consuming it.
    pub async fn peek(&self, token: &VisitorToken) -> Option<PendingEdit> {
        self.by_visitor.get(token).await
    }

    /// Consume the visitor's marker.
    pub async fn take(&self, token: &VisitorToken) -> Option<PendingEdit> {
        self.by_visitor.remove(token).await
    }

    pub async fn template_product(&self, template: &Serial) -> Option<TemplateStash> {
        self.by_template.get(template).await
    }

    pub async fn forget_template(&self, template: &Serial) {
        self.by_template.invalidate(template).await;
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// Result of handling a (possible) editor return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnOutcome {
    /// No serial present. `marked` is set when the URL still claimed to be a
    /// return (`lg_return=1`).
    NotAReturn { marked: bool },
    InvalidSerial(SerialError),
    ProductNotFound,
    SavedNewDesign {
        product_id: ProductId,
        record: DesignRecord,
    },
    UpdatedExistingLine {
        product_id: ProductId,
        cart_line_key: CartLineKey,
        record: DesignRecord,
    },
}

impl ReturnOutcome {
    /// Notice to show the visitor, if any.
    #[must_use]
    pub const fn notice(&self) -> Option<&'static str> {
        match self {
            Self::NotAReturn { marked: false } => None,
            Self::NotAReturn { marked: true } => {
                Some("No design found. Please try customizing the product again.")
            }
            Self::InvalidSerial(_) => Some("Invalid design serial number."),
            Self::ProductNotFound => Some("Product not found. Please try again."),
            Self::SavedNewDesign { .. } | Self::UpdatedExistingLine { .. } => Some(
                "Your design has been saved! You can now add this customized product to your cart.",
            ),
        }
    }

    /// Whether a design was stored.
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        matches!(
            self,
            Self::SavedNewDesign { .. } | Self::UpdatedExistingLine { .. }
        )
    }
}

// =============================================================================
// Handler
// =============================================================================

impl<A: DesignApi> DesignLifecycle<A> {
    /// Handle a request that may be a return from the editor.
    ///
    /// The visitor's pending marker is consumed whenever a serial is present,
    /// whatever the outcome. Preview lookup failures are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::Store` if the design cannot be persisted.
    #[instrument(skip(self, params, visitor, cart), fields(owner = %visitor.owner()))]
    pub async fn handle_return(
        &self,
        params: &ReturnParams,
        visitor: &Visitor,
        cart: Option<&mut Cart>,
    ) -> Result<ReturnOutcome, DesignError> {
        let Some(raw_serial) = params.serial() else {
            return Ok(ReturnOutcome::NotAReturn {
                marked: params.is_marked_return(),
            });
        };

        let pending = self.pending().take(&visitor.token).await;

        let serial = match Serial::parse(raw_serial) {
            Ok(serial) => serial,
            Err(e) => {
                warn!(error = %e, "Editor returned an invalid serial");
                return Ok(ReturnOutcome::InvalidSerial(e));
            }
        };

        let Some((product, via_template)) = self.resolve_product(params, pending.as_ref()).await
        else {
            warn!(%serial, "Could not resolve product for returned design");
            return Ok(ReturnOutcome::ProductNotFound);
        };
        let product_id = product.product_id;

        if let Some(template) = via_template {
            self.pending().forget_template(&template).await;
        }

        let mut extra = serde_json::Map::new();
        extra.insert(
            "returned_at".to_string(),
            serde_json::Value::String(Utc::now().to_rfc3339()),
        );
        if let Some(account) = visitor.account {
            extra.insert("user_id".to_string(), serde_json::Value::from(account.as_i64()));
        }

        let mut record = self
            .store()
            .save(visitor, product_id, serial.clone(), extra)
            .await?;
        info!(%product_id, %serial, "Design saved from editor return");

        if let Some(client) = self.clients().for_product(&product) {
            match client.get_design_preview(&serial, PreviewSize::Medium).await {
                Ok(preview) => {
                    if let Some(updated) = self
                        .store()
                        .attach_preview(visitor, product_id, &serial, &preview)
                        .await?
                    {
                        record = updated;
                    }
                }
                Err(e) => warn!(%serial, error = %e, "Failed to fetch design preview"),
            }
        }

        let editing = pending
            .filter(|p| p.product_id == product_id)
            .and_then(|p| p.editing);
        if let (Some(key), Some(cart)) = (editing, cart)
            && let Some(line) = cart.line_mut(key)
            && line.rebind(serial.clone(), &record.preview())
        {
            debug!(cart_line_key = %key, "Rebound cart line to edited design");
            return Ok(ReturnOutcome::UpdatedExistingLine {
                product_id,
                cart_line_key: key,
                record,
            });
        }

        Ok(ReturnOutcome::SavedNewDesign { product_id, record })
    }

    /// Find the product a returned design belongs to.
    ///
    /// The second element is the template whose marker was used, if any.
    async fn resolve_product(
        &self,
        params: &ReturnParams,
        pending: Option<&PendingEdit>,
    ) -> Option<(ProductDesignConfig, Option<Serial>)> {
        let explicit = params
            .product_id()
            .or_else(|| pending.map(|p| p.product_id));
        if let Some(product_id) = explicit {
            return self
                .catalog()
                .product(product_id)
                .filter(ProductDesignConfig::is_customizable)
                .map(|p| (p, None));
        }

        let mut best: Option<(TemplateStash, ProductDesignConfig, Serial)> = None;
        for product in self.catalog().customizable_products() {
            let Some(template) = product.template_serial.clone() else {
                continue;
            };
            let Some(stash) = self.pending().template_product(&template).await else {
                continue;
            };
            if stash.product_id != product.product_id {
                continue;
            }
            if best
                .as_ref()
                .is_none_or(|(current, _, _)| stash.stashed_at > current.stashed_at)
            {
                best = Some((stash, product, template));
            }
        }

        best.map(|(_, product, template)| (product, Some(template)))
    }
}
