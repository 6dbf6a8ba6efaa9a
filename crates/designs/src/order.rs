//! Order lines carrying frozen designs, and design locking after purchase.

use chrono::{DateTime, Utc};
use loose_gallery_core::{
    FinalizeTrigger, LockMode, LockState, OrderId, OrderLineId, ProductId, Serial, Visitor,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::api::{ApiClients, DesignApi};
use crate::cart::{Cart, CartLineBinding};
use crate::catalog::Catalog;

/// Timestamp format used in order metadata.
const META_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Design frozen into an order line at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRecord {
    pub product_id: ProductId,
    pub serial: Serial,
    pub preview_url: Option<String>,
    pub ordered_at: DateTime<Utc>,
    #[serde(default)]
    pub lock: LockState,
}

impl OrderLineRecord {
    #[must_use]
    pub const fn locked_flag(&self) -> bool {
        self.lock.is_locked()
    }

    #[must_use]
    pub const fn locked_at(&self) -> Option<DateTime<Utc>> {
        self.lock.locked_at()
    }

    /// Record a successful lock. Returns `false` if already locked.
    pub fn mark_locked(&mut self, mode: LockMode, at: DateTime<Utc>) -> bool {
        if self.lock.is_locked() {
            return false;
        }
        self.lock = LockState::Locked { at, mode };
        true
    }

    /// Line item metadata as persisted on the order.
    #[must_use]
    pub fn stored_meta(&self) -> Vec<(&'static str, String)> {
        let mut meta = vec![
            ("_lg_design_serial", self.serial.to_string()),
            (
                "_lg_design_locked",
                if self.locked_flag() { "yes" } else { "no" }.to_string(),
            ),
        ];
        if let Some(url) = &self.preview_url {
            meta.push(("_lg_design_preview_url", url.clone()));
        }
        meta.push((
            "_lg_design_ordered_at",
            self.ordered_at.format(META_TIME_FORMAT).to_string(),
        ));
        if let Some(at) = self.locked_at() {
            meta.push(("_lg_design_locked_at", at.format(META_TIME_FORMAT).to_string()));
        }
        meta
    }

    /// Human-readable label/value pairs for order screens and emails.
    #[must_use]
    pub fn display_meta(&self) -> Vec<(&'static str, String)> {
        self.stored_meta()
            .into_iter()
            .map(|(key, value)| match key {
                "_lg_design_serial" => ("Design Serial", value),
                "_lg_design_locked" => (
                    "Design Locked",
                    if self.locked_flag() { "Yes" } else { "No" }.to_string(),
                ),
                "_lg_design_preview_url" => ("Design Preview", value),
                "_lg_design_ordered_at" => ("Design Ordered At", value),
                _ => ("Design Locked At", value),
            })
            .collect()
    }
}

/// Freeze a cart binding into an order line record.
#[must_use]
pub fn on_checkout_create_order_line(
    binding: &CartLineBinding,
    ordered_at: DateTime<Utc>,
) -> OrderLineRecord {
    OrderLineRecord {
        product_id: binding.product_id,
        serial: binding.serial.clone(),
        preview_url: binding.preview_url.clone(),
        ordered_at,
        lock: LockState::Unlocked,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub design: Option<OrderLineRecord>,
}

/// Timestamped audit note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNote {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Short description of a design in an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesignSummary {
    pub product_name: String,
    pub serial: Serial,
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub lines: Vec<OrderLine>,
    #[serde(default)]
    pub notes: Vec<OrderNote>,
    /// Visitor who checked out; their stored designs get the lock flag.
    #[serde(default)]
    pub buyer: Option<Visitor>,
}

impl Order {
    /// Build an order from a cart, freezing every binding.
    #[must_use]
    pub fn from_cart(id: OrderId, cart: &Cart, ordered_at: DateTime<Utc>) -> Self {
        let lines = cart
            .lines
            .iter()
            .zip(1_i64..)
            .map(|(line, line_id)| OrderLine {
                id: OrderLineId::new(line_id),
                product_id: line.product_id,
                name: line.name.clone(),
                quantity: line.quantity,
                design: line
                    .design
                    .as_ref()
                    .map(|binding| on_checkout_create_order_line(binding, ordered_at)),
            })
            .collect();

        Self {
            id,
            lines,
            notes: Vec::new(),
            buyer: None,
        }
    }

    #[must_use]
    pub fn with_buyer(mut self, visitor: &Visitor) -> Self {
        self.buyer = Some(visitor.clone());
        self
    }

    pub fn add_note(&mut self, message: impl Into<String>) {
        self.notes.push(OrderNote {
            at: Utc::now(),
            message: message.into(),
        });
    }

    #[must_use]
    pub fn has_designs(&self) -> bool {
        self.lines.iter().any(|l| l.design.is_some())
    }

    #[must_use]
    pub fn design_summaries(&self) -> Vec<DesignSummary> {
        self.lines
            .iter()
            .filter_map(|line| {
                line.design.as_ref().map(|record| DesignSummary {
                    product_name: line.name.clone(),
                    serial: record.serial.clone(),
                    locked: record.locked_flag(),
                })
            })
            .collect()
    }
}

/// A design newly locked by [`lock_order_designs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedDesign {
    pub line_id: OrderLineId,
    pub product_id: ProductId,
    pub serial: Serial,
    pub mode: LockMode,
}

/// What a finalization pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeReport {
    /// Lines locked by this pass.
    pub locked: Vec<LockedDesign>,
    /// Lines already locked before this pass.
    pub already_locked: usize,
    /// Lines whose lock call failed; still unlocked.
    pub failed: usize,
    /// Lines without a usable API credential.
    pub skipped: usize,
}

impl FinalizeReport {
    /// Whether a later trigger should try again.
    #[must_use]
    pub const fn needs_retry(&self) -> bool {
        self.failed > 0
    }
}

/// Lock every unlocked design in an order.
///
/// Already-locked lines make no remote call. Failures are recorded as order
/// notes and leave the line unlocked for the next trigger. Never fails.
#[instrument(skip(order, catalog, clients, trigger), fields(order_id = %order.id, %trigger))]
pub async fn lock_order_designs<A, C>(
    order: &mut Order,
    catalog: &C,
    clients: &ApiClients<A>,
    trigger: FinalizeTrigger,
) -> FinalizeReport
where
    A: DesignApi,
    C: Catalog + ?Sized,
{
    let mut report = FinalizeReport::default();
    let mut notes = Vec::new();

    for line in &mut order.lines {
        let Some(record) = line.design.as_mut() else {
            continue;
        };
        if record.locked_flag() {
            report.already_locked += 1;
            continue;
        }

        let client = catalog
            .product(record.product_id)
            .and_then(|product| clients.for_product(&product));
        let Some(client) = client else {
            warn!(
                product_id = %record.product_id,
                serial = %record.serial,
                "No API credential for product; design not locked"
            );
            report.skipped += 1;
            continue;
        };

        match client.lock_design(&record.serial).await {
            Ok(outcome) => {
                let mode = outcome.mode();
                record.mark_locked(mode, Utc::now());
                info!(serial = %record.serial, %mode, "Design locked");
                notes.push(format!(
                    "Design {} has been locked and can no longer be edited.",
                    record.serial
                ));
                report.locked.push(LockedDesign {
                    line_id: line.id,
                    product_id: record.product_id,
                    serial: record.serial.clone(),
                    mode,
                });
            }
            Err(e) => {
                warn!(serial = %record.serial, error = %e, "Failed to lock design");
                notes.push(format!(
                    "Failed to lock design {}: {}",
                    record.serial, e.message
                ));
                report.failed += 1;
            }
        }
    }

    for note in notes {
        order.add_note(note);
    }
    report
}
