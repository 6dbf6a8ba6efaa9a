//! Cart lines carrying design snapshots.

use chrono::{DateTime, Utc};
use loose_gallery_core::{CartLineKey, ProductId, Serial};
use serde::{Deserialize, Serialize};

use crate::api::DesignPreview;
use crate::error::DesignError;
use crate::store::DesignRecord;

/// Shown when a cart with designs is submitted without the copyright box.
pub const COPYRIGHT_AGREEMENT_REQUIRED: &str =
    "You must agree to the copyright terms to proceed with your custom design order.";

/// Design snapshot attached to one cart line.
///
/// A copy, not a reference: later store writes never change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineBinding {
    pub cart_line_key: CartLineKey,
    pub product_id: ProductId,
    pub serial: Serial,
    pub preview_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub bound_at: DateTime<Utc>,
}

impl CartLineBinding {
    /// Snapshot a design record under a fresh line key.
    #[must_use]
    pub fn snapshot(record: &DesignRecord) -> Self {
        Self {
            cart_line_key: CartLineKey::generate(),
            product_id: record.product_id,
            serial: record.serial.clone(),
            preview_url: record.preview_url.clone(),
            thumbnail_url: record.thumbnail_url.clone(),
            bound_at: Utc::now(),
        }
    }

    /// Point the binding at a re-edited design.
    pub fn rebind(&mut self, serial: Serial, preview: &DesignPreview) {
        self.serial = serial;
        self.preview_url.clone_from(&preview.preview_url);
        self.thumbnail_url.clone_from(&preview.thumbnail_url);
        self.bound_at = Utc::now();
    }
}

/// Bind the visitor's current design to a new cart line.
///
/// Returns `None` (a plain line) when there is no design for this product.
#[must_use]
pub fn bind_on_add_to_cart(
    product_id: ProductId,
    design: Option<&DesignRecord>,
) -> Option<CartLineBinding> {
    design
        .filter(|record| record.product_id == product_id)
        .map(CartLineBinding::snapshot)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub key: CartLineKey,
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub design: Option<CartLineBinding>,
}

impl CartLine {
    /// Whether the line carries a design.
    #[must_use]
    pub const fn is_customized(&self) -> bool {
        self.design.is_some()
    }

    /// Update this line's design in place. No-op for plain lines.
    pub fn rebind(&mut self, serial: Serial, preview: &DesignPreview) -> bool {
        match self.design.as_mut() {
            Some(binding) => {
                binding.rebind(serial, preview);
                true
            }
            None => false,
        }
    }
}

/// A visitor's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a line and return its key.
    ///
    /// Customized lines are always separate, even for the same product.
    /// Plain lines of the same product merge their quantities.
    pub fn add_line(
        &mut self,
        product_id: ProductId,
        name: impl Into<String>,
        quantity: u32,
        design: Option<CartLineBinding>,
    ) -> CartLineKey {
        if design.is_none()
            && let Some(existing) = self
                .lines
                .iter_mut()
                .find(|l| l.product_id == product_id && l.design.is_none())
        {
            existing.quantity = existing.quantity.saturating_add(quantity);
            return existing.key;
        }

        let key = design
            .as_ref()
            .map_or_else(CartLineKey::generate, |b| b.cart_line_key);
        self.lines.push(CartLine {
            key,
            product_id,
            name: name.into(),
            quantity,
            design,
        });
        key
    }

    #[must_use]
    pub fn line(&self, key: CartLineKey) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.key == key)
    }

    pub fn line_mut(&mut self, key: CartLineKey) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| l.key == key)
    }

    /// Remove a line, returning it.
    pub fn remove_line(&mut self, key: CartLineKey) -> Option<CartLine> {
        let index = self.lines.iter().position(|l| l.key == key)?;
        Some(self.lines.remove(index))
    }

    /// Whether any line carries a design.
    #[must_use]
    pub fn has_designs(&self) -> bool {
        self.lines.iter().any(CartLine::is_customized)
    }

    /// Serials of all customized lines, in line order.
    #[must_use]
    pub fn design_serials(&self) -> Vec<&Serial> {
        self.lines
            .iter()
            .filter_map(|l| l.design.as_ref().map(|b| &b.serial))
            .collect()
    }
}

/// Whether checkout must show the copyright agreement.
#[must_use]
pub fn checkout_requires_agreement(cart: &Cart) -> bool {
    cart.has_designs()
}

/// Reject checkout of custom designs without the copyright agreement.
///
/// # Errors
///
/// Returns `DesignError::InvalidInput` when the cart has designs and the
/// agreement was not given.
pub fn validate_copyright_agreement(cart: &Cart, agreed: bool) -> Result<(), DesignError> {
    if checkout_requires_agreement(cart) && !agreed {
        return Err(DesignError::InvalidInput(
            COPYRIGHT_AGREEMENT_REQUIRED.to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use loose_gallery_core::{OwnerId, VisitorToken};

    use super::*;

    fn record(product: i64, serial: &str) -> DesignRecord {
        let mut record = DesignRecord::new(
            OwnerId::Visitor(VisitorToken::generate()),
            ProductId::new(product),
            Serial::parse(serial).unwrap(),
            serde_json::Map::new(),
            Utc::now(),
        );
        record.preview_url = Some(format!("https://cdn.example/{serial}.png"));
        record
    }

    #[test]
    fn test_bind_requires_matching_design() {
        let product = ProductId::new(42);
        assert!(bind_on_add_to_cart(product, None).is_none());
        assert!(bind_on_add_to_cart(product, Some(&record(7, "DSX00007"))).is_none());

        let binding = bind_on_add_to_cart(product, Some(&record(42, "DSX123456"))).unwrap();
        assert_eq!(binding.serial.as_str(), "DSX123456");
        assert_eq!(
            binding.preview_url.as_deref(),
            Some("https://cdn.example/DSX123456.png")
        );
    }

    #[test]
    fn test_binding_is_a_snapshot() {
        let mut source = record(42, "DSX00001");
        let binding = CartLineBinding::snapshot(&source);

        source.serial = Serial::parse("DSX00002").unwrap();
        source.preview_url = None;

        assert_eq!(binding.serial.as_str(), "DSX00001");
        assert!(binding.preview_url.is_some());
    }

    #[test]
    fn test_customized_lines_never_collapse() {
        let mut cart = Cart::new();
        let design = record(42, "DSX00001");

        let a = cart.add_line(
            ProductId::new(42),
            "Poster",
            1,
            bind_on_add_to_cart(ProductId::new(42), Some(&design)),
        );
        let b = cart.add_line(
            ProductId::new(42),
            "Poster",
            1,
            bind_on_add_to_cart(ProductId::new(42), Some(&design)),
        );

        assert_ne!(a, b);
        assert_eq!(cart.lines.len(), 2);
    }

    #[test]
    fn test_plain_lines_merge_quantity() {
        let mut cart = Cart::new();
        let a = cart.add_line(ProductId::new(5), "Mug", 1, None);
        let b = cart.add_line(ProductId::new(5), "Mug", 2, None);

        assert_eq!(a, b);
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.line(a).unwrap().quantity, 3);
    }

    #[test]
    fn test_rebind_updates_one_line() {
        let mut cart = Cart::new();
        let design = record(42, "DSX00001");
        let a = cart.add_line(
            ProductId::new(42),
            "Poster",
            1,
            bind_on_add_to_cart(ProductId::new(42), Some(&design)),
        );
        let b = cart.add_line(
            ProductId::new(42),
            "Poster",
            1,
            bind_on_add_to_cart(ProductId::new(42), Some(&design)),
        );

        let rebound = cart
            .line_mut(a)
            .unwrap()
            .rebind(Serial::parse("DSX00009").unwrap(), &DesignPreview::default());
        assert!(rebound);

        assert_eq!(cart.design_serials()[0].as_str(), "DSX00009");
        assert_eq!(
            cart.line(b).unwrap().design.as_ref().unwrap().serial.as_str(),
            "DSX00001"
        );
    }

    #[test]
    fn test_copyright_gate() {
        let mut cart = Cart::new();
        cart.add_line(ProductId::new(5), "Mug", 1, None);
        assert!(!checkout_requires_agreement(&cart));
        assert!(validate_copyright_agreement(&cart, false).is_ok());

        let design = record(42, "DSX00001");
        cart.add_line(
            ProductId::new(42),
            "Poster",
            1,
            bind_on_add_to_cart(ProductId::new(42), Some(&design)),
        );
        assert!(cart.has_designs());

        let err = validate_copyright_agreement(&cart, false).unwrap_err();
        assert_eq!(err.to_string(), COPYRIGHT_AGREEMENT_REQUIRED);
        assert!(validate_copyright_agreement(&cart, true).is_ok());
    }

    #[test]
    fn test_remove_line() {
        let mut cart = Cart::new();
        let key = cart.add_line(ProductId::new(5), "Mug", 1, None);
        assert!(cart.remove_line(key).is_some());
        assert!(cart.remove_line(key).is_none());
        assert!(cart.lines.is_empty());
    }
}
