//! Per-product design configuration.
//!
//! The host platform owns the product catalog; this crate only needs to know
//! which products can be personalized and how to open the editor for them.

use std::collections::BTreeMap;

use loose_gallery_core::{ProductId, Serial};
use serde::{Deserialize, Serialize};

/// Design settings of one catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDesignConfig {
    pub product_id: ProductId,
    /// Display name used in order summaries.
    pub name: String,
    /// Merchant toggle.
    #[serde(default)]
    pub customizable: bool,
    /// Editor domain the template belongs to.
    #[serde(default)]
    pub domain_id: Option<String>,
    /// Template new designs start from.
    #[serde(default)]
    pub template_serial: Option<Serial>,
    /// Credential name; `None` selects the default credential.
    #[serde(default)]
    pub credential: Option<String>,
}

impl ProductDesignConfig {
    /// A product that cannot be personalized.
    #[must_use]
    pub fn plain(product_id: ProductId, name: impl Into<String>) -> Self {
        Self {
            product_id,
            name: name.into(),
            customizable: false,
            domain_id: None,
            template_serial: None,
            credential: None,
        }
    }

    /// A personalizable product.
    #[must_use]
    pub fn customizable(
        product_id: ProductId,
        name: impl Into<String>,
        domain_id: impl Into<String>,
        template_serial: Serial,
    ) -> Self {
        Self {
            product_id,
            name: name.into(),
            customizable: true,
            domain_id: Some(domain_id.into()),
            template_serial: Some(template_serial),
            credential: None,
        }
    }

    /// Use a named credential instead of the default one.
    #[must_use]
    pub fn with_credential(mut self, name: impl Into<String>) -> Self {
        self.credential = Some(name.into());
        self
    }

    /// Flagged customizable with both a domain and a template configured.
    #[must_use]
    pub fn is_customizable(&self) -> bool {
        self.customizable
            && self
                .domain_id
                .as_deref()
                .is_some_and(|d| !d.trim().is_empty())
            && self.template_serial.is_some()
    }

    /// Domain and template, when the product is customizable.
    #[must_use]
    pub fn editor_target(&self) -> Option<(&str, &Serial)> {
        if !self.is_customizable() {
            return None;
        }
        self.domain_id
            .as_deref()
            .zip(self.template_serial.as_ref())
    }
}

/// Read access to product design settings.
pub trait Catalog: Send + Sync {
    /// Settings of one product.
    fn product(&self, product_id: ProductId) -> Option<ProductDesignConfig>;

    /// All products that can be personalized.
    fn customizable_products(&self) -> Vec<ProductDesignConfig>;
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    products: BTreeMap<ProductId, ProductDesignConfig>,
}

impl StaticCatalog {
    #[must_use]
    pub fn new(products: impl IntoIterator<Item = ProductDesignConfig>) -> Self {
        Self {
            products: products.into_iter().map(|p| (p.product_id, p)).collect(),
        }
    }

    /// Load a JSON array of product settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a template serial is
    /// invalid.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let products: Vec<ProductDesignConfig> = serde_json::from_str(json)?;
        Ok(Self::new(products))
    }

    /// Add or replace a product.
    pub fn insert(&mut self, product: ProductDesignConfig) {
        self.products.insert(product.product_id, product);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Catalog for StaticCatalog {
    fn product(&self, product_id: ProductId) -> Option<ProductDesignConfig> {
        self.products.get(&product_id).cloned()
    }

    fn customizable_products(&self) -> Vec<ProductDesignConfig> {
        self.products
            .values()
            .filter(|p| p.is_customizable())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_customizable_requires_domain_and_template() {
        let template = Serial::parse("TPL0001").unwrap();
        let full = ProductDesignConfig::customizable(ProductId::new(1), "Mug", "dom-1", template);
        assert!(full.is_customizable());
        assert_eq!(full.editor_target().map(|(d, _)| d), Some("dom-1"));

        let mut blank_domain = full.clone();
        blank_domain.domain_id = Some("  ".to_string());
        assert!(!blank_domain.is_customizable());

        let mut no_template = full.clone();
        no_template.template_serial = None;
        assert!(!no_template.is_customizable());
        assert!(no_template.editor_target().is_none());

        let mut unflagged = full;
        unflagged.customizable = false;
        assert!(!unflagged.is_customizable());
    }

    #[test]
    fn test_catalog_from_json() {
        let catalog = StaticCatalog::from_json(
            r#"[
                {"product_id": 42, "name": "Poster", "customizable": true,
                 "domain_id": "dom-1", "template_serial": "TPL0001", "credential": "eu"},
                {"product_id": 7, "name": "Gift card"}
            ]"#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        let poster = catalog.product(ProductId::new(42)).unwrap();
        assert_eq!(poster.credential.as_deref(), Some("eu"));
        assert_eq!(catalog.customizable_products().len(), 1);
        assert!(!catalog.product(ProductId::new(7)).unwrap().is_customizable());
    }

    #[test]
    fn test_catalog_rejects_invalid_template_serial() {
        let result = StaticCatalog::from_json(
            r#"[{"product_id": 1, "name": "Mug", "template_serial": "AB"}]"#,
        );
        assert!(result.is_err());
    }
}
