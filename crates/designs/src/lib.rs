//! Loose Gallery design lifecycle.
//!
//! A shopper personalizes a product in the external Loose Gallery editor.
//! This crate carries the resulting design (identified by its serial) from
//! the editor return, through the cart and checkout, to the order, and locks
//! it once the order is placed.
//!
//! # Modules
//!
//! - [`api`] - GraphQL client for the Loose Gallery API and editor links
//! - [`store`] - Per-visitor and per-account design records
//! - [`cart`] / [`order`] - Design snapshots on cart and order lines
//! - [`handshake`] - Editor return handling
//! - [`lifecycle`] - [`DesignLifecycle`], the entry point for all of the above
//! - [`config`] - Environment configuration
//!
//! # Example
//!
//! ```rust,ignore
//! let config = DesignConfig::from_env()?;
//! let lifecycle = DesignLifecycle::from_config(&config, Arc::new(catalog)).await?;
//!
//! let url = lifecycle.start_design_link(&visitor, product_id).await?;
//! // ... visitor edits and is redirected back ...
//! let outcome = lifecycle.handle_return(&params, &visitor, Some(&mut cart)).await?;
//! let key = lifecycle.on_add_to_cart(&visitor, &mut cart, product_id, 1).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod handshake;
pub mod lifecycle;
pub mod order;
pub mod store;

pub use api::{ApiClients, ApiError, ApiErrorKind, DesignApi, LooseGalleryClient};
pub use catalog::{Catalog, ProductDesignConfig, StaticCatalog};
pub use config::DesignConfig;
pub use error::DesignError;
pub use handshake::{ReturnOutcome, ReturnParams};
pub use lifecycle::DesignLifecycle;
pub use store::{DesignRecord, DesignStore, StoreError};
