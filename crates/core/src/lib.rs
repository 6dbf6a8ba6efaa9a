//! Loose Gallery Core - Shared types library.
//!
//! This crate provides common types used across the Loose Gallery components:
//! - `designs` - Design lifecycle: API client, design store, cart/order binding
//! - `cli` - Operator tools for credentials, renders, locks and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, design serials, owners and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
