//! Core types for Loose Gallery.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart_line;
pub mod id;
pub mod owner;
pub mod serial;
pub mod status;

pub use cart_line::CartLineKey;
pub use id::*;
pub use owner::{OwnerId, Visitor, VisitorToken};
pub use serial::{Serial, SerialError};
pub use status::*;
