//! GreenCart Core - Shared types library.
//!
//! This crate provides common types used across all GreenCart components:
//! - `storefront` - The REST API server (shopper and seller endpoints)
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and order states

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
