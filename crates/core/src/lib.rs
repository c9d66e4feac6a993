//! Larder Core - Shared types library.
//!
//! This crate provides common types used across all Larder components:
//! - `storefront` - Customer-facing shop API
//! - `admin` - Catalog and order management API
//! - `db` - `PostgreSQL` repositories shared by both services
//! - `cli` - Command-line tools for migrations and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. The inventory arithmetic lives here so the
//! repositories and the tests agree on a single definition of "available".
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, cart owners and statuses
//! - [`inventory`] - Available-inventory reconciliation and reservation checks

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod inventory;
pub mod types;

pub use inventory::{InventoryAdjustment, InventoryError, InventoryLevel};
pub use types::*;
