//! Core types for Larder.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod category;
pub mod email;
pub mod id;
pub mod money;
pub mod status;

pub use cart::{CartOwner, CartSessionId, CartSessionIdError};
pub use category::{CategoryName, CategoryNameError};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Cents, MoneyError};
pub use status::SaleStatus;
