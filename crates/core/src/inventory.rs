//! Inventory reconciliation rules.
//!
//! Products store a total on-hand count. Carts hold reservations against that
//! count; a reservation counts while its `expires_at` is in the future.
//! Nothing persists an "available" figure: it is always derived here from the
//! total and the live reservation sum.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ProductId;

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// Inventory rule violations.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryError {
    /// Quantity outside `1..=MAX_LINE_QUANTITY`.
    #[error("quantity must be between 1 and {MAX_LINE_QUANTITY}")]
    InvalidQuantity(i64),
    /// Not enough unreserved stock.
    #[error("only {reservable} available")]
    Insufficient {
        /// Total the caller asked to hold.
        requested: i64,
        /// Most this owner could hold right now.
        reservable: i64,
    },
    /// An adjustment would leave the product with negative or unrepresentable stock.
    #[error("inventory cannot be set to {0}")]
    OutOfRange(i64),
}

/// An admin change to a product's on-hand count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryAdjustment {
    /// Replace the count.
    Set(i64),
    /// Add to (or subtract from) the count.
    Delta(i64),
}

impl InventoryAdjustment {
    /// Apply to the current count.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::OutOfRange` if the result is negative or does
    /// not fit the `INTEGER` column.
    pub fn apply(self, current: i32) -> Result<i32, InventoryError> {
        let next = match self {
            Self::Set(value) => value,
            Self::Delta(delta) => i64::from(current).saturating_add(delta),
        };
        if next < 0 {
            return Err(InventoryError::OutOfRange(next));
        }
        i32::try_from(next).map_err(|_| InventoryError::OutOfRange(next))
    }
}

/// Snapshot of one product's stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLevel {
    pub product_id: ProductId,
    /// Units on hand.
    pub total: i64,
    /// Units held by active reservations.
    pub reserved: i64,
    /// `max(total - reserved, 0)`.
    pub available: i64,
}

impl InventoryLevel {
    /// Build a level from raw counts.
    #[must_use]
    pub const fn new(product_id: ProductId, total: i64, reserved: i64) -> Self {
        Self {
            product_id,
            total,
            reserved,
            available: available(total, reserved),
        }
    }
}

/// Units not held by any active reservation.
///
/// Clamped at zero: an admin can lower stock below what carts already hold.
#[must_use]
pub const fn available(total: i64, reserved: i64) -> i64 {
    let free = total.saturating_sub(reserved);
    if free < 0 { 0 } else { free }
}

/// Check a requested line quantity.
///
/// # Errors
///
/// Returns `InventoryError::InvalidQuantity` outside `1..=MAX_LINE_QUANTITY`.
pub fn validate_quantity(quantity: i64) -> Result<i32, InventoryError> {
    if (1..=i64::from(MAX_LINE_QUANTITY)).contains(&quantity) {
        i32::try_from(quantity).map_err(|_| InventoryError::InvalidQuantity(quantity))
    } else {
        Err(InventoryError::InvalidQuantity(quantity))
    }
}

/// Decide whether an owner may hold `requested_total` units of a product.
///
/// `already_held` is what this owner's active reservation holds now. It is
/// part of `level.reserved`, so it is added back before comparing.
///
/// # Errors
///
/// Returns `InventoryError::Insufficient` with the most the owner could hold.
pub const fn check_reservable(
    level: &InventoryLevel,
    already_held: i64,
    requested_total: i64,
) -> Result<(), InventoryError> {
    let reservable = level.available.saturating_add(already_held);
    if requested_total <= reservable {
        Ok(())
    } else {
        Err(InventoryError::Insufficient {
            requested: requested_total,
            reservable,
        })
    }
}

/// How many of `wanted` units fit, for merges that cap rather than fail.
#[must_use]
pub fn clamp_reservable(level: &InventoryLevel, already_held: i64, wanted: i64) -> i64 {
    wanted
        .min(level.available.saturating_add(already_held))
        .min(i64::from(MAX_LINE_QUANTITY))
        .max(0)
}

/// Expiry timestamp for a reservation created or refreshed at `now`.
#[must_use]
pub fn reservation_expiry(now: DateTime<Utc>, ttl: std::time::Duration) -> DateTime<Utc> {
    let ttl = Duration::from_std(ttl).unwrap_or(Duration::MAX);
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
