//! Cart and reservation domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use larder_core::{Cents, MoneyError, ProductId, ReservationId};

/// One reservation row, as written.
#[derive(Debug, Clone, Serialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub expires_at: DateTime<Utc>,
}

/// An active cart line joined with its product's current price.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub image_url: Option<String>,
    pub unit_price_cents: Cents,
    pub quantity: i32,
    pub line_total_cents: Cents,
    pub expires_at: DateTime<Utc>,
}

/// A cart: every active line the owner holds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
    pub item_count: i64,
    pub total_cents: Cents,
    /// Earliest line expiry; `None` for an empty cart.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Cart {
    /// Assemble a cart and its totals.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the total does not fit in `i64`.
    pub fn from_lines(lines: Vec<CartLine>) -> Result<Self, MoneyError> {
        let total_cents = Cents::try_sum(lines.iter().map(|l| l.line_total_cents))?;
        let item_count = lines.iter().map(|l| i64::from(l.quantity)).sum();
        let expires_at = lines.iter().map(|l| l.expires_at).min();
        Ok(Self {
            lines,
            item_count,
            total_cents,
            expires_at,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Rows removed by an expired-reservation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub session_rows: u64,
    pub user_rows: u64,
}

impl CleanupReport {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.session_rows + self.user_rows
    }
}

/// Outcome of folding a guest cart into a customer cart at login.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Guest lines moved (fully or partly) into the customer cart.
    pub merged_lines: u32,
    /// Units dropped because the customer cart could not hold them.
    pub dropped_units: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn line(product: i32, price: i64, quantity: i32, expires_at: DateTime<Utc>) -> CartLine {
        CartLine {
            product_id: ProductId::new(product),
            name: format!("Product {product}"),
            image_url: None,
            unit_price_cents: Cents::new(price),
            quantity,
            line_total_cents: Cents::new(price).times(quantity).unwrap(),
            expires_at,
        }
    }

    #[test]
    fn test_from_lines_totals() {
        let now = Utc::now();
        let cart = Cart::from_lines(vec![
            line(1, 450, 2, now + Duration::minutes(10)),
            line(2, 1000, 1, now + Duration::minutes(5)),
        ])
        .unwrap();

        assert_eq!(cart.total_cents, Cents::new(1900));
        assert_eq!(cart.item_count, 3);
        assert_eq!(cart.expires_at, Some(now + Duration::minutes(5)));
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::from_lines(Vec::new()).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.total_cents, Cents::ZERO);
        assert_eq!(cart.expires_at, None);

        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json["lines"], serde_json::json!([]));
        assert_eq!(json["total_cents"], 0);
    }

    #[test]
    fn test_cleanup_report_total() {
        let report = CleanupReport {
            session_rows: 3,
            user_rows: 2,
        };
        assert_eq!(report.total(), 5);
    }
}
