//! Sale (order) domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use larder_core::{Cents, CustomerId, Email, ProductId, ProductSaleId, SaleId, SaleStatus};

/// A sale header.
#[derive(Debug, Clone, Serialize)]
pub struct Sale {
    pub id: SaleId,
    pub customer_id: CustomerId,
    /// Sum of line totals at creation; never recomputed.
    pub total_cents: Cents,
    pub status: SaleStatus,
    /// Source of the payment idempotency keys.
    pub checkout_key: Uuid,
    pub payment_order_id: Option<String>,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Idempotency key for creating the payment order.
    #[must_use]
    pub fn order_idempotency_key(&self) -> String {
        format!("{}:order", self.checkout_key)
    }

    /// Idempotency key for charging the payment source.
    #[must_use]
    pub fn payment_idempotency_key(&self) -> String {
        format!("{}:payment", self.checkout_key)
    }
}

/// A sale line with the name and price captured at checkout.
#[derive(Debug, Clone, Serialize)]
pub struct SaleLine {
    pub id: ProductSaleId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price_cents: Cents,
    pub line_total_cents: Cents,
}

/// A sale with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct SaleWithLines {
    #[serde(flatten)]
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
}

/// Row in the admin order list.
#[derive(Debug, Clone, Serialize)]
pub struct SaleSummary {
    #[serde(flatten)]
    pub sale: Sale,
    pub customer_email: Email,
    pub item_count: i64,
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_keys_derive_from_checkout_key() {
        let now = Utc::now();
        let key = Uuid::nil();
        let sale = Sale {
            id: SaleId::new(1),
            customer_id: CustomerId::new(1),
            total_cents: Cents::new(100),
            status: SaleStatus::Pending,
            checkout_key: key,
            payment_order_id: None,
            payment_id: None,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(
            sale.order_idempotency_key(),
            "00000000-0000-0000-0000-000000000000:order"
        );
        assert_eq!(
            sale.payment_idempotency_key(),
            "00000000-0000-0000-0000-000000000000:payment"
        );
        assert_ne!(sale.order_idempotency_key(), sale.payment_idempotency_key());
    }
}
