//! Sale repository.
//!
//! Checkout converts an owner's reservations into a `pending` sale in one
//! transaction. Payment happens outside the transaction; the sale is then
//! marked `paid`, or `failed` with its units returned to the shopper's cart.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use larder_core::inventory::reservation_expiry;
use larder_core::{
    CartOwner, Cents, CustomerId, Email, InventoryError, ProductId, ProductSaleId, SaleId,
    SaleStatus,
};

use crate::RepositoryError;
use crate::models::{Page, Sale, SaleLine, SaleSummary, SaleWithLines};
use crate::reservations::{active_lines, delete_all, restore_lines};

const SALE_COLUMNS: &str = "id, customer_id, total_cents, status, checkout_key, \
    payment_order_id, payment_id, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: SaleId,
    customer_id: CustomerId,
    total_cents: Cents,
    status: SaleStatus,
    checkout_key: Uuid,
    payment_order_id: Option<String>,
    payment_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SaleRow> for Sale {
    fn from(row: SaleRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            total_cents: row.total_cents,
            status: row.status,
            checkout_key: row.checkout_key,
            payment_order_id: row.payment_order_id,
            payment_id: row.payment_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SaleLineRow {
    id: ProductSaleId,
    sale_id: SaleId,
    product_id: ProductId,
    product_name: String,
    quantity: i32,
    unit_price_cents: Cents,
    line_total_cents: Cents,
}

impl From<SaleLineRow> for SaleLine {
    fn from(row: SaleLineRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
            line_total_cents: row.line_total_cents,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SaleSummaryRow {
    #[sqlx(flatten)]
    sale: SaleRow,
    customer_email: String,
    item_count: i64,
}

impl TryFrom<SaleSummaryRow> for SaleSummary {
    type Error = RepositoryError;

    fn try_from(row: SaleSummaryRow) -> Result<Self, Self::Error> {
        let customer_email = Email::parse(&row.customer_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Self {
            sale: row.sale.into(),
            customer_email,
            item_count: row.item_count,
        })
    }
}

/// Product state read under lock during checkout.
#[derive(Debug, sqlx::FromRow)]
struct LockedProductRow {
    id: ProductId,
    name: String,
    price_cents: Cents,
    inventory: i32,
}

/// A priced checkout line before it is written.
#[derive(Debug)]
struct PricedLine {
    product_id: ProductId,
    product_name: String,
    quantity: i32,
    unit_price_cents: Cents,
    line_total_cents: Cents,
}

/// Price each reserved line against the locked product rows and verify stock.
///
/// The owner's reservations already excluded everyone else's holds when they
/// were made, so the only way a line can fail here is stock lowered since.
fn price_lines(
    lines: &[(ProductId, i32)],
    products: &[LockedProductRow],
) -> Result<Vec<PricedLine>, RepositoryError> {
    let by_id: HashMap<ProductId, &LockedProductRow> =
        products.iter().map(|p| (p.id, p)).collect();

    lines
        .iter()
        .map(|&(product_id, quantity)| {
            let product = by_id.get(&product_id).ok_or(RepositoryError::NotFound)?;
            if product.inventory < quantity {
                return Err(InventoryError::Insufficient {
                    requested: i64::from(quantity),
                    reservable: i64::from(product.inventory),
                }
                .into());
            }

            let line_total_cents = product
                .price_cents
                .times(quantity)
                .map_err(|e| RepositoryError::Invalid(format!("line total: {e}")))?;
            Ok(PricedLine {
                product_id,
                product_name: product.name.clone(),
                quantity,
                unit_price_cents: product.price_cents,
                line_total_cents,
            })
        })
        .collect()
}

async fn lines_for(
    conn: &mut PgConnection,
    sale_ids: &[i32],
) -> Result<Vec<SaleLineRow>, RepositoryError> {
    let rows = sqlx::query_as::<_, SaleLineRow>(
        r"
        SELECT id, sale_id, product_id, product_name, quantity,
               unit_price_cents, line_total_cents
        FROM product_sales
        WHERE sale_id = ANY($1)
        ORDER BY sale_id, id
        ",
    )
    .bind(sale_ids)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

fn attach_lines(sales: Vec<SaleRow>, lines: Vec<SaleLineRow>) -> Vec<SaleWithLines> {
    let mut grouped: HashMap<SaleId, Vec<SaleLine>> = HashMap::new();
    for line in lines {
        grouped.entry(line.sale_id).or_default().push(line.into());
    }
    sales
        .into_iter()
        .map(|row| {
            let lines = grouped.remove(&row.id).unwrap_or_default();
            SaleWithLines {
                sale: row.into(),
                lines,
            }
        })
        .collect()
}

/// Repository for sales.
pub struct SaleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SaleRepository<'a> {
    /// Create a new sale repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Turn an owner's active reservations into a pending sale.
    ///
    /// In one transaction: lock every product in the cart in ascending id
    /// order, verify stock still covers each line, insert the sale and its
    /// price-snapshotted lines, decrement inventory, and delete the owner's
    /// reservations.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the cart is empty.
    /// Returns `RepositoryError::Inventory` if stock no longer covers a line.
    #[tracing::instrument(skip(self), fields(owner = owner.kind()))]
    pub async fn begin_checkout(
        &self,
        owner: CartOwner,
        customer_id: CustomerId,
    ) -> Result<SaleWithLines, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let lines = active_lines(&mut tx, owner).await?;
        if lines.is_empty() {
            return Err(RepositoryError::Invalid("cart is empty".to_owned()));
        }
        let product_ids: Vec<i32> = lines.iter().map(|(id, _)| id.as_i32()).collect();

        // Row locks are taken in ORDER BY order.
        let products = sqlx::query_as::<_, LockedProductRow>(
            r"
            SELECT id, name, price_cents, inventory
            FROM products
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            ",
        )
        .bind(&product_ids)
        .fetch_all(&mut *tx)
        .await?;

        let priced = price_lines(&lines, &products)?;
        let total_cents = Cents::try_sum(priced.iter().map(|l| l.line_total_cents))
            .map_err(|e| RepositoryError::Invalid(format!("order total: {e}")))?;

        let sale = sqlx::query_as::<_, SaleRow>(&format!(
            r"
            INSERT INTO sales (customer_id, total_cents, status, checkout_key)
            VALUES ($1, $2, 'pending', $3)
            RETURNING {SALE_COLUMNS}
            "
        ))
        .bind(customer_id)
        .bind(total_cents)
        .bind(Uuid::new_v4())
        .fetch_one(&mut *tx)
        .await?;

        let mut sale_lines = Vec::with_capacity(priced.len());
        for line in &priced {
            let row = sqlx::query_as::<_, SaleLineRow>(
                r"
                INSERT INTO product_sales
                    (sale_id, product_id, product_name, quantity, unit_price_cents, line_total_cents)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, sale_id, product_id, product_name, quantity,
                          unit_price_cents, line_total_cents
                ",
            )
            .bind(sale.id)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.line_total_cents)
            .fetch_one(&mut *tx)
            .await?;
            sale_lines.push(row.into());

            sqlx::query(
                "UPDATE products SET inventory = inventory - $2, updated_at = now() WHERE id = $1",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }

        delete_all(&mut tx, owner).await?;
        tx.commit().await?;

        tracing::info!(
            sale_id = %sale.id,
            customer_id = %customer_id,
            total_cents = total_cents.as_i64(),
            lines = sale_lines.len(),
            "checkout started"
        );
        Ok(SaleWithLines {
            sale: sale.into(),
            lines: sale_lines,
        })
    }

    /// Record the payments API order id on a pending sale.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the sale does not exist.
    pub async fn record_payment_order(
        &self,
        id: SaleId,
        payment_order_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE sales SET payment_order_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(payment_order_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Mark a pending sale paid.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the sale is not pending.
    #[tracing::instrument(skip(self))]
    pub async fn mark_paid(
        &self,
        id: SaleId,
        payment_order_id: &str,
        payment_id: &str,
    ) -> Result<Sale, RepositoryError> {
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            r"
            UPDATE sales
            SET status = 'paid', payment_order_id = $2, payment_id = $3, updated_at = now()
            WHERE id = $1 AND status = 'pending'
            RETURNING {SALE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(payment_order_id)
        .bind(payment_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| RepositoryError::Conflict("sale is not pending".to_owned()))?;

        Ok(row.into())
    }

    /// Mark a pending sale failed and return its units to the owner's cart.
    ///
    /// Inventory goes back up and the same units are reserved again for
    /// `owner` with a fresh `ttl`, all in one transaction, so no other
    /// shopper can take them in between.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the sale is not pending.
    #[tracing::instrument(skip(self), fields(owner = owner.kind()))]
    pub async fn mark_failed(
        &self,
        id: SaleId,
        owner: CartOwner,
        ttl: Duration,
    ) -> Result<Sale, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, SaleRow>(&format!(
            r"
            UPDATE sales
            SET status = 'failed', updated_at = now()
            WHERE id = $1 AND status = 'pending'
            RETURNING {SALE_COLUMNS}
            "
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::Conflict("sale is not pending".to_owned()))?;

        sqlx::query(
            r"
            SELECT id FROM products
            WHERE id IN (SELECT product_id FROM product_sales WHERE sale_id = $1)
            ORDER BY id
            FOR UPDATE
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            UPDATE products p
            SET inventory = p.inventory + ps.quantity, updated_at = now()
            FROM product_sales ps
            WHERE ps.sale_id = $1 AND p.id = ps.product_id
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let lines = sqlx::query_as::<_, (ProductId, i32)>(
            "SELECT product_id, quantity FROM product_sales WHERE sale_id = $1 ORDER BY product_id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let expires_at = reservation_expiry(Utc::now(), ttl);
        let dropped = restore_lines(&mut tx, owner, &lines, expires_at).await?;
        tx.commit().await?;

        tracing::warn!(
            sale_id = %id,
            restored_lines = lines.len(),
            dropped_units = dropped,
            "sale failed, items returned to cart"
        );
        Ok(row.into())
    }

    /// List sales newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Page<SaleSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, SaleSummaryRow>(
            r"
            SELECT s.id, s.customer_id, s.total_cents, s.status, s.checkout_key,
                   s.payment_order_id, s.payment_id, s.created_at, s.updated_at,
                   c.email AS customer_email,
                   COALESCE((
                       SELECT SUM(ps.quantity) FROM product_sales ps WHERE ps.sale_id = s.id
                   ), 0)::bigint AS item_count
            FROM sales s
            JOIN customers c ON c.id = s.customer_id
            ORDER BY s.created_at DESC, s.id DESC
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(self.pool)
            .await?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
            total,
            limit,
            offset,
        })
    }

    /// Get a sale with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: SaleId) -> Result<Option<SaleWithLines>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let Some(sale) =
            sqlx::query_as::<_, SaleRow>(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = $1"))
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?
        else {
            return Ok(None);
        };

        let lines = lines_for(&mut conn, &[sale.id.as_i32()]).await?;
        Ok(attach_lines(vec![sale], lines).pop())
    }

    /// A customer's order history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<SaleWithLines>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let sales = sqlx::query_as::<_, SaleRow>(&format!(
            r"
            SELECT {SALE_COLUMNS}
            FROM sales
            WHERE customer_id = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(customer_id)
        .fetch_all(&mut *conn)
        .await?;

        let ids: Vec<i32> = sales.iter().map(|s| s.id.as_i32()).collect();
        let lines = lines_for(&mut conn, &ids).await?;
        Ok(attach_lines(sales, lines))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i32, price: i64, inventory: i32) -> LockedProductRow {
        LockedProductRow {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price_cents: Cents::new(price),
            inventory,
        }
    }

    #[test]
    fn test_price_lines_snapshots_prices() {
        let lines = [(ProductId::new(1), 2), (ProductId::new(2), 1)];
        let products = [product(1, 450, 10), product(2, 1200, 3)];

        let priced = price_lines(&lines, &products).unwrap();
        assert_eq!(priced.len(), 2);
        assert_eq!(priced[0].line_total_cents, Cents::new(900));
        assert_eq!(priced[1].unit_price_cents, Cents::new(1200));
        assert_eq!(priced[1].product_name, "Product 2");
    }

    #[test]
    fn test_price_lines_rejects_lowered_stock() {
        // Admin cut stock to 1 after the owner reserved 3.
        let lines = [(ProductId::new(1), 3)];
        let products = [product(1, 100, 1)];

        let err = price_lines(&lines, &products).unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Inventory(InventoryError::Insufficient { reservable: 1, .. })
        ));
    }

    #[test]
    fn test_price_lines_missing_product() {
        let lines = [(ProductId::new(9), 1)];
        let err = price_lines(&lines, &[]).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[test]
    fn test_attach_lines_groups_by_sale() {
        let now = Utc::now();
        let sale = |id: i32| SaleRow {
            id: SaleId::new(id),
            customer_id: CustomerId::new(1),
            total_cents: Cents::new(100),
            status: SaleStatus::Paid,
            checkout_key: Uuid::new_v4(),
            payment_order_id: None,
            payment_id: None,
            created_at: now,
            updated_at: now,
        };
        let line = |id: i32, sale_id: i32| SaleLineRow {
            id: ProductSaleId::new(id),
            sale_id: SaleId::new(sale_id),
            product_id: ProductId::new(1),
            product_name: "Salt".to_owned(),
            quantity: 1,
            unit_price_cents: Cents::new(50),
            line_total_cents: Cents::new(50),
        };

        let result = attach_lines(vec![sale(2), sale(1)], vec![line(1, 1), line(2, 2), line(3, 2)]);
        assert_eq!(result[0].sale.id, SaleId::new(2));
        assert_eq!(result[0].lines.len(), 2);
        assert_eq!(result[1].lines.len(), 1);
    }
}
