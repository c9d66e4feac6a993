//! Cart reservation repository.
//!
//! A cart line is a reservation row: it holds `quantity` units of a product
//! until `expires_at`. Guest carts live in `cart_reservations` (keyed by the
//! cart session id) and customer carts in `user_cart_reservations`. There is
//! at most one row per owner and product.
//!
//! Every write that can raise the number of held units runs in a transaction
//! that locks the product row first, re-reads the live reservation sum, and
//! only then writes. Two shoppers racing for the last unit serialize on the
//! lock; the second sees the first's row and gets `Insufficient`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use larder_core::inventory::{self, InventoryLevel};
use larder_core::{CartOwner, CartSessionId, Cents, CustomerId, ProductId, ReservationId};

use crate::RepositoryError;
use crate::models::{Cart, CartLine, CleanupReport, MergeReport, Reservation};
use crate::products::lock_product;

/// Bind the owner key (UUID or customer id) as the next parameter.
macro_rules! bind_owner {
    ($query:expr, $owner:expr) => {
        match $owner {
            CartOwner::Session(id) => $query.bind(id.as_uuid()),
            CartOwner::Customer(id) => $query.bind(id),
        }
    };
}

/// Table and key column holding an owner's reservations.
const fn owner_table(owner: &CartOwner) -> (&'static str, &'static str) {
    match owner {
        CartOwner::Session(_) => ("cart_reservations", "session_id"),
        CartOwner::Customer(_) => ("user_cart_reservations", "customer_id"),
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReservationRow {
    id: ReservationId,
    product_id: ProductId,
    quantity: i32,
    expires_at: DateTime<Utc>,
}

impl From<ReservationRow> for Reservation {
    fn from(row: ReservationRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            expires_at: row.expires_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    product_id: ProductId,
    name: String,
    image_url: Option<String>,
    price_cents: Cents,
    quantity: i32,
    expires_at: DateTime<Utc>,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let line_total_cents = row.price_cents.times(row.quantity).map_err(|e| {
            RepositoryError::DataCorruption(format!("line total for product {}: {e}", row.product_id))
        })?;
        Ok(Self {
            product_id: row.product_id,
            name: row.name,
            image_url: row.image_url,
            unit_price_cents: row.price_cents,
            quantity: row.quantity,
            line_total_cents,
            expires_at: row.expires_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LevelRow {
    id: ProductId,
    inventory: i32,
    reserved: i64,
}

impl From<LevelRow> for InventoryLevel {
    fn from(row: LevelRow) -> Self {
        Self::new(row.id, i64::from(row.inventory), row.reserved)
    }
}

/// Units of a product held by active reservations across both cart kinds.
pub(crate) async fn reserved_units(
    conn: &mut PgConnection,
    product_id: ProductId,
) -> Result<i64, RepositoryError> {
    let reserved = sqlx::query_scalar::<_, i64>(
        r"
        SELECT COALESCE(SUM(quantity), 0)::bigint
        FROM active_reservations
        WHERE product_id = $1
        ",
    )
    .bind(product_id)
    .fetch_one(conn)
    .await?;

    Ok(reserved)
}

/// Units this owner actively holds of a product (0 if none or expired).
async fn held_by(
    conn: &mut PgConnection,
    owner: CartOwner,
    product_id: ProductId,
) -> Result<i64, RepositoryError> {
    let (table, key) = owner_table(&owner);
    let sql = format!(
        "SELECT quantity FROM {table} WHERE {key} = $1 AND product_id = $2 AND expires_at > now()"
    );
    let held = bind_owner!(sqlx::query_scalar::<_, i32>(&sql), owner)
        .bind(product_id)
        .fetch_optional(conn)
        .await?;

    Ok(held.map_or(0, i64::from))
}

/// Insert or overwrite the owner's line with an absolute quantity.
async fn upsert_line(
    conn: &mut PgConnection,
    owner: CartOwner,
    product_id: ProductId,
    quantity: i32,
    expires_at: DateTime<Utc>,
) -> Result<Reservation, RepositoryError> {
    let (table, key) = owner_table(&owner);
    let sql = format!(
        r"
        INSERT INTO {table} ({key}, product_id, quantity, expires_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT ({key}, product_id) DO UPDATE
        SET quantity = EXCLUDED.quantity, expires_at = EXCLUDED.expires_at
        RETURNING id, product_id, quantity, expires_at
        "
    );
    let row = bind_owner!(sqlx::query_as::<_, ReservationRow>(&sql), owner)
        .bind(product_id)
        .bind(quantity)
        .bind(expires_at)
        .fetch_one(conn)
        .await?;

    Ok(row.into())
}

async fn delete_line(
    conn: &mut PgConnection,
    owner: CartOwner,
    product_id: ProductId,
) -> Result<bool, RepositoryError> {
    let (table, key) = owner_table(&owner);
    let sql = format!("DELETE FROM {table} WHERE {key} = $1 AND product_id = $2");
    let result = bind_owner!(sqlx::query(&sql), owner)
        .bind(product_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Top the owner's line up by `extra` units, clamped to what the product can
/// still cover. The product row must already be locked.
///
/// Returns `(granted, dropped)` where `granted` is the new line quantity.
async fn top_up_line(
    conn: &mut PgConnection,
    owner: CartOwner,
    product_id: ProductId,
    total: i32,
    extra: i32,
    expires_at: DateTime<Utc>,
) -> Result<(i64, i64), RepositoryError> {
    let reserved = reserved_units(&mut *conn, product_id).await?;
    let held = held_by(&mut *conn, owner, product_id).await?;
    let level = InventoryLevel::new(product_id, i64::from(total), reserved);

    let wanted = held + i64::from(extra);
    let granted = inventory::clamp_reservable(&level, held, wanted);
    if granted > 0 {
        let quantity = i32::try_from(granted)
            .map_err(|_| RepositoryError::Invalid("quantity out of range".to_owned()))?;
        upsert_line(conn, owner, product_id, quantity, expires_at).await?;
    }
    Ok((granted, wanted - granted))
}

/// Put sold lines back into the owner's cart, in product id order.
///
/// Returns the units that no longer fit under the per-line cap.
pub(crate) async fn restore_lines(
    conn: &mut PgConnection,
    owner: CartOwner,
    lines: &[(ProductId, i32)],
    expires_at: DateTime<Utc>,
) -> Result<i64, RepositoryError> {
    let mut dropped = 0;
    for &(product_id, quantity) in lines {
        let total = lock_product(&mut *conn, product_id).await?;
        let (_, lost) =
            top_up_line(&mut *conn, owner, product_id, total, quantity, expires_at).await?;
        dropped += lost;
    }
    Ok(dropped)
}

/// Delete every line the owner holds, expired or not.
pub(crate) async fn delete_all(
    conn: &mut PgConnection,
    owner: CartOwner,
) -> Result<u64, RepositoryError> {
    let (table, key) = owner_table(&owner);
    let sql = format!("DELETE FROM {table} WHERE {key} = $1");
    let result = bind_owner!(sqlx::query(&sql), owner).execute(conn).await?;
    Ok(result.rows_affected())
}

/// Active `(product_id, quantity)` lines for an owner, in product id order.
pub(crate) async fn active_lines(
    conn: &mut PgConnection,
    owner: CartOwner,
) -> Result<Vec<(ProductId, i32)>, RepositoryError> {
    let (table, key) = owner_table(&owner);
    let sql = format!(
        r"
        SELECT product_id, quantity
        FROM {table}
        WHERE {key} = $1 AND expires_at > now()
        ORDER BY product_id
        "
    );
    let lines = bind_owner!(sqlx::query_as::<_, (ProductId, i32)>(&sql), owner)
        .fetch_all(conn)
        .await?;
    Ok(lines)
}

/// Repository for cart reservations.
pub struct ReservationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReservationRepository<'a> {
    /// Create a new reservation repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Add `quantity` units of a product to the owner's cart.
    ///
    /// Creates the line if absent, otherwise adds to it. Either way the line's
    /// expiry is pushed out to `now + ttl`. An expired line is treated as
    /// absent and restarts from `quantity`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Inventory` if the quantity is out of range or
    /// more than is available.
    #[tracing::instrument(skip(self), fields(owner = owner.kind()))]
    pub async fn reserve(
        &self,
        owner: CartOwner,
        product_id: ProductId,
        quantity: i64,
        ttl: Duration,
    ) -> Result<Reservation, RepositoryError> {
        inventory::validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;

        let total = lock_product(&mut tx, product_id).await?;
        let reserved = reserved_units(&mut tx, product_id).await?;
        let held = held_by(&mut tx, owner, product_id).await?;

        let requested = held.saturating_add(quantity);
        let requested = inventory::validate_quantity(requested)?;
        let level = InventoryLevel::new(product_id, i64::from(total), reserved);
        inventory::check_reservable(&level, held, i64::from(requested))?;

        let expires_at = inventory::reservation_expiry(Utc::now(), ttl);
        let reservation = upsert_line(&mut tx, owner, product_id, requested, expires_at).await?;

        tx.commit().await?;

        tracing::debug!(
            product_id = %product_id,
            quantity = reservation.quantity,
            "reservation updated"
        );
        Ok(reservation)
    }

    /// Set the owner's line to an absolute quantity. Zero removes the line.
    ///
    /// Returns `None` when the line was removed.
    ///
    /// # Errors
    ///
    /// Same as [`Self::reserve`].
    #[tracing::instrument(skip(self), fields(owner = owner.kind()))]
    pub async fn set_quantity(
        &self,
        owner: CartOwner,
        product_id: ProductId,
        quantity: i64,
        ttl: Duration,
    ) -> Result<Option<Reservation>, RepositoryError> {
        if quantity == 0 {
            self.release(owner, product_id).await?;
            return Ok(None);
        }
        let quantity = inventory::validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;

        let total = lock_product(&mut tx, product_id).await?;
        let reserved = reserved_units(&mut tx, product_id).await?;
        let held = held_by(&mut tx, owner, product_id).await?;

        let level = InventoryLevel::new(product_id, i64::from(total), reserved);
        inventory::check_reservable(&level, held, i64::from(quantity))?;

        let expires_at = inventory::reservation_expiry(Utc::now(), ttl);
        let reservation = upsert_line(&mut tx, owner, product_id, quantity, expires_at).await?;

        tx.commit().await?;
        Ok(Some(reservation))
    }

    /// Remove the owner's line for a product.
    ///
    /// Returns whether a line was deleted. Releasing never needs the product
    /// lock: it can only increase availability.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn release(
        &self,
        owner: CartOwner,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        delete_line(&mut conn, owner, product_id).await
    }

    /// Remove every line in the owner's cart. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, owner: CartOwner) -> Result<u64, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        delete_all(&mut conn, owner).await
    }

    /// The owner's active cart, oldest line first, at current prices.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn cart(&self, owner: CartOwner) -> Result<Cart, RepositoryError> {
        let (table, key) = owner_table(&owner);
        let sql = format!(
            r"
            SELECT r.product_id, p.name, p.image_url, p.price_cents, r.quantity, r.expires_at
            FROM {table} r
            JOIN products p ON p.id = r.product_id
            WHERE r.{key} = $1 AND r.expires_at > now()
            ORDER BY r.created_at, r.id
            "
        );
        let rows = bind_owner!(sqlx::query_as::<_, CartLineRow>(&sql), owner)
            .fetch_all(self.pool)
            .await?;

        let lines = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;

        Cart::from_lines(lines)
            .map_err(|e| RepositoryError::DataCorruption(format!("cart total: {e}")))
    }

    /// Fold a guest cart into a customer's cart after login.
    ///
    /// Quantities add per product. If the sum exceeds what the customer may
    /// hold, the line is capped and the excess dropped. The guest rows are
    /// deleted either way.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[tracing::instrument(skip(self))]
    pub async fn merge_session_into_customer(
        &self,
        session: CartSessionId,
        customer: CustomerId,
        ttl: Duration,
    ) -> Result<MergeReport, RepositoryError> {
        let guest = CartOwner::Session(session);
        let target = CartOwner::Customer(customer);

        let mut tx = self.pool.begin().await?;
        let guest_lines = active_lines(&mut tx, guest).await?;
        let mut report = MergeReport::default();
        let expires_at = inventory::reservation_expiry(Utc::now(), ttl);

        // Lines come back in product id order, so locks are taken in order.
        for (product_id, guest_quantity) in guest_lines {
            let total = match lock_product(&mut tx, product_id).await {
                Ok(total) => total,
                Err(RepositoryError::NotFound) => continue,
                Err(e) => return Err(e),
            };
            delete_line(&mut tx, guest, product_id).await?;

            let (granted, dropped) =
                top_up_line(&mut tx, target, product_id, total, guest_quantity, expires_at)
                    .await?;
            report.dropped_units += dropped;
            if granted > 0 {
                report.merged_lines += 1;
            }
        }

        // Expired guest rows are no longer useful.
        delete_all(&mut tx, guest).await?;
        tx.commit().await?;

        if report.merged_lines > 0 || report.dropped_units > 0 {
            tracing::info!(
                customer_id = %customer,
                merged_lines = report.merged_lines,
                dropped_units = report.dropped_units,
                "guest cart merged"
            );
        }
        Ok(report)
    }

    /// Units of a product held by active reservations.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reserved_for(&self, product_id: ProductId) -> Result<i64, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        reserved_units(&mut conn, product_id).await
    }

    /// Read-time inventory for one product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn inventory_level(
        &self,
        product_id: ProductId,
    ) -> Result<Option<InventoryLevel>, RepositoryError> {
        let row = sqlx::query_as::<_, LevelRow>(
            r"
            SELECT p.id, p.inventory,
                   COALESCE((
                       SELECT SUM(quantity) FROM active_reservations a WHERE a.product_id = p.id
                   ), 0)::bigint AS reserved
            FROM products p
            WHERE p.id = $1
            ",
        )
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Read-time inventory for every product, by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn inventory_levels(&self) -> Result<Vec<InventoryLevel>, RepositoryError> {
        let rows = sqlx::query_as::<_, LevelRow>(
            r"
            SELECT p.id, p.inventory, COALESCE(r.reserved, 0)::bigint AS reserved
            FROM products p
            LEFT JOIN (
                SELECT product_id, SUM(quantity) AS reserved
                FROM active_reservations
                GROUP BY product_id
            ) r ON r.product_id = p.id
            ORDER BY p.id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Delete expired rows from both reservation tables.
    ///
    /// Expired rows already stopped counting against availability; this only
    /// reclaims space.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[tracing::instrument(skip(self))]
    pub async fn cleanup_expired(&self) -> Result<CleanupReport, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let session_rows = sqlx::query("DELETE FROM cart_reservations WHERE expires_at <= now()")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let user_rows = sqlx::query("DELETE FROM user_cart_reservations WHERE expires_at <= now()")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        let report = CleanupReport {
            session_rows,
            user_rows,
        };
        tracing::info!(
            session_rows = report.session_rows,
            user_rows = report.user_rows,
            "expired reservations removed"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_table() {
        let guest = CartOwner::Session(CartSessionId::generate());
        assert_eq!(owner_table(&guest), ("cart_reservations", "session_id"));

        let customer = CartOwner::Customer(CustomerId::new(3));
        assert_eq!(owner_table(&customer), ("user_cart_reservations", "customer_id"));
    }

    #[test]
    fn test_cart_line_row_computes_total() {
        let line: CartLine = CartLineRow {
            product_id: ProductId::new(2),
            name: "Sumac".to_owned(),
            image_url: None,
            price_cents: Cents::new(525),
            quantity: 4,
            expires_at: Utc::now(),
        }
        .try_into()
        .unwrap();

        assert_eq!(line.line_total_cents, Cents::new(2100));
        assert_eq!(line.unit_price_cents, Cents::new(525));
    }

    #[test]
    fn test_cart_line_row_overflow_is_corruption() {
        let result: Result<CartLine, _> = CartLineRow {
            product_id: ProductId::new(2),
            name: "Gold leaf".to_owned(),
            image_url: None,
            price_cents: Cents::new(i64::MAX),
            quantity: 2,
            expires_at: Utc::now(),
        }
        .try_into();
        assert!(matches!(result, Err(RepositoryError::DataCorruption(_))));
    }

    #[test]
    fn test_level_row_converts() {
        let level: InventoryLevel = LevelRow {
            id: ProductId::new(1),
            inventory: 10,
            reserved: 4,
        }
        .into();
        assert_eq!(level.available, 6);
    }
}
