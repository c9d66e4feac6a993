//! Product repository.
//!
//! Reads attach availability computed from `active_reservations`. Inventory
//! writes lock the product row first; see [`lock_product`].

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use larder_core::inventory::InventoryAdjustment;
use larder_core::{CategoryName, Cents, InventoryLevel, ProductId};

use crate::models::{NewProduct, Product, ProductUpdate, ProductWithAvailability};
use crate::reservations::reserved_units;
use crate::{RepositoryError, map_foreign_key};

/// Column list shared by every product read.
macro_rules! product_select {
    () => {
        r"
        SELECT p.id, p.name, p.price_cents, p.description, p.story, p.image_url,
               p.category_name, p.inventory, p.created_at, p.updated_at,
               COALESCE(r.reserved, 0)::bigint AS reserved
        FROM products p
        LEFT JOIN (
            SELECT product_id, SUM(quantity) AS reserved
            FROM active_reservations
            GROUP BY product_id
        ) r ON r.product_id = p.id
        "
    };
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    price_cents: Cents,
    description: String,
    story: Option<String>,
    image_url: Option<String>,
    category_name: Option<String>,
    inventory: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let category_name = row
            .category_name
            .as_deref()
            .map(CategoryName::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid category on product {}: {e}", row.id))
            })?;
        Ok(Self {
            id: row.id,
            name: row.name,
            price_cents: row.price_cents,
            description: row.description,
            story: row.story,
            image_url: row.image_url,
            category_name,
            inventory: row.inventory,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductAvailabilityRow {
    #[sqlx(flatten)]
    product: ProductRow,
    reserved: i64,
}

impl TryFrom<ProductAvailabilityRow> for ProductWithAvailability {
    type Error = RepositoryError;

    fn try_from(row: ProductAvailabilityRow) -> Result<Self, Self::Error> {
        let product = Product::try_from(row.product)?;
        let level = InventoryLevel::new(product.id, i64::from(product.inventory), row.reserved);
        Ok(Self {
            product,
            reserved: level.reserved,
            available: level.available,
        })
    }
}

/// Lock a product row for the rest of the transaction and return its inventory.
///
/// Every write that depends on available inventory goes through this, so
/// concurrent reservations and checkouts for one product serialize here.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the product does not exist.
pub(crate) async fn lock_product(
    conn: &mut PgConnection,
    id: ProductId,
) -> Result<i32, RepositoryError> {
    sqlx::query_scalar::<_, i32>("SELECT inventory FROM products WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound)
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products by name, optionally limited to one category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        category: Option<&CategoryName>,
    ) -> Result<Vec<ProductWithAvailability>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductAvailabilityRow>(concat!(
            product_select!(),
            "WHERE ($1::text IS NULL OR p.category_name = $1) ORDER BY p.name, p.id"
        ))
        .bind(category)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a product with availability.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        id: ProductId,
    ) -> Result<Option<ProductWithAvailability>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductAvailabilityRow>(concat!(
            product_select!(),
            "WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: &NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            INSERT INTO products
                (name, price_cents, description, story, image_url, category_name, inventory)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, price_cents, description, story, image_url,
                      category_name, inventory, created_at, updated_at
            ",
        )
        .bind(input.name.trim())
        .bind(input.price_cents)
        .bind(&input.description)
        .bind(input.story.as_deref().filter(|s| !s.is_empty()))
        .bind(input.image_url.as_deref().filter(|s| !s.is_empty()))
        .bind(input.category_name.as_ref())
        .bind(input.inventory)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_foreign_key(e, || RepositoryError::NotFound))?;

        row.try_into()
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product (or the new
    /// category) does not exist.
    #[tracing::instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            UPDATE products
            SET name = COALESCE($2, name),
                price_cents = COALESCE($3, price_cents),
                description = COALESCE($4, description),
                story = CASE WHEN $5::text IS NULL THEN story ELSE NULLIF($5, '') END,
                image_url = CASE WHEN $6::text IS NULL THEN image_url ELSE NULLIF($6, '') END,
                category_name = COALESCE($7, category_name),
                updated_at = now()
            WHERE id = $1
            RETURNING id, name, price_cents, description, story, image_url,
                      category_name, inventory, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.price_cents)
        .bind(input.description.as_deref())
        .bind(input.story.as_deref())
        .bind(input.image_url.as_deref())
        .bind(input.category_name.as_ref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_foreign_key(e, || RepositoryError::NotFound))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete a product and any cart lines holding it.
    ///
    /// Returns `false` if no such product existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if sales reference the product.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| {
                map_foreign_key(e, || {
                    RepositoryError::Conflict("product has sales and cannot be deleted".to_owned())
                })
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Set or shift a product's on-hand inventory under the row lock.
    ///
    /// Lowering stock below what carts hold is allowed; availability then
    /// reads as zero until reservations expire or are released.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Inventory` if the result would be negative.
    #[tracing::instrument(skip(self))]
    pub async fn adjust_inventory(
        &self,
        id: ProductId,
        adjustment: InventoryAdjustment,
    ) -> Result<InventoryLevel, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_product(&mut tx, id).await?;
        let next = adjustment.apply(current)?;

        sqlx::query("UPDATE products SET inventory = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(next)
            .execute(&mut *tx)
            .await?;

        let reserved = reserved_units(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(product_id = %id, from = current, to = next, "inventory adjusted");
        Ok(InventoryLevel::new(id, i64::from(next), reserved))
    }
}
