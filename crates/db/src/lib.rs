//! Database operations for Larder `PostgreSQL`.
//!
//! # Tables
//!
//! - `categories` - Product categories, keyed by name
//! - `products` - Catalog with on-hand `inventory`
//! - `customers` - Storefront customers (OAuth or checkout email)
//! - `cart_reservations` - Guest cart lines, keyed by `cart_session_id`
//! - `user_cart_reservations` - Logged-in customer cart lines
//! - `sales` / `product_sales` - Orders and their price-snapshotted lines
//!
//! The `active_reservations` view unions unexpired rows from both reservation
//! tables. Available inventory is always computed from it at read time.
//!
//! # Locking
//!
//! Any write that depends on available inventory first takes
//! `SELECT ... FOR UPDATE` on the product row inside a transaction. Multi-product
//! writes lock in ascending product id order.
//!
//! # Migrations
//!
//! Migrations live in `crates/db/migrations/` and are embedded in [`MIGRATOR`]:
//! ```bash
//! cargo run -p larder-cli -- migrate
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod categories;
pub mod customers;
pub mod models;
pub mod products;
pub mod reservations;
pub mod sales;

use std::time::Duration;

use larder_core::InventoryError;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use categories::CategoryRepository;
pub use customers::CustomerRepository;
pub use products::ProductRepository;
pub use reservations::ReservationRepository;
pub use sales::SaleRepository;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity (or an entity it references) was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate category, product with sales).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Inventory rule rejected the write.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// The request cannot be applied to the current state (e.g., empty cart).
    #[error("{0}")]
    Invalid(String),
}

/// Map unique/foreign-key violations onto repository errors.
///
/// `unique` is the conflict message for duplicate keys. A foreign-key
/// violation becomes `fk`, so callers decide whether a dangling reference is
/// a 404 (insert pointing at a missing row) or a 409 (delete of a referenced row).
pub(crate) fn map_constraint(
    err: sqlx::Error,
    unique: &str,
    fk: impl FnOnce() -> RepositoryError,
) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(unique.to_owned());
        }
    }
    map_foreign_key(err, fk)
}

/// Map only foreign-key violations, for tables without unique keys of their own.
pub(crate) fn map_foreign_key(
    err: sqlx::Error,
    fk: impl FnOnce() -> RepositoryError,
) -> RepositoryError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => fk(),
        other => RepositoryError::Database(other),
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply pending migrations.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the applied history diverges.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_error_converts() {
        let err: RepositoryError = InventoryError::InvalidQuantity(0).into();
        assert!(matches!(err, RepositoryError::Inventory(_)));
        assert_eq!(err.to_string(), "quantity must be between 1 and 99");
    }

    #[test]
    fn test_map_constraint_passes_through_other_errors() {
        let err = map_constraint(sqlx::Error::RowNotFound, "dup", || {
            RepositoryError::NotFound
        });
        assert!(matches!(err, RepositoryError::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn test_map_foreign_key_never_reports_duplicates() {
        let err = map_foreign_key(sqlx::Error::RowNotFound, || RepositoryError::NotFound);
        assert!(matches!(err, RepositoryError::Database(sqlx::Error::RowNotFound)));
        assert!(!err.to_string().contains("already exists"));
    }

    #[test]
    fn test_migrations_are_embedded() {
        assert!(MIGRATOR.iter().next().is_some());
    }
}
