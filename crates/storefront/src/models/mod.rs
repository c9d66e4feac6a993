//! Storefront-only types. Catalog and cart models live in `larder_db::models`.

pub mod session;

pub use session::{CurrentCustomer, keys as session_keys};
