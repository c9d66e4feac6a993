//! Domain types returned by the repositories.
//!
//! These are separate from the internal `*Row` types each repository decodes,
//! so validation of stored values happens in one place per table.

pub mod cart;
pub mod category;
pub mod customer;
pub mod product;
pub mod sale;

pub use cart::{Cart, CartLine, CleanupReport, MergeReport, Reservation};
pub use category::{Category, CategoryUpdate, NewCategory};
pub use customer::{Customer, OAuthIdentity};
pub use product::{NewProduct, Product, ProductUpdate, ProductWithAvailability};
pub use sale::{Page, Sale, SaleLine, SaleSummary, SaleWithLines};
