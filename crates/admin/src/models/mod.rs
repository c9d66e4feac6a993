//! Admin-side request identity types.

pub mod session;

pub use session::{CurrentAdmin, keys as session_keys};
