//! Clients for the services the storefront calls out to.
//!
//! - `oauth` - Customer login through the OAuth / `OpenID` Connect provider
//! - `payments` - Orders and card charges through the payments API

pub mod oauth;
pub mod payments;

pub use oauth::{OAuthClient, OAuthError};
pub use payments::{PaymentError, PaymentsClient};
