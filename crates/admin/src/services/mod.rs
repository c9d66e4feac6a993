//! Clients for the services the admin calls out to.

pub mod oauth;

pub use oauth::{OAuthClient, OAuthError};
