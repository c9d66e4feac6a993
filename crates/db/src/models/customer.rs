//! Customer domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use larder_core::{CustomerId, Email};

/// A storefront customer.
///
/// Created either by OAuth login or by a guest checkout with an email address.
/// Both paths converge on the same row because `email` is unique.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub email: Email,
    pub name: String,
    /// Subject claim from the identity provider, once the customer has logged in.
    #[serde(skip_serializing)]
    pub oauth_subject: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity asserted by the OAuth provider's userinfo endpoint.
#[derive(Debug, Clone)]
pub struct OAuthIdentity {
    pub subject: String,
    pub email: Email,
    pub name: String,
}
