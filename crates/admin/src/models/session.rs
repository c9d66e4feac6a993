//! Logged-in admin identity and session keys.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::jwt::AdminClaims;

/// The admin a verified `auth_token` belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentAdmin {
    pub email: String,
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<AdminClaims> for CurrentAdmin {
    fn from(claims: AdminClaims) -> Self {
        Self {
            email: claims.sub,
            name: claims.name,
            expires_at: DateTime::from_timestamp(claims.exp, 0),
        }
    }
}

/// Session keys. The admin session only carries the in-flight OAuth login;
/// who is logged in lives in the token.
pub mod keys {
    /// Key for OAuth state (CSRF protection).
    pub const OAUTH_STATE: &str = "admin_oauth_state";
}
