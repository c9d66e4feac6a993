//! Cart identity types.
//!
//! A cart belongs either to an anonymous browser (identified by the
//! `cart_session_id` cookie) or to a logged-in customer. Reservations are
//! stored in a separate table per owner kind.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CustomerId;

/// Error returned when a cookie value is not a valid cart session id.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid cart session id")]
pub struct CartSessionIdError;

/// Identifier for a guest cart, stored in the `cart_session_id` cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartSessionId(Uuid);

impl CartSessionId {
    /// Generate a fresh random session id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a cookie value.
    ///
    /// # Errors
    ///
    /// Returns `CartSessionIdError` if the value is not a UUID.
    pub fn parse(s: &str) -> Result<Self, CartSessionIdError> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| CartSessionIdError)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for CartSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CartSessionId {
    type Err = CartSessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for CartSessionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Who a cart belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartOwner {
    /// Anonymous browser cart.
    Session(CartSessionId),
    /// Logged-in customer cart.
    Customer(CustomerId),
}

impl CartOwner {
    /// Short label for logs and spans.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Session(_) => "session",
            Self::Customer(_) => "customer",
        }
    }
}

impl fmt::Display for CartOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(id) => write!(f, "session:{id}"),
            Self::Customer(id) => write!(f, "customer:{id}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_parse_roundtrip() {
        let id = CartSessionId::generate();
        let parsed = CartSessionId::parse(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_session_id_rejects_garbage() {
        assert_eq!(CartSessionId::parse("abc"), Err(CartSessionIdError));
        assert_eq!(CartSessionId::parse(""), Err(CartSessionIdError));
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(CartSessionId::generate(), CartSessionId::generate());
    }

    #[test]
    fn test_owner_display() {
        let owner = CartOwner::Customer(CustomerId::new(12));
        assert_eq!(owner.to_string(), "customer:12");
        assert_eq!(owner.kind(), "customer");

        let uuid = Uuid::nil();
        let owner = CartOwner::Session(CartSessionId::from(uuid));
        assert_eq!(
            owner.to_string(),
            "session:00000000-0000-0000-0000-000000000000"
        );
    }
}
