//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use larder_core::{CustomerId, Email};
use larder_db::models::Customer;

/// Session-stored customer identity.
///
/// Minimal data stored in the session to identify the logged-in customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentCustomer {
    pub id: CustomerId,
    pub email: Email,
    pub name: String,
}

impl From<&Customer> for CurrentCustomer {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id,
            email: customer.email.clone(),
            name: customer.name.clone(),
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in customer.
    pub const CURRENT_CUSTOMER: &str = "current_customer";

    /// Key for OAuth state (CSRF protection).
    pub const OAUTH_STATE: &str = "oauth_state";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_current_customer_session_shape() {
        let customer = CurrentCustomer {
            id: CustomerId::new(3),
            email: Email::parse("cook@example.com").unwrap(),
            name: "Cook".to_owned(),
        };
        let json = serde_json::to_value(&customer).unwrap();
        assert_eq!(json["id"], 3);
        let back: CurrentCustomer = serde_json::from_value(json).unwrap();
        assert_eq!(back, customer);
    }
}
