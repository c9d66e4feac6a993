//! Cart identity.
//!
//! A logged-in customer's cart is keyed by customer id. Guests are keyed by
//! the `cart_session_id` cookie, which is issued on the first cart write.

use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, header, request::Parts},
    response::{IntoResponseParts, ResponseParts},
};
use tower_sessions::cookie::{Cookie, SameSite, time::Duration};

use larder_core::{CartOwner, CartSessionId};

use super::auth::OptionalAuth;
use crate::models::CurrentCustomer;

/// Guest cart cookie name.
pub const CART_COOKIE_NAME: &str = "cart_session_id";

/// Guest cart cookie lifetime (30 days).
const CART_COOKIE_MAX_AGE_DAYS: i64 = 30;

/// Who the current cart belongs to, if anyone yet.
#[derive(Debug, Clone)]
pub struct CartIdentity {
    pub customer: Option<CurrentCustomer>,
    pub guest: Option<CartSessionId>,
}

impl CartIdentity {
    /// The owner for reads. `None` means there is no cart to show.
    #[must_use]
    pub fn owner(&self) -> Option<CartOwner> {
        self.customer
            .as_ref()
            .map(|c| CartOwner::Customer(c.id))
            .or_else(|| self.guest.map(CartOwner::Session))
    }

    /// The owner for writes, minting a guest cart id when there is none.
    ///
    /// The returned cookie must be sent with the response when present.
    #[must_use]
    pub fn owner_or_new(&self, secure: bool) -> (CartOwner, Option<CartCookie>) {
        match self.owner() {
            Some(owner) => (owner, None),
            None => {
                let id = CartSessionId::generate();
                (CartOwner::Session(id), Some(CartCookie { id, secure }))
            }
        }
    }
}

impl<S> FromRequestParts<S> for CartIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let OptionalAuth(customer) = OptionalAuth::from_request_parts(parts, state).await?;
        let guest = guest_cart_id(parts);
        Ok(Self { customer, guest })
    }
}

/// Read the guest cart id cookie. Malformed values are ignored.
fn guest_cart_id(parts: &Parts) -> Option<CartSessionId> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == CART_COOKIE_NAME)
        .and_then(|cookie| CartSessionId::parse(cookie.value()).ok())
}

/// Build the guest cart cookie.
#[must_use]
pub fn cart_cookie(id: CartSessionId, secure: bool) -> Cookie<'static> {
    Cookie::build((CART_COOKIE_NAME, id.to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::days(CART_COOKIE_MAX_AGE_DAYS))
        .build()
}

/// An expired guest cart cookie, sent once the guest cart has been merged.
#[must_use]
pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((CART_COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    cookie.make_removal();
    cookie
}

/// Response part that sets a freshly minted guest cart cookie.
#[derive(Debug, Clone, Copy)]
pub struct CartCookie {
    pub id: CartSessionId,
    pub secure: bool,
}

impl IntoResponseParts for CartCookie {
    type Error = std::convert::Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let cookie = cart_cookie(self.id, self.secure);
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            res.headers_mut().append(header::SET_COOKIE, value);
        }
        Ok(res)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;
    use larder_core::{CustomerId, Email};

    use super::*;

    fn parts_with_cookie(cookie: &str) -> Parts {
        let (parts, ()) = Request::builder()
            .uri("/api/cart")
            .header(header::COOKIE, cookie)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[tokio::test]
    async fn test_guest_cookie_is_read() {
        let id = CartSessionId::generate();
        let mut parts = parts_with_cookie(&format!("theme=dark; {CART_COOKIE_NAME}={id}"));

        let identity = CartIdentity::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(identity.customer.is_none());
        assert_eq!(identity.owner(), Some(CartOwner::Session(id)));
    }

    #[tokio::test]
    async fn test_malformed_cookie_ignored() {
        let mut parts = parts_with_cookie(&format!("{CART_COOKIE_NAME}=not-a-uuid"));
        let identity = CartIdentity::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(identity.owner(), None);
    }

    #[test]
    fn test_customer_wins_over_guest() {
        let identity = CartIdentity {
            customer: Some(CurrentCustomer {
                id: CustomerId::new(9),
                email: Email::parse("cook@example.com").unwrap(),
                name: String::new(),
            }),
            guest: Some(CartSessionId::generate()),
        };
        assert_eq!(identity.owner(), Some(CartOwner::Customer(CustomerId::new(9))));
        assert!(identity.owner_or_new(false).1.is_none());
    }

    #[test]
    fn test_owner_or_new_mints_cookie() {
        let identity = CartIdentity {
            customer: None,
            guest: None,
        };
        let (owner, cookie) = identity.owner_or_new(true);
        let cookie = cookie.unwrap();
        assert_eq!(owner, CartOwner::Session(cookie.id));
        assert!(cookie.secure);
    }

    #[test]
    fn test_cart_cookie_attributes() {
        let cookie = cart_cookie(CartSessionId::generate(), true).to_string();
        assert!(cookie.starts_with("cart_session_id="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Max-Age=2592000"));
    }
}
