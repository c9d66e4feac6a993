//! Admin authentication.
//!
//! [`RequireAdmin`] reads the `auth_token` cookie, verifies it against the
//! configured key, and re-checks the email against the allow-list so that
//! removing someone from `ADMIN_EMAILS` takes effect without waiting for
//! their token to expire.

use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, header, request::Parts},
    response::{IntoResponseParts, ResponseParts},
};
use tower_sessions::cookie::{Cookie, SameSite, time::Duration};

use larder_core::Email;

use crate::error::AppError;
use crate::jwt::TOKEN_TTL_HOURS;
use crate::models::CurrentAdmin;
use crate::state::AppState;

/// Admin token cookie name.
pub const AUTH_COOKIE_NAME: &str = "auth_token";

/// Extractor that requires a valid admin token.
pub struct RequireAdmin(pub CurrentAdmin);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = auth_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Not logged in".to_string()))?;
        let claims = state.jwt().verify(&token)?;

        let allowed = Email::parse(&claims.sub).is_ok_and(|email| state.config().is_admin(&email));
        if !allowed {
            tracing::warn!(email = %claims.sub, "token for an email no longer on the allow-list");
            return Err(AppError::Unauthorized("Not an admin".to_string()));
        }

        Ok(Self(claims.into()))
    }
}

/// Read the `auth_token` cookie value.
fn auth_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == AUTH_COOKIE_NAME)
        .map(|cookie| cookie.value().to_owned())
}

/// Response part that sets or clears the `auth_token` cookie.
#[derive(Debug, Clone)]
pub struct AuthCookie(Cookie<'static>);

impl AuthCookie {
    /// Cookie carrying a freshly issued token.
    #[must_use]
    pub fn issue(token: String, secure: bool) -> Self {
        let cookie = Cookie::build((AUTH_COOKIE_NAME, token))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Strict)
            .max_age(Duration::hours(TOKEN_TTL_HOURS))
            .build();
        Self(cookie)
    }

    /// Expired cookie that logs the browser out.
    #[must_use]
    pub fn clear(secure: bool) -> Self {
        let mut cookie = Cookie::build((AUTH_COOKIE_NAME, ""))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Strict)
            .build();
        cookie.make_removal();
        Self(cookie)
    }
}

impl IntoResponseParts for AuthCookie {
    type Error = std::convert::Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if let Ok(value) = HeaderValue::from_str(&self.0.to_string()) {
            res.headers_mut().append(header::SET_COOKIE, value);
        }
        Ok(res)
    }
}
