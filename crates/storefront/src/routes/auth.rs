//! Customer OAuth login.
//!
//! - Login: store a random `state` in the session and redirect to the provider
//! - Callback: check `state`, exchange the code, upsert the customer, fold the
//!   guest cart into the customer cart, and mark the session logged in
//! - Logout: drop the session

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use rand::{Rng, distr::Alphanumeric};
use serde::Deserialize;
use tower_sessions::Session;

use larder_db::{CustomerRepository, ReservationRepository};

use crate::error::{ApiQuery, AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::cart::removal_cookie;
use crate::middleware::{CartIdentity, clear_current_customer, set_current_customer};
use crate::models::{CurrentCustomer, session_keys};
use crate::state::AppState;

/// Length of the OAuth `state` parameter.
const STATE_LENGTH: usize = 32;

/// Query parameters from the provider callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Generate a random alphanumeric string.
fn generate_random_string(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Redirect to the provider's login page.
///
/// # Route
///
/// `GET /auth/login`
pub async fn login(State(state): State<AppState>, session: Session) -> Result<Redirect> {
    let oauth_state = generate_random_string(STATE_LENGTH);
    session
        .insert(session_keys::OAUTH_STATE, &oauth_state)
        .await?;

    let redirect_uri = state.config().oauth_redirect_uri();
    let url = state.oauth().authorization_url(&redirect_uri, &oauth_state);
    Ok(Redirect::to(&url))
}

/// Handle the provider callback.
///
/// # Route
///
/// `GET /auth/callback`
#[tracing::instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    identity: CartIdentity,
    ApiQuery(query): ApiQuery<CallbackQuery>,
) -> Result<Response> {
    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        tracing::warn!(%error, %description, "provider refused login");
        return Err(AppError::Unauthorized("Login was not completed".to_string()));
    }

    let (Some(code), Some(returned_state)) = (query.code, query.state) else {
        return Err(AppError::BadRequest("Missing code or state".to_string()));
    };

    // One-time use: removed whether or not it matches.
    let stored_state: Option<String> = session.remove(session_keys::OAUTH_STATE).await?;
    if stored_state.as_deref() != Some(returned_state.as_str()) {
        tracing::warn!("OAuth state mismatch");
        return Err(AppError::BadRequest("Invalid login state".to_string()));
    }

    let redirect_uri = state.config().oauth_redirect_uri();
    let token = state.oauth().exchange_code(&code, &redirect_uri).await?;
    let oauth_identity = state
        .oauth()
        .userinfo(&token.access_token)
        .await?
        .into_identity()?;

    let customer = CustomerRepository::new(state.pool())
        .upsert_oauth(&oauth_identity)
        .await?;

    let merged = if let Some(guest) = identity.guest {
        ReservationRepository::new(state.pool())
            .merge_session_into_customer(guest, customer.id, state.config().reservation_ttl)
            .await?;
        true
    } else {
        false
    };

    set_current_customer(&session, &CurrentCustomer::from(&customer)).await?;
    set_sentry_user(&customer.id, Some(customer.email.as_str()));
    tracing::info!(customer_id = %customer.id, "customer logged in");

    let mut response = Redirect::to("/").into_response();
    if merged
        && let Ok(value) = HeaderValue::from_str(&removal_cookie().to_string())
    {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    Ok(response)
}

/// Log out.
///
/// # Route
///
/// `POST /auth/logout`
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_customer(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_random_string() {
        let a = generate_random_string(STATE_LENGTH);
        let b = generate_random_string(STATE_LENGTH);
        assert_eq!(a.len(), STATE_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
