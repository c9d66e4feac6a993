//! Staff login.
//!
//! The provider proves who the caller is; `ADMIN_EMAILS` decides whether they
//! are staff. A successful login sets the `auth_token` cookie and nothing
//! else: the session only lives long enough to carry the OAuth `state`.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use rand::{Rng, distr::Alphanumeric};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{ApiQuery, AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{AuthCookie, RequireAdmin};
use crate::models::{CurrentAdmin, session_keys};
use crate::state::AppState;

/// Length of the OAuth `state` parameter.
const STATE_LENGTH: usize = 32;

/// Query parameters from the provider callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

fn generate_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

/// Redirect to the provider's login page.
///
/// # Route
///
/// `GET /auth/login`
pub async fn login(State(state): State<AppState>, session: Session) -> Result<Redirect> {
    let oauth_state = generate_state();
    session
        .insert(session_keys::OAUTH_STATE, &oauth_state)
        .await?;

    let redirect_uri = state.config().oauth_redirect_uri();
    Ok(Redirect::to(
        &state.oauth().authorization_url(&redirect_uri, &oauth_state),
    ))
}

/// Handle the provider callback and issue the admin token.
///
/// # Route
///
/// `GET /auth/callback`
#[tracing::instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<CallbackQuery>,
) -> Result<Response> {
    if let Some(error) = query.error {
        tracing::warn!(%error, "provider refused admin login");
        return Err(AppError::Unauthorized("Login was not completed".to_string()));
    }
    let (Some(code), Some(returned_state)) = (query.code, query.state) else {
        return Err(AppError::BadRequest("Missing code or state".to_string()));
    };

    let stored_state: Option<String> = session.remove(session_keys::OAUTH_STATE).await?;
    if stored_state.as_deref() != Some(returned_state.as_str()) {
        tracing::warn!("OAuth state mismatch");
        return Err(AppError::BadRequest("Invalid login state".to_string()));
    }

    let redirect_uri = state.config().oauth_redirect_uri();
    let info = state.oauth().identify(&code, &redirect_uri).await?;
    let email = info.verified_email()?;

    if !state.config().is_admin(&email) {
        tracing::warn!(email = %email, "login refused: not on the admin allow-list");
        return Err(AppError::Unauthorized("Not an admin".to_string()));
    }

    let token = state
        .jwt()
        .issue(email.as_str(), info.name.as_deref().unwrap_or_default())?;
    set_sentry_user(email.as_str());
    tracing::info!(email = %email, "admin logged in");

    Ok((
        AuthCookie::issue(token, state.config().secure_cookies()),
        Redirect::to("/"),
    )
        .into_response())
}

/// Log out by expiring the token cookie.
///
/// # Route
///
/// `POST /auth/logout`
pub async fn logout(State(state): State<AppState>) -> (AuthCookie, StatusCode) {
    clear_sentry_user();
    (
        AuthCookie::clear(state.config().secure_cookies()),
        StatusCode::NO_CONTENT,
    )
}

/// The logged-in admin.
///
/// # Route
///
/// `GET /api/me`
pub async fn me(RequireAdmin(admin): RequireAdmin) -> Json<CurrentAdmin> {
    Json(admin)
}
