//! Session middleware configuration for admin.
//!
//! `PostgreSQL`-backed sessions through tower-sessions, used only to hold the
//! OAuth `state` between login and callback. Stricter than the storefront:
//! SameSite=Lax is the minimum the provider redirect allows, and sessions
//! expire after an hour.

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::AdminConfig;

/// Session cookie name for admin.
pub const SESSION_COOKIE_NAME: &str = "larder_admin_session";

/// Session expiry time in seconds.
const SESSION_EXPIRY_SECONDS: i64 = 60 * 60;

/// Create the session store, sharing the application pool.
#[must_use]
pub fn session_store(pool: &PgPool) -> PostgresStore {
    PostgresStore::new(pool.clone())
}

/// Create the session layer over `store`.
#[must_use]
pub fn create_session_layer(
    store: PostgresStore,
    config: &AdminConfig,
) -> SessionManagerLayer<PostgresStore> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.secure_cookies())
        // Lax: the provider callback is a cross-site top-level navigation
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
