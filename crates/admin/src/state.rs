//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AdminConfig;
use crate::jwt::JwtKeys;
use crate::services::{OAuthClient, OAuthError};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    oauth: OAuthClient,
    jwt: JwtKeys,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the OAuth HTTP client cannot be built.
    pub fn new(config: AdminConfig, pool: PgPool) -> Result<Self, OAuthError> {
        let oauth = OAuthClient::new(&config.oauth)?;
        let jwt = JwtKeys::new(&config.jwt_secret);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                oauth,
                jwt,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn oauth(&self) -> &OAuthClient {
        &self.inner.oauth
    }

    /// Token signing and verification keys.
    #[must_use]
    pub fn jwt(&self) -> &JwtKeys {
        &self.inner.jwt
    }
}
