//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::{OAuthClient, OAuthError, PaymentError, PaymentsClient};

/// Error building the shared HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payments client: {0}")]
    Payments(#[from] PaymentError),
    #[error("oauth client: {0}")]
    OAuth(#[from] OAuthError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    payments: PaymentsClient,
    oauth: OAuthClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an outbound HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let payments = PaymentsClient::new(&config.payments)?;
        let oauth = OAuthClient::new(&config.oauth)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                payments,
                oauth,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the payments API client.
    #[must_use]
    pub fn payments(&self) -> &PaymentsClient {
        &self.inner.payments
    }

    /// Get a reference to the OAuth provider client.
    #[must_use]
    pub fn oauth(&self) -> &OAuthClient {
        &self.inner.oauth
    }
}
