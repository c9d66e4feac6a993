//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health, /health/ready           - Liveness and database readiness
//!
//! # Auth (OAuth, allow-listed emails only)
//! GET  /auth/login                      - Redirect to the provider
//! GET  /auth/callback                   - Set the auth_token cookie
//! POST /auth/logout                     - Clear the auth_token cookie
//!
//! # API (auth_token required)
//! GET  /api/me                          - Who is logged in
//! GET|POST /api/products                - List / create
//! GET|PUT|DELETE /api/products/{id}     - Show / update / delete
//! GET|POST /api/categories              - List / create
//! GET|PUT|DELETE /api/categories/{name} - Show / update / delete
//! GET  /api/orders, /api/orders/{id}    - Sales, newest first
//! GET  /api/customers, /api/customers/{id}
//! GET  /api/inventory                   - Every product's inventory level
//! PATCH /api/inventory/{product_id}     - {"set": n} or {"delta": n}
//! ```

pub mod auth;
pub mod categories;
pub mod customers;
pub mod inventory;
pub mod orders;
pub mod products;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
};
use serde::Deserialize;

use crate::state::AppState;

/// Default page size for listings.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Largest page size a caller may ask for.
pub const MAX_PAGE_SIZE: i64 = 200;

/// `limit` / `offset` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// Clamp to a sane window: `limit` in `1..=MAX_PAGE_SIZE`, `offset >= 0`.
    #[must_use]
    pub fn window(&self) -> (i64, i64) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

/// Liveness health check. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check.
///
/// Returns 503 Service Unavailable if the database is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .route("/logout", post(auth::logout))
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(auth::me))
        .route("/products", get(products::index).post(products::create))
        .route(
            "/products/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
        .route(
            "/categories",
            get(categories::index).post(categories::create),
        )
        .route(
            "/categories/{name}",
            get(categories::show)
                .put(categories::update)
                .delete(categories::delete),
        )
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/customers", get(customers::index))
        .route("/customers/{id}", get(customers::show))
        .route("/inventory", get(inventory::index))
        .route("/inventory/{product_id}", patch(inventory::adjust))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/auth", auth_routes())
        .nest("/api", api_routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults_and_clamps() {
        assert_eq!(Pagination::default().window(), (DEFAULT_PAGE_SIZE, 0));

        let wild = Pagination {
            limit: Some(10_000),
            offset: Some(-4),
        };
        assert_eq!(wild.window(), (MAX_PAGE_SIZE, 0));

        let zero = Pagination {
            limit: Some(0),
            offset: Some(20),
        };
        assert_eq!(zero.window(), (1, 20));
    }
}
