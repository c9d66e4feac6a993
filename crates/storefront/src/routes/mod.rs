//! HTTP route handlers for the storefront API.
//!
//! # Routes
//!
//! - `GET /health`, `GET /health/ready` - Liveness and database readiness
//! - `/api/products`, `/api/categories` - Catalog reads with availability
//! - `/api/inventory/{product_id}` - Read-time inventory level
//! - `/api/cart` - Cart backed by inventory reservations
//! - `POST /api/checkout` - Turn the cart into a paid sale
//! - `/api/customer` - Logged-in customer profile and orders
//! - `POST /api/cron/cleanup-reservations` - Expired reservation sweep
//! - `/auth/*` - OAuth login, callback and logout

pub mod auth;
pub mod cart;
pub mod categories;
pub mod checkout;
pub mod cron;
pub mod customer;
pub mod inventory;
pub mod products;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter, checkout_rate_limiter};
use crate::state::AppState;

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
        .layer(auth_rate_limiter())
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index))
        .route("/products/{id}", get(products::show))
        .route("/categories", get(categories::index))
        .route("/categories/{name}", get(categories::show))
        .route("/inventory/{product_id}", get(inventory::show))
}

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/cart",
            get(cart::show).post(cart::add).delete(cart::clear),
        )
        .route(
            "/cart/{product_id}",
            put(cart::update).delete(cart::remove),
        )
}

pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/customer", get(customer::show))
        .route("/customer/orders", get(customer::orders))
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(catalog_routes())
        .merge(cart_routes())
        .merge(customer_routes())
        .route(
            "/cron/cleanup-reservations",
            post(cron::cleanup_reservations),
        )
        .layer(api_rate_limiter())
        // Checkout sits outside the general limiter with its own, stricter one.
        .route(
            "/checkout",
            post(checkout::checkout).layer(checkout_rate_limiter()),
        )
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes())
        .nest("/auth", auth_routes())
}
