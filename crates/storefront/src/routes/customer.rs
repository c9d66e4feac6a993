//! Logged-in customer handlers.

use axum::{Json, extract::State};

use larder_db::models::{Customer, SaleWithLines};
use larder_db::{CustomerRepository, SaleRepository};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// The logged-in customer's profile.
///
/// # Route
///
/// `GET /api/customer`
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<Customer>> {
    CustomerRepository::new(state.pool())
        .get(current.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))
}

/// The logged-in customer's orders, newest first.
///
/// # Route
///
/// `GET /api/customer/orders`
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<Vec<SaleWithLines>>> {
    let orders = SaleRepository::new(state.pool())
        .list_for_customer(current.id)
        .await?;
    Ok(Json(orders))
}
