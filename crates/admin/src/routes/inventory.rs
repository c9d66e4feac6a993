//! Inventory levels and adjustments.
//!
//! Levels are computed at read time: on-hand minus active reservations.
//! Adjustments change on-hand only and take the product row lock, so they
//! serialize with cart writes and checkout.

use axum::{Json, extract::State};

use larder_core::{InventoryAdjustment, InventoryLevel, ProductId};
use larder_db::{ProductRepository, ReservationRepository};

use crate::error::{ApiJson, ApiPath, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Every product's inventory level.
///
/// # Route
///
/// `GET /api/inventory`
pub async fn index(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<InventoryLevel>>> {
    Ok(Json(
        ReservationRepository::new(state.pool())
            .inventory_levels()
            .await?,
    ))
}

/// Set or shift on-hand inventory. Going below zero is a 400.
///
/// # Route
///
/// `PATCH /api/inventory/{product_id}` with `{"set": n}` or `{"delta": n}`
#[tracing::instrument(skip_all, fields(admin = %admin.email, product_id = %product_id, ?adjustment))]
pub async fn adjust(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiJson(adjustment): ApiJson<InventoryAdjustment>,
) -> Result<Json<InventoryLevel>> {
    let level = ProductRepository::new(state.pool())
        .adjust_inventory(product_id, adjustment)
        .await?;
    Ok(Json(level))
}
