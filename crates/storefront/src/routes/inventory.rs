//! Read-time inventory for one product.

use axum::{Json, extract::State};

use larder_core::{InventoryLevel, ProductId};
use larder_db::ReservationRepository;

use crate::error::{ApiPath, AppError, Result};
use crate::state::AppState;

/// Total, reserved and available units for a product.
///
/// # Route
///
/// `GET /api/inventory/{product_id}`
pub async fn show(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<InventoryLevel>> {
    ReservationRepository::new(state.pool())
        .inventory_level(product_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Product {product_id} not found")))
}
