//! Order (sale) browsing.

use axum::{Json, extract::State};

use larder_core::SaleId;
use larder_db::SaleRepository;
use larder_db::models::{Page, SaleSummary, SaleWithLines};

use super::Pagination;
use crate::error::{ApiPath, ApiQuery, AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Sales, newest first.
///
/// # Route
///
/// `GET /api/orders?limit=&offset=`
pub async fn index(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> Result<Json<Page<SaleSummary>>> {
    let (limit, offset) = page.window();
    Ok(Json(
        SaleRepository::new(state.pool()).list(limit, offset).await?,
    ))
}

/// A sale with its lines.
///
/// # Route
///
/// `GET /api/orders/{id}`
pub async fn show(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SaleId>,
) -> Result<Json<SaleWithLines>> {
    SaleRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))
}
