//! Customer browsing.

use axum::{Json, extract::State};
use serde::Serialize;

use larder_core::CustomerId;
use larder_db::models::{Customer, Page, SaleWithLines};
use larder_db::{CustomerRepository, SaleRepository};

use super::Pagination;
use crate::error::{ApiPath, ApiQuery, AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// A customer and their order history.
#[derive(Debug, Serialize)]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    pub orders: Vec<SaleWithLines>,
}

/// Customers, newest first.
///
/// # Route
///
/// `GET /api/customers?limit=&offset=`
pub async fn index(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> Result<Json<Page<Customer>>> {
    let (limit, offset) = page.window();
    Ok(Json(
        CustomerRepository::new(state.pool())
            .list(limit, offset)
            .await?,
    ))
}

/// # Route
///
/// `GET /api/customers/{id}`
pub async fn show(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CustomerId>,
) -> Result<Json<CustomerDetail>> {
    let customer = CustomerRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Customer {id} not found")))?;
    let orders = SaleRepository::new(state.pool())
        .list_for_customer(id)
        .await?;

    Ok(Json(CustomerDetail { customer, orders }))
}
