//! Product management.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use larder_core::{CategoryName, ProductId};
use larder_db::ProductRepository;
use larder_db::models::{NewProduct, Product, ProductUpdate, ProductWithAvailability};

use crate::error::{ApiJson, ApiPath, ApiQuery, AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
}

/// List products with availability, optionally for one category.
///
/// # Route
///
/// `GET /api/products?category=`
pub async fn index(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<Vec<ProductWithAvailability>>> {
    let category = query
        .category
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(CategoryName::parse)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(Json(
        ProductRepository::new(state.pool())
            .list(category.as_ref())
            .await?,
    ))
}

/// # Route
///
/// `GET /api/products/{id}`
pub async fn show(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ProductWithAvailability>> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))
}

/// Create a product. An unknown category is a 404.
///
/// # Route
///
/// `POST /api/products`
#[tracing::instrument(skip_all, fields(admin = %admin.email))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    input.validate().map_err(AppError::BadRequest)?;

    let product = ProductRepository::new(state.pool()).create(&input).await?;
    tracing::info!(product_id = %product.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Partially update a product.
///
/// # Route
///
/// `PUT /api/products/{id}`
#[tracing::instrument(skip_all, fields(admin = %admin.email, product_id = %id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(input): ApiJson<ProductUpdate>,
) -> Result<Json<Product>> {
    if input.is_empty() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }
    input.validate().map_err(AppError::BadRequest)?;

    let product = ProductRepository::new(state.pool()).update(id, &input).await?;
    tracing::info!("product updated");
    Ok(Json(product))
}

/// Delete a product. Products that have been sold cannot be deleted.
///
/// # Route
///
/// `DELETE /api/products/{id}`
#[tracing::instrument(skip_all, fields(admin = %admin.email, product_id = %id))]
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<StatusCode> {
    if !ProductRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::NotFound(format!("Product {id} not found")));
    }
    tracing::info!("product deleted");
    Ok(StatusCode::NO_CONTENT)
}
