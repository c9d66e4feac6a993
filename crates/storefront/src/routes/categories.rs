//! Category read handlers.

use axum::{Json, extract::State};
use serde::Serialize;

use larder_core::CategoryName;
use larder_db::models::{Category, ProductWithAvailability};
use larder_db::{CategoryRepository, ProductRepository};

use crate::error::{ApiPath, AppError, Result};
use crate::state::AppState;

/// A category with the products filed under it.
#[derive(Debug, Serialize)]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: Category,
    pub products: Vec<ProductWithAvailability>,
}

/// List categories.
///
/// # Route
///
/// `GET /api/categories`
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(CategoryRepository::new(state.pool()).list().await?))
}

/// Show a category and its products.
///
/// # Route
///
/// `GET /api/categories/{name}`
#[tracing::instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    ApiPath(name): ApiPath<String>,
) -> Result<Json<CategoryDetail>> {
    let not_found = || AppError::NotFound(format!("Category {name} not found"));
    let name = CategoryName::parse(&name).map_err(|_| not_found())?;

    let category = CategoryRepository::new(state.pool())
        .get(&name)
        .await?
        .ok_or_else(not_found)?;
    let products = ProductRepository::new(state.pool())
        .list(Some(&name))
        .await?;

    Ok(Json(CategoryDetail { category, products }))
}
