//! Catalog read handlers.

use axum::{Json, extract::State};
use serde::Deserialize;

use larder_core::{CategoryName, ProductId};
use larder_db::ProductRepository;
use larder_db::models::ProductWithAvailability;

use crate::error::{ApiPath, ApiQuery, AppError, Result};
use crate::state::AppState;

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
}

impl ProductQuery {
    /// The category filter, if one was given. An empty value means no filter.
    fn category(&self) -> Result<Option<CategoryName>> {
        self.category
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(CategoryName::parse)
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))
    }
}

/// List products with their available inventory.
///
/// # Route
///
/// `GET /api/products?category=`
#[tracing::instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<Vec<ProductWithAvailability>>> {
    let category = query.category()?;
    let products = ProductRepository::new(state.pool())
        .list(category.as_ref())
        .await?;
    Ok(Json(products))
}

/// Show one product.
///
/// # Route
///
/// `GET /api/products/{id}`
#[tracing::instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ProductWithAvailability>> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_category_means_all() {
        let query = ProductQuery {
            category: Some("  ".to_owned()),
        };
        assert!(query.category().unwrap().is_none());
        assert!(ProductQuery::default().category().unwrap().is_none());
    }

    #[test]
    fn test_category_is_parsed() {
        let query = ProductQuery {
            category: Some(" Chiles ".to_owned()),
        };
        assert_eq!(query.category().unwrap().unwrap().as_str(), "Chiles");
    }

    #[test]
    fn test_bad_category_rejected() {
        let query = ProductQuery {
            category: Some("a/b".to_owned()),
        };
        assert!(matches!(query.category(), Err(AppError::BadRequest(_))));
    }
}
