//! Category management.

use axum::{Json, extract::State, http::StatusCode};

use larder_core::CategoryName;
use larder_db::CategoryRepository;
use larder_db::models::{Category, CategoryUpdate, NewCategory};

use crate::error::{ApiJson, ApiPath, AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Parse a path segment as a category name. Anything unparseable cannot
/// exist, so it is a 404 rather than a 400.
fn category_name(raw: &str) -> Result<CategoryName> {
    CategoryName::parse(raw).map_err(|_| not_found(raw))
}

fn not_found(name: &str) -> AppError {
    AppError::NotFound(format!("Category {name} not found"))
}

/// # Route
///
/// `GET /api/categories`
pub async fn index(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>> {
    Ok(Json(CategoryRepository::new(state.pool()).list().await?))
}

/// # Route
///
/// `GET /api/categories/{name}`
pub async fn show(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiPath(raw): ApiPath<String>,
) -> Result<Json<Category>> {
    let name = category_name(&raw)?;
    CategoryRepository::new(state.pool())
        .get(&name)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(&raw))
}

/// Create a category. A taken name is a 409.
///
/// # Route
///
/// `POST /api/categories`
#[tracing::instrument(skip_all, fields(admin = %admin.email, category = %input.name))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewCategory>,
) -> Result<(StatusCode, Json<Category>)> {
    let category = CategoryRepository::new(state.pool()).create(&input).await?;
    tracing::info!("category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// Update a category's description or image.
///
/// # Route
///
/// `PUT /api/categories/{name}`
#[tracing::instrument(skip_all, fields(admin = %admin.email, category = %raw))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(raw): ApiPath<String>,
    ApiJson(input): ApiJson<CategoryUpdate>,
) -> Result<Json<Category>> {
    let name = category_name(&raw)?;
    let category = CategoryRepository::new(state.pool())
        .update(&name, &input)
        .await?;
    Ok(Json(category))
}

/// Delete a category. Refused with 409 while products are filed under it.
///
/// # Route
///
/// `DELETE /api/categories/{name}`
#[tracing::instrument(skip_all, fields(admin = %admin.email, category = %raw))]
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(raw): ApiPath<String>,
) -> Result<StatusCode> {
    let name = category_name(&raw)?;
    if !CategoryRepository::new(state.pool()).delete(&name).await? {
        return Err(not_found(&raw));
    }
    tracing::info!("category deleted");
    Ok(StatusCode::NO_CONTENT)
}
