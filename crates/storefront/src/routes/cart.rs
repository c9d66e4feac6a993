//! Cart handlers.
//!
//! Every cart line is an inventory reservation. Writes go through
//! [`ReservationRepository`], which locks the product row, so two carts
//! racing for the last unit cannot both get it.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use larder_core::ProductId;
use larder_db::ReservationRepository;
use larder_db::models::Cart;

use crate::error::{ApiJson, ApiPath, AppError, Result};
use crate::middleware::{CartCookie, CartIdentity};
use crate::state::AppState;

/// Request body for adding to the cart.
#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Request body for setting a line's quantity.
#[derive(Debug, Deserialize)]
pub struct SetQuantity {
    pub quantity: i64,
}

fn secure_cookies(state: &AppState) -> bool {
    state.config().base_url.starts_with("https://")
}

/// Show the current cart. Empty when the caller has no cart yet.
///
/// # Route
///
/// `GET /api/cart`
pub async fn show(State(state): State<AppState>, identity: CartIdentity) -> Result<Json<Cart>> {
    let Some(owner) = identity.owner() else {
        return Ok(Json(Cart::default()));
    };
    Ok(Json(ReservationRepository::new(state.pool()).cart(owner).await?))
}

/// Reserve units of a product, adding to any existing line.
///
/// # Route
///
/// `POST /api/cart`
#[tracing::instrument(skip(state, identity))]
pub async fn add(
    State(state): State<AppState>,
    identity: CartIdentity,
    ApiJson(body): ApiJson<AddToCart>,
) -> Result<(StatusCode, Option<CartCookie>, Json<Cart>)> {
    let (owner, cookie) = identity.owner_or_new(secure_cookies(&state));
    let reservations = ReservationRepository::new(state.pool());

    reservations
        .reserve(
            owner,
            body.product_id,
            body.quantity,
            state.config().reservation_ttl,
        )
        .await?;

    let cart = reservations.cart(owner).await?;
    Ok((StatusCode::CREATED, cookie, Json(cart)))
}

/// Set a line to an absolute quantity. Zero removes the line.
///
/// # Route
///
/// `PUT /api/cart/{product_id}`
#[tracing::instrument(skip(state, identity))]
pub async fn update(
    State(state): State<AppState>,
    identity: CartIdentity,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<SetQuantity>,
) -> Result<(Option<CartCookie>, Json<Cart>)> {
    if body.quantity == 0 && identity.owner().is_none() {
        return Ok((None, Json(Cart::default())));
    }

    let (owner, cookie) = identity.owner_or_new(secure_cookies(&state));
    let reservations = ReservationRepository::new(state.pool());

    reservations
        .set_quantity(
            owner,
            product_id,
            body.quantity,
            state.config().reservation_ttl,
        )
        .await?;

    let cart = reservations.cart(owner).await?;
    Ok((cookie, Json(cart)))
}

/// Remove a line and release its units.
///
/// # Route
///
/// `DELETE /api/cart/{product_id}`
#[tracing::instrument(skip(state, identity))]
pub async fn remove(
    State(state): State<AppState>,
    identity: CartIdentity,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<Cart>> {
    let not_in_cart = || AppError::NotFound(format!("Product {product_id} is not in the cart"));
    let owner = identity.owner().ok_or_else(not_in_cart)?;
    let reservations = ReservationRepository::new(state.pool());

    if !reservations.release(owner, product_id).await? {
        return Err(not_in_cart());
    }

    Ok(Json(reservations.cart(owner).await?))
}

/// Empty the cart.
///
/// # Route
///
/// `DELETE /api/cart`
pub async fn clear(State(state): State<AppState>, identity: CartIdentity) -> Result<Json<Cart>> {
    if let Some(owner) = identity.owner() {
        let released = ReservationRepository::new(state.pool()).clear(owner).await?;
        tracing::debug!(owner = owner.kind(), released, "cart cleared");
    }
    Ok(Json(Cart::default()))
}
