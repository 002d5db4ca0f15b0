//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use domain::CartView;
use serde::{Deserialize, Serialize};
use store::ProductId;

use crate::Store;
use crate::error::ApiError;
use crate::extract::Identity;
use crate::routes::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub success: bool,
    pub message: String,
    pub cart: CartView,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub success: bool,
    pub message: String,
}

// -- Handlers --

/// POST /cart — create an empty cart for the current user.
#[tracing::instrument(skip(state))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<(StatusCode, Json<CartResponse>), ApiError> {
    let cart = state.cart_service.create(identity.user_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(CartResponse {
            success: true,
            message: "Cart created".to_string(),
            cart: CartView {
                lines: vec![],
                total: cart.total,
            },
        }),
    ))
}

/// PUT /cart/add — reserve stock and add a product to the cart.
#[tracing::instrument(skip(state, req))]
pub async fn add<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    state
        .checkout
        .add_item(
            identity.user_id,
            ProductId::new(req.product_id),
            req.quantity,
        )
        .await?;

    // Re-read for the product-resolved presentation.
    let cart = state.cart_service.get(identity.user_id).await?;

    Ok(Json(CartResponse {
        success: true,
        message: "Product added to cart".to_string(),
        cart,
    }))
}

/// GET /cart — the current user's cart with resolved product details.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.cart_service.get(identity.user_id).await?;

    Ok(Json(CartResponse {
        success: true,
        message: "Cart found".to_string(),
        cart,
    }))
}

/// DELETE /cart — cancel the cart, restoring reserved stock.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<CancelResponse>, ApiError> {
    state.checkout.cancel(identity.user_id).await?;

    Ok(Json(CancelResponse {
        success: true,
        message: "Cart cancelled and stock restored".to_string(),
    }))
}
