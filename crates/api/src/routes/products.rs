//! Administrative product endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::Money;
use serde::{Deserialize, Serialize};
use store::{Product, ProductId, ProductPatch};

use crate::Store;
use crate::error::ApiError;
use crate::extract::Identity;
use crate::routes::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub stock: u32,
}

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    pub stock: Option<u32>,
    pub status: Option<bool>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub success: bool,
    pub message: String,
    pub product: Product,
}

// -- Handlers --

/// POST /products — create a product. Admin only.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    if req.price_cents < 0 {
        return Err(ApiError::BadRequest(
            "Price must not be negative".to_string(),
        ));
    }

    let product = Product::new(
        ProductId::new(req.id),
        req.name,
        Money::from_cents(req.price_cents),
        req.stock,
    );

    let product = state
        .catalog_service
        .create(product, identity.role)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ProductResponse {
            success: true,
            message: "Product created".to_string(),
            product,
        }),
    ))
}

/// PUT /products/:id — update a product's fields. Admin only.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    if req.price_cents.is_some_and(|p| p < 0) {
        return Err(ApiError::BadRequest(
            "Price must not be negative".to_string(),
        ));
    }

    let patch = ProductPatch {
        name: req.name,
        price: req.price_cents.map(Money::from_cents),
        stock: req.stock,
        status: req.status,
    };

    let product = state
        .catalog_service
        .update(&ProductId::new(id), patch, identity.role)
        .await?;

    Ok(Json(ProductResponse {
        success: true,
        message: "Product updated".to_string(),
        product,
    }))
}
