//! Invoice endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::AmendItem;
use common::InvoiceId;
use domain::InvoiceView;
use serde::{Deserialize, Serialize};
use store::{Invoice, ProductId};

use crate::Store;
use crate::error::ApiError;
use crate::extract::Identity;
use crate::routes::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct AmendRequest {
    pub products: Vec<AmendItemRequest>,
}

#[derive(Deserialize)]
pub struct AmendItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct InvoiceResponse {
    pub success: bool,
    pub message: String,
    pub invoice: Invoice,
}

#[derive(Serialize)]
pub struct InvoiceListResponse {
    pub success: bool,
    pub invoices: Vec<InvoiceView>,
}

// -- Handlers --

/// POST /invoices — commit the current user's cart into an invoice.
#[tracing::instrument(skip(state))]
pub async fn commit<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<(StatusCode, Json<InvoiceResponse>), ApiError> {
    let invoice = state.checkout.commit(identity.user_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse {
            success: true,
            message: "Invoice created".to_string(),
            invoice,
        }),
    ))
}

/// GET /invoices — the current user's invoices with resolved product details.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<InvoiceListResponse>, ApiError> {
    let invoices = state.invoice_service.list(identity.user_id).await?;

    Ok(Json(InvoiceListResponse {
        success: true,
        invoices,
    }))
}

/// PUT /invoices/:id — administratively replace an invoice's line items.
#[tracing::instrument(skip(state, req))]
pub async fn amend<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
    Json(req): Json<AmendRequest>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let invoice_id = parse_invoice_id(&id)?;
    let items = req
        .products
        .into_iter()
        .map(|item| AmendItem::new(ProductId::new(item.product_id), item.quantity))
        .collect();

    let invoice = state
        .checkout
        .amend(invoice_id, items, identity.role)
        .await?;

    Ok(Json(InvoiceResponse {
        success: true,
        message: "Invoice amended".to_string(),
        invoice,
    }))
}

fn parse_invoice_id(id: &str) -> Result<InvoiceId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid invoice ID: {e}")))?;
    Ok(InvoiceId::from_uuid(uuid))
}
