//! Domain error taxonomy.

use thiserror::Error;

use common::{InvoiceId, UserId};
use store::{ProductId, StoreError};

/// Errors surfaced by storefront operations.
///
/// Every reservation failure is a definitive business-rule rejection: none
/// are retried automatically, and none leave a ledger mutation behind.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The operation requires the admin role.
    #[error("Operation requires the admin role")]
    Forbidden,

    /// No cart exists for the user.
    #[error("No cart exists for user {0}")]
    CartNotFound(UserId),

    /// The user already has a cart.
    #[error("User {0} already has a cart")]
    CartExists(UserId),

    /// The user's cart was modified concurrently; the caller should retry.
    #[error("Cart for user {0} was modified concurrently")]
    CartConflict(UserId),

    /// The cart has no lines, so there is nothing to commit.
    #[error("Cart for user {0} is empty")]
    EmptyCart(UserId),

    /// No product exists with the given ID.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A product with this ID already exists.
    #[error("Product already exists: {0}")]
    ProductExists(ProductId),

    /// The product has been retired and accepts no reservations.
    #[error("Product unavailable: {0}")]
    ProductUnavailable(ProductId),

    /// Fewer units remain than the reservation asked for.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The invoice was not found.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    /// Quantities must be at least 1.
    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity { quantity: u32 },

    /// Unexpected storage failure; no state is assumed committed.
    #[error("Storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ProductNotFound(id) => DomainError::ProductNotFound(id),
            StoreError::ProductUnavailable(id) => DomainError::ProductUnavailable(id),
            StoreError::ProductExists(id) => DomainError::ProductExists(id),
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StoreError::VersionConflict { user_id, .. } => DomainError::CartConflict(user_id),
            StoreError::InvoiceNotFound(id) => DomainError::InvoiceNotFound(id),
            other => DomainError::Storage(other),
        }
    }
}
