use thiserror::Error;

use common::{InvoiceId, UserId};

use crate::records::{ProductId, Version};

/// Errors that can occur when interacting with the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No product exists with the given ID.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The product exists but has been retired and accepts no reservations.
    #[error("Product unavailable: {0}")]
    ProductUnavailable(ProductId),

    /// A product with this ID already exists.
    #[error("Product already exists: {0}")]
    ProductExists(ProductId),

    /// The conditional stock decrement found fewer units than requested.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A concurrency conflict occurred when writing a cart.
    /// The expected version did not match the actual version.
    #[error("Version conflict for cart of user {user_id}: expected {expected}, found {actual}")]
    VersionConflict {
        user_id: UserId,
        expected: Version,
        actual: Version,
    },

    /// The invoice was not found.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
