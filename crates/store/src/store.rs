use async_trait::async_trait;

use common::{InvoiceId, Money, UserId};

use crate::records::{Cart, Invoice, Product, ProductId, ProductPatch, Version};
use crate::Result;

/// Options for writing a cart to the store.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Expected version of the cart for optimistic concurrency control.
    /// If None, no version check is performed (use with caution).
    pub expected_version: Option<Version>,
}

impl PutOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the cart to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Creates options expecting the cart to not exist yet.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// The product ledger: authoritative stock counts and prices.
///
/// `reserve` and `release` are the only ways stock moves in normal
/// operation. Both must be atomic per product: the read-modify-write of
/// `stock` happens in a single critical section (or a single conditional
/// database statement), never as separate read and write calls.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Creates a product. Fails with `ProductExists` on a duplicate ID.
    async fn insert_product(&self, product: Product) -> Result<()>;

    /// Looks up a product by ID.
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>>;

    /// Applies an administrative patch, returning the updated product.
    /// Fails with `ProductNotFound` if absent.
    async fn update_product(&self, product_id: &ProductId, patch: ProductPatch) -> Result<Product>;

    /// Atomically decrements stock by `quantity` and returns the product's
    /// current unit price.
    ///
    /// Fails with `ProductNotFound` if the product is absent,
    /// `ProductUnavailable` if it is retired, and `InsufficientStock` if
    /// fewer than `quantity` units remain. On failure no stock is mutated.
    async fn reserve(&self, product_id: &ProductId, quantity: u32) -> Result<Money>;

    /// Atomically increments stock by `quantity`.
    ///
    /// Fails with `ProductNotFound` if the product is absent. This
    /// operation has no memory of which reservation it undoes; callers
    /// must pass exactly the quantity they reserved.
    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<()>;

    /// Read-only price lookup. Returns None if the product is absent.
    async fn price_of(&self, product_id: &ProductId) -> Result<Option<Money>>;
}

/// Storage for shopping carts, keyed by owner. At most one cart per user.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Loads the cart for a user, if one exists.
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>>;

    /// Writes a cart.
    ///
    /// If `options.expected_version` is set, the operation fails with
    /// `VersionConflict` when the stored version doesn't match (a missing
    /// cart counts as `Version::initial()`). On success the cart is stored
    /// at the next version, which is returned.
    async fn put_cart(&self, cart: &Cart, options: PutOptions) -> Result<Version>;

    /// Deletes the cart for a user. Returns whether a cart existed.
    async fn delete_cart(&self, user_id: UserId) -> Result<bool>;
}

/// Storage for issued invoices.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Persists a new invoice.
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<()>;

    /// Loads an invoice by ID.
    async fn get_invoice(&self, invoice_id: InvoiceId) -> Result<Option<Invoice>>;

    /// Replaces a stored invoice. Fails with `InvoiceNotFound` if absent.
    async fn update_invoice(&self, invoice: &Invoice) -> Result<()>;

    /// Returns all invoices for a user, oldest first.
    async fn invoices_for_user(&self, user_id: UserId) -> Result<Vec<Invoice>>;
}
