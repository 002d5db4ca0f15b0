use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{InvoiceId, Money, UserId};

/// Product identifier (SKU).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Version number for a cart document, used for optimistic concurrency control.
///
/// A cart's version starts at 1 on its first write and increments by 1 on
/// each subsequent write.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) for a cart that has never been written.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the first version (1) for the first write.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A catalog product with its authoritative stock count and price.
///
/// Stock is mutated only through the ledger's `reserve`/`release` contract
/// or an administrative `update`; it can never go negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// The product identifier.
    pub id: ProductId,

    /// Human-readable product name.
    pub name: String,

    /// Price per unit in cents.
    pub price: Money,

    /// Units currently available for reservation.
    pub stock: u32,

    /// Whether the product is active. Retired products (`false`)
    /// reject new reservations but can still be released back to.
    pub status: bool,
}

impl Product {
    /// Creates a new active product.
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock,
            status: true,
        }
    }
}

/// Administrative field-level update for a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub price: Option<Money>,
    pub stock: Option<u32>,
    pub status: Option<bool>,
}

/// A line in a shopping cart.
///
/// The quantity has already been reserved (decremented) from the product's
/// stock on behalf of the cart's owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// The reserved product.
    pub product_id: ProductId,

    /// Reserved quantity, always at least 1.
    pub quantity: u32,
}

impl CartLine {
    /// Creates a new cart line.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A user's shopping cart. At most one exists per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// The owning user.
    pub user_id: UserId,

    /// Reserved line items.
    pub lines: Vec<CartLine>,

    /// Sum of `price * quantity` over all lines, recomputed with fresh
    /// prices on every mutation.
    pub total: Money,

    /// Stored version for optimistic concurrency.
    pub version: Version,
}

impl Cart {
    /// Creates a new empty cart that has not been written yet.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            lines: Vec::new(),
            total: Money::zero(),
            version: Version::initial(),
        }
    }

    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns the line for a product, if present.
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.product_id == product_id)
    }
}

/// A line in an issued invoice: a snapshot of the reserved quantity at
/// commit time. The price was folded into the invoice total and is not
/// re-read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// The invoiced product.
    pub product_id: ProductId,

    /// Quantity held by this invoice's reservation.
    pub quantity: u32,
}

impl InvoiceLine {
    /// Creates a new invoice line.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// An issued invoice. Created atomically from a cart at commit time and
/// only changed afterwards by administrative amendment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique invoice identifier.
    pub id: InvoiceId,

    /// The user who committed the purchase.
    pub user_id: UserId,

    /// Invoiced line items.
    pub lines: Vec<InvoiceLine>,

    /// Total captured at commit (or last amendment) time.
    pub total: Money,

    /// Issue (or last amendment) timestamp.
    pub date: DateTime<Utc>,
}
