//! Shared value objects used across the storefront crates.

mod types;

pub use types::{InvoiceId, Money, Role, UserId};
