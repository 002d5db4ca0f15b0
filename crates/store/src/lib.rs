//! Persistence layer: product ledger, cart, and invoice storage.
//!
//! The stores are defined as traits with two implementations: an
//! in-memory store for tests and local runs, and a PostgreSQL store.
//! Stock movement goes through the atomic `reserve`/`release` contract
//! on [`ProductStore`]; cart writes carry an optimistic [`Version`] check.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use common::{InvoiceId, Money, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use records::{Cart, CartLine, Invoice, InvoiceLine, Product, ProductId, ProductPatch, Version};
pub use store::{CartStore, InvoiceStore, ProductStore, PutOptions};
