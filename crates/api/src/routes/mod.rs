//! Route handlers.

pub mod cart;
pub mod health;
pub mod invoices;
pub mod metrics;
pub mod products;

use checkout::CheckoutFlow;
use domain::{CartService, CatalogService, InvoiceService};

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub cart_service: CartService<S>,
    pub invoice_service: InvoiceService<S>,
    pub catalog_service: CatalogService<S>,
    pub checkout: CheckoutFlow<S>,
}
