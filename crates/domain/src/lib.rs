//! Business layer: error taxonomy, total computation, and read services.

mod cart;
mod catalog;
mod error;
mod invoice;
mod totals;

pub use cart::{CartLineView, CartService, CartView};
pub use catalog::CatalogService;
pub use common::{InvoiceId, Money, Role, UserId};
pub use error::DomainError;
pub use invoice::{InvoiceLineView, InvoiceService, InvoiceView};
pub use store::{Cart, CartLine, Invoice, InvoiceLine, Product, ProductId, ProductPatch};
pub use totals::compute_total;
