//! Invoice read service and views.

use chrono::{DateTime, Utc};
use serde::Serialize;

use common::{InvoiceId, Money, UserId};
use store::{Invoice, InvoiceStore, ProductId, ProductStore};

use crate::error::DomainError;

/// An invoice line resolved against the catalog for presentation.
///
/// Name and unit price are the product's current values; the committed
/// total on the invoice itself is never recomputed from them.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceLineView {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// An invoice resolved against the catalog for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceView {
    pub id: InvoiceId,
    pub lines: Vec<InvoiceLineView>,
    pub total: Money,
    pub date: DateTime<Utc>,
}

/// Service for invoice reads.
pub struct InvoiceService<S> {
    store: S,
}

impl<S: InvoiceStore + ProductStore> InvoiceService<S> {
    /// Creates a new invoice service backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns all invoices for a user with resolved product details,
    /// oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, user_id: UserId) -> Result<Vec<InvoiceView>, DomainError> {
        let invoices = self.store.invoices_for_user(user_id).await?;

        let mut views = Vec::with_capacity(invoices.len());
        for invoice in &invoices {
            views.push(self.resolve(invoice).await?);
        }
        Ok(views)
    }

    async fn resolve(&self, invoice: &Invoice) -> Result<InvoiceView, DomainError> {
        let mut lines = Vec::with_capacity(invoice.lines.len());
        for line in &invoice.lines {
            let product = self
                .store
                .get_product(&line.product_id)
                .await?
                .ok_or_else(|| DomainError::ProductNotFound(line.product_id.clone()))?;
            lines.push(InvoiceLineView {
                product_id: line.product_id.clone(),
                name: product.name,
                quantity: line.quantity,
                unit_price: product.price,
            });
        }

        Ok(InvoiceView {
            id: invoice.id,
            lines,
            total: invoice.total,
            date: invoice.date,
        })
    }
}
