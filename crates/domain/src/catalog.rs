//! Administrative catalog management.

use common::Role;
use store::{Product, ProductId, ProductPatch, ProductStore};

use crate::error::DomainError;

/// Service for administrative product management.
///
/// Stock set through here is an administrative edit; normal stock movement
/// goes through the ledger's reserve/release contract.
pub struct CatalogService<S> {
    store: S,
}

impl<S: ProductStore> CatalogService<S> {
    /// Creates a new catalog service backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a product. Admin only.
    #[tracing::instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn create(&self, product: Product, actor: Role) -> Result<Product, DomainError> {
        if !actor.is_admin() {
            return Err(DomainError::Forbidden);
        }

        self.store.insert_product(product.clone()).await?;
        Ok(product)
    }

    /// Applies a field-level update to a product. Admin only.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update(
        &self,
        product_id: &ProductId,
        patch: ProductPatch,
        actor: Role,
    ) -> Result<Product, DomainError> {
        if !actor.is_admin() {
            return Err(DomainError::Forbidden);
        }

        Ok(self.store.update_product(product_id, patch).await?)
    }
}
