use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use common::{InvoiceId, Money, UserId};

use crate::records::{Cart, Invoice, Product, ProductId, ProductPatch, Version};
use crate::store::{CartStore, InvoiceStore, ProductStore, PutOptions};
use crate::{Result, StoreError};

/// In-memory store implementation for testing and local runs.
///
/// Provides the same interface as the PostgreSQL implementation. Each
/// record family sits behind its own lock; stock mutations take the
/// products write lock for the whole check-and-decrement, so reservations
/// against a single product are serialized.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    carts: Arc<RwLock<HashMap<UserId, Cart>>>,
    invoices: Arc<RwLock<Vec<Invoice>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored invoices.
    pub async fn invoice_count(&self) -> usize {
        self.invoices.read().await.len()
    }

    /// Clears all products, carts, and invoices.
    pub async fn clear(&self) {
        self.products.write().await.clear();
        self.carts.write().await.clear();
        self.invoices.write().await.clear();
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn insert_product(&self, product: Product) -> Result<()> {
        let mut products = self.products.write().await;
        if products.contains_key(&product.id) {
            return Err(StoreError::ProductExists(product.id));
        }
        products.insert(product.id.clone(), product);
        Ok(())
    }

    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(product_id).cloned())
    }

    async fn update_product(&self, product_id: &ProductId, patch: ProductPatch) -> Result<Product> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;

        if let Some(name) = patch.name {
            product.name = name;
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(stock) = patch.stock {
            product.stock = stock;
        }
        if let Some(status) = patch.status {
            product.status = status;
        }

        Ok(product.clone())
    }

    async fn reserve(&self, product_id: &ProductId, quantity: u32) -> Result<Money> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;

        if !product.status {
            return Err(StoreError::ProductUnavailable(product_id.clone()));
        }
        if product.stock < quantity {
            return Err(StoreError::InsufficientStock {
                product_id: product_id.clone(),
                requested: quantity,
                available: product.stock,
            });
        }

        product.stock -= quantity;
        Ok(product.price)
    }

    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;

        product.stock += quantity;
        Ok(())
    }

    async fn price_of(&self, product_id: &ProductId) -> Result<Option<Money>> {
        Ok(self
            .products
            .read()
            .await
            .get(product_id)
            .map(|p| p.price))
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        Ok(self.carts.read().await.get(&user_id).cloned())
    }

    async fn put_cart(&self, cart: &Cart, options: PutOptions) -> Result<Version> {
        let mut carts = self.carts.write().await;

        let actual = carts
            .get(&cart.user_id)
            .map(|c| c.version)
            .unwrap_or(Version::initial());

        if let Some(expected) = options.expected_version
            && actual != expected
        {
            return Err(StoreError::VersionConflict {
                user_id: cart.user_id,
                expected,
                actual,
            });
        }

        let new_version = actual.next();
        let mut stored = cart.clone();
        stored.version = new_version;
        carts.insert(stored.user_id, stored);

        Ok(new_version)
    }

    async fn delete_cart(&self, user_id: UserId) -> Result<bool> {
        Ok(self.carts.write().await.remove(&user_id).is_some())
    }
}

#[async_trait]
impl InvoiceStore for InMemoryStore {
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<()> {
        self.invoices.write().await.push(invoice.clone());
        Ok(())
    }

    async fn get_invoice(&self, invoice_id: InvoiceId) -> Result<Option<Invoice>> {
        Ok(self
            .invoices
            .read()
            .await
            .iter()
            .find(|i| i.id == invoice_id)
            .cloned())
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<()> {
        let mut invoices = self.invoices.write().await;
        let stored = invoices
            .iter_mut()
            .find(|i| i.id == invoice.id)
            .ok_or(StoreError::InvoiceNotFound(invoice.id))?;
        *stored = invoice.clone();
        Ok(())
    }

    async fn invoices_for_user(&self, user_id: UserId) -> Result<Vec<Invoice>> {
        Ok(self
            .invoices
            .read()
            .await
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }
}
