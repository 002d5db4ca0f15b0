//! Cart read service and views.

use serde::Serialize;

use common::{Money, UserId};
use store::{Cart, CartStore, ProductId, ProductStore, PutOptions, StoreError};

use crate::error::DomainError;

/// A cart line resolved against the catalog for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// A cart resolved against the catalog for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub total: Money,
}

/// Service for cart creation and reads.
///
/// Cart mutations that touch the ledger (adding items, cancellation,
/// checkout) live in the checkout workflow; this service only covers the
/// operations with no stock side effects.
pub struct CartService<S> {
    store: S,
}

impl<S: CartStore + ProductStore> CartService<S> {
    /// Creates a new cart service backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates an empty cart for the user.
    ///
    /// Fails with `CartExists` if the user already has one.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, user_id: UserId) -> Result<Cart, DomainError> {
        if self.store.get_cart(user_id).await?.is_some() {
            return Err(DomainError::CartExists(user_id));
        }

        let mut cart = Cart::new(user_id);
        match self.store.put_cart(&cart, PutOptions::expect_new()).await {
            Ok(version) => {
                cart.version = version;
                Ok(cart)
            }
            // A racing create beat us to the insert.
            Err(StoreError::VersionConflict { .. }) => Err(DomainError::CartExists(user_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the user's cart with lines resolved to product name and
    /// current price.
    ///
    /// Fails with `CartNotFound` if the user has no cart.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, user_id: UserId) -> Result<CartView, DomainError> {
        let cart = self
            .store
            .get_cart(user_id)
            .await?
            .ok_or(DomainError::CartNotFound(user_id))?;

        self.resolve(&cart).await
    }

    async fn resolve(&self, cart: &Cart) -> Result<CartView, DomainError> {
        let mut lines = Vec::with_capacity(cart.lines.len());
        for line in &cart.lines {
            let product = self
                .store
                .get_product(&line.product_id)
                .await?
                .ok_or_else(|| DomainError::ProductNotFound(line.product_id.clone()))?;
            lines.push(CartLineView {
                product_id: line.product_id.clone(),
                name: product.name,
                quantity: line.quantity,
                unit_price: product.price,
            });
        }

        Ok(CartView {
            lines,
            total: cart.total,
        })
    }
}
