//! The checkout workflow orchestrator.

use chrono::Utc;

use common::{InvoiceId, Money, Role, UserId};
use domain::{DomainError, compute_total};
use store::{
    Cart, CartLine, CartStore, Invoice, InvoiceLine, InvoiceStore, ProductId, ProductStore,
    PutOptions,
};

use crate::compensation::CompensationLog;

/// A requested invoice line in an administrative amendment.
#[derive(Debug, Clone)]
pub struct AmendItem {
    /// The product to reserve.
    pub product_id: ProductId,
    /// Quantity to reserve.
    pub quantity: u32,
}

impl AmendItem {
    /// Creates a new amendment item.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Orchestrates the four reservation workflows: add-to-cart, commit,
/// cancel, and amend.
///
/// Each operation validates its preconditions, mutates the product ledger
/// through the atomic reserve/release contract, then updates the cart or
/// invoice aggregate. A failure after a ledger mutation unwinds through
/// the [`CompensationLog`], so stock is never left reserved by state that
/// was not persisted.
pub struct CheckoutFlow<S> {
    store: S,
}

impl<S> CheckoutFlow<S>
where
    S: ProductStore + CartStore + InvoiceStore,
{
    /// Creates a new checkout flow over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Reserves `quantity` of a product and adds it to the user's cart,
    /// creating the cart if none exists.
    ///
    /// An existing line for the product absorbs the new quantity; the cart
    /// total is recomputed from fresh ledger prices. Fails with whatever
    /// the reservation fails with; on any later failure the reservation is
    /// released again and no cart change is persisted.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }

        self.store.reserve(&product_id, quantity).await?;
        let mut compensation = CompensationLog::new();
        compensation.reserved(product_id.clone(), quantity);

        match self.persist_added_line(user_id, &product_id, quantity).await {
            Ok(cart) => {
                metrics::counter!("cart_items_added_total").increment(1);
                tracing::info!(%user_id, %product_id, quantity, "item added to cart");
                Ok(cart)
            }
            Err(e) => {
                compensation.unwind(&self.store).await;
                Err(e)
            }
        }
    }

    async fn persist_added_line(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Cart, DomainError> {
        let (mut cart, options) = match self.store.get_cart(user_id).await? {
            Some(cart) => {
                let options = PutOptions::expect_version(cart.version);
                (cart, options)
            }
            None => (Cart::new(user_id), PutOptions::expect_new()),
        };

        match cart.lines.iter_mut().find(|l| &l.product_id == product_id) {
            Some(line) => line.quantity += quantity,
            None => cart.lines.push(CartLine::new(product_id.clone(), quantity)),
        }

        cart.total = self.fresh_total(&cart.lines).await?;
        cart.version = self.store.put_cart(&cart, options).await?;
        Ok(cart)
    }

    /// Recomputes a total from the ledger's current prices.
    async fn fresh_total(&self, lines: &[CartLine]) -> Result<Money, DomainError> {
        let mut prices = Vec::with_capacity(lines.len());
        for line in lines {
            let price = self.store.price_of(&line.product_id).await?;
            prices.push((line.product_id.clone(), price));
        }

        Ok(compute_total(lines, |pid| {
            prices
                .iter()
                .find(|(id, _)| id == pid)
                .and_then(|(_, price)| *price)
        }))
    }

    /// Converts the user's cart into an invoice.
    ///
    /// The cart's lines and total are taken verbatim; its reservations are
    /// simply carried over, so no ledger mutation happens here. The cart
    /// is deleted in the same logical step.
    #[tracing::instrument(skip(self))]
    pub async fn commit(&self, user_id: UserId) -> Result<Invoice, DomainError> {
        let start = std::time::Instant::now();

        let cart = self
            .store
            .get_cart(user_id)
            .await?
            .ok_or(DomainError::CartNotFound(user_id))?;
        if cart.is_empty() {
            return Err(DomainError::EmptyCart(user_id));
        }

        let invoice = Invoice {
            id: InvoiceId::new(),
            user_id,
            lines: cart
                .lines
                .iter()
                .map(|l| InvoiceLine::new(l.product_id.clone(), l.quantity))
                .collect(),
            total: cart.total,
            date: Utc::now(),
        };

        self.store.insert_invoice(&invoice).await?;
        self.store.delete_cart(user_id).await?;

        metrics::counter!("invoices_committed_total").increment(1);
        metrics::histogram!("checkout_duration_seconds").record(start.elapsed().as_secs_f64());
        tracing::info!(%user_id, invoice_id = %invoice.id, total = %invoice.total, "cart committed to invoice");

        Ok(invoice)
    }

    /// Cancels the user's cart, restoring every reserved quantity to the
    /// ledger, then deletes the cart.
    ///
    /// Every line's release is attempted even when an earlier one fails;
    /// the first failure is surfaced after all lines are processed.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, user_id: UserId) -> Result<(), DomainError> {
        let cart = self
            .store
            .get_cart(user_id)
            .await?
            .ok_or(DomainError::CartNotFound(user_id))?;

        let mut first_failure = None;
        for line in &cart.lines {
            if let Err(e) = self.store.release(&line.product_id, line.quantity).await {
                tracing::warn!(
                    %user_id,
                    product_id = %line.product_id,
                    quantity = line.quantity,
                    error = %e,
                    "release failed during cart cancellation"
                );
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }

        self.store.delete_cart(user_id).await?;
        metrics::counter!("carts_cancelled_total").increment(1);
        tracing::info!(%user_id, "cart cancelled and stock restored");

        match first_failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Administratively replaces an invoice's line items.
    ///
    /// Releases every old line, then validates and reserves every new one;
    /// the total is rebuilt from the prices the reservations return and
    /// the date reset to now. If any step fails, everything this call did
    /// to the ledger is compensated in reverse, leaving both invoice and
    /// ledger as they were before the call.
    #[tracing::instrument(skip(self, new_items), fields(item_count = new_items.len()))]
    pub async fn amend(
        &self,
        invoice_id: InvoiceId,
        new_items: Vec<AmendItem>,
        actor: Role,
    ) -> Result<Invoice, DomainError> {
        if !actor.is_admin() {
            return Err(DomainError::Forbidden);
        }
        for item in &new_items {
            if item.quantity == 0 {
                return Err(DomainError::InvalidQuantity {
                    quantity: item.quantity,
                });
            }
        }

        let mut invoice = self
            .store
            .get_invoice(invoice_id)
            .await?
            .ok_or(DomainError::InvoiceNotFound(invoice_id))?;

        metrics::counter!("invoice_amendments_total").increment(1);
        let mut compensation = CompensationLog::new();

        // Phase 1: hand the old reservations back to the ledger.
        for line in &invoice.lines {
            if let Err(e) = self.store.release(&line.product_id, line.quantity).await {
                self.roll_back(compensation, invoice_id, &e).await;
                return Err(e.into());
            }
            compensation.released(line.product_id.clone(), line.quantity);
        }

        // Phase 2: validate and reserve the replacement lines, pricing the
        // new total from what each reservation returns.
        let mut new_lines = Vec::with_capacity(new_items.len());
        let mut new_total = Money::zero();
        for item in &new_items {
            match self.store.reserve(&item.product_id, item.quantity).await {
                Ok(price) => {
                    compensation.reserved(item.product_id.clone(), item.quantity);
                    new_total += price.multiply(item.quantity);
                    new_lines.push(InvoiceLine::new(item.product_id.clone(), item.quantity));
                }
                Err(e) => {
                    self.roll_back(compensation, invoice_id, &e).await;
                    return Err(e.into());
                }
            }
        }

        invoice.lines = new_lines;
        invoice.total = new_total;
        invoice.date = Utc::now();

        if let Err(e) = self.store.update_invoice(&invoice).await {
            self.roll_back(compensation, invoice_id, &e).await;
            return Err(e.into());
        }

        tracing::info!(%invoice_id, total = %invoice.total, "invoice amended");
        Ok(invoice)
    }

    async fn roll_back(
        &self,
        compensation: CompensationLog,
        invoice_id: InvoiceId,
        cause: &store::StoreError,
    ) {
        metrics::counter!("amend_rollbacks_total").increment(1);
        tracing::warn!(%invoice_id, error = %cause, "amendment failed, rolling back ledger");
        compensation.unwind(&self.store).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{InMemoryStore, Product, ProductPatch};

    async fn setup() -> (CheckoutFlow<InMemoryStore>, InMemoryStore) {
        let store = InMemoryStore::new();
        store
            .insert_product(Product::new(
                "SKU-001",
                "Widget",
                Money::from_cents(1000),
                5,
            ))
            .await
            .unwrap();
        store
            .insert_product(Product::new(
                "SKU-002",
                "Gadget",
                Money::from_cents(2500),
                3,
            ))
            .await
            .unwrap();
        (CheckoutFlow::new(store.clone()), store)
    }

    async fn stock_of(store: &InMemoryStore, sku: &str) -> u32 {
        store
            .get_product(&ProductId::new(sku))
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    #[tokio::test]
    async fn add_item_creates_cart_and_reserves_stock() {
        let (flow, store) = setup().await;
        let user_id = UserId::new();

        let cart = flow
            .add_item(user_id, ProductId::new("SKU-001"), 3)
            .await
            .unwrap();

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.total, Money::from_cents(3000));
        assert_eq!(stock_of(&store, "SKU-001").await, 2);
    }

    #[tokio::test]
    async fn add_item_merges_existing_line() {
        let (flow, store) = setup().await;
        let user_id = UserId::new();

        flow.add_item(user_id, ProductId::new("SKU-001"), 2)
            .await
            .unwrap();
        let cart = flow
            .add_item(user_id, ProductId::new("SKU-001"), 1)
            .await
            .unwrap();

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 3);
        assert_eq!(cart.total, Money::from_cents(3000));
        assert_eq!(stock_of(&store, "SKU-001").await, 2);
    }

    #[tokio::test]
    async fn add_item_totals_use_fresh_prices() {
        let (flow, store) = setup().await;
        let user_id = UserId::new();

        flow.add_item(user_id, ProductId::new("SKU-001"), 2)
            .await
            .unwrap();

        // Admin price change between mutations
        store
            .update_product(
                &ProductId::new("SKU-001"),
                ProductPatch {
                    price: Some(Money::from_cents(2000)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let cart = flow
            .add_item(user_id, ProductId::new("SKU-002"), 1)
            .await
            .unwrap();

        // 2 * $20.00 (new price) + 1 * $25.00
        assert_eq!(cart.total, Money::from_cents(6500));
    }

    #[tokio::test]
    async fn add_item_rejects_zero_quantity() {
        let (flow, store) = setup().await;
        let result = flow
            .add_item(UserId::new(), ProductId::new("SKU-001"), 0)
            .await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidQuantity { quantity: 0 })
        ));
        assert_eq!(stock_of(&store, "SKU-001").await, 5);
    }

    #[tokio::test]
    async fn add_item_surfaces_reservation_failures_without_state() {
        let (flow, store) = setup().await;
        let user_id = UserId::new();

        let result = flow.add_item(user_id, ProductId::new("SKU-001"), 9).await;
        assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));

        let result = flow.add_item(user_id, ProductId::new("SKU-404"), 1).await;
        assert!(matches!(result, Err(DomainError::ProductNotFound(_))));

        // No cart was created by the failed attempts
        assert!(store.get_cart(user_id).await.unwrap().is_none());
        assert_eq!(stock_of(&store, "SKU-001").await, 5);
    }

    #[tokio::test]
    async fn add_item_rejects_retired_product() {
        let (flow, store) = setup().await;
        store
            .update_product(
                &ProductId::new("SKU-001"),
                ProductPatch {
                    status: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let result = flow
            .add_item(UserId::new(), ProductId::new("SKU-001"), 1)
            .await;
        assert!(matches!(result, Err(DomainError::ProductUnavailable(_))));
        assert_eq!(stock_of(&store, "SKU-001").await, 5);
    }

    #[tokio::test]
    async fn concurrent_add_items_never_oversell() {
        let (flow, store) = setup().await;
        let flow = std::sync::Arc::new(flow);

        // 10 users race for 5 units of SKU-001.
        let mut handles = Vec::new();
        for _ in 0..10 {
            let flow = flow.clone();
            handles.push(tokio::spawn(async move {
                flow.add_item(UserId::new(), ProductId::new("SKU-001"), 1)
                    .await
                    .is_ok()
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 5);
        assert_eq!(stock_of(&store, "SKU-001").await, 0);
    }

    #[tokio::test]
    async fn commit_converts_cart_to_invoice() {
        let (flow, store) = setup().await;
        let user_id = UserId::new();

        flow.add_item(user_id, ProductId::new("SKU-001"), 3)
            .await
            .unwrap();
        let invoice = flow.commit(user_id).await.unwrap();

        assert_eq!(invoice.total, Money::from_cents(3000));
        assert_eq!(invoice.lines.len(), 1);
        assert_eq!(invoice.lines[0].quantity, 3);

        // Cart gone, reservation carried over untouched
        assert!(store.get_cart(user_id).await.unwrap().is_none());
        assert_eq!(stock_of(&store, "SKU-001").await, 2);
        assert_eq!(store.invoice_count().await, 1);
        assert_eq!(
            store.get_invoice(invoice.id).await.unwrap().unwrap(),
            invoice
        );
    }

    #[tokio::test]
    async fn commit_requires_a_non_empty_cart() {
        let (flow, store) = setup().await;
        let user_id = UserId::new();

        let result = flow.commit(user_id).await;
        assert!(matches!(result, Err(DomainError::CartNotFound(_))));

        store
            .put_cart(&Cart::new(user_id), PutOptions::expect_new())
            .await
            .unwrap();
        let result = flow.commit(user_id).await;
        assert!(matches!(result, Err(DomainError::EmptyCart(_))));

        // The empty cart survives the failed commit
        assert!(store.get_cart(user_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cancel_restores_stock_per_line_and_deletes_cart() {
        let (flow, store) = setup().await;
        let user_id = UserId::new();

        flow.add_item(user_id, ProductId::new("SKU-001"), 2)
            .await
            .unwrap();
        flow.add_item(user_id, ProductId::new("SKU-002"), 3)
            .await
            .unwrap();
        assert_eq!(stock_of(&store, "SKU-001").await, 3);
        assert_eq!(stock_of(&store, "SKU-002").await, 0);

        flow.cancel(user_id).await.unwrap();

        assert_eq!(stock_of(&store, "SKU-001").await, 5);
        assert_eq!(stock_of(&store, "SKU-002").await, 3);
        assert!(store.get_cart(user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cancel_without_cart_fails() {
        let (flow, _) = setup().await;
        let result = flow.cancel(UserId::new()).await;
        assert!(matches!(result, Err(DomainError::CartNotFound(_))));
    }

    #[tokio::test]
    async fn amend_requires_admin() {
        let (flow, _) = setup().await;
        let result = flow
            .amend(InvoiceId::new(), vec![AmendItem::new("SKU-001", 1)], Role::User)
            .await;
        assert!(matches!(result, Err(DomainError::Forbidden)));
    }

    #[tokio::test]
    async fn amend_missing_invoice_fails() {
        let (flow, _) = setup().await;
        let result = flow
            .amend(InvoiceId::new(), vec![AmendItem::new("SKU-001", 1)], Role::Admin)
            .await;
        assert!(matches!(result, Err(DomainError::InvoiceNotFound(_))));
    }

    #[tokio::test]
    async fn amend_replaces_lines_and_moves_stock() {
        let (flow, store) = setup().await;
        let user_id = UserId::new();

        flow.add_item(user_id, ProductId::new("SKU-001"), 2)
            .await
            .unwrap();
        let invoice = flow.commit(user_id).await.unwrap();
        assert_eq!(stock_of(&store, "SKU-001").await, 3);

        let amended = flow
            .amend(
                invoice.id,
                vec![AmendItem::new("SKU-001", 1), AmendItem::new("SKU-002", 1)],
                Role::Admin,
            )
            .await
            .unwrap();

        // SKU-001: released 2, re-reserved 1 => net +1. SKU-002: -1.
        assert_eq!(stock_of(&store, "SKU-001").await, 4);
        assert_eq!(stock_of(&store, "SKU-002").await, 2);
        assert_eq!(amended.total, Money::from_cents(3500));
        assert_eq!(amended.lines.len(), 2);
        assert!(amended.date >= invoice.date);

        let stored = store.get_invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(stored, amended);
    }

    #[tokio::test]
    async fn amend_totals_from_current_prices() {
        let (flow, store) = setup().await;
        let user_id = UserId::new();

        flow.add_item(user_id, ProductId::new("SKU-001"), 2)
            .await
            .unwrap();
        let invoice = flow.commit(user_id).await.unwrap();
        assert_eq!(invoice.total, Money::from_cents(2000));

        store
            .update_product(
                &ProductId::new("SKU-001"),
                ProductPatch {
                    price: Some(Money::from_cents(1200)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let amended = flow
            .amend(invoice.id, vec![AmendItem::new("SKU-001", 2)], Role::Admin)
            .await
            .unwrap();

        assert_eq!(amended.total, Money::from_cents(2400));
    }

    #[tokio::test]
    async fn failed_amend_rolls_the_ledger_and_invoice_all_the_way_back() {
        let (flow, store) = setup().await;
        let user_id = UserId::new();

        flow.add_item(user_id, ProductId::new("SKU-001"), 2)
            .await
            .unwrap();
        let invoice = flow.commit(user_id).await.unwrap();
        assert_eq!(stock_of(&store, "SKU-001").await, 3);

        // SKU-002 has 3 in stock; asking for 4 fails after SKU-001's new
        // reservation already succeeded.
        let result = flow
            .amend(
                invoice.id,
                vec![AmendItem::new("SKU-001", 1), AmendItem::new("SKU-002", 4)],
                Role::Admin,
            )
            .await;
        assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));

        // Ledger exactly as before the amend began
        assert_eq!(stock_of(&store, "SKU-001").await, 3);
        assert_eq!(stock_of(&store, "SKU-002").await, 3);

        // Invoice untouched
        let stored = store.get_invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(stored, invoice);
    }

    #[tokio::test]
    async fn failed_amend_on_retired_replacement_rolls_back() {
        let (flow, store) = setup().await;
        let user_id = UserId::new();

        flow.add_item(user_id, ProductId::new("SKU-001"), 2)
            .await
            .unwrap();
        let invoice = flow.commit(user_id).await.unwrap();

        store
            .update_product(
                &ProductId::new("SKU-002"),
                ProductPatch {
                    status: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let result = flow
            .amend(invoice.id, vec![AmendItem::new("SKU-002", 1)], Role::Admin)
            .await;
        assert!(matches!(result, Err(DomainError::ProductUnavailable(_))));

        assert_eq!(stock_of(&store, "SKU-001").await, 3);
        assert_eq!(stock_of(&store, "SKU-002").await, 3);
        let stored = store.get_invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(stored, invoice);
    }

    #[tokio::test]
    async fn amend_to_empty_releases_everything() {
        let (flow, store) = setup().await;
        let user_id = UserId::new();

        flow.add_item(user_id, ProductId::new("SKU-001"), 2)
            .await
            .unwrap();
        let invoice = flow.commit(user_id).await.unwrap();

        let amended = flow.amend(invoice.id, vec![], Role::Admin).await.unwrap();

        assert_eq!(stock_of(&store, "SKU-001").await, 5);
        assert!(amended.lines.is_empty());
        assert_eq!(amended.total, Money::zero());
    }

    #[tokio::test]
    async fn amend_rejects_zero_quantity_before_touching_the_ledger() {
        let (flow, store) = setup().await;
        let user_id = UserId::new();

        flow.add_item(user_id, ProductId::new("SKU-001"), 2)
            .await
            .unwrap();
        let invoice = flow.commit(user_id).await.unwrap();

        let result = flow
            .amend(invoice.id, vec![AmendItem::new("SKU-002", 0)], Role::Admin)
            .await;
        assert!(matches!(result, Err(DomainError::InvalidQuantity { .. })));

        assert_eq!(stock_of(&store, "SKU-001").await, 3);
        assert_eq!(stock_of(&store, "SKU-002").await, 3);
    }
}
