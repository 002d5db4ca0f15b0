//! Compensating-action log for multi-step ledger operations.

use store::{ProductId, ProductStore};

/// A single compensating action against the product ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompensationAction {
    /// Undo a reservation made during the current operation.
    Release { product_id: ProductId, quantity: u32 },
    /// Restore a reservation the current operation released.
    Reserve { product_id: ProductId, quantity: u32 },
}

/// Accumulates the compensating actions for an in-flight operation.
///
/// Each ledger mutation records its inverse here as soon as it succeeds.
/// If a later step fails, `unwind` applies the inverses in reverse order,
/// returning the ledger to its state from before the operation began.
#[derive(Debug, Default)]
pub struct CompensationLog {
    actions: Vec<CompensationAction>,
}

impl CompensationLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `quantity` of a product was reserved and must be
    /// released on unwind.
    pub fn reserved(&mut self, product_id: ProductId, quantity: u32) {
        self.actions.push(CompensationAction::Release {
            product_id,
            quantity,
        });
    }

    /// Records that `quantity` of a product was released and must be
    /// re-reserved on unwind.
    pub fn released(&mut self, product_id: ProductId, quantity: u32) {
        self.actions.push(CompensationAction::Reserve {
            product_id,
            quantity,
        });
    }

    /// Returns the recorded actions, oldest first.
    pub fn actions(&self) -> &[CompensationAction] {
        &self.actions
    }

    /// Applies all recorded inverses in reverse order.
    ///
    /// Individual failures are logged and counted but do not stop the
    /// unwind; the error that triggered it is the one callers surface.
    pub async fn unwind<S: ProductStore>(self, ledger: &S) {
        for action in self.actions.into_iter().rev() {
            let result = match &action {
                CompensationAction::Release {
                    product_id,
                    quantity,
                } => ledger.release(product_id, *quantity).await,
                CompensationAction::Reserve {
                    product_id,
                    quantity,
                } => ledger.reserve(product_id, *quantity).await.map(|_| ()),
            };

            if let Err(e) = result {
                metrics::counter!("compensation_failures_total").increment(1);
                tracing::warn!(?action, error = %e, "compensation step failed");
            }
        }
    }
}
