//! Cart total computation.

use common::Money;
use store::{CartLine, ProductId};

/// Sums `price * quantity` over the given lines using an explicit price
/// source.
///
/// The lookup decouples total computation from the ledger: callers pass
/// fresh prices gathered at mutation time, so the total always reflects
/// authoritative pricing rather than values cached on the cart. Lines
/// whose product the lookup cannot resolve contribute nothing.
pub fn compute_total<F>(lines: &[CartLine], price_of: F) -> Money
where
    F: Fn(&ProductId) -> Option<Money>,
{
    lines.iter().fold(Money::zero(), |total, line| {
        match price_of(&line.product_id) {
            Some(price) => total + price.multiply(line.quantity),
            None => total,
        }
    })
}
