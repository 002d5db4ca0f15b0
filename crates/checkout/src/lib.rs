//! Workflow orchestrator for the stock-reservation core.
//!
//! The four multi-step operations (add-to-cart, commit, cancel, amend)
//! each touch the product ledger and one aggregate. Ledger mutations made
//! partway through a failed operation are undone through an explicit
//! compensating-action log, so reservations are never left dangling.

pub mod compensation;
mod flow;

pub use compensation::{CompensationAction, CompensationLog};
pub use flow::{AmendItem, CheckoutFlow};
