//! `stocktide-stock` — pure stock domain.
//!
//! Stock tree model (Product → ColorVariant → SizeVariant), the immutable
//! movement ledger entry type, reconciliation planning/application, stocktake
//! math, and derived inventory statistics. No IO lives here; persistence and
//! orchestration belong to `stocktide-infra`.

pub mod movement;
pub mod node;
pub mod reconcile;
pub mod stats;
pub mod stocktake;

pub use movement::{ReasonCode, StockMovement};
pub use node::{ColorVariant, NodeKind, NodeRef, ProductTree, SizeVariant};
pub use reconcile::{
    apply_plan, plan_mutation, AppliedMutation, ExpectedQuantity, MutationRequest,
    ReconcileScope, ReconciliationPlan,
};
pub use stats::{InventoryStats, LOW_STOCK_THRESHOLD};
pub use stocktake::{discrepancy, StocktakePreview};
