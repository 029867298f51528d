use std::sync::Arc;

use thiserror::Error;

use stocktide_core::ProductId;
use stocktide_stock::{ProductTree, ReconciliationPlan, StockMovement};

/// Stock store operation error.
///
/// Infrastructure failures only; deterministic domain failures (validation,
/// invariants) are rejected before a transaction ever starts.
#[derive(Debug, Error)]
pub enum StockStoreError {
    /// The referenced node does not exist. Transaction aborted, no partial writes.
    #[error("stock node not found")]
    NotFound,

    /// The underlying row changed between read and commit. Transaction
    /// aborted; the caller should resubmit with fresh data.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage unavailable or misbehaving. Transaction aborted; treated as
    /// transient and retried by the caller, never by the core.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

/// Outcome of one committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedMutation {
    /// The single ledger entry written for the directly targeted node.
    pub movement: StockMovement,
    /// Product-level quantity after ancestor reconciliation.
    pub product_quantity: i64,
    /// Whether the product-level quantity moved (drives storefront
    /// cache invalidation).
    pub product_quantity_changed: bool,
}

/// Transactional store for current quantities across the stock tree.
///
/// `commit_mutation` is the single write path: it must, inside one
/// transaction with at least read-committed isolation,
///
/// 1. write the target node's quantity (honoring the plan's expected
///    previous quantity, failing with `Conflict` when stale),
/// 2. append exactly one ledger entry for the target,
/// 3. re-sum every ancestor named by the plan's scope, **re-reading sibling
///    quantities at write time** so concurrent mutations to different leaves
///    under the same product both survive in the aggregate.
///
/// On any failure nothing is visible: zero quantity changes, zero ledger
/// entries. The mutation path is synchronous and is never retried here.
pub trait StockStore: Send + Sync {
    /// Snapshot one product subtree with quantities at every level.
    fn product_tree(&self, product_id: ProductId) -> Result<Option<ProductTree>, StockStoreError>;

    /// Atomically commit one planned mutation (target write + ledger append
    /// + ancestor re-sums).
    fn commit_mutation(&self, plan: ReconciliationPlan) -> Result<CommittedMutation, StockStoreError>;
}

impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    fn product_tree(&self, product_id: ProductId) -> Result<Option<ProductTree>, StockStoreError> {
        (**self).product_tree(product_id)
    }

    fn commit_mutation(&self, plan: ReconciliationPlan) -> Result<CommittedMutation, StockStoreError> {
        (**self).commit_mutation(plan)
    }
}
