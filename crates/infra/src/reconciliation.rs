//! Reconciliation engine.
//!
//! Orchestrates a stock mutation end to end: load the product tree, plan the
//! write (target resolution, validation, scope), hand the plan to the store
//! for an atomic commit, then notify the storefront when the product total
//! moved. Planning is pure and retry-safe; all ledger writes happen inside
//! `StockStore::commit_mutation`.

use thiserror::Error;
use tracing::{info, instrument, warn};

use stocktide_core::DomainError;
use stocktide_stock::{plan_mutation, ExpectedQuantity, MutationRequest, StockMovement};

use crate::stock_store::{CommittedMutation, StockStore, StockStoreError};
use crate::storefront::StorefrontCache;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("validation failed on '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("stock node not found")]
    NotFound,

    #[error("conflicting concurrent mutation: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Persistence(String),
}

impl From<DomainError> for ReconcileError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { field, message } => {
                ReconcileError::Validation { field, message }
            }
            DomainError::NotFound => ReconcileError::NotFound,
            DomainError::Conflict(msg) => ReconcileError::Conflict(msg),
            DomainError::InvalidId(msg) => ReconcileError::Validation {
                field: "id".to_string(),
                message: msg,
            },
            DomainError::InvariantViolation(msg) => ReconcileError::Persistence(msg),
        }
    }
}

impl From<StockStoreError> for ReconcileError {
    fn from(err: StockStoreError) -> Self {
        match err {
            StockStoreError::NotFound => ReconcileError::NotFound,
            StockStoreError::Conflict(msg) => ReconcileError::Conflict(msg),
            StockStoreError::Persistence(msg) => ReconcileError::Persistence(msg),
        }
    }
}

/// What a committed mutation looked like, for callers and API responses.
#[derive(Debug, Clone)]
pub struct MutationReport {
    pub movement: StockMovement,
    pub new_quantity: i64,
    pub product_quantity: i64,
}

impl MutationReport {
    fn from_committed(committed: &CommittedMutation) -> Self {
        Self {
            movement: committed.movement.clone(),
            new_quantity: committed.movement.new_quantity,
            product_quantity: committed.product_quantity,
        }
    }
}

/// Drives mutations against a [`StockStore`] and notifies the storefront.
#[derive(Debug, Clone)]
pub struct ReconciliationEngine<S, C> {
    store: S,
    storefront: C,
}

impl<S, C> ReconciliationEngine<S, C>
where
    S: StockStore,
    C: StorefrontCache,
{
    pub fn new(store: S, storefront: C) -> Self {
        Self { store, storefront }
    }

    /// Plain mutation path: plan against the current tree and commit.
    pub fn reconcile(&self, request: &MutationRequest) -> Result<MutationReport, ReconcileError> {
        self.reconcile_with_expected(request, ExpectedQuantity::Any)
    }

    /// Mutation guarded by an expected current quantity. Used by stocktake
    /// confirmation so the committed delta matches the previewed discrepancy.
    #[instrument(
        skip(self, request),
        fields(
            product_id = %request.product_id,
            new_quantity = request.new_quantity,
            reason = %request.reason,
        ),
        err
    )]
    pub fn reconcile_with_expected(
        &self,
        request: &MutationRequest,
        expected: ExpectedQuantity,
    ) -> Result<MutationReport, ReconcileError> {
        let tree = self
            .store
            .product_tree(request.product_id)?
            .ok_or(ReconcileError::NotFound)?;

        let mut plan = plan_mutation(&tree, request)?;
        plan.expected = expected;

        let committed = self.store.commit_mutation(plan)?;

        info!(
            movement_id = %committed.movement.id,
            node = %committed.movement.node,
            quantity_delta = committed.movement.quantity_delta,
            product_quantity = committed.product_quantity,
            "stock mutation committed"
        );

        if committed.product_quantity_changed {
            // Fire-and-forget: the mutation stays committed either way.
            if let Err(e) = self.storefront.invalidate_product(request.product_id) {
                warn!(
                    product_id = %request.product_id,
                    error = %e,
                    "storefront invalidation failed; stock remains committed"
                );
            }
        }

        Ok(MutationReport::from_committed(&committed))
    }
}
