//! Stocktake workflow: preview a physical count, then confirm it.
//!
//! Preview is read-only. Confirmation replays the count through the
//! reconciliation engine with the previewed recorded quantity as the
//! expected value, so the ledger delta written on commit is exactly the
//! discrepancy the operator approved. If anything moved the row between
//! preview and confirmation, the commit conflicts instead of silently
//! recording a different delta.

use tracing::instrument;

use stocktide_core::{ColorVariantId, ProductId, SizeVariantId};
use stocktide_stock::{
    discrepancy, plan_mutation, ExpectedQuantity, MutationRequest, ReasonCode, StocktakePreview,
};

use crate::ledger::MovementLedger;
use crate::reconciliation::{MutationReport, ReconcileError, ReconciliationEngine};
use crate::stock_store::StockStore;
use crate::storefront::StorefrontCache;

/// How many ledger entries a preview carries when the caller does not ask
/// for a specific amount.
pub const PREVIEW_MOVEMENT_LIMIT: usize = 10;
/// Upper bound on the history a preview will attach.
pub const MAX_PREVIEW_MOVEMENT_LIMIT: usize = 100;

/// A physical count against one stock node.
#[derive(Debug, Clone)]
pub struct StocktakeRequest {
    pub product_id: ProductId,
    pub color_variant_id: Option<ColorVariantId>,
    pub size_variant_id: Option<SizeVariantId>,
    pub counted_quantity: i64,
    /// How the operator classifies the correction (stocktake, damage, ...).
    pub reason: ReasonCode,
    /// How many recent ledger entries the preview should carry.
    pub history_limit: Option<usize>,
    pub note: Option<String>,
    pub actor: Option<String>,
}

impl StocktakeRequest {
    fn as_mutation(&self) -> MutationRequest {
        MutationRequest {
            product_id: self.product_id,
            color_variant_id: self.color_variant_id,
            size_variant_id: self.size_variant_id,
            new_quantity: self.counted_quantity,
            reason: self.reason,
            note: self.note.clone(),
            actor: self.actor.clone(),
        }
    }

    fn effective_history_limit(&self) -> usize {
        self.history_limit
            .unwrap_or(PREVIEW_MOVEMENT_LIMIT)
            .min(MAX_PREVIEW_MOVEMENT_LIMIT)
    }
}

/// A confirmed stocktake: the preview the operator approved plus the count.
#[derive(Debug, Clone)]
pub struct StocktakeConfirmation {
    pub request: StocktakeRequest,
    /// Recorded quantity the operator saw at preview time.
    pub recorded_quantity: i64,
}

/// Stocktake orchestration over a store that can both mutate and list history.
#[derive(Debug, Clone)]
pub struct AuditWorkflow<S, C> {
    store: S,
    engine: ReconciliationEngine<S, C>,
}

impl<S, C> AuditWorkflow<S, C>
where
    S: StockStore + MovementLedger + Clone,
    C: StorefrontCache,
{
    pub fn new(store: S, storefront: C) -> Self {
        let engine = ReconciliationEngine::new(store.clone(), storefront);
        Self { store, engine }
    }

    /// Resolve the counted node, compute the discrepancy, and attach recent
    /// ledger entries. Writes nothing.
    #[instrument(skip(self, request), fields(product_id = %request.product_id), err)]
    pub async fn preview(
        &self,
        request: &StocktakeRequest,
    ) -> Result<StocktakePreview, ReconcileError> {
        let tree = self
            .store
            .product_tree(request.product_id)?
            .ok_or(ReconcileError::NotFound)?;

        // Planning resolves the target and rejects invalid node combinations
        // exactly as the later confirmation would.
        let plan = plan_mutation(&tree, &request.as_mutation())?;
        let recorded_quantity = tree
            .quantity_of(&plan.target)
            .ok_or(ReconcileError::NotFound)?;

        let recent_movements = self
            .store
            .list(&plan.target, request.effective_history_limit())
            .await?;

        Ok(StocktakePreview {
            node: plan.target,
            recorded_quantity,
            counted_quantity: request.counted_quantity,
            discrepancy: discrepancy(request.counted_quantity, recorded_quantity),
            recent_movements,
        })
    }

    /// Commit the count. Conflicts if the node's quantity no longer matches
    /// what the preview showed.
    pub fn confirm(
        &self,
        confirmation: &StocktakeConfirmation,
    ) -> Result<MutationReport, ReconcileError> {
        self.engine.reconcile_with_expected(
            &confirmation.request.as_mutation(),
            ExpectedQuantity::Exact(confirmation.recorded_quantity),
        )
    }
}
