use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use stocktide_core::{DomainError, MovementId, ProductId};
use stocktide_stock::{
    apply_plan, InventoryStats, NodeRef, ProductTree, ReconciliationPlan, StockMovement,
};

use super::r#trait::{CommittedMutation, StockStore, StockStoreError};
use crate::ledger::MovementLedger;
use crate::query::{matches_search, Page, PageRequest, StockItemView, StockQuery};

/// In-memory stock store + ledger.
///
/// Intended for tests/dev. One `RwLock` over the whole state serializes
/// writers, so every `commit_mutation` is trivially atomic and isolated;
/// `apply_plan` re-reads sibling quantities under that same lock.
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    inner: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, ProductTree>,
    /// Append-only. Entries are never updated or deleted.
    movements: Vec<StockMovement>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one product subtree. Stands in for the external catalog, which
    /// owns node creation and deletion.
    pub fn insert_product_tree(&self, tree: ProductTree) {
        if let Ok(mut state) = self.inner.write() {
            state.products.insert(tree.id, tree);
        }
    }

    /// Total number of ledger entries, across all nodes. Test support.
    pub fn movement_count(&self) -> usize {
        self.inner.read().map(|s| s.movements.len()).unwrap_or(0)
    }

    fn lock_poisoned() -> StockStoreError {
        StockStoreError::Persistence("lock poisoned".to_string())
    }
}

fn map_apply_error(err: DomainError) -> StockStoreError {
    match err {
        DomainError::NotFound => StockStoreError::NotFound,
        DomainError::Conflict(msg) => StockStoreError::Conflict(msg),
        // Plans are validated before commit; anything else means the plan and
        // the store disagree about the tree.
        other => StockStoreError::Persistence(format!("plan not applicable: {other}")),
    }
}

impl StockStore for InMemoryStockStore {
    fn product_tree(&self, product_id: ProductId) -> Result<Option<ProductTree>, StockStoreError> {
        let state = self.inner.read().map_err(|_| Self::lock_poisoned())?;
        Ok(state.products.get(&product_id).cloned())
    }

    fn commit_mutation(&self, plan: ReconciliationPlan) -> Result<CommittedMutation, StockStoreError> {
        let mut state = self.inner.write().map_err(|_| Self::lock_poisoned())?;
        let state = &mut *state;

        let tree = state
            .products
            .get_mut(&plan.scope.product_id())
            .ok_or(StockStoreError::NotFound)?;

        // apply_plan fails before touching the tree, so an error here leaves
        // zero quantity changes and zero ledger entries.
        let applied = apply_plan(tree, &plan).map_err(map_apply_error)?;

        let movement = StockMovement {
            id: MovementId::new(),
            node: plan.target,
            previous_quantity: applied.previous_quantity,
            new_quantity: applied.new_quantity,
            quantity_delta: applied.quantity_delta(),
            reason: plan.reason,
            note: plan.note,
            actor: plan.actor,
            recorded_at: Utc::now(),
        };
        state.movements.push(movement.clone());

        Ok(CommittedMutation {
            movement,
            product_quantity: applied.product_quantity_after,
            product_quantity_changed: applied.product_quantity_changed(),
        })
    }
}

#[async_trait]
impl MovementLedger for InMemoryStockStore {
    async fn list(
        &self,
        node: &NodeRef,
        limit: usize,
    ) -> Result<Vec<StockMovement>, StockStoreError> {
        let state = self.inner.read().map_err(|_| Self::lock_poisoned())?;
        Ok(state
            .movements
            .iter()
            .rev()
            .filter(|m| m.node == *node)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StockQuery for InMemoryStockStore {
    async fn list(
        &self,
        page: PageRequest,
        search: Option<&str>,
    ) -> Result<Page<StockItemView>, StockStoreError> {
        let state = self.inner.read().map_err(|_| Self::lock_poisoned())?;

        let term = search.unwrap_or_default();
        let mut filtered: Vec<&ProductTree> = state
            .products
            .values()
            .filter(|t| matches_search(&t.name, &t.reference, term))
            .collect();
        filtered.sort_by(|a, b| a.name.cmp(&b.name));

        let total_items = filtered.len() as u64;
        let items = filtered
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size() as usize)
            .map(StockItemView::from)
            .collect();

        Ok(Page {
            items,
            page: page.page(),
            page_size: page.page_size(),
            total_items,
        })
    }

    async fn stats(&self, search: Option<&str>) -> Result<InventoryStats, StockStoreError> {
        let state = self.inner.read().map_err(|_| Self::lock_poisoned())?;

        let term = search.unwrap_or_default();
        Ok(InventoryStats::collect(
            state
                .products
                .values()
                .filter(|t| matches_search(&t.name, &t.reference, term))
                .map(|t| (t.quantity, t.unit_price_cents)),
        ))
    }
}
