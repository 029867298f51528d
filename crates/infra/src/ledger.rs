//! Read side of the movement ledger.
//!
//! The ledger is write-once, read-many: appends happen only inside
//! [`StockStore::commit_mutation`](crate::stock_store::StockStore::commit_mutation),
//! in the same transaction as the quantity writes, so no failure path can
//! leave a stray entry. No update or delete operation exists anywhere on
//! this surface.
//!
//! Reads run on the reporting path (outside mutation transactions) and may
//! observe a slightly stale but internally consistent snapshot.

use async_trait::async_trait;
use std::sync::Arc;

use stocktide_stock::{NodeRef, StockMovement};

use crate::stock_store::StockStoreError;

/// Append-only movement ledger, read side.
#[async_trait]
pub trait MovementLedger: Send + Sync {
    /// Ledger entries for one node, reverse-chronological, at most `limit`.
    async fn list(
        &self,
        node: &NodeRef,
        limit: usize,
    ) -> Result<Vec<StockMovement>, StockStoreError>;
}

#[async_trait]
impl<L> MovementLedger for Arc<L>
where
    L: MovementLedger + ?Sized,
{
    async fn list(
        &self,
        node: &NodeRef,
        limit: usize,
    ) -> Result<Vec<StockMovement>, StockStoreError> {
        (**self).list(node, limit).await
    }
}
