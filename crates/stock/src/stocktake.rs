//! Stocktake math: what the operator sees before confirming a physical count.

use serde::{Deserialize, Serialize};

use crate::movement::StockMovement;
use crate::node::NodeRef;

/// Counted minus recorded. Positive means the shelf holds more than the books.
pub fn discrepancy(counted_quantity: i64, recorded_quantity: i64) -> i64 {
    counted_quantity - recorded_quantity
}

/// Read-only stocktake preview shown to the operator before confirmation.
///
/// Committing with `recorded_quantity` as the expected previous value
/// guarantees the discrepancy shown here equals the ledger entry's delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StocktakePreview {
    pub node: NodeRef,
    pub recorded_quantity: i64,
    pub counted_quantity: i64,
    pub discrepancy: i64,
    /// Last N ledger entries for operator context, reverse-chronological.
    pub recent_movements: Vec<StockMovement>,
}
