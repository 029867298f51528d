use chrono::{DateTime, Utc};
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use stocktide_core::{DomainError, Entity, MovementId};

use crate::node::NodeRef;

/// Why a quantity changed. Closed enumeration; free text goes in the
/// movement's `note`, never here.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    Adjustment,
    Stocktake,
    Damage,
    Expire,
    Misplacement,
    Theft,
    /// Operational: stock consumed by an order.
    Sale,
    /// Operational: stock received from a supplier.
    Restock,
    Other,
}

impl ReasonCode {
    pub const ALL: [ReasonCode; 9] = [
        ReasonCode::Adjustment,
        ReasonCode::Stocktake,
        ReasonCode::Damage,
        ReasonCode::Expire,
        ReasonCode::Misplacement,
        ReasonCode::Theft,
        ReasonCode::Sale,
        ReasonCode::Restock,
        ReasonCode::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Adjustment => "adjustment",
            ReasonCode::Stocktake => "stocktake",
            ReasonCode::Damage => "damage",
            ReasonCode::Expire => "expire",
            ReasonCode::Misplacement => "misplacement",
            ReasonCode::Theft => "theft",
            ReasonCode::Sale => "sale",
            ReasonCode::Restock => "restock",
            ReasonCode::Other => "other",
        }
    }
}

impl core::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReasonCode::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| {
                DomainError::validation("reason", format!("unknown reason code '{s}'"))
            })
    }
}

/// Immutable ledger entry: one quantity change at one directly targeted node.
///
/// Derived ancestor recomputations never produce a movement. Entries are
/// write-once; nothing in this subsystem updates or deletes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    /// The node that was directly targeted (never a derived ancestor).
    pub node: NodeRef,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    /// `new_quantity - previous_quantity`; negative for shrinkage.
    pub quantity_delta: i64,
    pub reason: ReasonCode,
    pub note: Option<String>,
    /// Actor attribution, supplied by the (external) auth layer.
    pub actor: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_round_trip_through_their_labels() {
        for reason in ReasonCode::ALL {
            assert_eq!(reason.as_str().parse::<ReasonCode>().unwrap(), reason);
        }
    }

    #[test]
    fn unknown_reason_is_a_field_level_validation_error() {
        let err = "shoplifting".parse::<ReasonCode>().unwrap_err();
        match err {
            DomainError::Validation { field, .. } => assert_eq!(field, "reason"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
