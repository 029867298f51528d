//! Reconciliation: planning and applying a single stock mutation.
//!
//! Split in two pure steps so the algorithm is testable without storage:
//!
//! - [`plan_mutation`] resolves the target node, validates the request, and
//!   decides which ancestors must be re-summed ([`ReconcileScope`]).
//! - [`apply_plan`] performs the state transition on a tree snapshot,
//!   re-reading sibling quantities at write time (never applying a cached
//!   delta). Stores run this under their own transaction boundary.
//!
//! Validation happens entirely before any write: a request that would be
//! rejected never starts a transaction.

use serde::{Deserialize, Serialize};

use stocktide_core::{ColorVariantId, DomainError, DomainResult, ProductId, SizeVariantId};

use crate::movement::ReasonCode;
use crate::node::{NodeKind, NodeRef, ProductTree};

/// Expectation on the target's previous quantity at commit time.
///
/// `Exact` is how the stocktake workflow guarantees that the discrepancy it
/// displayed equals the delta it commits: if the row moved in between, the
/// commit fails with a conflict instead of recording a misleading entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedQuantity {
    /// Skip the check (plain mutation path).
    Any,
    /// Require the target to still hold exactly this quantity.
    Exact(i64),
}

impl ExpectedQuantity {
    pub fn matches(self, actual: i64) -> bool {
        match self {
            ExpectedQuantity::Any => true,
            ExpectedQuantity::Exact(q) => q == actual,
        }
    }

    pub fn check(self, actual: i64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "quantity changed since it was read (expected {self:?}, found {actual})"
            )))
        }
    }
}

/// One inbound stock mutation, exactly as the API layer receives it.
///
/// `product_id` is always present; the most specific variant identifier wins
/// (size over color over product). Supplied identifiers that contradict the
/// tree's actual ancestry are rejected rather than silently ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRequest {
    pub product_id: ProductId,
    pub color_variant_id: Option<ColorVariantId>,
    pub size_variant_id: Option<SizeVariantId>,
    pub new_quantity: i64,
    pub reason: ReasonCode,
    pub note: Option<String>,
    pub actor: Option<String>,
}

impl MutationRequest {
    /// Pre-transaction validation. Field-level failures only; node existence
    /// is checked during planning against a tree snapshot.
    pub fn validate(&self) -> DomainResult<()> {
        if self.new_quantity < 0 {
            return Err(DomainError::validation(
                "new_quantity",
                format!("must be a non-negative integer, got {}", self.new_quantity),
            ));
        }
        Ok(())
    }
}

/// Which ancestor re-sums a committed mutation entails.
///
/// Produced by dispatching on the target node's [`NodeKind`] tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReconcileScope {
    /// Size variant target: re-sum its color row over all sizes sharing the
    /// color label, then the product over every size variant it has.
    Size {
        size_id: SizeVariantId,
        color_id: ColorVariantId,
        product_id: ProductId,
    },
    /// Leaf color variant target: re-sum the product over its color rows.
    Color {
        color_id: ColorVariantId,
        product_id: ProductId,
    },
    /// Leaf product target: the root has no derived aggregation.
    ProductLeaf { product_id: ProductId },
}

impl ReconcileScope {
    /// The product whose subtree this mutation touches.
    pub fn product_id(&self) -> ProductId {
        match self {
            ReconcileScope::Size { product_id, .. }
            | ReconcileScope::Color { product_id, .. }
            | ReconcileScope::ProductLeaf { product_id } => *product_id,
        }
    }
}

/// A validated, resolved mutation ready to commit atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub target: NodeRef,
    pub new_quantity: i64,
    pub scope: ReconcileScope,
    pub reason: ReasonCode,
    pub note: Option<String>,
    pub actor: Option<String>,
    pub expected: ExpectedQuantity,
}

/// Result of applying a plan to a tree: the before/after snapshot for the
/// ledger entry plus the (possibly recomputed) product-level quantity.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AppliedMutation {
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub product_quantity_before: i64,
    pub product_quantity_after: i64,
}

impl AppliedMutation {
    pub fn quantity_delta(&self) -> i64 {
        self.new_quantity - self.previous_quantity
    }

    pub fn product_quantity_changed(&self) -> bool {
        self.product_quantity_before != self.product_quantity_after
    }
}

/// Resolve and validate a mutation request against a product tree snapshot.
///
/// Rejections (all before any write):
/// - negative `new_quantity` → validation error
/// - an identifier that does not exist in the tree → not found
/// - supplied ancestor identifiers that contradict the resolved node's actual
///   ancestry → validation error
/// - a color variant that still has size variants targeted directly →
///   validation error (mutate the sizes individually; no silent stale children)
/// - a product with color variants targeted directly → validation error
pub fn plan_mutation(
    tree: &ProductTree,
    request: &MutationRequest,
) -> DomainResult<ReconciliationPlan> {
    request.validate()?;

    if request.product_id != tree.id {
        return Err(DomainError::not_found());
    }

    let (target, scope) = if let Some(size_id) = request.size_variant_id {
        let (color, _size) = tree.find_size(size_id).ok_or(DomainError::NotFound)?;
        if let Some(color_id) = request.color_variant_id {
            if color_id != color.id {
                return Err(DomainError::validation(
                    "color_variant_id",
                    "does not own the targeted size variant",
                ));
            }
        }
        (
            NodeRef::Size(size_id),
            ReconcileScope::Size {
                size_id,
                color_id: color.id,
                product_id: tree.id,
            },
        )
    } else if let Some(color_id) = request.color_variant_id {
        let color = tree.find_color(color_id).ok_or(DomainError::NotFound)?;
        if color.kind() == NodeKind::Aggregate {
            return Err(DomainError::validation(
                "color_variant_id",
                "color variant has size variants; mutate the size variants individually",
            ));
        }
        (
            NodeRef::Color(color_id),
            ReconcileScope::Color {
                color_id,
                product_id: tree.id,
            },
        )
    } else {
        if tree.kind() == NodeKind::Aggregate {
            return Err(DomainError::validation(
                "product_id",
                "product has color variants; target a variant instead",
            ));
        }
        (
            NodeRef::Product(tree.id),
            ReconcileScope::ProductLeaf { product_id: tree.id },
        )
    };

    Ok(ReconciliationPlan {
        target,
        new_quantity: request.new_quantity,
        scope,
        reason: request.reason,
        note: request.note.clone(),
        actor: request.actor.clone(),
        expected: ExpectedQuantity::Any,
    })
}

/// Apply a plan to a tree snapshot: write the target quantity, then re-sum
/// every affected ancestor from current sibling values.
///
/// Stores call this under their transaction boundary (the in-memory store
/// under its write lock), so the sibling re-reads here happen at write time.
/// Fails without touching the tree when the target vanished or the expected
/// previous quantity no longer matches.
pub fn apply_plan(tree: &mut ProductTree, plan: &ReconciliationPlan) -> DomainResult<AppliedMutation> {
    let previous = tree
        .quantity_of(&plan.target)
        .ok_or(DomainError::NotFound)?;
    plan.expected.check(previous)?;

    let product_before = tree.quantity;

    match plan.scope {
        ReconcileScope::Size {
            size_id, color_id, ..
        } => {
            let size = tree.find_size_mut(size_id).ok_or(DomainError::NotFound)?;
            size.quantity = plan.new_quantity;

            // Derived writes: re-sum from the tree, no ledger entries.
            let color_label = tree
                .find_color(color_id)
                .ok_or(DomainError::NotFound)?
                .color
                .clone();
            let color_sum = tree.size_total_for_color(&color_label);
            let color = tree.find_color_mut(color_id).ok_or(DomainError::NotFound)?;
            color.quantity = color_sum;

            if tree.has_sizes() {
                tree.quantity = tree.size_total();
            }
        }
        ReconcileScope::Color { color_id, .. } => {
            let color = tree.find_color_mut(color_id).ok_or(DomainError::NotFound)?;
            color.quantity = plan.new_quantity;
            // Size sum wins whenever sizes exist anywhere under the product,
            // mirroring the cross-level invariant.
            tree.quantity = if tree.has_sizes() {
                tree.size_total()
            } else {
                tree.color_total()
            };
        }
        ReconcileScope::ProductLeaf { .. } => {
            tree.quantity = plan.new_quantity;
        }
    }

    Ok(AppliedMutation {
        previous_quantity: previous,
        new_quantity: plan.new_quantity,
        product_quantity_before: product_before,
        product_quantity_after: tree.quantity,
    })
}
