use serde::{Deserialize, Serialize};

use stocktide_core::{ColorVariantId, DomainError, DomainResult, Entity, ProductId, SizeVariantId};

/// Reference to one node of the stock tree.
///
/// Movements and queries address nodes through this enum so that a derived
/// ancestor can never be confused with a directly targeted node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NodeRef {
    Product(ProductId),
    Color(ColorVariantId),
    Size(SizeVariantId),
}

impl core::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NodeRef::Product(id) => write!(f, "product/{id}"),
            NodeRef::Color(id) => write!(f, "color/{id}"),
            NodeRef::Size(id) => write!(f, "size/{id}"),
        }
    }
}

/// Explicit leaf/aggregate tag.
///
/// Reconciliation dispatches on this tag rather than null-checking child
/// collections: a `Leaf` holds an authoritative quantity set directly by
/// mutation, an `Aggregate` holds a materialized sum over its children.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Aggregate,
}

/// SizeVariant node: always a leaf; identified by its color's label plus a size label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeVariant {
    pub id: SizeVariantId,
    pub size: String,
    pub quantity: i64,
}

impl Entity for SizeVariant {
    type Id = SizeVariantId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// ColorVariant node: child of a Product; a leaf until size variants are
/// defined under it, an aggregate afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorVariant {
    pub id: ColorVariantId,
    pub color: String,
    pub quantity: i64,
    pub sizes: Vec<SizeVariant>,
}

impl ColorVariant {
    pub fn kind(&self) -> NodeKind {
        if self.sizes.is_empty() {
            NodeKind::Leaf
        } else {
            NodeKind::Aggregate
        }
    }

    /// Sum of this color row's own size variants.
    pub fn size_total(&self) -> i64 {
        self.sizes.iter().map(|s| s.quantity).sum()
    }
}

impl Entity for ColorVariant {
    type Id = ColorVariantId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// One full product subtree with materialized quantities at every level.
///
/// Node lifecycle (create/delete) belongs to the external catalog; this
/// subsystem only reads and rewrites `quantity` fields. `name`, `reference`
/// and `unit_price_cents` are catalog-owned display/valuation fields carried
/// for the reporting facade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTree {
    pub id: ProductId,
    pub name: String,
    pub reference: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub colors: Vec<ColorVariant>,
}

impl Entity for ProductTree {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl ProductTree {
    pub fn kind(&self) -> NodeKind {
        if self.colors.is_empty() {
            NodeKind::Leaf
        } else {
            NodeKind::Aggregate
        }
    }

    /// True if any size variant exists anywhere under this product.
    pub fn has_sizes(&self) -> bool {
        self.colors.iter().any(|c| !c.sizes.is_empty())
    }

    /// Sum of every size variant under this product, across all colors.
    pub fn size_total(&self) -> i64 {
        self.colors.iter().map(ColorVariant::size_total).sum()
    }

    /// Sum of the color variant rows under this product.
    pub fn color_total(&self) -> i64 {
        self.colors.iter().map(|c| c.quantity).sum()
    }

    /// Sum of all size variants under this product sharing the given color label.
    pub fn size_total_for_color(&self, color: &str) -> i64 {
        self.colors
            .iter()
            .filter(|c| c.color == color)
            .map(ColorVariant::size_total)
            .sum()
    }

    pub fn find_color(&self, id: ColorVariantId) -> Option<&ColorVariant> {
        self.colors.iter().find(|c| c.id == id)
    }

    pub fn find_color_mut(&mut self, id: ColorVariantId) -> Option<&mut ColorVariant> {
        self.colors.iter_mut().find(|c| c.id == id)
    }

    /// Locate a size variant together with its owning color row.
    pub fn find_size(&self, id: SizeVariantId) -> Option<(&ColorVariant, &SizeVariant)> {
        self.colors
            .iter()
            .find_map(|c| c.sizes.iter().find(|s| s.id == id).map(|s| (c, s)))
    }

    pub fn find_size_mut(&mut self, id: SizeVariantId) -> Option<&mut SizeVariant> {
        self.colors
            .iter_mut()
            .find_map(|c| c.sizes.iter_mut().find(|s| s.id == id))
    }

    /// Quantity currently recorded for a node of this tree.
    pub fn quantity_of(&self, node: &NodeRef) -> Option<i64> {
        match node {
            NodeRef::Product(id) if *id == self.id => Some(self.quantity),
            NodeRef::Product(_) => None,
            NodeRef::Color(id) => self.find_color(*id).map(|c| c.quantity),
            NodeRef::Size(id) => self.find_size(*id).map(|(_, s)| s.quantity),
        }
    }

    /// Verify the cross-level numeric invariants.
    ///
    /// - no node carries a negative quantity
    /// - if the product has size variants anywhere, its quantity equals the
    ///   sum of all of them
    /// - every color row with size variants equals the sum of all sizes
    ///   sharing its color label
    pub fn check_invariants(&self) -> DomainResult<()> {
        if self.quantity < 0 {
            return Err(DomainError::invariant("product quantity is negative"));
        }
        for c in &self.colors {
            if c.quantity < 0 {
                return Err(DomainError::invariant(format!(
                    "color variant {} quantity is negative",
                    c.id
                )));
            }
            for s in &c.sizes {
                if s.quantity < 0 {
                    return Err(DomainError::invariant(format!(
                        "size variant {} quantity is negative",
                        s.id
                    )));
                }
            }
            if c.kind() == NodeKind::Aggregate {
                let expected = self.size_total_for_color(&c.color);
                if c.quantity != expected {
                    return Err(DomainError::invariant(format!(
                        "color variant {} holds {}, size sum is {expected}",
                        c.id, c.quantity
                    )));
                }
            }
        }
        if self.has_sizes() && self.quantity != self.size_total() {
            return Err(DomainError::invariant(format!(
                "product {} holds {}, size sum is {}",
                self.id,
                self.quantity,
                self.size_total()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(label: &str, quantity: i64) -> SizeVariant {
        SizeVariant {
            id: SizeVariantId::new(),
            size: label.to_string(),
            quantity,
        }
    }

    fn tree_with_sizes() -> ProductTree {
        let red = ColorVariant {
            id: ColorVariantId::new(),
            color: "Red".to_string(),
            quantity: 5,
            sizes: vec![size("S", 3), size("M", 2)],
        };
        let blue = ColorVariant {
            id: ColorVariantId::new(),
            color: "Blue".to_string(),
            quantity: 5,
            sizes: vec![size("S", 5)],
        };
        ProductTree {
            id: ProductId::new(),
            name: "Linen shirt".to_string(),
            reference: "SHIRT-01".to_string(),
            unit_price_cents: 4_900,
            quantity: 10,
            colors: vec![red, blue],
        }
    }

    #[test]
    fn kind_dispatches_on_children() {
        let tree = tree_with_sizes();
        assert_eq!(tree.kind(), NodeKind::Aggregate);
        assert_eq!(tree.colors[0].kind(), NodeKind::Aggregate);

        let leaf = ProductTree {
            colors: vec![],
            ..tree
        };
        assert_eq!(leaf.kind(), NodeKind::Leaf);
    }

    #[test]
    fn totals_sum_across_colors() {
        let tree = tree_with_sizes();
        assert_eq!(tree.size_total(), 10);
        assert_eq!(tree.color_total(), 10);
        assert_eq!(tree.size_total_for_color("Red"), 5);
        assert_eq!(tree.size_total_for_color("Blue"), 5);
        assert_eq!(tree.size_total_for_color("Green"), 0);
    }

    #[test]
    fn invariants_hold_on_consistent_tree() {
        assert!(tree_with_sizes().check_invariants().is_ok());
    }

    #[test]
    fn invariants_catch_stale_product_total() {
        let mut tree = tree_with_sizes();
        tree.quantity = 99;
        assert!(tree.check_invariants().is_err());
    }

    #[test]
    fn invariants_catch_stale_color_total() {
        let mut tree = tree_with_sizes();
        tree.colors[0].quantity = 99;
        assert!(tree.check_invariants().is_err());
    }

    #[test]
    fn quantity_of_resolves_each_level() {
        let tree = tree_with_sizes();
        let size_id = tree.colors[0].sizes[0].id;
        assert_eq!(tree.quantity_of(&NodeRef::Product(tree.id)), Some(10));
        assert_eq!(tree.quantity_of(&NodeRef::Color(tree.colors[1].id)), Some(5));
        assert_eq!(tree.quantity_of(&NodeRef::Size(size_id)), Some(3));
        assert_eq!(tree.quantity_of(&NodeRef::Size(SizeVariantId::new())), None);
    }
}
