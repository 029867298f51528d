use serde::{Deserialize, Serialize};

/// Product-level quantities strictly below this (and above zero) count as
/// low stock.
pub const LOW_STOCK_THRESHOLD: i64 = 5;

/// Derived inventory statistics. Never stored; recomputed over the entire
/// filtered set on every report, independently of listing pagination.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStats {
    /// Σ product quantity × unit price, in cents.
    pub total_value_cents: i64,
    /// Products with `0 < quantity < LOW_STOCK_THRESHOLD`.
    pub low_stock_count: u64,
    /// Products with `quantity == 0`.
    pub out_of_stock_count: u64,
}

impl InventoryStats {
    /// Fold `(quantity, unit_price_cents)` product rows into statistics.
    pub fn collect(products: impl IntoIterator<Item = (i64, i64)>) -> Self {
        let mut stats = InventoryStats::default();
        for (quantity, unit_price_cents) in products {
            stats.total_value_cents += quantity * unit_price_cents;
            if quantity == 0 {
                stats.out_of_stock_count += 1;
            } else if quantity < LOW_STOCK_THRESHOLD {
                stats.low_stock_count += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_buckets_products_by_quantity() {
        let stats = InventoryStats::collect(vec![
            (0, 1_000),  // out of stock
            (4, 2_000),  // low stock
            (5, 3_000),  // neither: threshold is exclusive
            (12, 500),   // healthy
        ]);

        assert_eq!(stats.out_of_stock_count, 1);
        assert_eq!(stats.low_stock_count, 1);
        assert_eq!(stats.total_value_cents, 4 * 2_000 + 5 * 3_000 + 12 * 500);
    }

    #[test]
    fn empty_set_yields_zeroed_stats() {
        assert_eq!(InventoryStats::collect(vec![]), InventoryStats::default());
    }
}
