use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use stocktide_core::{ColorVariantId, ProductId, SizeVariantId};
use stocktide_infra::reconciliation::ReconciliationEngine;
use stocktide_infra::stock_store::{InMemoryStockStore, StockStore};
use stocktide_infra::storefront::LoggingStorefrontCache;
use stocktide_stock::{ColorVariant, MutationRequest, ProductTree, ReasonCode, SizeVariant};

/// Naive counter store: keeps only per-size counters and a cached product
/// delta (the lost-update-prone design the re-sum replaces).
#[derive(Debug, Clone)]
struct NaiveCounterStore {
    inner: Arc<RwLock<NaiveState>>,
}

#[derive(Debug, Default)]
struct NaiveState {
    sizes: HashMap<SizeVariantId, i64>,
    product_total: i64,
}

impl NaiveCounterStore {
    fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(NaiveState::default())),
        }
    }

    fn insert_size(&self, size_id: SizeVariantId, quantity: i64) {
        let mut state = self.inner.write().unwrap();
        state.sizes.insert(size_id, quantity);
        state.product_total += quantity;
    }

    fn set_quantity(&self, size_id: SizeVariantId, quantity: i64) -> Result<(), ()> {
        let mut state = self.inner.write().unwrap();
        let Some(current) = state.sizes.get_mut(&size_id) else {
            return Err(());
        };
        let delta = quantity - *current;
        *current = quantity;
        state.product_total += delta;
        Ok(())
    }
}

/// Single product with `colors` color rows of `sizes_per_color` sizes each.
fn seed_product(store: &InMemoryStockStore, colors: usize, sizes_per_color: usize) -> (ProductId, SizeVariantId) {
    let product_id = ProductId::new();
    let mut first_size = None;
    let mut color_rows = Vec::with_capacity(colors);

    for c in 0..colors {
        let mut sizes = Vec::with_capacity(sizes_per_color);
        for s in 0..sizes_per_color {
            let size_id = SizeVariantId::new();
            first_size.get_or_insert(size_id);
            sizes.push(SizeVariant {
                id: size_id,
                size: format!("S{s}"),
                quantity: 10,
            });
        }
        color_rows.push(ColorVariant {
            id: ColorVariantId::new(),
            color: format!("color-{c}"),
            quantity: (sizes_per_color as i64) * 10,
            sizes,
        });
    }

    store.insert_product_tree(ProductTree {
        id: product_id,
        name: "Bench Product".to_string(),
        reference: "BP-1".to_string(),
        unit_price_cents: 1000,
        quantity: (colors as i64) * (sizes_per_color as i64) * 10,
        colors: color_rows,
    });

    (product_id, first_size.expect("at least one size"))
}

fn size_request(product_id: ProductId, size_id: SizeVariantId, quantity: i64) -> MutationRequest {
    MutationRequest {
        product_id,
        color_variant_id: None,
        size_variant_id: Some(size_id),
        new_quantity: quantity,
        reason: ReasonCode::Adjustment,
        note: None,
        actor: None,
    }
}

fn bench_mutation_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("mutation_latency");
    group.sample_size(1000);

    group.bench_function("size_mutation_small_tree", |b| {
        let store = Arc::new(InMemoryStockStore::new());
        let (product_id, size_id) = seed_product(&store, 2, 3);
        let engine = ReconciliationEngine::new(Arc::clone(&store), LoggingStorefrontCache);

        let mut quantity = 0i64;
        b.iter(|| {
            quantity = (quantity + 1) % 100;
            engine
                .reconcile(black_box(&size_request(product_id, size_id, quantity)))
                .unwrap();
        });
    });

    group.finish();
}

/// Cost of the full ancestor re-sum as the product tree fans out.
fn bench_resum_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("resum_fan_out");
    group.throughput(Throughput::Elements(1));

    for sizes_per_color in [2usize, 8, 32, 128].iter() {
        group.bench_with_input(
            BenchmarkId::new("sizes_per_color", sizes_per_color),
            sizes_per_color,
            |b, &fan_out| {
                let store = Arc::new(InMemoryStockStore::new());
                let (product_id, size_id) = seed_product(&store, 4, fan_out);
                let engine =
                    ReconciliationEngine::new(Arc::clone(&store), LoggingStorefrontCache);

                let mut quantity = 0i64;
                b.iter(|| {
                    quantity = (quantity + 1) % 100;
                    engine
                        .reconcile(black_box(&size_request(product_id, size_id, quantity)))
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

/// Re-sum with ledger append versus bare counter updates with a cached delta.
fn bench_resum_vs_naive_counters(c: &mut Criterion) {
    let mut group = c.benchmark_group("resum_vs_naive_counters");
    group.sample_size(1000);

    group.bench_function("resum_with_ledger", |b| {
        let store = Arc::new(InMemoryStockStore::new());
        let (product_id, size_id) = seed_product(&store, 4, 8);
        let engine = ReconciliationEngine::new(Arc::clone(&store), LoggingStorefrontCache);

        let mut quantity = 0i64;
        b.iter(|| {
            quantity = (quantity + 1) % 100;
            engine
                .reconcile(black_box(&size_request(product_id, size_id, quantity)))
                .unwrap();
        });
    });

    group.bench_function("naive_cached_delta", |b| {
        let store = NaiveCounterStore::new();
        let size_id = SizeVariantId::new();
        store.insert_size(size_id, 10);
        for _ in 0..31 {
            store.insert_size(SizeVariantId::new(), 10);
        }

        let mut quantity = 0i64;
        b.iter(|| {
            quantity = (quantity + 1) % 100;
            store.set_quantity(black_box(size_id), quantity).unwrap();
        });
    });

    group.finish();
}

fn bench_tree_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_load");

    for colors in [1usize, 8, 64].iter() {
        group.bench_with_input(BenchmarkId::new("colors", colors), colors, |b, &colors| {
            let store = Arc::new(InMemoryStockStore::new());
            let (product_id, _) = seed_product(&store, colors, 8);

            b.iter(|| {
                black_box(store.product_tree(black_box(product_id)).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_mutation_latency,
    bench_resum_fan_out,
    bench_resum_vs_naive_counters,
    bench_tree_load
);
criterion_main!(benches);
