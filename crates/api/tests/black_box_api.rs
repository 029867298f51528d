use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use stocktide_api::app::{build_app, services::AppServices};
use stocktide_core::{ColorVariantId, ProductId, SizeVariantId};
use stocktide_infra::stock_store::InMemoryStockStore;
use stocktide_stock::{ColorVariant, ProductTree, SizeVariant};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(services: Arc<AppServices>) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Seed {
    product_id: ProductId,
    red_size_id: SizeVariantId,
    leaf_product_id: ProductId,
}

/// Shirt (red S=3 / blue S1=5, S2=6) plus a leaf product with no variants.
fn seed_store(store: &InMemoryStockStore) -> Seed {
    let product_id = ProductId::new();
    let red_size_id = SizeVariantId::new();

    store.insert_product_tree(ProductTree {
        id: product_id,
        name: "Quay Shirt".to_string(),
        reference: "QS-7".to_string(),
        unit_price_cents: 1800,
        quantity: 14,
        colors: vec![
            ColorVariant {
                id: ColorVariantId::new(),
                color: "red".to_string(),
                quantity: 3,
                sizes: vec![SizeVariant {
                    id: red_size_id,
                    size: "S".to_string(),
                    quantity: 3,
                }],
            },
            ColorVariant {
                id: ColorVariantId::new(),
                color: "blue".to_string(),
                quantity: 11,
                sizes: vec![
                    SizeVariant {
                        id: SizeVariantId::new(),
                        size: "S".to_string(),
                        quantity: 5,
                    },
                    SizeVariant {
                        id: SizeVariantId::new(),
                        size: "M".to_string(),
                        quantity: 6,
                    },
                ],
            },
        ],
    });

    let leaf_product_id = ProductId::new();
    store.insert_product_tree(ProductTree {
        id: leaf_product_id,
        name: "Quay Mug".to_string(),
        reference: "QM-1".to_string(),
        unit_price_cents: 900,
        quantity: 10,
        colors: Vec::new(),
    });

    Seed {
        product_id,
        red_size_id,
        leaf_product_id,
    }
}

async fn spawn_seeded() -> (TestServer, Seed) {
    let store = Arc::new(InMemoryStockStore::new());
    let seed = seed_store(&store);
    let services = Arc::new(AppServices::in_memory(store));
    (TestServer::spawn(services).await, seed)
}

#[tokio::test]
async fn health_is_public() {
    let (srv, _) = spawn_seeded().await;

    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn size_mutation_propagates_to_the_product_listing() {
    let (srv, seed) = spawn_seeded().await;
    let client = reqwest::Client::new();

    // Red S: 3 -> 7.
    let res = client
        .post(format!("{}/stock/mutations", srv.base_url))
        .json(&json!({
            "product_id": seed.product_id.to_string(),
            "size_variant_id": seed.red_size_id.to_string(),
            "new_quantity": 7,
            "reason": "adjustment",
            "actor": "warehouse-1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["movement"]["quantity_delta"], 4);
    assert_eq!(body["new_quantity"], 7);
    assert_eq!(body["product_quantity"], 18);

    let res = client
        .get(format!("{}/stock/items", srv.base_url))
        .query(&[("search", "quay shirt")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total_items"], 1);
    assert_eq!(body["items"][0]["quantity"], 18);
}

#[tokio::test]
async fn movements_endpoint_lists_the_ledger_newest_first() {
    let (srv, seed) = spawn_seeded().await;
    let client = reqwest::Client::new();

    for quantity in [4, 5] {
        let res = client
            .post(format!("{}/stock/mutations", srv.base_url))
            .json(&json!({
                "product_id": seed.product_id.to_string(),
                "size_variant_id": seed.red_size_id.to_string(),
                "new_quantity": quantity,
                "reason": "restock",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = client
        .get(format!(
            "{}/stock/sizes/{}/movements",
            srv.base_url, seed.red_size_id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let movements = body["movements"].as_array().unwrap();
    assert_eq!(movements.len(), 2);
    assert_eq!(movements[0]["new_quantity"], 5);
    assert_eq!(movements[1]["new_quantity"], 4);
}

#[tokio::test]
async fn bad_requests_are_rejected_without_writes() {
    let (srv, seed) = spawn_seeded().await;
    let client = reqwest::Client::new();

    // Unknown reason code.
    let res = client
        .post(format!("{}/stock/mutations", srv.base_url))
        .json(&json!({
            "product_id": seed.product_id.to_string(),
            "size_variant_id": seed.red_size_id.to_string(),
            "new_quantity": 5,
            "reason": "shrinkage",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Negative quantity.
    let res = client
        .post(format!("{}/stock/mutations", srv.base_url))
        .json(&json!({
            "product_id": seed.product_id.to_string(),
            "size_variant_id": seed.red_size_id.to_string(),
            "new_quantity": -2,
            "reason": "adjustment",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Unknown product.
    let res = client
        .post(format!("{}/stock/mutations", srv.base_url))
        .json(&json!({
            "product_id": ProductId::new().to_string(),
            "new_quantity": 5,
            "reason": "adjustment",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Unknown node kind in the history path.
    let res = client
        .get(format!(
            "{}/stock/warehouses/{}/movements",
            srv.base_url, seed.red_size_id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Nothing reached the ledger.
    let res = client
        .get(format!(
            "{}/stock/sizes/{}/movements",
            srv.base_url, seed.red_size_id
        ))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["movements"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn leaf_product_damage_shows_up_as_out_of_stock() {
    let (srv, seed) = spawn_seeded().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/stock/mutations", srv.base_url))
        .json(&json!({
            "product_id": seed.leaf_product_id.to_string(),
            "new_quantity": 0,
            "reason": "damage",
            "note": "water damage, whole shelf",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["movement"]["quantity_delta"], -10);

    let res = client
        .get(format!("{}/stock/items", srv.base_url))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["stats"]["out_of_stock_count"], 1);
}

#[tokio::test]
async fn stocktake_preview_and_confirm_round_trip() {
    let (srv, seed) = spawn_seeded().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/stock/stocktakes/preview", srv.base_url))
        .json(&json!({
            "product_id": seed.product_id.to_string(),
            "size_variant_id": seed.red_size_id.to_string(),
            "counted_quantity": 8,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let preview: serde_json::Value = res.json().await.unwrap();
    assert_eq!(preview["recorded_quantity"], 3);
    assert_eq!(preview["discrepancy"], 5);

    let res = client
        .post(format!("{}/stock/stocktakes", srv.base_url))
        .json(&json!({
            "product_id": seed.product_id.to_string(),
            "size_variant_id": seed.red_size_id.to_string(),
            "counted_quantity": 8,
            "recorded_quantity": preview["recorded_quantity"],
            "reason": "stocktake",
            "actor": "auditor-3",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["movement"]["quantity_delta"], preview["discrepancy"]);
    assert_eq!(body["movement"]["reason"], "stocktake");
}

#[tokio::test]
async fn stocktake_confirmation_ledgers_the_supplied_reason() {
    let (srv, seed) = spawn_seeded().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/stock/stocktakes", srv.base_url))
        .json(&json!({
            "product_id": seed.product_id.to_string(),
            "size_variant_id": seed.red_size_id.to_string(),
            "counted_quantity": 1,
            "recorded_quantity": 3,
            "reason": "damage",
            "note": "crushed carton",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["movement"]["reason"], "damage");
    assert_eq!(body["movement"]["quantity_delta"], -2);

    let res = client
        .get(format!(
            "{}/stock/sizes/{}/movements",
            srv.base_url, seed.red_size_id
        ))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["movements"][0]["reason"], "damage");
}

#[tokio::test]
async fn preview_honors_the_requested_history_limit() {
    let (srv, seed) = spawn_seeded().await;
    let client = reqwest::Client::new();

    for quantity in [4, 2] {
        let res = client
            .post(format!("{}/stock/mutations", srv.base_url))
            .json(&json!({
                "product_id": seed.product_id.to_string(),
                "size_variant_id": seed.red_size_id.to_string(),
                "new_quantity": quantity,
                "reason": "adjustment",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = client
        .post(format!("{}/stock/stocktakes/preview", srv.base_url))
        .json(&json!({
            "product_id": seed.product_id.to_string(),
            "size_variant_id": seed.red_size_id.to_string(),
            "counted_quantity": 2,
            "history_limit": 1,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let preview: serde_json::Value = res.json().await.unwrap();
    let movements = preview["recent_movements"].as_array().unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0]["new_quantity"], 2);
}

#[tokio::test]
async fn stale_stocktake_confirmation_is_a_conflict() {
    let (srv, seed) = spawn_seeded().await;
    let client = reqwest::Client::new();

    // A restock lands after the operator previewed recorded_quantity = 3.
    let res = client
        .post(format!("{}/stock/mutations", srv.base_url))
        .json(&json!({
            "product_id": seed.product_id.to_string(),
            "size_variant_id": seed.red_size_id.to_string(),
            "new_quantity": 6,
            "reason": "restock",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(format!("{}/stock/stocktakes", srv.base_url))
        .json(&json!({
            "product_id": seed.product_id.to_string(),
            "size_variant_id": seed.red_size_id.to_string(),
            "counted_quantity": 8,
            "recorded_quantity": 3,
            "reason": "stocktake",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}
