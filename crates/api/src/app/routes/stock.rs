use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stocktide_infra::query::{PageRequest, DEFAULT_PAGE_SIZE};
use stocktide_stock::NodeRef;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Upper bound on one movement-history read.
const MAX_MOVEMENT_LIMIT: usize = 100;
const DEFAULT_MOVEMENT_LIMIT: usize = 20;

pub fn router() -> Router {
    Router::new()
        .route("/mutations", post(commit_mutation))
        .route("/items", get(list_items))
        .route("/:kind/:id/movements", get(list_movements))
}

pub async fn commit_mutation(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::MutationBody>,
) -> axum::response::Response {
    let request = match body.into_request() {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let report = match services.reconcile(&request) {
        Ok(r) => r,
        Err(e) => return errors::reconcile_error_to_response(e),
    };

    (StatusCode::CREATED, Json(dto::report_to_json(&report))).into_response()
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    let page = match PageRequest::new(
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    ) {
        Ok(p) => p,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
        }
    };
    let search = query.search.as_deref();

    let items = match services.list_items(page, search).await {
        Ok(p) => p,
        Err(e) => return errors::store_error_to_response(e),
    };
    // Stats cover the whole filtered set, not just the returned page.
    let stats = match services.stats(search).await {
        Ok(s) => s,
        Err(e) => return errors::store_error_to_response(e),
    };

    (StatusCode::OK, Json(dto::page_to_json(&items, &stats))).into_response()
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Path((kind, id)): Path<(String, String)>,
    Query(query): Query<dto::MovementsQuery>,
) -> axum::response::Response {
    let node = match parse_node(&kind, &id) {
        Ok(n) => n,
        Err(resp) => return resp,
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_MOVEMENT_LIMIT)
        .min(MAX_MOVEMENT_LIMIT);

    let movements = match services.movements(&node, limit).await {
        Ok(m) => m,
        Err(e) => return errors::store_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "node": node,
            "movements": movements.iter().map(dto::movement_to_json).collect::<Vec<_>>(),
        })),
    )
        .into_response()
}

pub fn parse_node(kind: &str, id: &str) -> Result<NodeRef, axum::response::Response> {
    match kind {
        "products" => Ok(NodeRef::Product(dto::parse_product_id(id)?)),
        "colors" => Ok(NodeRef::Color(dto::parse_color_id(id)?)),
        "sizes" => Ok(NodeRef::Size(dto::parse_size_id(id)?)),
        _ => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_node_kind",
            "kind must be one of: products, colors, sizes",
        )),
    }
}
