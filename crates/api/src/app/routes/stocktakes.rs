use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use stocktide_infra::audit::StocktakeConfirmation;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/stocktakes/preview", post(preview_stocktake))
        .route("/stocktakes", post(confirm_stocktake))
}

/// Read-only: shows the operator what confirming the count would do.
pub async fn preview_stocktake(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::StocktakePreviewBody>,
) -> axum::response::Response {
    let request = match body.into_request() {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let preview = match services.preview(&request).await {
        Ok(p) => p,
        Err(e) => return errors::reconcile_error_to_response(e),
    };

    (StatusCode::OK, Json(dto::preview_to_json(&preview))).into_response()
}

/// Commits the count; conflicts if the node moved since the preview.
pub async fn confirm_stocktake(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::StocktakeConfirmBody>,
) -> axum::response::Response {
    let (request, recorded_quantity) = match body.into_parts() {
        Ok(parts) => parts,
        Err(resp) => return resp,
    };

    let report = match services.confirm(&StocktakeConfirmation {
        request,
        recorded_quantity,
    }) {
        Ok(r) => r,
        Err(e) => return errors::reconcile_error_to_response(e),
    };

    (StatusCode::CREATED, Json(dto::report_to_json(&report))).into_response()
}
