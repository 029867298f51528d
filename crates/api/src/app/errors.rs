use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stocktide_infra::reconciliation::ReconcileError;
use stocktide_infra::stock_store::StockStoreError;

pub fn reconcile_error_to_response(err: ReconcileError) -> axum::response::Response {
    match err {
        ReconcileError::Validation { field, message } => json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("{field}: {message}"),
        ),
        ReconcileError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        ReconcileError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ReconcileError::Persistence(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", msg)
        }
    }
}

pub fn store_error_to_response(err: StockStoreError) -> axum::response::Response {
    reconcile_error_to_response(err.into())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
