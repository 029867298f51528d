//! Request/response DTOs and JSON mapping helpers.

use serde::Deserialize;
use serde_json::json;

use stocktide_core::{ColorVariantId, ProductId, SizeVariantId};
use stocktide_infra::audit::StocktakeRequest;
use stocktide_infra::query::{Page, StockItemView};
use stocktide_infra::reconciliation::MutationReport;
use stocktide_stock::{
    InventoryStats, MutationRequest, ReasonCode, StockMovement, StocktakePreview,
};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct MutationBody {
    pub product_id: String,
    pub color_variant_id: Option<String>,
    pub size_variant_id: Option<String>,
    pub new_quantity: i64,
    pub reason: String,
    pub note: Option<String>,
    pub actor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StocktakePreviewBody {
    pub product_id: String,
    pub color_variant_id: Option<String>,
    pub size_variant_id: Option<String>,
    pub counted_quantity: i64,
    pub history_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct StocktakeConfirmBody {
    pub product_id: String,
    pub color_variant_id: Option<String>,
    pub size_variant_id: Option<String>,
    pub counted_quantity: i64,
    /// Quantity the operator saw at preview time; the commit conflicts if
    /// the node moved since.
    pub recorded_quantity: i64,
    pub reason: String,
    pub note: Option<String>,
    pub actor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MovementsQuery {
    pub limit: Option<usize>,
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn parse_product_id(s: &str) -> Result<ProductId, axum::response::Response> {
    s.parse().map_err(|_| {
        errors::json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "invalid_id",
            "invalid product id",
        )
    })
}

pub fn parse_color_id(s: &str) -> Result<ColorVariantId, axum::response::Response> {
    s.parse().map_err(|_| {
        errors::json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "invalid_id",
            "invalid color variant id",
        )
    })
}

pub fn parse_size_id(s: &str) -> Result<SizeVariantId, axum::response::Response> {
    s.parse().map_err(|_| {
        errors::json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "invalid_id",
            "invalid size variant id",
        )
    })
}

fn parse_optional_color(
    id: &Option<String>,
) -> Result<Option<ColorVariantId>, axum::response::Response> {
    id.as_deref().map(parse_color_id).transpose()
}

fn parse_optional_size(
    id: &Option<String>,
) -> Result<Option<SizeVariantId>, axum::response::Response> {
    id.as_deref().map(parse_size_id).transpose()
}

pub fn parse_reason(s: &str) -> Result<ReasonCode, axum::response::Response> {
    s.parse().map_err(|_| {
        errors::json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "invalid_reason",
            format!(
                "reason must be one of: {}",
                ReasonCode::ALL
                    .iter()
                    .map(|r| r.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        )
    })
}

impl MutationBody {
    pub fn into_request(self) -> Result<MutationRequest, axum::response::Response> {
        Ok(MutationRequest {
            product_id: parse_product_id(&self.product_id)?,
            color_variant_id: parse_optional_color(&self.color_variant_id)?,
            size_variant_id: parse_optional_size(&self.size_variant_id)?,
            new_quantity: self.new_quantity,
            reason: parse_reason(&self.reason)?,
            note: self.note,
            actor: self.actor,
        })
    }
}

impl StocktakePreviewBody {
    pub fn into_request(self) -> Result<StocktakeRequest, axum::response::Response> {
        Ok(StocktakeRequest {
            product_id: parse_product_id(&self.product_id)?,
            color_variant_id: parse_optional_color(&self.color_variant_id)?,
            size_variant_id: parse_optional_size(&self.size_variant_id)?,
            counted_quantity: self.counted_quantity,
            // Previews plan the target without committing, so the eventual
            // classification is irrelevant here.
            reason: ReasonCode::Stocktake,
            history_limit: self.history_limit,
            note: None,
            actor: None,
        })
    }
}

impl StocktakeConfirmBody {
    pub fn into_parts(self) -> Result<(StocktakeRequest, i64), axum::response::Response> {
        let request = StocktakeRequest {
            product_id: parse_product_id(&self.product_id)?,
            color_variant_id: parse_optional_color(&self.color_variant_id)?,
            size_variant_id: parse_optional_size(&self.size_variant_id)?,
            counted_quantity: self.counted_quantity,
            reason: parse_reason(&self.reason)?,
            history_limit: None,
            note: self.note,
            actor: self.actor,
        };
        Ok((request, self.recorded_quantity))
    }
}

// -------------------------
// Response JSON
// -------------------------

pub fn movement_to_json(movement: &StockMovement) -> serde_json::Value {
    json!({
        "id": movement.id.to_string(),
        "node": movement.node,
        "previous_quantity": movement.previous_quantity,
        "new_quantity": movement.new_quantity,
        "quantity_delta": movement.quantity_delta,
        "reason": movement.reason.as_str(),
        "note": movement.note,
        "actor": movement.actor,
        "recorded_at": movement.recorded_at.to_rfc3339(),
    })
}

pub fn report_to_json(report: &MutationReport) -> serde_json::Value {
    json!({
        "movement": movement_to_json(&report.movement),
        "new_quantity": report.new_quantity,
        "product_quantity": report.product_quantity,
    })
}

pub fn preview_to_json(preview: &StocktakePreview) -> serde_json::Value {
    json!({
        "node": preview.node,
        "recorded_quantity": preview.recorded_quantity,
        "counted_quantity": preview.counted_quantity,
        "discrepancy": preview.discrepancy,
        "recent_movements": preview
            .recent_movements
            .iter()
            .map(movement_to_json)
            .collect::<Vec<_>>(),
    })
}

pub fn item_to_json(item: &StockItemView) -> serde_json::Value {
    serde_json::to_value(item).unwrap_or_else(|_| json!({}))
}

pub fn page_to_json(page: &Page<StockItemView>, stats: &InventoryStats) -> serde_json::Value {
    json!({
        "items": page.items.iter().map(item_to_json).collect::<Vec<_>>(),
        "page": page.page,
        "page_size": page.page_size,
        "total_items": page.total_items,
        "stats": {
            "total_value_cents": stats.total_value_cents,
            "low_stock_count": stats.low_stock_count,
            "out_of_stock_count": stats.out_of_stock_count,
        },
    })
}
