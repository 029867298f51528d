use axum::Router;

pub mod stock;
pub mod stocktakes;
pub mod system;

/// Router for all stock endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/stock", stock::router().merge(stocktakes::router()))
}
