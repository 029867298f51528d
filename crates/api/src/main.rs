#[tokio::main]
async fn main() {
    stocktide_observability::init();

    let services = std::sync::Arc::new(stocktide_api::app::services::build_services().await);
    let app = stocktide_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
