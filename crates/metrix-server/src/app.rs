use crate::state::AppState;
use crate::{api, logging};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::predicate::SizeAbove;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;

/// Builds the router. Gzip request bodies are decoded before the handlers
/// run; responses are gzipped whenever the client accepts it.
pub fn build_http_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::list_metrics))
        .route("/ping", get(api::ping))
        .route("/update/", post(api::update_json))
        .route("/updates/", post(api::update_batch))
        .route("/update/{mtype}/{name}/{value}", post(api::update_path))
        .route("/value/", post(api::value_json))
        .route("/value/{mtype}/{name}", get(api::value_path))
        .with_state(state)
        .layer(middleware::from_fn(logging::request_logging))
        .layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new().compress_when(SizeAbove::new(0)))
}
