use axum::{
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use common::{metrics::encode_metrics, types::Health};

use crate::state::AppState;

pub mod access;
pub mod entities;
pub mod hierarchy;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn metrics() -> (axum::http::StatusCode, String) {
    encode_metrics()
}

/// Build the full application router: health/metrics plus the catalog API.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics));

    let reads = Router::new()
        .route("/api/hierarchy", get(hierarchy::full_tree))
        .route("/api/hierarchy/:type/:id", get(hierarchy::sub_tree))
        .route("/api/hierarchy/:type/:id/parents", get(hierarchy::parents))
        .route("/api/hierarchy/:type/:id/children", get(hierarchy::children))
        .route("/api/entities/:type", get(entities::search))
        .route("/api/entities/:type/:id", get(entities::fetch))
        .route_layer(middleware::from_fn_with_state(state.clone(), access::resolve_access));

    let writes = Router::new()
        .route("/api/entities/:type", post(entities::create))
        .route("/api/entities/:type/batch", post(entities::batch))
        .route("/api/entities/:type/:id", put(entities::update).delete(entities::remove))
        .route_layer(middleware::from_fn_with_state(state.clone(), access::require_admin));

    public
        .merge(reads)
        .merge(writes)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                // 5xx at ERROR
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
