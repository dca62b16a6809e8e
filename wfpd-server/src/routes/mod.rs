//! Router assembly.

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

// WFP uploads for large codebases run to tens of megabytes.
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

use crate::handlers::{engine_handlers, scan_handlers, status_handlers};
use crate::infra::app_state::AppState;
use crate::middleware::{ip_filter, request_id};

/// Create the full API router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(status_handlers::welcome))
        .route("/api/", get(status_handlers::welcome))
        .route("/api/health", get(status_handlers::health_check))
        .route("/api/health-check", get(status_handlers::health_check))
        .route("/api/metrics/{type}", get(status_handlers::metrics))
        .route("/api/scan/direct", post(scan_handlers::scan_direct))
        .route("/api/scan/batch", post(scan_handlers::scan_batch))
        .route(
            "/api/file_contents/{md5}",
            get(engine_handlers::file_contents),
        )
        .route(
            "/api/sbom/attribution",
            post(engine_handlers::sbom_attribution),
        )
        .route(
            "/api/license/obligations/{license}",
            get(engine_handlers::license_obligations),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn(request_id::propagate_request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    if state.config.filtering.is_active() {
        let filter = Arc::new(ip_filter::IpFilter::from_config(&state.config.filtering));
        router = router.layer(middleware::from_fn_with_state(
            filter,
            ip_filter::filter_requests,
        ));
    }
    router
}
