use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{admin, search};
use crate::state::AppState;

/// Main application router: search/ask/compare plus the admin surface,
/// behind CORS and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state);

    Router::new()
        .route("/health", get(admin::health))
        .route("/api/search", post(search::search))
        .route("/api/ask", post(search::ask))
        .route("/api/compare", post(search::compare))
        .route("/api/entity/:entity_id", get(search::get_entity_by_id))
        .route(
            "/api/entities/country/:country_code",
            get(search::get_entities_by_country),
        )
        .route(
            "/api/entities/type/:entity_type",
            get(search::get_entities_by_type),
        )
        .route("/api/similar/:entity_id", get(search::get_similar_entities))
        .route("/api/admin/stats", get(admin::get_stats))
        .route("/api/admin/scheduler/status", get(admin::scheduler_status))
        .route("/api/admin/scheduler/start", post(admin::start_scheduler))
        .route("/api/admin/scheduler/stop", post(admin::stop_scheduler))
        .route("/api/admin/collection/status", get(admin::collection_status))
        .route("/api/admin/collection/run", post(admin::run_collection))
        .route(
            "/api/admin/collection/update/:source_id",
            post(admin::update_source),
        )
        .route("/api/admin/collection/reset", delete(admin::reset_collection))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

fn build_cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .settings
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
