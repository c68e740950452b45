use std::sync::Arc;

use axum::{routing::get, Router};
use tower::Layer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::Level;

use appointment_cell::appointment_routes;
use auth_cell::auth_routes;
use report_cell::report_routes;
use shared_models::response::ApiResponse;
use shared_utils::AppState;
use user_cell::user_routes;

async fn greeting() -> ApiResponse<Option<()>> {
    ApiResponse::ok("Hello from the clinic API", None)
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .route("/greeting", get(greeting))
        .nest("/v1/auth", auth_routes(state.clone()))
        .nest("/v1/user", user_routes(state.clone()))
        .nest("/v1/appointments", appointment_routes(state.clone()))
        .nest("/v1/reports", report_routes(state))
}

/// The full service: routes plus tracing and CORS, with trailing slashes
/// trimmed before routing so `/v1/user/` and `/v1/user` match alike.
pub fn create_app(state: Arc<AppState>) -> NormalizePath<Router> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    NormalizePathLayer::trim_trailing_slash().layer(router)
}
