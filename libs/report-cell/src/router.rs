use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::{auth_middleware, role_guard, AppState, RoleGuard};

use crate::handlers;

/// Room for the multipart framing around a file at the configured limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn report_routes(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route(
            "/upload",
            post(handlers::upload_report)
                .layer::<_, Infallible>(middleware::from_fn_with_state(
                    RoleGuard::patient("upload report"),
                    role_guard,
                ))
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/{appointment_id}", get(handlers::list_reports))
        .layer(middleware::from_fn_with_state(state.codec.clone(), auth_middleware))
        .with_state(state)
}
