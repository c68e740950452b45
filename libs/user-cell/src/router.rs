use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_utils::{auth_middleware, AppState};

use crate::handlers::*;

pub fn user_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(get_profile).put(update_profile))
        .route("/doctors", get(list_doctors))
        .layer(middleware::from_fn_with_state(state.codec.clone(), auth_middleware))
        .with_state(state)
}
