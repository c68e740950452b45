use std::sync::Arc;

use axum::{
    handler::Handler,
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::{auth_middleware, role_guard, AppState, RoleGuard};

use crate::handlers;

const CREATE_GUARD: RoleGuard = RoleGuard::patient("create appointment");
const UPDATE_GUARD: RoleGuard = RoleGuard::doctor("update appointment");

pub fn appointment_routes(state: Arc<AppState>) -> Router {
    // `/{segment}` is a role name for GET and an appointment id for PUT; axum
    // allows only one parameter name per position.
    Router::new()
        .route(
            "/",
            post(handlers::book_appointment)
                .layer(middleware::from_fn_with_state(CREATE_GUARD, role_guard)),
        )
        .route(
            "/{segment}",
            get(handlers::list_appointments).put(
                handlers::update_appointment
                    .layer(middleware::from_fn_with_state(UPDATE_GUARD, role_guard)),
            ),
        )
        .layer(middleware::from_fn_with_state(state.codec.clone(), auth_middleware))
        .with_state(state)
}
