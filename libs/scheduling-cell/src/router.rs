use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::create_appointment))
        .route("/", get(handlers::list_appointments))
        .route("/availability", get(handlers::get_availability))
        .route("/blocks", post(handlers::create_block))
        .route("/blocks", get(handlers::list_blocks))
        .route("/blocks/{block_id}", put(handlers::update_block))
        .route("/blocks/{block_id}", delete(handlers::delete_block))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}", put(handlers::update_appointment))
        .route("/{appointment_id}", delete(handlers::cancel_appointment))
        .route("/{appointment_id}/no-show", put(handlers::mark_no_show))
        .route("/{appointment_id}/complete", put(handlers::complete_appointment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}

pub fn clinic_settings_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::get_clinic_settings))
        .route("/", put(handlers::update_clinic_settings))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
