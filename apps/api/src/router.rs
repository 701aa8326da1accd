use std::sync::Arc;

use axum::{routing::get, Router};

use patient_cell::router::patient_routes;
use scheduling_cell::router::{appointment_routes, clinic_settings_routes};
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Practice Scheduler API is running!" }))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/clinic-settings", clinic_settings_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
}
