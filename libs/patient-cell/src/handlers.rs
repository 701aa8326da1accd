use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::Patient;
use crate::services::DirectoryService;

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Patient>, AppError> {
    let directory = DirectoryService::new(&state);
    let patient = directory
        .accessible_patient(&user, patient_id, auth.token())
        .await?;

    Ok(Json(patient))
}

/// Soft-delete a patient. Cascades to force-cancel their active
/// appointments and deactivate their notes.
#[axum::debug_handler]
pub async fn delete_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let directory = DirectoryService::new(&state);
    directory
        .deactivate_patient_cascade(&user, patient_id, auth.token())
        .await?;

    Ok(Json(json!({
        "message": "Patient and related records deactivated"
    })))
}
