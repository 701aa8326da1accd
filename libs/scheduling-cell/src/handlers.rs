use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use uuid::Uuid;

use patient_cell::DirectoryService;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentBlock, AppointmentListQuery, AppointmentResponse, AvailabilityQuery,
    AvailabilityResponse, ClinicSettings, CreateAppointmentRequest, CreateBlockRequest,
    UpdateAppointmentRequest, UpdateBlockRequest, UpdateSettingsRequest,
};
use crate::permissions;
use crate::services::{AppointmentService, AvailabilityService, BlockService, SettingsService};

// ----- appointments ----------------------------------------------------------

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<AppointmentResponse>), AppError> {
    let service = AppointmentService::new(&state);
    let created = service.create(&user, request, auth.token()).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Vec<AppointmentResponse>>, AppError> {
    let service = AppointmentService::new(&state);
    let appointments = service.list(&user, &query, auth.token()).await?;

    Ok(Json(appointments))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<AppointmentResponse>, AppError> {
    let service = AppointmentService::new(&state);
    let appointment = service.get(&user, appointment_id, auth.token()).await?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<AppointmentResponse>, AppError> {
    let service = AppointmentService::new(&state);
    let updated = service
        .update(&user, appointment_id, request, auth.token())
        .await?;

    Ok(Json(updated))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<AppointmentResponse>, AppError> {
    let service = AppointmentService::new(&state);
    let cancelled = service.cancel(&user, appointment_id, auth.token()).await?;

    Ok(Json(cancelled))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<AppointmentResponse>, AppError> {
    let service = AppointmentService::new(&state);
    let updated = service
        .mark_no_show(&user, appointment_id, auth.token())
        .await?;

    Ok(Json(updated))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<AppointmentResponse>, AppError> {
    let service = AppointmentService::new(&state);
    let updated = service
        .complete(&user, appointment_id, auth.token())
        .await?;

    Ok(Json(updated))
}

// ----- availability -----------------------------------------------------------

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let directory = DirectoryService::new(&state);
    let owner = directory
        .resolve_calendar_owner(&user, auth.token())
        .await?;

    let service = AvailabilityService::new(&state);
    let availability = service.compute(owner, &query, auth.token()).await?;

    Ok(Json(availability))
}

// ----- blocks -------------------------------------------------------------------

#[axum::debug_handler]
pub async fn create_block(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateBlockRequest>,
) -> Result<(StatusCode, Json<AppointmentBlock>), AppError> {
    let service = BlockService::new(&state);
    let created = service.create(&user, request, auth.token()).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[axum::debug_handler]
pub async fn list_blocks(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<AppointmentBlock>>, AppError> {
    let service = BlockService::new(&state);
    let blocks = service.list(&user, auth.token()).await?;

    Ok(Json(blocks))
}

#[axum::debug_handler]
pub async fn update_block(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(block_id): Path<Uuid>,
    Json(request): Json<UpdateBlockRequest>,
) -> Result<Json<AppointmentBlock>, AppError> {
    let service = BlockService::new(&state);
    let updated = service
        .update(&user, block_id, request, auth.token())
        .await?;

    Ok(Json(updated))
}

#[axum::debug_handler]
pub async fn delete_block(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(block_id): Path<Uuid>,
) -> Result<Json<AppointmentBlock>, AppError> {
    let service = BlockService::new(&state);
    let deleted = service.delete(&user, block_id, auth.token()).await?;

    Ok(Json(deleted))
}

// ----- clinic settings -----------------------------------------------------------

#[axum::debug_handler]
pub async fn get_clinic_settings(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<ClinicSettings>, AppError> {
    let directory = DirectoryService::new(&state);
    let owner = directory
        .resolve_calendar_owner(&user, auth.token())
        .await?;

    let service = SettingsService::new(&state);
    let settings = service.get(owner, auth.token()).await?;

    Ok(Json(settings))
}

#[axum::debug_handler]
pub async fn update_clinic_settings(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateSettingsRequest>,
) -> Result<Json<ClinicSettings>, AppError> {
    permissions::authorize_settings_update(user.role)?;

    let directory = DirectoryService::new(&state);
    let owner = directory
        .resolve_calendar_owner(&user, auth.token())
        .await?;

    let service = SettingsService::new(&state);
    let settings = service.update(owner, request, auth.token()).await?;

    Ok(Json(settings))
}
