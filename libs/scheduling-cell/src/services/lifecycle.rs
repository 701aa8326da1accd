use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use patient_cell::DirectoryService;
use shared_config::AppConfig;
use shared_models::auth::{Role, User};

use crate::models::{
    Appointment, AppointmentListQuery, AppointmentResponse, AppointmentStatus,
    CreateAppointmentRequest, SchedulingError, UpdateAppointmentRequest,
};
use crate::permissions::{self, LifecycleAction};
use crate::services::conflict::ConflictChecker;
use crate::services::store::CalendarStore;

fn parse_filter_date(s: &str) -> Result<NaiveDate, SchedulingError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| SchedulingError::InvalidRange(format!("invalid date: {}", s)))
}

/// Appointment lifecycle: create, edit, list, and the terminal transitions.
///
/// Every operation resolves the calendar owner first (assistants delegate
/// to the practitioner), then runs the permission table, then validates
/// the slot before touching storage.
pub struct AppointmentService {
    store: CalendarStore,
    directory: DirectoryService,
    checker: ConflictChecker,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: CalendarStore::new(config),
            directory: DirectoryService::new(config),
            checker: ConflictChecker::new(config),
        }
    }

    /// Admins see every calendar; everyone else is scoped to the calendar
    /// their role resolves to.
    async fn visible_scope(
        &self,
        user: &User,
        auth_token: &str,
    ) -> Result<Option<Uuid>, SchedulingError> {
        match user.role {
            Role::Admin => Ok(None),
            _ => Ok(Some(
                self.directory
                    .resolve_calendar_owner(user, auth_token)
                    .await?,
            )),
        }
    }

    async fn decorate(
        &self,
        appointments: Vec<Appointment>,
        auth_token: &str,
    ) -> Result<Vec<AppointmentResponse>, SchedulingError> {
        let mut ids: Vec<Uuid> = appointments.iter().map(|a| a.patient_id).collect();
        ids.sort();
        ids.dedup();

        let names: HashMap<Uuid, String> =
            self.directory.patient_names(&ids, auth_token).await?;

        Ok(appointments
            .into_iter()
            .map(|a| {
                let name = names.get(&a.patient_id).cloned();
                AppointmentResponse::from_appointment(a, name)
            })
            .collect())
    }

    async fn decorate_one(
        &self,
        appointment: Appointment,
        auth_token: &str,
    ) -> Result<AppointmentResponse, SchedulingError> {
        let names = self
            .directory
            .patient_names(&[appointment.patient_id], auth_token)
            .await?;
        let name = names.get(&appointment.patient_id).cloned();
        Ok(AppointmentResponse::from_appointment(appointment, name))
    }

    pub async fn create(
        &self,
        user: &User,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<AppointmentResponse, SchedulingError> {
        let owner = self
            .directory
            .resolve_calendar_owner(user, auth_token)
            .await?;

        // Also enforces that the caller may book for this patient.
        let patient = self
            .directory
            .accessible_patient(user, request.patient_id, auth_token)
            .await?;

        self.checker
            .validate_candidate(
                owner,
                request.start_time,
                request.duration_minutes,
                None,
                true,
                auth_token,
            )
            .await?;
        self.checker
            .validate_patient_not_double_booked(owner, patient.id, None, auth_token)
            .await?;

        let appointment = self
            .store
            .insert_appointment(
                json!({
                    "user_id": owner,
                    "patient_id": patient.id,
                    "start_time": request.start_time.to_rfc3339(),
                    "duration_minutes": request.duration_minutes,
                    "status": "scheduled",
                    "notes": request.notes,
                    "is_active": true,
                    "created_by": user.id,
                }),
                auth_token,
            )
            .await?;

        info!(
            "Appointment {} created on calendar {} at {}",
            appointment.id, owner, appointment.start_time
        );

        Ok(AppointmentResponse::from_appointment(
            appointment,
            Some(patient.full_name),
        ))
    }

    pub async fn list(
        &self,
        user: &User,
        query: &AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Vec<AppointmentResponse>, SchedulingError> {
        let scope = self.visible_scope(user, auth_token).await?;

        let status = match &query.status {
            Some(raw) => Some(AppointmentStatus::parse_filter(raw).ok_or_else(|| {
                SchedulingError::Validation(format!("unknown status filter: {}", raw))
            })?),
            None => None,
        };
        let date_from = query.date_from.as_deref().map(parse_filter_date).transpose()?;
        let date_to = query.date_to.as_deref().map(parse_filter_date).transpose()?;

        let rows = self
            .store
            .list_appointments(scope, status, query.patient_id, date_from, date_to, auth_token)
            .await?;

        self.decorate(rows, auth_token).await
    }

    pub async fn get(
        &self,
        user: &User,
        id: Uuid,
        auth_token: &str,
    ) -> Result<AppointmentResponse, SchedulingError> {
        let scope = self.visible_scope(user, auth_token).await?;
        let appointment = self
            .store
            .get_active_appointment(id, scope, auth_token)
            .await?;
        self.decorate_one(appointment, auth_token).await
    }

    pub async fn update(
        &self,
        user: &User,
        id: Uuid,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<AppointmentResponse, SchedulingError> {
        let scope = self.visible_scope(user, auth_token).await?;
        let appointment = self
            .store
            .get_active_appointment(id, scope, auth_token)
            .await?;

        let now = Utc::now();
        permissions::authorize_transition(
            user.role,
            LifecycleAction::Edit,
            appointment.status,
            appointment.start_time,
            now,
        )?;

        // Terminal statuses have dedicated operations; the dead `confirmed`
        // state has no entering transition either.
        if let Some(status) = request.status {
            if status != AppointmentStatus::Scheduled {
                return Err(SchedulingError::Validation(format!(
                    "status cannot be set to {} through an edit",
                    status
                )));
            }
        }

        let new_start = request.start_time.unwrap_or(appointment.start_time);
        let new_duration = request
            .duration_minutes
            .unwrap_or(appointment.duration_minutes);

        // The slot is revalidated in full; the past check only applies when
        // the caller is actually moving the appointment.
        self.checker
            .validate_candidate(
                appointment.user_id,
                new_start,
                new_duration,
                Some(appointment.id),
                request.start_time.is_some(),
                auth_token,
            )
            .await?;

        if request.start_time.is_some() {
            self.checker
                .validate_patient_not_double_booked(
                    appointment.user_id,
                    appointment.patient_id,
                    Some(appointment.id),
                    auth_token,
                )
                .await?;
        }

        let mut fields = Map::new();
        if let Some(start) = request.start_time {
            fields.insert("start_time".to_string(), json!(start.to_rfc3339()));
        }
        if let Some(duration) = request.duration_minutes {
            fields.insert("duration_minutes".to_string(), json!(duration));
        }
        if let Some(notes) = request.notes {
            fields.insert("notes".to_string(), json!(notes));
        }
        fields.insert("updated_by".to_string(), json!(user.id));
        fields.insert("updated_at".to_string(), json!(now.to_rfc3339()));

        let updated = self
            .store
            .patch_appointment(appointment.id, Value::Object(fields), auth_token)
            .await?;

        self.decorate_one(updated, auth_token).await
    }

    /// Cancel is the only transition that also soft-deletes the row.
    pub async fn cancel(
        &self,
        user: &User,
        id: Uuid,
        auth_token: &str,
    ) -> Result<AppointmentResponse, SchedulingError> {
        self.transition(user, id, LifecycleAction::Cancel, auth_token)
            .await
    }

    pub async fn mark_no_show(
        &self,
        user: &User,
        id: Uuid,
        auth_token: &str,
    ) -> Result<AppointmentResponse, SchedulingError> {
        self.transition(user, id, LifecycleAction::NoShow, auth_token)
            .await
    }

    pub async fn complete(
        &self,
        user: &User,
        id: Uuid,
        auth_token: &str,
    ) -> Result<AppointmentResponse, SchedulingError> {
        self.transition(user, id, LifecycleAction::Complete, auth_token)
            .await
    }

    async fn transition(
        &self,
        user: &User,
        id: Uuid,
        action: LifecycleAction,
        auth_token: &str,
    ) -> Result<AppointmentResponse, SchedulingError> {
        let scope = self.visible_scope(user, auth_token).await?;
        let appointment = self
            .store
            .get_active_appointment(id, scope, auth_token)
            .await?;

        let now = Utc::now();
        permissions::authorize_transition(
            user.role,
            action,
            appointment.status,
            appointment.start_time,
            now,
        )?;

        let mut fields = Map::new();
        match action {
            LifecycleAction::Cancel => {
                fields.insert("status".to_string(), json!("cancelled"));
                fields.insert("is_active".to_string(), json!(false));
            }
            LifecycleAction::NoShow => {
                fields.insert("status".to_string(), json!("no_show"));
            }
            LifecycleAction::Complete => {
                fields.insert("status".to_string(), json!("completed"));
            }
            LifecycleAction::Edit => {
                return Err(SchedulingError::Validation(
                    "edit is not a status transition".to_string(),
                ));
            }
        }
        fields.insert("updated_by".to_string(), json!(user.id));
        fields.insert("updated_at".to_string(), json!(now.to_rfc3339()));

        let updated = self
            .store
            .patch_appointment(appointment.id, Value::Object(fields), auth_token)
            .await?;

        info!(
            "Appointment {} transitioned to {} by {}",
            updated.id, updated.status, user.id
        );

        self.decorate_one(updated, auth_token).await
    }
}
