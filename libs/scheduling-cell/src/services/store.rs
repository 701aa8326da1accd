use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};

use crate::models::{
    Appointment, AppointmentBlock, AppointmentStatus, ClinicSettings, SchedulingError,
    UpdateSettingsRequest,
};

/// Timestamps in PostgREST query strings. Plain UTC wall-clock form, no
/// offset suffix (a `+` would be eaten by URL decoding).
fn ts(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn write_conflict(e: DbError, conflict: SchedulingError) -> SchedulingError {
    if e.is_conflict() {
        conflict
    } else {
        e.into()
    }
}

/// Persistence for appointments, blocks and working-hours settings.
///
/// Read paths pre-filter on the database side where the columns allow it
/// and finish overlap math in memory (appointment end times are derived
/// from duration). Writes rely on the database constraints as the final
/// word: a 409 on insert/patch is mapped back onto the conflict taxonomy.
pub struct CalendarStore {
    db: SupabaseClient,
}

impl CalendarStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: SupabaseClient::new(config),
        }
    }

    // ----- appointments -------------------------------------------------

    /// Every active appointment of one calendar owner that starts inside
    /// `[from, to)`, regardless of status. Completed, no-show and confirmed
    /// rows stay active and still occupy their slot, so the conflict check
    /// must see them. Appointments never cross midnight, so a start-time
    /// window is enough to catch every possible overlap.
    pub async fn active_in_range(
        &self,
        owner: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?user_id=eq.{}&is_active=eq.true&start_time=gte.{}&start_time=lt.{}&order=start_time.asc",
            owner,
            ts(from),
            ts(to)
        );

        let rows: Vec<Appointment> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;
        Ok(rows)
    }

    /// Active `scheduled` appointments that start inside `[from, to)`.
    /// This is the busy set the availability sweep uses.
    pub async fn scheduled_in_range(
        &self,
        owner: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?user_id=eq.{}&is_active=eq.true&status=eq.scheduled&start_time=gte.{}&start_time=lt.{}&order=start_time.asc",
            owner,
            ts(from),
            ts(to)
        );

        let rows: Vec<Appointment> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;
        Ok(rows)
    }

    /// Active future `scheduled` appointments a patient holds on a calendar,
    /// minus an optional appointment being edited.
    pub async fn patient_future_scheduled(
        &self,
        owner: Uuid,
        patient_id: Uuid,
        now: DateTime<Utc>,
        exclude: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut path = format!(
            "/rest/v1/appointments?user_id=eq.{}&patient_id=eq.{}&is_active=eq.true&status=eq.scheduled&start_time=gte.{}",
            owner,
            patient_id,
            ts(now)
        );
        if let Some(id) = exclude {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let rows: Vec<Appointment> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;
        Ok(rows)
    }

    /// One active appointment by id, scoped to a calendar owner unless the
    /// caller may see every calendar.
    pub async fn get_active_appointment(
        &self,
        id: Uuid,
        owner: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let mut path = format!("/rest/v1/appointments?id=eq.{}&is_active=eq.true", id);
        if let Some(owner) = owner {
            path.push_str(&format!("&user_id=eq.{}", owner));
        }

        let rows: Vec<Appointment> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| SchedulingError::NotFound("appointment not found".to_string()))
    }

    /// Appointment listing with the caller's query filters applied
    /// database-side. Filtering on `cancelled` also surfaces soft-deleted
    /// rows, since cancellation is the transition that deactivates.
    pub async fn list_appointments(
        &self,
        owner: Option<Uuid>,
        status: Option<AppointmentStatus>,
        patient_id: Option<Uuid>,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut parts: Vec<String> = Vec::new();

        if let Some(owner) = owner {
            parts.push(format!("user_id=eq.{}", owner));
        }
        match status {
            Some(status) => {
                parts.push(format!("status=eq.{}", status));
                if status != AppointmentStatus::Cancelled {
                    parts.push("is_active=eq.true".to_string());
                }
            }
            None => parts.push("is_active=eq.true".to_string()),
        }
        if let Some(patient_id) = patient_id {
            parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(from) = date_from {
            parts.push(format!(
                "start_time=gte.{}",
                ts(from.and_time(NaiveTime::MIN).and_utc())
            ));
        }
        if let Some(to) = date_to {
            let next_day = to + Duration::days(1);
            parts.push(format!(
                "start_time=lt.{}",
                ts(next_day.and_time(NaiveTime::MIN).and_utc())
            ));
        }
        parts.push("order=start_time.asc".to_string());

        let path = format!("/rest/v1/appointments?{}", parts.join("&"));
        let rows: Vec<Appointment> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;
        Ok(rows)
    }

    pub async fn insert_appointment(
        &self,
        row: Value,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let created: Vec<Appointment> = self
            .db
            .insert_returning("/rest/v1/appointments", auth_token, row)
            .await
            .map_err(|e| write_conflict(e, SchedulingError::DoubleBooked))?;

        created
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::Database("insert returned no row".to_string()))
    }

    pub async fn patch_appointment(
        &self,
        id: Uuid,
        fields: Value,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Patching appointment {}", id);

        let updated: Vec<Appointment> = self
            .db
            .patch_returning(
                &format!("/rest/v1/appointments?id=eq.{}", id),
                auth_token,
                fields,
            )
            .await
            .map_err(|e| write_conflict(e, SchedulingError::DoubleBooked))?;

        updated
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::NotFound("appointment not found".to_string()))
    }

    // ----- blocks --------------------------------------------------------

    /// Active blocks of an owner overlapping `[from, to)`. Both endpoints
    /// are real columns, so the half-open predicate runs database-side.
    pub async fn blocks_in_range(
        &self,
        owner: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<AppointmentBlock>, SchedulingError> {
        let mut path = format!(
            "/rest/v1/appointment_blocks?user_id=eq.{}&is_active=eq.true&start_time=lt.{}&end_time=gt.{}",
            owner,
            ts(to),
            ts(from)
        );
        if let Some(id) = exclude {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let rows: Vec<AppointmentBlock> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;
        Ok(rows)
    }

    pub async fn list_active_blocks(
        &self,
        owner: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<AppointmentBlock>, SchedulingError> {
        let mut path = "/rest/v1/appointment_blocks?is_active=eq.true".to_string();
        if let Some(owner) = owner {
            path.push_str(&format!("&user_id=eq.{}", owner));
        }
        path.push_str("&order=start_time.asc");

        let rows: Vec<AppointmentBlock> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;
        Ok(rows)
    }

    pub async fn get_active_block(
        &self,
        id: Uuid,
        owner: Option<Uuid>,
        auth_token: &str,
    ) -> Result<AppointmentBlock, SchedulingError> {
        let mut path = format!("/rest/v1/appointment_blocks?id=eq.{}&is_active=eq.true", id);
        if let Some(owner) = owner {
            path.push_str(&format!("&user_id=eq.{}", owner));
        }

        let rows: Vec<AppointmentBlock> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| SchedulingError::NotFound("appointment block not found".to_string()))
    }

    pub async fn insert_block(
        &self,
        row: Value,
        auth_token: &str,
    ) -> Result<AppointmentBlock, SchedulingError> {
        let created: Vec<AppointmentBlock> = self
            .db
            .insert_returning("/rest/v1/appointment_blocks", auth_token, row)
            .await
            .map_err(|e| write_conflict(e, SchedulingError::BlockOverlap))?;

        created
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::Database("insert returned no row".to_string()))
    }

    pub async fn patch_block(
        &self,
        id: Uuid,
        fields: Value,
        auth_token: &str,
    ) -> Result<AppointmentBlock, SchedulingError> {
        let updated: Vec<AppointmentBlock> = self
            .db
            .patch_returning(
                &format!("/rest/v1/appointment_blocks?id=eq.{}", id),
                auth_token,
                fields,
            )
            .await
            .map_err(|e| write_conflict(e, SchedulingError::BlockOverlap))?;

        updated
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::NotFound("appointment block not found".to_string()))
    }

    // ----- clinic settings -------------------------------------------------

    /// Working-hours record for one calendar owner, created with defaults
    /// (09:00-21:00, all days) on first read.
    pub async fn get_settings(
        &self,
        owner: Uuid,
        auth_token: &str,
    ) -> Result<ClinicSettings, SchedulingError> {
        let path = format!("/rest/v1/clinic_settings?user_id=eq.{}&limit=1", owner);
        let rows: Vec<ClinicSettings> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        if let Some(settings) = rows.into_iter().next() {
            return Ok(settings);
        }

        debug!("No clinic settings for {}, creating defaults", owner);

        let created: Vec<ClinicSettings> = self
            .db
            .insert_returning(
                "/rest/v1/clinic_settings",
                auth_token,
                json!({
                    "user_id": owner,
                    "start_time": "09:00:00",
                    "end_time": "21:00:00",
                    "mon": true,
                    "tue": true,
                    "wed": true,
                    "thu": true,
                    "fri": true,
                    "sat": true,
                    "sun": true,
                }),
            )
            .await?;

        created
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::Database("insert returned no row".to_string()))
    }

    /// Full-record settings write. All fields land at once so the record is
    /// never torn between old and new hours.
    pub async fn update_settings(
        &self,
        owner: Uuid,
        update: &UpdateSettingsRequest,
        auth_token: &str,
    ) -> Result<ClinicSettings, SchedulingError> {
        // Ensure the row exists first so the PATCH has something to match.
        let current = self.get_settings(owner, auth_token).await?;

        let updated: Vec<ClinicSettings> = self
            .db
            .patch_returning(
                &format!("/rest/v1/clinic_settings?id=eq.{}", current.id),
                auth_token,
                serde_json::to_value(update)
                    .map_err(|e| SchedulingError::Database(e.to_string()))?,
            )
            .await?;

        updated
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::NotFound("clinic settings not found".to_string()))
    }
}
