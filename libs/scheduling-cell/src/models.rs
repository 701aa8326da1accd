use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

use crate::schedule::TimeRange;

// ==============================================================================
// CORE SCHEDULING MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    /// Calendar owner (the practitioner, or whoever the request resolved to).
    pub user_id: Uuid,
    pub patient_id: Uuid,
    #[serde(with = "utc_instant")]
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    pub is_active: bool,
    #[serde(default, with = "utc_instant_opt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "utc_instant_opt")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub updated_by: Option<Uuid>,
}

impl Appointment {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(self.duration_minutes as i64)
    }

    /// The half-open interval this appointment occupies.
    pub fn interval(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time())
    }

    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.start_time < now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    /// Present in the schema but unreachable: no transition enters or
    /// leaves it. Kept representable so existing rows still deserialize.
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Cancelled
                | AppointmentStatus::Completed
                | AppointmentStatus::NoShow
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    /// Lenient parser for query-string filters. Accepts the `no-show` and
    /// `noshow` spellings clients have historically sent.
    pub fn parse_filter(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "scheduled" => Some(AppointmentStatus::Scheduled),
            "confirmed" => Some(AppointmentStatus::Confirmed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            "completed" => Some(AppointmentStatus::Completed),
            "no_show" | "no-show" | "noshow" => Some(AppointmentStatus::NoShow),
            _ => None,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Administrator/practitioner-declared closed interval, independent of
/// appointments. Never validated against working hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentBlock {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "utc_instant")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "utc_instant")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
    pub is_active: bool,
    #[serde(default, with = "utc_instant_opt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "utc_instant_opt")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub updated_by: Option<Uuid>,
}

impl AppointmentBlock {
    pub fn interval(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }
}

/// Weekly recurring open-hours policy, one record per calendar owner
/// (defaulted lazily on first read).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicSettings {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub mon: bool,
    pub tue: bool,
    pub wed: bool,
    pub thu: bool,
    pub fri: bool,
    pub sat: bool,
    pub sun: bool,
}

impl ClinicSettings {
    pub fn is_day_enabled(&self, weekday: Weekday) -> bool {
        match weekday {
            Weekday::Mon => self.mon,
            Weekday::Tue => self.tue,
            Weekday::Wed => self.wed,
            Weekday::Thu => self.thu,
            Weekday::Fri => self.fri,
            Weekday::Sat => self.sat,
            Weekday::Sun => self.sun,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    #[serde(with = "utc_instant")]
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update: only fields present in the payload are applied.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAppointmentRequest {
    #[serde(default, with = "utc_instant_opt")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Terminal statuses are rejected here; they have dedicated operations.
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBlockRequest {
    #[serde(with = "utc_instant")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "utc_instant")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateBlockRequest {
    #[serde(default, with = "utc_instant_opt")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, with = "utc_instant_opt")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Full-record settings update (all fields at once, no torn partial state).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSettingsRequest {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub mon: bool,
    pub tue: bool,
    pub wed: bool,
    pub thu: bool,
    pub fri: bool,
    pub sat: bool,
    pub sun: bool,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<String>,
    pub patient_id: Option<Uuid>,
    /// YYYY-MM-DD
    pub date_from: Option<String>,
    /// YYYY-MM-DD
    pub date_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// YYYY-MM-DD
    pub date_from: String,
    /// YYYY-MM-DD
    pub date_to: String,
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: i32,
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: i32,
}

fn default_slot_minutes() -> i32 {
    30
}

fn default_duration_minutes() -> i32 {
    60
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentResponse {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub user_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub patient_name: Option<String>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

impl AppointmentResponse {
    pub fn from_appointment(appt: Appointment, patient_name: Option<String>) -> Self {
        Self {
            id: appt.id,
            patient_id: appt.patient_id,
            user_id: appt.user_id,
            start_time: appt.start_time,
            duration_minutes: appt.duration_minutes,
            status: appt.status,
            notes: appt.notes,
            patient_name,
            is_active: appt.is_active,
            created_at: appt.created_at,
            updated_at: appt.updated_at,
            created_by: appt.created_by,
            updated_by: appt.updated_by,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DaysEnabled {
    pub mon: bool,
    pub tue: bool,
    pub wed: bool,
    pub thu: bool,
    pub fri: bool,
    pub sat: bool,
    pub sun: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkingHoursSummary {
    pub start_time: String,
    pub end_time: String,
    pub days_enabled: DaysEnabled,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    /// Free start times as %H:%M, in ascending order.
    pub slots: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityResponse {
    pub calendar_user_id: Uuid,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub slot_minutes: i32,
    pub duration_minutes: i32,
    pub working_hours: WorkingHoursSummary,
    pub days: Vec<DayAvailability>,
}

// ==============================================================================
// ERROR TAXONOMY
// ==============================================================================

/// Request-rejection errors of the scheduling engine. Guards short-circuit:
/// the first failing guard wins, nothing is aggregated or retried.
#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("appointment cannot be in the past")]
    PastTime,

    #[error("duration_minutes must be greater than 0")]
    InvalidDuration,

    #[error("that day is not enabled for appointments")]
    DayDisabled,

    #[error("appointment cannot cross into the next day")]
    SpansMidnight,

    #[error("appointment must fit within working hours ({open}-{close})")]
    OutsideWorkingHours { open: NaiveTime, close: NaiveTime },

    #[error("that time range is blocked")]
    BlockedTime,

    #[error("an appointment already exists in that time range")]
    DoubleBooked,

    #[error("patient already has a scheduled appointment (#{appointment_id} at {start_time})")]
    PatientDoubleBooked {
        appointment_id: Uuid,
        start_time: DateTime<Utc>,
    },

    #[error("a block overlapping that time range already exists")]
    BlockOverlap,

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    RoleForbidden(String),

    #[error("{0}")]
    StateConflict(String),

    #[error("{0}")]
    NotFound(String),

    /// No active practitioner record exists to delegate to. A deployment
    /// fault, not a user error.
    #[error("no active user with role 'psychologist' exists")]
    MissingOwner,

    #[error("database error: {0}")]
    Database(String),
}

impl From<shared_database::DbError> for SchedulingError {
    fn from(e: shared_database::DbError) -> Self {
        SchedulingError::Database(e.to_string())
    }
}

impl From<patient_cell::DirectoryError> for SchedulingError {
    fn from(e: patient_cell::DirectoryError) -> Self {
        match e {
            patient_cell::DirectoryError::MissingOwner => SchedulingError::MissingOwner,
            patient_cell::DirectoryError::NotFound(msg) => SchedulingError::NotFound(msg),
            patient_cell::DirectoryError::Database(msg) => SchedulingError::Database(msg),
        }
    }
}

impl From<SchedulingError> for AppError {
    fn from(e: SchedulingError) -> Self {
        match e {
            SchedulingError::BlockedTime
            | SchedulingError::DoubleBooked
            | SchedulingError::PatientDoubleBooked { .. }
            | SchedulingError::BlockOverlap => AppError::Conflict(e.to_string()),
            SchedulingError::RoleForbidden(msg) => AppError::Forbidden(msg),
            SchedulingError::NotFound(msg) => AppError::NotFound(msg),
            SchedulingError::MissingOwner => AppError::Internal(e.to_string()),
            SchedulingError::Database(msg) => AppError::Database(msg),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

// ==============================================================================
// TIMESTAMP (DE)SERIALIZATION
// ==============================================================================

/// UTC instants on the wire. Inputs carrying an offset are converted to
/// UTC; inputs without one are treated as already-UTC (never rejected,
/// never auto-localized).
pub mod utc_instant {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", s)))
    }
}

pub mod utc_instant_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match dt {
            Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        match s {
            None => Ok(None),
            Some(s) => super::utc_instant::parse(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn naive_timestamps_are_treated_as_utc() {
        let parsed = utc_instant::parse("2026-09-07T10:30:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 9, 7, 10, 30, 0).unwrap());
    }

    #[test]
    fn offset_timestamps_are_normalized_to_utc() {
        let parsed = utc_instant::parse("2026-09-07T10:30:00-05:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 9, 7, 15, 30, 0).unwrap());
    }

    #[test]
    fn status_filter_accepts_no_show_spellings() {
        for spelling in ["no_show", "no-show", "noshow", "NO-SHOW"] {
            assert_eq!(
                AppointmentStatus::parse_filter(spelling),
                Some(AppointmentStatus::NoShow)
            );
        }
        assert_eq!(AppointmentStatus::parse_filter("rescheduled"), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(AppointmentStatus::Cancelled.is_terminal());
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(AppointmentStatus::NoShow.is_terminal());
        assert!(!AppointmentStatus::Scheduled.is_terminal());
        assert!(!AppointmentStatus::Confirmed.is_terminal());
    }
}
