use chrono::{DateTime, NaiveTime, Utc};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::SchedulingError;
use crate::schedule::{self, TimeRange};
use crate::services::store::CalendarStore;

/// Pre-write validation of candidate appointments and blocks.
///
/// Guards run in a fixed order and the first failure wins: temporal
/// plausibility, working-hours containment, blocked time, then sibling
/// appointments. This is the fast path; the database exclusion constraint
/// remains authoritative at commit time.
pub struct ConflictChecker {
    store: CalendarStore,
}

impl ConflictChecker {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: CalendarStore::new(config),
        }
    }

    /// Validate a candidate `[start, start+duration)` on an owner's
    /// calendar. `exclude` skips the appointment being rescheduled;
    /// `require_future` is dropped when editing fields of an appointment
    /// whose start time is left untouched.
    pub async fn validate_candidate(
        &self,
        owner: Uuid,
        start: DateTime<Utc>,
        duration_minutes: i32,
        exclude: Option<Uuid>,
        require_future: bool,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        let now = Utc::now();

        if require_future {
            schedule::validate_not_past(start, now)?;
        }

        let settings = self.store.get_settings(owner, auth_token).await?;
        schedule::validate_working_hours(&settings, start, duration_minutes)?;

        let candidate = TimeRange::from_start(start, duration_minutes);

        let blocks = self
            .store
            .blocks_in_range(owner, candidate.start, candidate.end, None, auth_token)
            .await?;
        if !blocks.is_empty() {
            debug!("Candidate {:?} hits {} block(s)", candidate, blocks.len());
            return Err(SchedulingError::BlockedTime);
        }

        // Appointments never cross midnight, so scanning from the day's
        // start catches every row that could reach into the candidate.
        // Every active row counts, whatever its status: a completed or
        // no-show session still occupied its slot.
        let day_start = start.date_naive().and_time(NaiveTime::MIN).and_utc();
        let appointments = self
            .store
            .active_in_range(owner, day_start, candidate.end, auth_token)
            .await?;

        let clash = appointments
            .iter()
            .filter(|a| Some(a.id) != exclude)
            .any(|a| a.interval().overlaps(&candidate));
        if clash {
            return Err(SchedulingError::DoubleBooked);
        }

        Ok(())
    }

    /// A patient may hold at most one open future appointment per calendar.
    pub async fn validate_patient_not_double_booked(
        &self,
        owner: Uuid,
        patient_id: Uuid,
        exclude: Option<Uuid>,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        let existing = self
            .store
            .patient_future_scheduled(owner, patient_id, Utc::now(), exclude, auth_token)
            .await?;

        if let Some(appt) = existing.into_iter().next() {
            return Err(SchedulingError::PatientDoubleBooked {
                appointment_id: appt.id,
                start_time: appt.start_time,
            });
        }

        Ok(())
    }

    /// Validate a candidate block range against its siblings. Blocks are
    /// deliberately not checked against working hours or appointments.
    pub async fn validate_block_candidate(
        &self,
        owner: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        if end <= start {
            return Err(SchedulingError::Validation(
                "end_time must be after start_time".to_string(),
            ));
        }

        let siblings = self
            .store
            .blocks_in_range(owner, start, end, exclude, auth_token)
            .await?;
        if !siblings.is_empty() {
            return Err(SchedulingError::BlockOverlap);
        }

        Ok(())
    }
}
