use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{
    AvailabilityQuery, AvailabilityResponse, DayAvailability, DaysEnabled, SchedulingError,
    WorkingHoursSummary,
};
use crate::schedule::{self, TimeRange};
use crate::services::store::CalendarStore;

fn parse_date(s: &str) -> Result<NaiveDate, SchedulingError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| SchedulingError::InvalidRange(format!("invalid date: {}", s)))
}

/// Free-slot computation over a date range for one calendar owner.
pub struct AvailabilityService {
    store: CalendarStore,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: CalendarStore::new(config),
        }
    }

    pub async fn compute(
        &self,
        owner: Uuid,
        query: &AvailabilityQuery,
        auth_token: &str,
    ) -> Result<AvailabilityResponse, SchedulingError> {
        let date_from = parse_date(&query.date_from)?;
        let date_to = parse_date(&query.date_to)?;

        if date_to < date_from {
            return Err(SchedulingError::InvalidRange(
                "date_to must not be before date_from".to_string(),
            ));
        }
        if query.slot_minutes <= 0 {
            return Err(SchedulingError::InvalidRange(
                "slot_minutes must be greater than 0".to_string(),
            ));
        }
        if query.duration_minutes <= 0 {
            return Err(SchedulingError::InvalidRange(
                "duration_minutes must be greater than 0".to_string(),
            ));
        }

        let settings = self.store.get_settings(owner, auth_token).await?;

        let range_start = date_from.and_time(NaiveTime::MIN).and_utc();
        let range_end = (date_to + Duration::days(1)).and_time(NaiveTime::MIN).and_utc();

        let appointments = self
            .store
            .scheduled_in_range(owner, range_start, range_end, auth_token)
            .await?;
        let blocks = self
            .store
            .blocks_in_range(owner, range_start, range_end, None, auth_token)
            .await?;

        debug!(
            "Availability sweep for {}: {} appointment(s), {} block(s)",
            owner,
            appointments.len(),
            blocks.len()
        );

        let busy: Vec<TimeRange> = appointments
            .iter()
            .map(|a| a.interval())
            .chain(blocks.iter().map(|b| b.interval()))
            .collect();

        let now = Utc::now();
        let mut days = Vec::new();
        let mut day = date_from;
        while day <= date_to {
            let slots = schedule::day_slots(
                &settings,
                day,
                query.slot_minutes,
                query.duration_minutes,
                now,
                &busy,
            );
            days.push(DayAvailability {
                date: day,
                slots: slots
                    .iter()
                    .map(|t| t.format("%H:%M").to_string())
                    .collect(),
            });
            day += Duration::days(1);
        }

        Ok(AvailabilityResponse {
            calendar_user_id: owner,
            date_from,
            date_to,
            slot_minutes: query.slot_minutes,
            duration_minutes: query.duration_minutes,
            working_hours: WorkingHoursSummary {
                start_time: settings.start_time.format("%H:%M").to_string(),
                end_time: settings.end_time.format("%H:%M").to_string(),
                days_enabled: DaysEnabled {
                    mon: settings.mon,
                    tue: settings.tue,
                    wed: settings.wed,
                    thu: settings.thu,
                    fri: settings.fri,
                    sat: settings.sat,
                    sun: settings.sun,
                },
            },
            days,
        })
    }
}
