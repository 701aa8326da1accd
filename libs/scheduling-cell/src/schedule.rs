//! Pure scheduling math: the half-open interval primitive, working-hours
//! containment and the per-day slot sweep. Everything here is synchronous
//! and side-effect free; the services feed it data from the store.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};

use crate::models::{ClinicSettings, SchedulingError};

/// Half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn from_start(start: DateTime<Utc>, duration_minutes: i32) -> Self {
        Self {
            start,
            end: start + Duration::minutes(duration_minutes as i64),
        }
    }

    /// Strict half-open overlap: a range ending exactly when another starts
    /// does not conflict with it.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Candidate start must not be in the past.
pub fn validate_not_past(start: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), SchedulingError> {
    if start < now {
        return Err(SchedulingError::PastTime);
    }
    Ok(())
}

/// Working-hours containment for a candidate `[start, start+duration)`:
/// positive duration, enabled weekday, no midnight crossing, start
/// time-of-day in `[open, close)` and end time-of-day in `(open, close]`.
pub fn validate_working_hours(
    settings: &ClinicSettings,
    start: DateTime<Utc>,
    duration_minutes: i32,
) -> Result<(), SchedulingError> {
    if duration_minutes <= 0 {
        return Err(SchedulingError::InvalidDuration);
    }

    if !settings.is_day_enabled(start.weekday()) {
        return Err(SchedulingError::DayDisabled);
    }

    let end = start + Duration::minutes(duration_minutes as i64);

    // Appointments may never cross midnight, even if both endpoints would
    // otherwise be legal.
    if end.date_naive() != start.date_naive() {
        return Err(SchedulingError::SpansMidnight);
    }

    let start_t = start.time();
    let end_t = end.time();
    let outside = SchedulingError::OutsideWorkingHours {
        open: settings.start_time,
        close: settings.end_time,
    };

    if start_t < settings.start_time || start_t >= settings.end_time {
        return Err(outside);
    }

    // Ending exactly at close time is legal.
    if end_t > settings.end_time || end_t <= settings.start_time {
        return Err(outside);
    }

    Ok(())
}

/// Free start times for one calendar day.
///
/// Sweeps candidate starts from the day's open time by `slot_minutes` up to
/// `close - duration`, skipping starts already in the past and any candidate
/// whose interval overlaps a busy range.
pub fn day_slots(
    settings: &ClinicSettings,
    day: NaiveDate,
    slot_minutes: i32,
    duration_minutes: i32,
    now: DateTime<Utc>,
    busy: &[TimeRange],
) -> Vec<NaiveTime> {
    if !settings.is_day_enabled(day.weekday()) {
        return Vec::new();
    }

    let duration = Duration::minutes(duration_minutes as i64);
    let day_open = day.and_time(settings.start_time).and_utc();
    let day_close = day.and_time(settings.end_time).and_utc();
    let last_legal_start = day_close - duration;

    let mut slots = Vec::new();
    let mut t = day_open;

    while t <= last_legal_start {
        if t >= now {
            let candidate = TimeRange::new(t, t + duration);
            if !busy.iter().any(|b| b.overlaps(&candidate)) {
                slots.push(t.time());
            }
        }
        t += Duration::minutes(slot_minutes as i64);
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn weekday_settings() -> ClinicSettings {
        ClinicSettings {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            mon: true,
            tue: true,
            wed: true,
            thu: true,
            fri: true,
            sat: false,
            sun: false,
        }
    }

    #[test]
    fn overlap_is_symmetric() {
        let a = TimeRange::new(utc(2026, 9, 7, 10, 0), utc(2026, 9, 7, 11, 0));
        let b = TimeRange::new(utc(2026, 9, 7, 10, 30), utc(2026, 9, 7, 11, 30));
        let c = TimeRange::new(utc(2026, 9, 7, 12, 0), utc(2026, 9, 7, 13, 0));

        assert!(a.overlaps(&b));
        assert_eq!(a.overlaps(&b), b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert_eq!(a.overlaps(&c), c.overlaps(&a));
    }

    #[test]
    fn adjacent_ranges_do_not_overlap() {
        // [10:00, 11:00) and [11:00, 12:00) share only the boundary instant.
        let a = TimeRange::new(utc(2026, 9, 7, 10, 0), utc(2026, 9, 7, 11, 0));
        let b = TimeRange::new(utc(2026, 9, 7, 11, 0), utc(2026, 9, 7, 12, 0));

        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn containment_counts_as_overlap() {
        let outer = TimeRange::new(utc(2026, 9, 7, 9, 0), utc(2026, 9, 7, 12, 0));
        let inner = TimeRange::new(utc(2026, 9, 7, 10, 0), utc(2026, 9, 7, 10, 30));

        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn rejects_disabled_weekday() {
        // 2026-09-12 is a Saturday.
        let err = validate_working_hours(&weekday_settings(), utc(2026, 9, 12, 10, 0), 60)
            .unwrap_err();
        assert!(matches!(err, SchedulingError::DayDisabled));
    }

    #[test]
    fn rejects_non_positive_duration() {
        let err =
            validate_working_hours(&weekday_settings(), utc(2026, 9, 7, 10, 0), 0).unwrap_err();
        assert!(matches!(err, SchedulingError::InvalidDuration));
    }

    #[test]
    fn rejects_midnight_crossing() {
        let mut settings = weekday_settings();
        settings.end_time = NaiveTime::from_hms_opt(23, 59, 59).unwrap();

        // Monday 23:30 + 60min lands on Tuesday.
        let err = validate_working_hours(&settings, utc(2026, 9, 7, 23, 30), 60).unwrap_err();
        assert!(matches!(err, SchedulingError::SpansMidnight));
    }

    #[test]
    fn appointment_may_end_exactly_at_close() {
        assert!(validate_working_hours(&weekday_settings(), utc(2026, 9, 7, 16, 0), 60).is_ok());
    }

    #[test]
    fn appointment_may_not_start_at_close() {
        let err =
            validate_working_hours(&weekday_settings(), utc(2026, 9, 7, 17, 0), 30).unwrap_err();
        assert!(matches!(err, SchedulingError::OutsideWorkingHours { .. }));
    }

    #[test]
    fn appointment_may_not_end_past_close() {
        let err =
            validate_working_hours(&weekday_settings(), utc(2026, 9, 7, 16, 30), 60).unwrap_err();
        assert!(matches!(err, SchedulingError::OutsideWorkingHours { .. }));
    }

    #[test]
    fn sweep_skips_booked_and_overlapping_starts() {
        // Open 09:00-12:00, slot 30, duration 60, one booking 10:00-11:00.
        let mut settings = weekday_settings();
        settings.end_time = NaiveTime::from_hms_opt(12, 0, 0).unwrap();

        let day = NaiveDate::from_ymd_opt(2026, 9, 7).unwrap();
        let busy = [TimeRange::new(utc(2026, 9, 7, 10, 0), utc(2026, 9, 7, 11, 0))];
        let now = utc(2026, 9, 1, 0, 0);

        let slots = day_slots(&settings, day, 30, 60, now, &busy);
        let rendered: Vec<String> = slots.iter().map(|t| t.format("%H:%M").to_string()).collect();

        assert_eq!(rendered, vec!["09:00", "11:00"]);
    }

    #[test]
    fn sweep_returns_empty_for_disabled_day() {
        let day = NaiveDate::from_ymd_opt(2026, 9, 12).unwrap(); // Saturday
        let slots = day_slots(&weekday_settings(), day, 30, 60, utc(2026, 9, 1, 0, 0), &[]);
        assert!(slots.is_empty());
    }

    #[test]
    fn sweep_never_offers_past_starts() {
        let mut settings = weekday_settings();
        settings.end_time = NaiveTime::from_hms_opt(12, 0, 0).unwrap();

        let day = NaiveDate::from_ymd_opt(2026, 9, 7).unwrap();
        // Mid-morning on the queried day: 09:00-10:30 already elapsed.
        let now = utc(2026, 9, 7, 10, 30);

        let slots = day_slots(&settings, day, 30, 60, now, &[]);
        let rendered: Vec<String> = slots.iter().map(|t| t.format("%H:%M").to_string()).collect();

        assert_eq!(rendered, vec!["10:30", "11:00"]);
    }

    #[test]
    fn sweep_respects_last_legal_start() {
        let mut settings = weekday_settings();
        settings.end_time = NaiveTime::from_hms_opt(12, 0, 0).unwrap();

        let day = NaiveDate::from_ymd_opt(2026, 9, 7).unwrap();
        let slots = day_slots(&settings, day, 30, 90, utc(2026, 9, 1, 0, 0), &[]);
        let rendered: Vec<String> = slots.iter().map(|t| t.format("%H:%M").to_string()).collect();

        // 90-minute sessions must start by 10:30 to end at close.
        assert_eq!(rendered, vec!["09:00", "09:30", "10:00", "10:30"]);
    }
}
