use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::models::{AvailabilityQuery, SchedulingError};
use scheduling_cell::services::AvailabilityService;
use shared_utils::test_utils::test_config;

fn settings_row(owner: Uuid, open: &str, close: &str, sat: bool) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "user_id": owner,
        "start_time": open,
        "end_time": close,
        "mon": true,
        "tue": true,
        "wed": true,
        "thu": true,
        "fri": true,
        "sat": sat,
        "sun": true,
    })
}

async fn mount_calendar(
    server: &MockServer,
    settings: serde_json::Value,
    appointments: serde_json::Value,
    blocks: serde_json::Value,
) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/clinic_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([settings])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(appointments))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_blocks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(blocks))
        .mount(server)
        .await;
}

fn query(from: &str, to: &str, slot: i32, duration: i32) -> AvailabilityQuery {
    serde_json::from_value(json!({
        "date_from": from,
        "date_to": to,
        "slot_minutes": slot,
        "duration_minutes": duration,
    }))
    .unwrap()
}

// 2030-09-02 is a Monday, 2030-09-07 a Saturday.

#[tokio::test]
async fn booked_hour_splits_the_morning() {
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();

    mount_calendar(
        &server,
        settings_row(owner, "09:00:00", "12:00:00", true),
        json!([{
            "id": Uuid::new_v4(),
            "user_id": owner,
            "patient_id": Uuid::new_v4(),
            "start_time": "2030-09-02T10:00:00",
            "duration_minutes": 60,
            "status": "scheduled",
            "is_active": true,
        }]),
        json!([]),
    )
    .await;

    let service = AvailabilityService::new(&test_config(&server.uri()));
    let response = service
        .compute(owner, &query("2030-09-02", "2030-09-02", 30, 60), "token")
        .await
        .unwrap();

    assert_eq!(response.days.len(), 1);
    assert_eq!(response.days[0].slots, vec!["09:00", "11:00"]);
    assert_eq!(response.working_hours.start_time, "09:00");
    assert_eq!(response.calendar_user_id, owner);
}

#[tokio::test]
async fn disabled_day_yields_no_slots() {
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();

    mount_calendar(
        &server,
        settings_row(owner, "09:00:00", "12:00:00", false),
        json!([]),
        json!([]),
    )
    .await;

    let service = AvailabilityService::new(&test_config(&server.uri()));
    let response = service
        .compute(owner, &query("2030-09-07", "2030-09-07", 30, 60), "token")
        .await
        .unwrap();

    assert_eq!(response.days.len(), 1);
    assert!(response.days[0].slots.is_empty());
}

#[tokio::test]
async fn block_closes_part_of_the_day() {
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();

    mount_calendar(
        &server,
        settings_row(owner, "09:00:00", "12:00:00", true),
        json!([]),
        json!([{
            "id": Uuid::new_v4(),
            "user_id": owner,
            "start_time": "2030-09-02T09:00:00",
            "end_time": "2030-09-02T11:00:00",
            "reason": "training",
            "is_active": true,
        }]),
    )
    .await;

    let service = AvailabilityService::new(&test_config(&server.uri()));
    let response = service
        .compute(owner, &query("2030-09-02", "2030-09-02", 30, 60), "token")
        .await
        .unwrap();

    assert_eq!(response.days[0].slots, vec!["11:00"]);
}

#[tokio::test]
async fn spans_multiple_days_in_order() {
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();

    mount_calendar(
        &server,
        settings_row(owner, "09:00:00", "11:00:00", true),
        json!([]),
        json!([]),
    )
    .await;

    let service = AvailabilityService::new(&test_config(&server.uri()));
    let response = service
        .compute(owner, &query("2030-09-02", "2030-09-04", 60, 60), "token")
        .await
        .unwrap();

    assert_eq!(response.days.len(), 3);
    let dates: Vec<String> = response.days.iter().map(|d| d.date.to_string()).collect();
    assert_eq!(dates, vec!["2030-09-02", "2030-09-03", "2030-09-04"]);
    for day in &response.days {
        assert_eq!(day.slots, vec!["09:00", "10:00"]);
    }
}

#[tokio::test]
async fn malformed_date_is_an_invalid_range() {
    let server = MockServer::start().await;
    let service = AvailabilityService::new(&test_config(&server.uri()));

    let result = service
        .compute(
            Uuid::new_v4(),
            &query("02-09-2030", "2030-09-02", 30, 60),
            "token",
        )
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidRange(_)));
}

#[tokio::test]
async fn reversed_range_is_rejected() {
    let server = MockServer::start().await;
    let service = AvailabilityService::new(&test_config(&server.uri()));

    let result = service
        .compute(
            Uuid::new_v4(),
            &query("2030-09-04", "2030-09-02", 30, 60),
            "token",
        )
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidRange(_)));
}

#[tokio::test]
async fn non_positive_slot_width_is_rejected() {
    let server = MockServer::start().await;
    let service = AvailabilityService::new(&test_config(&server.uri()));

    let result = service
        .compute(
            Uuid::new_v4(),
            &query("2030-09-02", "2030-09-02", 0, 60),
            "token",
        )
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidRange(_)));
}
