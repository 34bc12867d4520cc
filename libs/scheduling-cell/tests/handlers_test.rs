// libs/scheduling-cell/tests/handlers_test.rs

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::{AUTHORIZATION, CONTENT_TYPE}, Request, StatusCode},
    Router,
};
use chrono::DateTime;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::router::scheduling_routes;
use shared_config::{AppConfig, Tz};

fn create_test_config(mock_server: &MockServer) -> AppConfig {
    AppConfig {
        supabase_url: mock_server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        clinic_timezone: Tz::UTC,
        port: 3000,
    }
}

fn create_app(mock_server: &MockServer) -> Router {
    scheduling_routes(Arc::new(create_test_config(mock_server)))
}

fn booking_row(service: &str, appointment_at: &str) -> Value {
    json!({
        "id": Uuid::new_v4().to_string(),
        "service": service,
        "title": null,
        "appointment_at": appointment_at,
        "created_by": Uuid::new_v4().to_string()
    })
}

async fn mount_configuration(mock_server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_configurations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(mock_server)
        .await;
}

async fn mount_bookings(mock_server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(mock_server)
        .await;
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_day_schedule_reports_busy_slots() {
    let mock_server = MockServer::start().await;
    mount_configuration(&mock_server, json!([{
        "slot_minutes": 60,
        "work_start_hour": 8,
        "work_end_hour": 11,
        "allow_weekends": false,
        "max_appointments_per_slot": 1
    }])).await;
    mount_bookings(&mock_server, json!([
        booking_row("physiotherapy", "2026-03-03T09:00:00+00:00")
    ])).await;

    let (status, body) = send(create_app(&mock_server), get("/physiotherapy/days/2026-03-03")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], "Busy 1/3");
    assert_eq!(body["is_fully_booked"], false);
    assert_eq!(body["schedule"]["status"], "slots");
    assert_eq!(body["schedule"]["slots"][1]["start_time"], "09:00");
    assert_eq!(body["schedule"]["slots"][1]["is_available"], false);
    assert_eq!(body["schedule"]["slots"][2]["is_available"], true);
}

#[tokio::test]
async fn test_pilates_holiday() {
    let mock_server = MockServer::start().await;
    mount_configuration(&mock_server, json!([])).await;
    mount_bookings(&mock_server, json!([])).await;

    let (status, body) = send(create_app(&mock_server), get("/pilates/days/2026-03-04")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schedule"]["status"], "holiday");
    assert_eq!(body["summary"], "Holiday / no classes for this day");
}

#[tokio::test]
async fn test_unknown_service_is_bad_request() {
    let mock_server = MockServer::start().await;

    let (status, body) = send(create_app(&mock_server), get("/yoga/days/2026-03-03")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("yoga"));
}

#[tokio::test]
async fn test_invalid_date_is_bad_request() {
    let mock_server = MockServer::start().await;

    let (status, body) = send(create_app(&mock_server), get("/pilates/days/2026-02-30")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("2026-02-30"));
}

#[tokio::test]
async fn test_slots_for_holiday_are_empty() {
    let mock_server = MockServer::start().await;
    mount_configuration(&mock_server, json!([])).await;

    let (status, body) = send(create_app(&mock_server), get("/pilates/slots/2026-03-04")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert_eq!(body["slots"], json!([]));
}

#[tokio::test]
async fn test_slots_survive_configuration_outage() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_configurations"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let (status, body) = send(create_app(&mock_server), get("/physiotherapy/slots/2026-03-03")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 12);
    assert_eq!(body["slots"][0]["label"], "08:00");
}

#[tokio::test]
async fn test_booking_outage_is_bad_gateway() {
    let mock_server = MockServer::start().await;
    mount_configuration(&mock_server, json!([])).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&mock_server)
        .await;

    let (status, _) = send(create_app(&mock_server), get("/physiotherapy/days/2026-03-03")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_bearer_token_is_forwarded() {
    let mock_server = MockServer::start().await;
    mount_configuration(&mock_server, json!([])).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("service", "eq.pilates"))
        .and(header("Authorization", "Bearer patient-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .uri("/pilates/days/2026-03-02")
        .header(AUTHORIZATION, "Bearer patient-token")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(create_app(&mock_server), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], "Busy 0/5");
}

#[tokio::test]
async fn test_check_misaligned_candidate() {
    let mock_server = MockServer::start().await;
    mount_configuration(&mock_server, json!([])).await;
    mount_bookings(&mock_server, json!([])).await;

    let request = Request::builder()
        .method("POST")
        .uri("/physiotherapy/check")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "appointment_at": "2030-03-05T09:47:00+00:00" }).to_string()))
        .unwrap();
    let (status, body) = send(create_app(&mock_server), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], false);
    assert_eq!(body["message"], "Time adjusted to match 60-minute slot boundaries.");
    assert_eq!(body["result"]["outcome"], "adjusted");
    let suggested = DateTime::parse_from_rfc3339(body["result"]["suggested"].as_str().unwrap()).unwrap();
    assert_eq!(suggested, DateTime::parse_from_rfc3339("2030-03-05T09:00:00+00:00").unwrap());
}

#[tokio::test]
async fn test_check_rejects_off_schedule_pilates() {
    let mock_server = MockServer::start().await;
    mount_configuration(&mock_server, json!([])).await;
    mount_bookings(&mock_server, json!([])).await;

    let request = Request::builder()
        .method("POST")
        .uri("/pilates/check")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "appointment_at": "2030-03-06T09:30:00+00:00" }).to_string()))
        .unwrap();
    let (status, body) = send(create_app(&mock_server), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["outcome"], "rejected");
    assert_eq!(body["result"]["reason"], "outside_schedule");
    assert_eq!(body["message"], "Selected time is outside the Pilates schedule.");
}

#[tokio::test]
async fn test_next_pilates_slot() {
    let mock_server = MockServer::start().await;
    mount_configuration(&mock_server, json!([])).await;

    let (status, body) = send(
        create_app(&mock_server),
        get("/pilates/next-slot?from=2026-03-03T13:10:00%2B00:00"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let next = DateTime::parse_from_rfc3339(body["next_slot"].as_str().unwrap()).unwrap();
    assert_eq!(next, DateTime::parse_from_rfc3339("2026-03-05T09:30:00+00:00").unwrap());
}

#[tokio::test]
async fn test_next_slot_accepts_unencoded_offset() {
    let mock_server = MockServer::start().await;
    mount_configuration(&mock_server, json!([])).await;

    // A raw `+` in a query string decodes to a space.
    let (status, body) = send(
        create_app(&mock_server),
        get("/pilates/next-slot?from=2026-03-03T13:10:00+00:00"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let next = DateTime::parse_from_rfc3339(body["next_slot"].as_str().unwrap()).unwrap();
    assert_eq!(next, DateTime::parse_from_rfc3339("2026-03-05T09:30:00+00:00").unwrap());
}

#[tokio::test]
async fn test_next_slot_rejects_garbage_reference() {
    let mock_server = MockServer::start().await;

    let (status, body) = send(create_app(&mock_server), get("/pilates/next-slot?from=tomorrow")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("tomorrow"));
}

#[tokio::test]
async fn test_calendar_month_grid() {
    let mock_server = MockServer::start().await;
    mount_configuration(&mock_server, json!([])).await;
    mount_bookings(&mock_server, json!([
        booking_row("physiotherapy", "2030-04-02T10:00:00+00:00")
    ])).await;

    let (status, body) = send(
        create_app(&mock_server),
        get("/physiotherapy/calendar?month=2030-04&selected_date=2030-04-06&selected_time=09:00"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["month"], "2030-04-01");
    let days = body["days"].as_array().unwrap();
    assert_eq!(days.len(), 42);
    assert_eq!(days[0]["date_key"], "2030-03-31");

    let tuesday = days.iter().find(|d| d["date_key"] == "2030-04-02").unwrap();
    assert_eq!(tuesday["has_bookings"], true);
    assert_eq!(tuesday["is_selectable"], true);

    // Saturday the 6th is a weekend; Monday the 1st is the first open day.
    assert_eq!(body["selection"]["date"], "2030-04-01");
    assert_eq!(body["selection"]["time"], "09:00");
}
