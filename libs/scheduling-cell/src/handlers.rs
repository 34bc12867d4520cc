use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::error::SchedulingError;
use crate::models::{CalendarSelection, ServiceType};
use crate::services::date_keys::{parse_date_key, parse_time_key};
use crate::services::scheduling::AvailabilityService;

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    /// `YYYY-MM` or any `YYYY-MM-DD` inside the month.
    pub month: Option<String>,
    pub selected_date: Option<String>,
    pub selected_time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NextSlotQuery {
    /// RFC 3339 instant. An unescaped `+` in the offset arrives as a space.
    pub from: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckCandidateRequest {
    pub appointment_at: DateTime<FixedOffset>,
}

type BearerHeader = Option<TypedHeader<Authorization<Bearer>>>;

fn bearer_token(auth: &BearerHeader) -> Option<&str> {
    auth.as_ref().map(|TypedHeader(auth)| auth.token())
}

fn parse_service(raw: &str) -> Result<ServiceType, AppError> {
    raw.parse::<ServiceType>().map_err(AppError::from)
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    parse_date_key(raw).ok_or_else(|| SchedulingError::InvalidDate(raw.to_string()).into())
}

fn parse_reference(raw: &str) -> Result<DateTime<FixedOffset>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(&raw.replace(' ', "+")))
        .map_err(|_| SchedulingError::InvalidDate(raw.to_string()).into())
}

#[axum::debug_handler]
pub async fn get_calendar(
    State(state): State<Arc<AppConfig>>,
    Path(service): Path<String>,
    Query(query): Query<CalendarQuery>,
    auth: BearerHeader,
) -> Result<Json<Value>, AppError> {
    let service = parse_service(&service)?;
    let availability = AvailabilityService::new(&state);

    // Unparseable selections are dropped; the view falls back to the first open day.
    let requested = CalendarSelection {
        date: query.selected_date.as_deref().and_then(parse_date_key),
        time: query.selected_time.as_deref().and_then(parse_time_key),
    };

    let today = availability.today();
    let view = availability
        .month_view(service, query.month.as_deref(), requested, today, bearer_token(&auth))
        .await?;

    Ok(Json(json!({
        "service": view.service,
        "month": view.month,
        "today": today,
        "days": view.days,
        "selection": view.selection,
    })))
}

#[axum::debug_handler]
pub async fn get_day_schedule(
    State(state): State<Arc<AppConfig>>,
    Path((service, date)): Path<(String, String)>,
    auth: BearerHeader,
) -> Result<Json<Value>, AppError> {
    let service = parse_service(&service)?;
    let date = parse_date(&date)?;

    let availability = AvailabilityService::new(&state);
    let schedule = availability.day_view(service, date, bearer_token(&auth)).await?;

    Ok(Json(json!({
        "service": service,
        "summary": schedule.summary(),
        "is_fully_booked": schedule.is_fully_booked(),
        "schedule": schedule,
    })))
}

#[axum::debug_handler]
pub async fn get_slots_for_date(
    State(state): State<Arc<AppConfig>>,
    Path((service, date)): Path<(String, String)>,
    auth: BearerHeader,
) -> Result<Json<Value>, AppError> {
    let service = parse_service(&service)?;
    let date = parse_date(&date)?;

    let availability = AvailabilityService::new(&state);
    let slots = availability.slots_for_date(service, date, bearer_token(&auth)).await;

    Ok(Json(json!({
        "service": service,
        "date": date,
        "slots": slots,
        "total": slots.len(),
    })))
}

#[axum::debug_handler]
pub async fn check_candidate(
    State(state): State<Arc<AppConfig>>,
    Path(service): Path<String>,
    auth: BearerHeader,
    Json(request): Json<CheckCandidateRequest>,
) -> Result<Json<Value>, AppError> {
    let service = parse_service(&service)?;
    debug!("Candidate check for {} at {}", service, request.appointment_at);

    let availability = AvailabilityService::new(&state);
    let result = availability
        .check_candidate(service, request.appointment_at, bearer_token(&auth))
        .await?;

    Ok(Json(json!({
        "service": service,
        "accepted": result.is_accepted(),
        "message": result.message(),
        "result": result,
    })))
}

#[axum::debug_handler]
pub async fn get_next_slot(
    State(state): State<Arc<AppConfig>>,
    Path(service): Path<String>,
    Query(query): Query<NextSlotQuery>,
    auth: BearerHeader,
) -> Result<Json<Value>, AppError> {
    let service = parse_service(&service)?;
    let from = match query.from.as_deref() {
        Some(raw) => parse_reference(raw)?,
        None => Utc::now().with_timezone(&state.clinic_timezone).fixed_offset(),
    };

    let availability = AvailabilityService::new(&state);
    let next = availability.next_slot(service, from, bearer_token(&auth)).await;

    Ok(Json(json!({
        "service": service,
        "from": from,
        "next_slot": next,
    })))
}
