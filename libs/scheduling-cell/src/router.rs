use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use shared_config::AppConfig;

use crate::handlers;

/// Read-only availability routes, mounted per service: `/{service}/...`.
pub fn scheduling_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/{service}/calendar", get(handlers::get_calendar))
        .route("/{service}/days/{date}", get(handlers::get_day_schedule))
        .route("/{service}/slots/{date}", get(handlers::get_slots_for_date))
        .route("/{service}/check", post(handlers::check_candidate))
        .route("/{service}/next-slot", get(handlers::get_next_slot))
        .with_state(state)
}
