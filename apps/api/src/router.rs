use std::sync::Arc;

use axum::{
    Json,
    Router,
    routing::get,
};
use serde_json::{json, Value};

use scheduling_cell::router::scheduling_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    let configured = state.is_configured();

    Router::new()
        .route("/", get(|| async { "Clinic booking API is running!" }))
        .route("/health", get(move || health(configured)))
        .nest("/services", scheduling_routes(state))
}

async fn health(configured: bool) -> Json<Value> {
    Json(json!({
        "status": if configured { "ok" } else { "degraded" },
        "store_configured": configured,
    }))
}
