use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::StoreError;
use crate::models::{Booking, ServiceConfiguration, ServiceConfigurationRow, ServiceType};

/// Half-open `[from, to)` hint narrowing a booking fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Read contract the availability engine needs from the external store.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn fetch_bookings(
        &self,
        service: ServiceType,
        range: Option<DateRange>,
        auth_token: Option<&str>,
    ) -> Result<Vec<Booking>, StoreError>;

    /// `Ok(None)` when the service has no configuration row.
    async fn fetch_service_configuration(
        &self,
        service: ServiceType,
        auth_token: Option<&str>,
    ) -> Result<Option<ServiceConfiguration>, StoreError>;
}

pub struct SupabaseBookingStore {
    supabase: SupabaseClient,
}

impl SupabaseBookingStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

fn timestamp_param(instant: DateTime<Utc>) -> String {
    // `Z` suffix keeps the value free of `+`, which PostgREST would read as a space.
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl BookingStore for SupabaseBookingStore {
    async fn fetch_bookings(
        &self,
        service: ServiceType,
        range: Option<DateRange>,
        auth_token: Option<&str>,
    ) -> Result<Vec<Booking>, StoreError> {
        debug!("Fetching {} bookings (range: {:?})", service, range);

        let mut path = format!(
            "/rest/v1/appointments?select=id,service,title,appointment_at,created_by&service=eq.{}",
            service
        );
        if let Some(range) = range {
            path.push_str(&format!(
                "&appointment_at=gte.{}&appointment_at=lt.{}",
                timestamp_param(range.from),
                timestamp_param(range.to)
            ));
        }
        path.push_str("&order=appointment_at.asc");

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
        ).await?;

        let bookings: Vec<Booking> = result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Booking>, _>>()?;

        debug!("Fetched {} {} bookings", bookings.len(), service);
        Ok(bookings)
    }

    async fn fetch_service_configuration(
        &self,
        service: ServiceType,
        auth_token: Option<&str>,
    ) -> Result<Option<ServiceConfiguration>, StoreError> {
        let path = format!(
            "/rest/v1/appointment_configurations?select=slot_minutes,work_start_hour,work_end_hour,allow_weekends,max_appointments_per_slot&service=eq.{}&limit=1",
            service
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
        ).await?;

        match result.into_iter().next() {
            Some(row) => {
                let row: ServiceConfigurationRow = serde_json::from_value(row)?;
                Ok(Some(row.into()))
            }
            None => Ok(None),
        }
    }
}
