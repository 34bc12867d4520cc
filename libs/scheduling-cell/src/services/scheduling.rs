use std::sync::Arc;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::error::SchedulingError;
use crate::models::{
    CalendarSelection, CandidateCheck, DaySchedule, MonthView, ServiceConfiguration,
    ServiceType, SlotDefinition,
};
use crate::services::availability::{AvailabilityEngine, CALENDAR_GRID_DAYS};
use crate::services::date_keys::{month_start, parse_month_reference};
use crate::services::schedule_rules::ScheduleRules;
use crate::services::store::{BookingStore, DateRange, SupabaseBookingStore};

/// Query surface used by the booking UI. Every call reads a fresh booking
/// snapshot; nothing is cached between calls.
pub struct AvailabilityService {
    store: Arc<dyn BookingStore>,
    engine: AvailabilityEngine<Tz>,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_store(
            Arc::new(SupabaseBookingStore::new(config)),
            AvailabilityEngine::new(ScheduleRules::default(), config.clinic_timezone),
        )
    }

    pub fn with_store(store: Arc<dyn BookingStore>, engine: AvailabilityEngine<Tz>) -> Self {
        Self { store, engine }
    }

    pub fn engine(&self) -> &AvailabilityEngine<Tz> {
        &self.engine
    }

    pub fn today(&self) -> NaiveDate {
        self.engine.today()
    }

    /// Configuration never blocks rendering: a missing row or a failed fetch
    /// falls back to the defaults.
    pub async fn load_configuration(
        &self,
        service: ServiceType,
        auth_token: Option<&str>,
    ) -> ServiceConfiguration {
        match self.store.fetch_service_configuration(service, auth_token).await {
            Ok(Some(config)) => config.sanitized(),
            Ok(None) => {
                warn!("No appointment configuration for {}, using defaults", service);
                ServiceConfiguration::default()
            }
            Err(e) => {
                warn!("Failed to load appointment configuration for {}: {}. Using defaults", service, e);
                ServiceConfiguration::default()
            }
        }
    }

    pub async fn month_view(
        &self,
        service: ServiceType,
        month_reference: Option<&str>,
        requested: CalendarSelection,
        today: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<MonthView, SchedulingError> {
        let month = parse_month_reference(month_reference, today);
        debug!("Building {} calendar for {}", service, month);

        let config = self.load_configuration(service, auth_token).await;
        let range = self.grid_range(month);
        let bookings = self.store.fetch_bookings(service, range, auth_token).await?;

        Ok(self.engine.build_month_view(service, &bookings, month, &config, today, requested))
    }

    pub async fn day_view(
        &self,
        service: ServiceType,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<DaySchedule, SchedulingError> {
        debug!("Building {} day schedule for {}", service, date);

        let config = self.load_configuration(service, auth_token).await;
        let range = self.local_range(date, 1);
        let bookings = self.store.fetch_bookings(service, range, auth_token).await?;

        Ok(self.engine.build_day_slot_statuses(service, &bookings, date, &config))
    }

    pub async fn slots_for_date(
        &self,
        service: ServiceType,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Vec<SlotDefinition> {
        let config = self.load_configuration(service, auth_token).await;
        self.engine.get_slots_for_date(service, date, &config)
    }

    pub async fn check_candidate(
        &self,
        service: ServiceType,
        appointment_at: DateTime<FixedOffset>,
        auth_token: Option<&str>,
    ) -> Result<CandidateCheck, SchedulingError> {
        debug!("Checking {} candidate at {}", service, appointment_at);

        let config = self.load_configuration(service, auth_token).await;
        let local_date = appointment_at.with_timezone(self.engine.timezone()).date_naive();
        let range = self.local_range(local_date, 1);
        let bookings = self.store.fetch_bookings(service, range, auth_token).await?;

        Ok(self.engine.check_candidate(service, &appointment_at, &config, &bookings, &Utc::now()))
    }

    pub async fn next_slot(
        &self,
        service: ServiceType,
        reference: DateTime<FixedOffset>,
        auth_token: Option<&str>,
    ) -> Option<DateTime<FixedOffset>> {
        let config = self.load_configuration(service, auth_token).await;
        self.engine.next_available_slot_from(&reference, service, &config)
    }

    fn grid_range(&self, month: NaiveDate) -> Option<DateRange> {
        let first = month_start(month);
        // Generous window: the grid never starts more than 6 days before the 1st.
        let grid_start = first.checked_sub_days(Days::new(7))?;
        self.local_range(grid_start, CALENDAR_GRID_DAYS + 7)
    }

    /// UTC bounds of `days` local calendar days starting at `start`. `None`
    /// (fetch everything) when a local midnight does not exist.
    fn local_range(&self, start: NaiveDate, days: u64) -> Option<DateRange> {
        let tz = self.engine.timezone();
        let end = start.checked_add_days(Days::new(days))?;
        let from = tz.from_local_datetime(&start.and_hms_opt(0, 0, 0)?).earliest()?;
        let to = tz.from_local_datetime(&end.and_hms_opt(0, 0, 0)?).earliest()?;

        Some(DateRange {
            from: from.with_timezone(&Utc),
            to: to.with_timezone(&Utc),
        })
    }
}
