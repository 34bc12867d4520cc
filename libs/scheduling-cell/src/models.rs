use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SchedulingError;
use crate::services::date_keys::{hhmm, hhmm_option};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Physiotherapy,
    Pilates,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Physiotherapy => "physiotherapy",
            ServiceType::Pilates => "pilates",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = SchedulingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "physiotherapy" => Ok(ServiceType::Physiotherapy),
            "pilates" => Ok(ServiceType::Pilates),
            other => Err(SchedulingError::UnknownService(other.to_string())),
        }
    }
}

pub const DEFAULT_SLOT_MINUTES: i32 = 60;
pub const DEFAULT_WORK_START_HOUR: i32 = 8;
pub const DEFAULT_WORK_END_HOUR: i32 = 20;
pub const DEFAULT_MAX_APPOINTMENTS_PER_SLOT: i32 = 1;

/// Per-service booking rules, owned by the clinic administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    pub slot_minutes: i32,
    pub work_start_hour: i32,
    pub work_end_hour: i32,
    pub allow_weekends: bool,
    pub max_appointments_per_slot: i32,
}

impl Default for ServiceConfiguration {
    fn default() -> Self {
        Self {
            slot_minutes: DEFAULT_SLOT_MINUTES,
            work_start_hour: DEFAULT_WORK_START_HOUR,
            work_end_hour: DEFAULT_WORK_END_HOUR,
            allow_weekends: false,
            max_appointments_per_slot: DEFAULT_MAX_APPOINTMENTS_PER_SLOT,
        }
    }
}

impl ServiceConfiguration {
    /// Clamps every field into its legal range. Availability must always
    /// render, so bad admin input is corrected here instead of rejected.
    pub fn sanitized(&self) -> Self {
        Self {
            slot_minutes: if self.slot_minutes > 0 { self.slot_minutes } else { DEFAULT_SLOT_MINUTES },
            work_start_hour: self.work_start_hour.clamp(0, 24),
            work_end_hour: self.work_end_hour.clamp(0, 24),
            allow_weekends: self.allow_weekends,
            max_appointments_per_slot: self.max_appointments_per_slot.max(1),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.sanitized().max_appointments_per_slot as u32
    }
}

/// Raw `appointment_configurations` row; every column is nullable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfigurationRow {
    pub slot_minutes: Option<i32>,
    pub work_start_hour: Option<i32>,
    pub work_end_hour: Option<i32>,
    pub allow_weekends: Option<bool>,
    pub max_appointments_per_slot: Option<i32>,
}

impl From<ServiceConfigurationRow> for ServiceConfiguration {
    fn from(row: ServiceConfigurationRow) -> Self {
        let defaults = ServiceConfiguration::default();
        ServiceConfiguration {
            slot_minutes: row.slot_minutes.unwrap_or(defaults.slot_minutes),
            work_start_hour: row.work_start_hour.unwrap_or(defaults.work_start_hour),
            work_end_hour: row.work_end_hour.unwrap_or(defaults.work_end_hour),
            allow_weekends: row.allow_weekends.unwrap_or(defaults.allow_weekends),
            max_appointments_per_slot: row
                .max_appointments_per_slot
                .unwrap_or(defaults.max_appointments_per_slot),
        }
        .sanitized()
    }
}

/// Read projection of a stored appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub service: ServiceType,
    #[serde(default)]
    pub title: Option<String>,
    pub appointment_at: DateTime<FixedOffset>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDefinition {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStatus {
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub label: String,
    pub occupied_count: u32,
    pub capacity: u32,
    pub is_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date_key: NaiveDate,
    pub day_number: u32,
    pub in_target_month: bool,
    pub is_past: bool,
    /// Past, disallowed weekend, outside the month, or no slots that day.
    pub non_working: bool,
    /// Day-level busy hint: at least one booking exists. Slot capacity is
    /// only resolved by the day schedule.
    pub has_bookings: bool,
    pub is_open: bool,
    pub is_selectable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DaySchedule {
    /// The service has no slots on this date.
    Holiday { date_key: NaiveDate },
    Slots {
        date_key: NaiveDate,
        slots: Vec<SlotStatus>,
        busy_count: usize,
        total: usize,
    },
}

impl DaySchedule {
    pub fn is_holiday(&self) -> bool {
        matches!(self, DaySchedule::Holiday { .. })
    }

    pub fn is_fully_booked(&self) -> bool {
        match self {
            DaySchedule::Holiday { .. } => false,
            DaySchedule::Slots { busy_count, total, .. } => *total > 0 && busy_count == total,
        }
    }

    pub fn slots(&self) -> &[SlotStatus] {
        match self {
            DaySchedule::Holiday { .. } => &[],
            DaySchedule::Slots { slots, .. } => slots,
        }
    }

    pub fn busy_count(&self) -> usize {
        match self {
            DaySchedule::Holiday { .. } => 0,
            DaySchedule::Slots { busy_count, .. } => *busy_count,
        }
    }

    /// "Busy X/N" line shown above the hour list.
    pub fn summary(&self) -> String {
        match self {
            DaySchedule::Holiday { .. } => "Holiday / no classes for this day".to_string(),
            DaySchedule::Slots { busy_count, total, .. } => format!("Busy {}/{}", busy_count, total),
        }
    }
}

/// Caller-owned calendar selection, passed in and handed back resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSelection {
    pub date: Option<NaiveDate>,
    #[serde(default, with = "hhmm_option")]
    pub time: Option<NaiveTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthView {
    pub service: ServiceType,
    pub month: NaiveDate,
    pub days: Vec<CalendarDay>,
    pub selection: CalendarSelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    Past,
    OutsideSchedule,
    OutsideWorkingHours,
    NonWorkingDay,
    SlotFull,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CandidateCheck {
    Accepted { appointment_at: DateTime<FixedOffset> },
    /// Misaligned rolling-grid time; the caller offers `suggested` instead.
    Adjusted { suggested: DateTime<FixedOffset>, slot_minutes: i32 },
    Rejected { reason: RejectionReason },
}

impl CandidateCheck {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CandidateCheck::Accepted { .. })
    }

    pub fn message(&self) -> String {
        match self {
            CandidateCheck::Accepted { .. } => "Time is available.".to_string(),
            CandidateCheck::Adjusted { slot_minutes, .. } => {
                format!("Time adjusted to match {}-minute slot boundaries.", slot_minutes)
            }
            CandidateCheck::Rejected { reason } => match reason {
                RejectionReason::Past => "Selected time is in the past.",
                RejectionReason::OutsideSchedule => "Selected time is outside the Pilates schedule.",
                RejectionReason::OutsideWorkingHours => "Selected time is outside working hours.",
                RejectionReason::NonWorkingDay => "Selected day is not a working day.",
                RejectionReason::SlotFull => "Selected time slot is fully booked.",
            }
            .to_string(),
        }
    }
}
