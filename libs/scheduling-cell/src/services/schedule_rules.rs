use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScheduleError;
use crate::models::{ServiceConfiguration, ServiceType, SlotDefinition};
use crate::services::date_keys::{format_time_key, hhmm};

/// Used when a rolling grid would otherwise produce no slots at all.
pub const FALLBACK_SLOT_START: (u32, u32) = (8, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassWindow {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl ClassWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    fn to_slot(self) -> SlotDefinition {
        SlotDefinition {
            start: self.start,
            end: self.end,
            label: format!("{} - {}", format_time_key(self.start), format_time_key(self.end)),
        }
    }
}

/// Fixed weekly class timetable keyed by ISO weekday (Mon = 1 .. Sun = 7).
/// Weekdays without an entry are holidays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeeklyScheduleTemplate {
    days: BTreeMap<u32, Vec<ClassWindow>>,
}

impl WeeklyScheduleTemplate {
    /// Builds a template, ordering each day's windows by start time and
    /// rejecting inverted or overlapping windows.
    pub fn new<I>(entries: I) -> Result<Self, ScheduleError>
    where
        I: IntoIterator<Item = (Weekday, Vec<ClassWindow>)>,
    {
        let mut merged: BTreeMap<u32, (Weekday, Vec<ClassWindow>)> = BTreeMap::new();
        for (weekday, windows) in entries {
            merged
                .entry(weekday.number_from_monday())
                .or_insert_with(|| (weekday, Vec::new()))
                .1
                .extend(windows);
        }

        let mut days = BTreeMap::new();
        for (day, (weekday, mut windows)) in merged {
            windows.sort_by_key(|window| window.start);

            for window in &windows {
                if window.start >= window.end {
                    return Err(ScheduleError::InvertedWindow {
                        weekday,
                        start: window.start,
                        end: window.end,
                    });
                }
            }
            for pair in windows.windows(2) {
                if pair[1].start < pair[0].end {
                    return Err(ScheduleError::OverlappingWindows { weekday, start: pair[1].start });
                }
            }

            if !windows.is_empty() {
                days.insert(day, windows);
            }
        }

        Ok(Self { days })
    }

    /// The clinic's Pilates timetable. Wednesdays and weekends have no classes.
    pub fn pilates() -> Self {
        const MONDAY: &[(u32, u32, u32, u32)] = &[
            (9, 30, 10, 20),
            (10, 30, 11, 20),
            (15, 40, 16, 30),
            (16, 40, 17, 30),
            (17, 40, 18, 30),
        ];
        const TUESDAY: &[(u32, u32, u32, u32)] = &[
            (7, 15, 8, 5),
            (8, 15, 9, 5),
            (9, 15, 10, 5),
            (12, 0, 12, 50),
            (13, 0, 13, 50),
        ];
        const THURSDAY: &[(u32, u32, u32, u32)] = &[
            (9, 30, 10, 20),
            (10, 30, 11, 20),
            (15, 40, 16, 30),
            (16, 40, 17, 30),
            (17, 40, 18, 30),
            (18, 40, 19, 30),
        ];
        const FRIDAY: &[(u32, u32, u32, u32)] = &[
            (7, 15, 8, 5),
            (8, 15, 9, 5),
            (9, 15, 10, 5),
            (10, 15, 11, 5),
            (12, 0, 12, 50),
            (13, 0, 13, 50),
        ];

        let windows = |table: &[(u32, u32, u32, u32)]| {
            table
                .iter()
                .filter_map(|&(sh, sm, eh, em)| {
                    Some(ClassWindow::new(
                        NaiveTime::from_hms_opt(sh, sm, 0)?,
                        NaiveTime::from_hms_opt(eh, em, 0)?,
                    ))
                })
                .collect::<Vec<_>>()
        };

        let mut days = BTreeMap::new();
        days.insert(Weekday::Mon.number_from_monday(), windows(MONDAY));
        days.insert(Weekday::Tue.number_from_monday(), windows(TUESDAY));
        days.insert(Weekday::Thu.number_from_monday(), windows(THURSDAY));
        days.insert(Weekday::Fri.number_from_monday(), windows(FRIDAY));
        Self { days }
    }

    pub fn windows_for(&self, weekday: Weekday) -> &[ClassWindow] {
        self.days
            .get(&weekday.number_from_monday())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.days.values().all(Vec::is_empty)
    }
}

/// Single dispatch point between the two slot-generation strategies.
#[derive(Debug, Clone, Copy)]
pub enum ScheduleStrategy<'a> {
    FixedWeekly(&'a WeeklyScheduleTemplate),
    RollingGrid(ServiceConfiguration),
}

impl<'a> ScheduleStrategy<'a> {
    pub fn slots_for_date(&self, date: NaiveDate) -> Vec<SlotDefinition> {
        match self {
            ScheduleStrategy::FixedWeekly(template) => template
                .windows_for(date.weekday())
                .iter()
                .map(|window| window.to_slot())
                .collect(),
            ScheduleStrategy::RollingGrid(config) => rolling_grid_slots(config),
        }
    }

    /// Whether the strategy schedules anything on `date` at all. A rolling
    /// grid always does; weekends are filtered by configuration elsewhere.
    pub fn has_slots_on(&self, date: NaiveDate) -> bool {
        match self {
            ScheduleStrategy::FixedWeekly(template) => !template.windows_for(date.weekday()).is_empty(),
            ScheduleStrategy::RollingGrid(_) => true,
        }
    }

    pub fn is_fixed_weekly(&self) -> bool {
        matches!(self, ScheduleStrategy::FixedWeekly(_))
    }
}

fn rolling_grid_slots(config: &ServiceConfiguration) -> Vec<SlotDefinition> {
    let config = config.sanitized();
    let step = config.slot_minutes as u32;
    let end_minutes = config.work_end_hour as u32 * 60;

    let mut slots = Vec::new();
    let mut current = config.work_start_hour as u32 * 60;
    while current < end_minutes {
        if let Some(start) = NaiveTime::from_hms_opt(current / 60, current % 60, 0) {
            slots.push(instant_slot(start));
        }
        current += step;
    }

    if slots.is_empty() {
        debug!(
            "Working hours {}..{} produce no slots, using fallback",
            config.work_start_hour, config.work_end_hour
        );
        let (hour, minute) = FALLBACK_SLOT_START;
        if let Some(start) = NaiveTime::from_hms_opt(hour, minute, 0) {
            slots.push(instant_slot(start));
        }
    }

    slots
}

/// Rolling-grid slots mark a session start; duration is implied by the grid.
fn instant_slot(start: NaiveTime) -> SlotDefinition {
    SlotDefinition {
        start,
        end: start,
        label: format_time_key(start),
    }
}

pub fn is_weekend_date(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Maps each service onto its slot strategy.
#[derive(Debug, Clone)]
pub struct ScheduleRules {
    pilates: WeeklyScheduleTemplate,
}

impl Default for ScheduleRules {
    fn default() -> Self {
        Self::new(WeeklyScheduleTemplate::pilates())
    }
}

impl ScheduleRules {
    pub fn new(pilates: WeeklyScheduleTemplate) -> Self {
        Self { pilates }
    }

    pub fn pilates_template(&self) -> &WeeklyScheduleTemplate {
        &self.pilates
    }

    pub fn strategy_for(&self, service: ServiceType, config: &ServiceConfiguration) -> ScheduleStrategy<'_> {
        match service {
            ServiceType::Pilates => ScheduleStrategy::FixedWeekly(&self.pilates),
            ServiceType::Physiotherapy => ScheduleStrategy::RollingGrid(config.sanitized()),
        }
    }

    pub fn get_slots_for_date(
        &self,
        service: ServiceType,
        date: NaiveDate,
        config: &ServiceConfiguration,
    ) -> Vec<SlotDefinition> {
        self.strategy_for(service, config).slots_for_date(date)
    }
}
