use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use tracing::debug;

use crate::models::{
    Booking, CalendarDay, CalendarSelection, CandidateCheck, DaySchedule, MonthView,
    RejectionReason, ServiceConfiguration, ServiceType, SlotDefinition, SlotStatus,
};
use crate::services::alignment::safe_slot_minutes;
use crate::services::date_keys::{month_end, month_start, to_date_key, to_time_key, truncate_to_minute};
use crate::services::schedule_rules::{is_weekend_date, ScheduleRules, ScheduleStrategy};

/// Six weeks of seven days, so every month fits regardless of length.
pub const CALENDAR_GRID_DAYS: u64 = 42;
pub const PILATES_SEARCH_HORIZON_DAYS: u64 = 14;
const MINUTES_PER_DAY: u32 = 24 * 60;

/// Stateless availability computations over a caller-supplied booking
/// snapshot. All calendar days and slot buckets are evaluated in `tz`.
#[derive(Clone)]
pub struct AvailabilityEngine<Tz: TimeZone> {
    rules: ScheduleRules,
    tz: Tz,
}

impl<Tz: TimeZone> AvailabilityEngine<Tz> {
    pub fn new(rules: ScheduleRules, tz: Tz) -> Self {
        Self { rules, tz }
    }

    pub fn timezone(&self) -> &Tz {
        &self.tz
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    pub fn get_slots_for_date(
        &self,
        service: ServiceType,
        date: NaiveDate,
        config: &ServiceConfiguration,
    ) -> Vec<SlotDefinition> {
        self.rules.get_slots_for_date(service, date, config)
    }

    /// Month grid of 42 cells starting on the Sunday on or before the 1st.
    ///
    /// A day with any booking is flagged busy but stays selectable; only the
    /// day schedule resolves whether free slots remain.
    pub fn build_calendar_days(
        &self,
        service: ServiceType,
        bookings: &[Booking],
        month_date: NaiveDate,
        config: &ServiceConfiguration,
        today: NaiveDate,
    ) -> Vec<CalendarDay> {
        let config = config.sanitized();
        let strategy = self.rules.strategy_for(service, &config);

        let booked_days: HashSet<NaiveDate> = bookings
            .iter()
            .filter(|booking| booking.service == service)
            .map(|booking| to_date_key(&booking.appointment_at, &self.tz))
            .collect();

        let first = month_start(month_date);
        let last = month_end(month_date);
        let lead = Days::new(u64::from(first.weekday().num_days_from_sunday()));
        let grid_start = first.checked_sub_days(lead).unwrap_or(first);

        grid_start
            .iter_days()
            .take(CALENDAR_GRID_DAYS as usize)
            .map(|date| {
                let in_target_month = date >= first && date <= last;
                let is_past = date < today;
                let has_bookings = booked_days.contains(&date);
                let non_working = is_past
                    || (!config.allow_weekends && is_weekend_date(date))
                    || !in_target_month
                    || !strategy.has_slots_on(date);

                CalendarDay {
                    date_key: date,
                    day_number: date.day(),
                    in_target_month,
                    is_past,
                    non_working,
                    has_bookings,
                    is_open: in_target_month && !non_working && !has_bookings,
                    is_selectable: in_target_month && !non_working,
                }
            })
            .collect()
    }

    pub fn build_day_slot_statuses(
        &self,
        service: ServiceType,
        bookings: &[Booking],
        date_key: NaiveDate,
        config: &ServiceConfiguration,
    ) -> DaySchedule {
        let config = config.sanitized();
        let definitions = self.rules.get_slots_for_date(service, date_key, &config);
        if definitions.is_empty() {
            return DaySchedule::Holiday { date_key };
        }

        let capacity = config.capacity();
        let usage = self.slot_usage(service, bookings, date_key);

        let slots: Vec<SlotStatus> = definitions
            .into_iter()
            .map(|slot| {
                let occupied_count = usage.get(&slot.start).copied().unwrap_or(0);
                SlotStatus {
                    start_time: slot.start,
                    end_time: slot.end,
                    label: slot.label,
                    occupied_count,
                    capacity,
                    is_available: occupied_count < capacity,
                }
            })
            .collect();

        let busy_count = slots.iter().filter(|slot| !slot.is_available).count();
        let total = slots.len();
        debug!("{} on {}: busy {}/{}", service, date_key, busy_count, total);

        DaySchedule::Slots { date_key, slots, busy_count, total }
    }

    /// Month grid plus the resolved selection for that month.
    pub fn build_month_view(
        &self,
        service: ServiceType,
        bookings: &[Booking],
        month_date: NaiveDate,
        config: &ServiceConfiguration,
        today: NaiveDate,
        requested: CalendarSelection,
    ) -> MonthView {
        let days = self.build_calendar_days(service, bookings, month_date, config, today);
        let date = resolve_selected_date(&days, requested.date);
        let time = date.and_then(|date| {
            let slots = self.rules.get_slots_for_date(service, date, config);
            resolve_selected_time(&slots, requested.time)
        });

        MonthView {
            service,
            month: month_start(month_date),
            days,
            selection: CalendarSelection { date, time },
        }
    }

    /// True iff the candidate's local `HH:MM` is a class start on that weekday.
    pub fn is_pilates_time_allowed<Src: TimeZone>(&self, candidate: &DateTime<Src>) -> bool {
        let local = candidate.with_timezone(&self.tz);
        let start = truncate_to_minute(local.time());

        self.rules
            .pilates_template()
            .windows_for(local.date_naive().weekday())
            .iter()
            .any(|window| window.start == start)
    }

    /// Earliest slot start at or after `reference`, in the reference's zone.
    ///
    /// A rolling grid rounds up to the next boundary of the slot grid anchored
    /// at the opening hour and may roll past midnight. A weekly template is scanned day by day for
    /// at most [`PILATES_SEARCH_HORIZON_DAYS`].
    pub fn next_available_slot_from<Src: TimeZone>(
        &self,
        reference: &DateTime<Src>,
        service: ServiceType,
        config: &ServiceConfiguration,
    ) -> Option<DateTime<Src>> {
        let local = reference.with_timezone(&self.tz).naive_local();
        let normalized = local.date().and_time(truncate_to_minute(local.time()));

        let found = match self.rules.strategy_for(service, config) {
            ScheduleStrategy::RollingGrid(config) => {
                let step = safe_slot_minutes(config.slot_minutes);
                // Earliest boundary of the day; every slot start is `anchor + k * step`.
                let anchor = config.work_start_hour as u32 * 60 % step;
                let elapsed = normalized.hour() * 60 + normalized.minute();
                let rounded = if elapsed <= anchor {
                    anchor
                } else {
                    anchor + (elapsed - anchor).div_ceil(step) * step
                };
                let date = normalized
                    .date()
                    .checked_add_days(Days::new(u64::from(rounded / MINUTES_PER_DAY)))?;
                let minutes = rounded % MINUTES_PER_DAY;
                let time = NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)?;
                self.localize(date.and_time(time))
            }
            ScheduleStrategy::FixedWeekly(template) => (0..PILATES_SEARCH_HORIZON_DAYS)
                .filter_map(|offset| normalized.date().checked_add_days(Days::new(offset)))
                .flat_map(|day| {
                    template
                        .windows_for(day.weekday())
                        .iter()
                        .map(move |window| day.and_time(window.start))
                })
                .filter(|start| *start >= normalized)
                .find_map(|start| self.localize(start)),
        };

        found.map(|slot| slot.with_timezone(&reference.timezone()))
    }

    /// Submit-time decision for a candidate appointment, evaluated against
    /// `now`. Advisory only: the store must still enforce capacity against
    /// concurrent writers.
    pub fn check_candidate(
        &self,
        service: ServiceType,
        candidate: &DateTime<FixedOffset>,
        config: &ServiceConfiguration,
        bookings: &[Booking],
        now: &DateTime<Utc>,
    ) -> CandidateCheck {
        if candidate.with_timezone(&Utc) < *now {
            return CandidateCheck::Rejected { reason: RejectionReason::Past };
        }

        let config = config.sanitized();
        let strategy = self.rules.strategy_for(service, &config);
        let local = candidate.with_timezone(&self.tz);
        let date = local.date_naive();
        let start = truncate_to_minute(local.time());

        if strategy.is_fixed_weekly() && !self.is_pilates_time_allowed(candidate) {
            return CandidateCheck::Rejected { reason: RejectionReason::OutsideSchedule };
        }

        if (!config.allow_weekends && is_weekend_date(date)) || !strategy.has_slots_on(date) {
            return CandidateCheck::Rejected { reason: RejectionReason::NonWorkingDay };
        }

        let slots = strategy.slots_for_date(date);
        if !slots.iter().any(|slot| slot.start == start) {
            if let ScheduleStrategy::RollingGrid(grid) = strategy {
                if let Some(suggested) = self.latest_grid_start(&slots, date, start, grid.slot_minutes) {
                    return CandidateCheck::Adjusted {
                        suggested: suggested.with_timezone(&candidate.timezone()),
                        slot_minutes: grid.slot_minutes,
                    };
                }
            }
            return CandidateCheck::Rejected { reason: RejectionReason::OutsideWorkingHours };
        }

        let occupied = self
            .slot_usage(service, bookings, date)
            .get(&start)
            .copied()
            .unwrap_or(0);
        if occupied >= config.capacity() {
            return CandidateCheck::Rejected { reason: RejectionReason::SlotFull };
        }

        CandidateCheck::Accepted { appointment_at: *candidate }
    }

    /// Latest slot start at or before `time`, provided `time` still falls
    /// inside the working grid (before the last slot's end boundary).
    fn latest_grid_start(
        &self,
        slots: &[SlotDefinition],
        date: NaiveDate,
        time: NaiveTime,
        slot_minutes: i32,
    ) -> Option<DateTime<Tz>> {
        let last = slots.last()?;
        let closing = minute_of_day(last.start) + safe_slot_minutes(slot_minutes);
        if minute_of_day(time) >= closing {
            return None;
        }

        let slot = slots.iter().rev().find(|slot| slot.start <= time)?;
        self.localize(date.and_time(slot.start))
    }

    /// Bookings on `date`, counted per local start minute.
    fn slot_usage(&self, service: ServiceType, bookings: &[Booking], date: NaiveDate) -> HashMap<NaiveTime, u32> {
        let mut usage = HashMap::new();
        for booking in bookings.iter().filter(|booking| booking.service == service) {
            if to_date_key(&booking.appointment_at, &self.tz) == date {
                *usage.entry(to_time_key(&booking.appointment_at, &self.tz)).or_insert(0) += 1;
            }
        }
        usage
    }

    fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
        self.tz.from_local_datetime(&naive).earliest()
    }
}

fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Keeps the requested date if it is selectable, otherwise picks the first
/// open day, then the first selectable one.
pub fn resolve_selected_date(days: &[CalendarDay], requested: Option<NaiveDate>) -> Option<NaiveDate> {
    let selectable: Vec<&CalendarDay> = days.iter().filter(|day| day.is_selectable).collect();

    if let Some(requested) = requested {
        if selectable.iter().any(|day| day.date_key == requested) {
            return Some(requested);
        }
    }

    selectable
        .iter()
        .find(|day| day.is_open)
        .or_else(|| selectable.first())
        .map(|day| day.date_key)
}

/// Keeps the requested time if it is a slot start, otherwise the first slot.
pub fn resolve_selected_time(slots: &[SlotDefinition], requested: Option<NaiveTime>) -> Option<NaiveTime> {
    requested
        .filter(|time| slots.iter().any(|slot| slot.start == *time))
        .or_else(|| slots.first().map(|slot| slot.start))
}
