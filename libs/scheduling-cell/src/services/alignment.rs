//! Slot-boundary checks for free-form rolling-grid times. Both functions
//! read the minute in the zone the instant already carries; callers convert
//! into the clinic zone first.

use chrono::{DateTime, TimeZone, Timelike};

use crate::models::DEFAULT_SLOT_MINUTES;

pub(crate) fn safe_slot_minutes(slot_minutes: i32) -> u32 {
    if slot_minutes > 0 {
        slot_minutes as u32
    } else {
        DEFAULT_SLOT_MINUTES as u32
    }
}

pub fn is_aligned_to_slot<Tz: TimeZone>(candidate: &DateTime<Tz>, slot_minutes: i32) -> bool {
    candidate.minute() % safe_slot_minutes(slot_minutes) == 0
}

/// Floors the minute to the nearest lower multiple of `slot_minutes` and
/// zeroes seconds. Returns the input unchanged if the local time cannot be
/// represented (DST gap).
pub fn align_to_slot<Tz: TimeZone>(candidate: &DateTime<Tz>, slot_minutes: i32) -> DateTime<Tz> {
    let step = safe_slot_minutes(slot_minutes);
    let aligned_minute = candidate.minute() / step * step;

    candidate
        .with_minute(aligned_minute)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or_else(|| candidate.clone())
}
