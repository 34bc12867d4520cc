//! Timezone-safe date and time keys.
//!
//! Stored instants carry an explicit offset. Calendar days and slot buckets
//! are always derived after converting into one evaluation zone, so two
//! bookings compare by local calendar date and local `HH:MM`, never by raw
//! UTC instant.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Timelike};

pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";
pub const TIME_KEY_FORMAT: &str = "%H:%M";

pub fn to_date_key<Src: TimeZone, Tz: TimeZone>(instant: &DateTime<Src>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

pub fn to_time_key<Src: TimeZone, Tz: TimeZone>(instant: &DateTime<Src>, tz: &Tz) -> NaiveTime {
    truncate_to_minute(instant.with_timezone(tz).time())
}

/// Drops seconds and sub-seconds; slot buckets are minute-precise.
pub fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

pub fn parse_date_key(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_KEY_FORMAT).ok()
}

pub fn parse_time_key(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, TIME_KEY_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

pub fn format_time_key(time: NaiveTime) -> String {
    time.format(TIME_KEY_FORMAT).to_string()
}

pub fn month_start(reference: NaiveDate) -> NaiveDate {
    reference.with_day(1).unwrap_or(reference)
}

pub fn month_end(reference: NaiveDate) -> NaiveDate {
    let start = month_start(reference);
    start
        .checked_add_months(chrono::Months::new(1))
        .and_then(|next| next.checked_sub_days(Days::new(1)))
        .unwrap_or(start)
}

/// First day of the referenced month; unparsable or missing references fall
/// back to the month containing `today`.
pub fn parse_month_reference(reference: Option<&str>, today: NaiveDate) -> NaiveDate {
    let parsed = reference.and_then(|value| {
        let value = value.trim();
        parse_date_key(value)
            .or_else(|| NaiveDate::parse_from_str(&format!("{}-01", value), DATE_KEY_FORMAT).ok())
    });
    month_start(parsed.unwrap_or(today))
}

pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_time_key(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time_key(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid time key '{}'", raw)))
    }
}

pub mod hhmm_option {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(time) => serializer.serialize_some(&super::format_time_key(*time)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => super::parse_time_key(&raw)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid time key '{}'", raw))),
            None => Ok(None),
        }
    }
}
