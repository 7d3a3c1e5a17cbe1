//! Duration units and calendar-day helpers
//!
//! All timestamps are stored as UTC. Anything that depends on the wall
//! clock (midnight, weekday, month boundaries) is evaluated in the
//! configured fixed offset.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveTime, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};

pub const MS_PER_SECOND: i64 = 1_000;
pub const MS_PER_MINUTE: i64 = 60_000;
pub const MS_PER_HOUR: i64 = 3_600_000;
pub const MS_PER_DAY: i64 = 86_400_000;

/// Unit attached to every amount stored on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    #[serde(other)]
    Unknown,
}

impl DurationUnit {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "m" | "min" | "mins" | "minute" | "minutes" => Some(Self::Minutes),
            "h" | "hr" | "hrs" | "hour" | "hours" => Some(Self::Hours),
            "d" | "day" | "days" => Some(Self::Days),
            "w" | "wk" | "week" | "weeks" => Some(Self::Weeks),
            "mo" | "month" | "months" => Some(Self::Months),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
            Self::Weeks => "weeks",
            Self::Months => "months",
            Self::Unknown => "unknown",
        }
    }

    /// Fixed length of one unit. Months are approximated as 30 days.
    pub fn unit_ms(&self) -> i64 {
        match self {
            Self::Minutes => MS_PER_MINUTE,
            Self::Hours => MS_PER_HOUR,
            Self::Days => MS_PER_DAY,
            Self::Weeks => 7 * MS_PER_DAY,
            Self::Months => 30 * MS_PER_DAY,
            Self::Unknown => 0,
        }
    }
}

/// Length of `amount` units in milliseconds. Missing or non-positive
/// amounts are zero.
pub fn duration_ms(amount: Option<i64>, unit: Option<DurationUnit>) -> i64 {
    match (amount, unit) {
        (Some(amount), Some(unit)) if amount > 0 => {
            let ms = amount.saturating_mul(unit.unit_ms());
            if unit == DurationUnit::Unknown {
                tracing::warn!("unknown duration unit; treating as zero");
            }
            ms
        }
        _ => 0,
    }
}

pub fn duration(amount: Option<i64>, unit: Option<DurationUnit>) -> Duration {
    Duration::milliseconds(duration_ms(amount, unit))
}

/// Advance `base` by `amount` units on the calendar. Non-positive amounts
/// advance by one unit. Months keep the day of month, clamped to the
/// length of the target month. Returns `None` past the representable range.
pub fn add_calendar(
    amount: Option<i64>,
    unit: Option<DurationUnit>,
    base: DateTime<Utc>,
    offset: FixedOffset,
) -> Option<DateTime<Utc>> {
    let amount = match amount {
        Some(value) if value > 0 => value,
        _ => 1,
    };
    let step = match unit {
        Some(DurationUnit::Minutes) => Duration::try_minutes(amount),
        Some(DurationUnit::Hours) => Duration::try_hours(amount),
        Some(DurationUnit::Days) => Duration::try_days(amount),
        Some(DurationUnit::Weeks) => Duration::try_weeks(amount),
        Some(DurationUnit::Months) => {
            let months = u32::try_from(amount).ok()?;
            return base
                .with_timezone(&offset)
                .checked_add_months(Months::new(months))
                .map(|value| value.with_timezone(&Utc));
        }
        Some(DurationUnit::Unknown) | None => {
            tracing::warn!("cannot advance date without a known unit");
            return Some(base);
        }
    };
    base.checked_add_signed(step?)
}

/// Parse compact durations such as `30m`, `2h`, `1d`, `3w`, `1mo`, or
/// `45 minutes`.
pub fn parse_amount_unit(raw: &str) -> Option<(i64, DurationUnit)> {
    let value = raw.trim();
    let split = value
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: i64 = digits.parse().ok()?;
    let unit = if unit.trim().is_empty() {
        DurationUnit::Minutes
    } else {
        DurationUnit::parse(unit)?
    };
    Some((amount, unit))
}

/// Human label such as `30 minutes` or `1 hour`.
pub fn format_amount(amount: Option<i64>, unit: Option<DurationUnit>) -> String {
    match (amount, unit) {
        (Some(amount), Some(unit)) => {
            let name = unit.as_str();
            if amount == 1 {
                format!("1 {}", name.trim_end_matches('s'))
            } else {
                format!("{amount} {name}")
            }
        }
        _ => "-".to_string(),
    }
}

/// Render milliseconds as `HH:MM:SS`.
pub fn format_hms(ms: i64) -> String {
    let total = ms.max(0) / MS_PER_SECOND;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// JavaScript-compatible ISO rendering (`2025-06-02T04:30:00.000Z`), used
/// to key occurrences.
pub fn iso_millis(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

pub fn local_date(value: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    value.with_timezone(&offset).date_naive()
}

pub fn local_time(value: DateTime<Utc>, offset: FixedOffset) -> NaiveTime {
    value.with_timezone(&offset).time()
}

/// The UTC instant of `date` at `time` in `offset`.
pub fn at_local(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    match offset.from_local_datetime(&date.and_time(time)).single() {
        Some(value) => value.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&date.and_time(time)),
    }
}

pub fn start_of_day(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    at_local(date, NaiveTime::MIN, offset)
}

/// Last millisecond of `date`.
pub fn end_of_day(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    start_of_day(date, offset) + Duration::days(1) - Duration::milliseconds(1)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// Sunday that starts the week containing `date`.
pub fn week_start_sunday(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

/// Monday that starts the week containing `date`.
pub fn week_start_monday(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}
