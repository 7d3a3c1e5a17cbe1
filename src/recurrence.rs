//! Recurrence expansion
//!
//! A task repeats either relatively (every N units after the previous due
//! date) or absolutely (on weekdays, days of the month, or nth weekdays of
//! selected months). Absolute rules are evaluated day by day in the
//! configured offset and keep the time of day of the task's due date.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::task::Task;
use crate::units::{self, DurationUnit};

/// Upper bound on days scanned by one absolute expansion (ten years).
pub const MAX_SCAN_DAYS: i64 = 366 * 10;

/// Upper bound on generated relative occurrences per call.
pub const MAX_RELATIVE_OCCURRENCES: usize = 500;

/// Look-back used by calendar views so events starting before the view
/// but ending inside it are not lost.
pub const CALENDAR_LOOKBACK_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepetitionType {
    #[default]
    None,
    Relative,
    Absolute,
}

impl RepetitionType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "relative" => Some(Self::Relative),
            "absolute" => Some(Self::Absolute),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbsoluteFrequency {
    Weekly,
    Monthly,
    Yearly,
}

impl AbsoluteFrequency {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }
}

/// How monthly and yearly rules pick a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthlyMode {
    DayNumber,
    #[serde(other)]
    DayOfWeek,
}

/// A selected day of the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayOfMonth {
    Day(u32),
    Last,
    SecondLast,
    ThirdLast,
}

impl DayOfMonth {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "last" => Some(Self::Last),
            "second_last" => Some(Self::SecondLast),
            "third_last" => Some(Self::ThirdLast),
            other => other.parse::<u32>().ok().map(Self::Day),
        }
    }

    fn matches(&self, day: u32, month_len: u32) -> bool {
        match self {
            Self::Day(value) => *value == day,
            Self::Last => day == month_len,
            Self::SecondLast => day + 1 == month_len,
            Self::ThirdLast => day + 2 == month_len,
        }
    }
}

impl fmt::Display for DayOfMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day(value) => write!(f, "{value}"),
            Self::Last => f.write_str("last"),
            Self::SecondLast => f.write_str("second_last"),
            Self::ThirdLast => f.write_str("third_last"),
        }
    }
}

/// Which occurrence of a weekday within its month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NthOccurrence {
    Nth(u32),
    Last,
}

impl NthOccurrence {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "last" => Some(Self::Last),
            other => other.parse::<u32>().ok().map(Self::Nth),
        }
    }
}

impl fmt::Display for NthOccurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nth(value) => write!(f, "{value}"),
            Self::Last => f.write_str("last"),
        }
    }
}

/// Stored values are either numbers or keyword strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(i64),
    Text(String),
}

impl NumberOrText {
    fn into_text(self) -> String {
        match self {
            NumberOrText::Number(value) => value.to_string(),
            NumberOrText::Text(value) => value,
        }
    }
}

impl Serialize for DayOfMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Day(value) => serializer.serialize_u32(*value),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for DayOfMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = NumberOrText::deserialize(deserializer)?.into_text();
        // Unrecognised selections never match.
        Ok(DayOfMonth::parse(&raw).unwrap_or(DayOfMonth::Day(0)))
    }
}

impl Serialize for NthOccurrence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Nth(value) => serializer.serialize_u32(*value),
            Self::Last => serializer.serialize_str("last"),
        }
    }
}

impl<'de> Deserialize<'de> for NthOccurrence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = NumberOrText::deserialize(deserializer)?.into_text();
        Ok(NthOccurrence::parse(&raw).unwrap_or(NthOccurrence::Nth(0)))
    }
}

/// One calendar block: the task runs from `start` until it is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub start: DateTime<Utc>,
    pub due: DateTime<Utc>,
}

pub fn day_of_month_matches(date: NaiveDate, days: &[DayOfMonth]) -> bool {
    let month_len = units::days_in_month(date.year(), date.month());
    days.iter().any(|day| day.matches(date.day(), month_len))
}

/// Weekdays use 0 = Sunday. The occurrence number of a date is
/// `ceil(day / 7)`; `last` matches when a week later is another month.
pub fn nth_weekday_matches(date: NaiveDate, occurrences: &[NthOccurrence], weekdays: &[u8]) -> bool {
    if occurrences.is_empty() || weekdays.is_empty() {
        return false;
    }
    let weekday = date.weekday().num_days_from_sunday() as u8;
    if !weekdays.contains(&weekday) {
        return false;
    }
    let occurrence_number = date.day().div_ceil(7);
    occurrences.iter().any(|occurrence| match occurrence {
        NthOccurrence::Last => (date + Duration::days(7)).month() != date.month(),
        NthOccurrence::Nth(value) => *value == occurrence_number,
    })
}

fn absolute_day_matches(task: &Task, date: NaiveDate) -> bool {
    let Some(frequency) = task.repetition_absolute_frequency else {
        return false;
    };
    let month_index = date.month0() as u8;
    let weekday = date.weekday().num_days_from_sunday() as u8;
    match frequency {
        AbsoluteFrequency::Weekly => task
            .repetition_absolute_weekly_days
            .as_deref()
            .is_some_and(|days| days.contains(&weekday)),
        AbsoluteFrequency::Monthly => match task.repetition_absolute_monthly_mode {
            Some(MonthlyMode::DayNumber) => day_of_month_matches(
                date,
                task.repetition_absolute_days_of_month.as_deref().unwrap_or(&[]),
            ),
            _ => nth_weekday_matches(
                date,
                task.repetition_absolute_nth_weekday_occurrence
                    .as_deref()
                    .unwrap_or(&[]),
                task.repetition_absolute_nth_weekday_days.as_deref().unwrap_or(&[]),
            ),
        },
        AbsoluteFrequency::Yearly => {
            let month_selected = task
                .repetition_absolute_yearly_months
                .as_deref()
                .is_some_and(|months| months.contains(&month_index));
            if !month_selected {
                return false;
            }
            match task.repetition_absolute_yearly_mode {
                Some(MonthlyMode::DayNumber) => day_of_month_matches(
                    date,
                    task.repetition_absolute_yearly_days_of_month
                        .as_deref()
                        .unwrap_or(&[]),
                ),
                _ => nth_weekday_matches(
                    date,
                    task.repetition_absolute_yearly_nth_weekday_occurrence
                        .as_deref()
                        .unwrap_or(&[]),
                    task.repetition_absolute_yearly_nth_weekday_days
                        .as_deref()
                        .unwrap_or(&[]),
                ),
            }
        }
    }
}

/// Dates matching an absolute rule within `[start, end]`, sorted.
pub fn absolute_occurrences(
    task: &Task,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<DateTime<Utc>> {
    if task.repetition_type != RepetitionType::Absolute
        || task.repetition_absolute_frequency.is_none()
        || end < start
    {
        tracing::debug!(task = %task.id, "no absolute occurrences for invalid input");
        return Vec::new();
    }

    let time_source = task.due_date.unwrap_or(start);
    let time_of_day = units::local_time(time_source, offset);
    let end_date = units::local_date(end, offset);
    let mut current = units::local_date(start, offset);
    let mut scanned = 0;
    let mut found = Vec::new();

    while current <= end_date && scanned < MAX_SCAN_DAYS {
        scanned += 1;
        if absolute_day_matches(task, current) {
            let candidate = units::at_local(current, time_of_day, offset);
            if candidate >= start && candidate <= end {
                found.push(candidate);
            }
        }
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }

    if scanned >= MAX_SCAN_DAYS {
        tracing::warn!(task = %task.id, "absolute expansion hit the scan limit");
    }
    found.sort();
    found
}

fn relative_interval(task: &Task) -> i64 {
    units::duration_ms(task.repetition_amount, task.repetition_unit)
}

/// First relative due date at or after `floor`, stepping from `anchor` in
/// whole intervals in either direction.
fn first_relative_at_or_after(
    anchor: DateTime<Utc>,
    interval_ms: i64,
    floor: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let gap = (floor - anchor).num_milliseconds();
    let steps = if gap > 0 {
        (gap - 1) / interval_ms + 1
    } else {
        // Step backwards while staying at or after the floor.
        -((-gap) / interval_ms)
    };
    let shift = steps.checked_mul(interval_ms).and_then(Duration::try_milliseconds)?;
    anchor.checked_add_signed(shift)
}

/// Due dates of `task` within `[start, end]`.
pub fn occurrences(
    task: &Task,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<DateTime<Utc>> {
    let Some(due) = task.due_date else {
        return Vec::new();
    };

    match task.repetition_type {
        RepetitionType::None => {
            if due >= start && due <= end {
                vec![due]
            } else {
                Vec::new()
            }
        }
        RepetitionType::Absolute => absolute_occurrences(task, start, end, offset),
        RepetitionType::Relative => {
            let interval_ms = relative_interval(task);
            if interval_ms <= 0 {
                return Vec::new();
            }
            // Due dates before the due date already passed are not regenerated.
            let first = if due < start {
                first_relative_at_or_after(due, interval_ms, start)
            } else {
                Some(due)
            };
            let step = Duration::milliseconds(interval_ms);
            let mut found = Vec::new();
            let mut next = first;
            while let Some(current) = next {
                if current > end || found.len() >= MAX_RELATIVE_OCCURRENCES {
                    break;
                }
                found.push(current);
                next = current.checked_add_signed(step);
            }
            found
        }
    }
}

/// Calendar blocks overlapping `(view_start, view_end)`.
///
/// Relative tasks are projected both backwards and forwards from their
/// due date so past weeks show the rhythm of the task too.
pub fn calendar_occurrences(
    task: &Task,
    view_start: DateTime<Utc>,
    view_end: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<Occurrence> {
    let Some(due) = task.due_date else {
        return Vec::new();
    };
    let length = units::duration(task.estimated_duration_amount, task.estimated_duration_unit);
    let expanded_start = view_start - Duration::hours(CALENDAR_LOOKBACK_HOURS);

    let candidates = match task.repetition_type {
        RepetitionType::None => vec![due],
        RepetitionType::Absolute => absolute_occurrences(task, expanded_start, view_end, offset),
        RepetitionType::Relative => {
            let interval_ms = relative_interval(task);
            if interval_ms <= 0 {
                Vec::new()
            } else {
                let step = Duration::milliseconds(interval_ms);
                let mut next = first_relative_at_or_after(due, interval_ms, expanded_start);
                let mut found = Vec::new();
                while let Some(current) = next {
                    if current >= view_end || found.len() >= MAX_RELATIVE_OCCURRENCES {
                        break;
                    }
                    found.push(current);
                    next = current.checked_add_signed(step);
                }
                found
            }
        }
    };

    candidates
        .into_iter()
        .filter_map(|due| {
            Some(Occurrence {
                start: due.checked_sub_signed(length)?,
                due,
            })
        })
        .filter(|occurrence| occurrence.start < view_end && occurrence.due > view_start)
        .collect()
}

/// Number of cycles that elapsed since the task became overdue, counting
/// the overdue cycle itself. Non-repeating tasks have none.
pub fn pending_cycles(task: &Task, now: DateTime<Utc>, offset: FixedOffset) -> u32 {
    let Some(base) = task.overdue_start_date.or(task.due_date) else {
        tracing::warn!(task = %task.id, "cannot count pending cycles without a due date");
        return 0;
    };
    if task.repetition_type == RepetitionType::None || base >= now {
        return 0;
    }

    match task.repetition_type {
        RepetitionType::Relative => {
            let interval_ms = relative_interval(task);
            if interval_ms <= 0 {
                tracing::warn!(task = %task.id, "invalid relative interval; assuming one cycle");
                return 1;
            }
            let elapsed = (now - base).num_milliseconds();
            u32::try_from(elapsed / interval_ms)
                .unwrap_or(u32::MAX - 1)
                .saturating_add(1)
        }
        RepetitionType::Absolute => {
            let missed = absolute_occurrences(task, base, now, offset)
                .into_iter()
                .filter(|occurrence| *occurrence > base && *occurrence <= now)
                .count();
            u32::try_from(missed).unwrap_or(u32::MAX - 1) + 1
        }
        RepetitionType::None => 0,
    }
}

/// Due date after `cycles` cycles counted from `base`. Returns `None` for
/// absolute rules with no such occurrence within five years.
pub fn advance_due_date(
    task: &Task,
    base: DateTime<Utc>,
    cycles: u32,
    offset: FixedOffset,
) -> Option<DateTime<Utc>> {
    let cycles = cycles.max(1);
    match task.repetition_type {
        RepetitionType::None => None,
        RepetitionType::Relative => {
            let mut current = base;
            for _ in 0..cycles {
                current = units::add_calendar(
                    task.repetition_amount,
                    task.repetition_unit.or(Some(DurationUnit::Days)),
                    current,
                    offset,
                )?;
            }
            Some(current)
        }
        RepetitionType::Absolute => {
            let local_year = base.with_timezone(&offset).year();
            let horizon_date = NaiveDate::from_ymd_opt(local_year + 5, 1, 1)?;
            let horizon = units::start_of_day(horizon_date, offset);
            let future = absolute_occurrences(
                task,
                base + Duration::milliseconds(1),
                horizon,
                offset,
            );
            future.get(cycles as usize - 1).copied()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    fn zero() -> FixedOffset {
        FixedOffset::east_opt(0).expect("offset")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    fn weekly(days: &[u8], due: &str) -> Task {
        let mut task = Task::new("_weekly", "Weekly");
        task.due_date = Some(utc(due));
        task.repetition_type = RepetitionType::Absolute;
        task.repetition_absolute_frequency = Some(AbsoluteFrequency::Weekly);
        task.repetition_absolute_weekly_days = Some(days.to_vec());
        task
    }

    fn relative(hours: i64, due: &str) -> Task {
        let mut task = Task::new("_rel", "Relative");
        task.due_date = Some(utc(due));
        task.repetition_type = RepetitionType::Relative;
        task.repetition_amount = Some(hours);
        task.repetition_unit = Some(DurationUnit::Hours);
        task
    }

    #[test]
    fn day_of_month_keywords() {
        let last = [DayOfMonth::Last];
        assert!(day_of_month_matches(date(2024, 2, 29), &last));
        assert!(!day_of_month_matches(date(2025, 2, 27), &last));
        assert!(day_of_month_matches(date(2025, 2, 27), &[DayOfMonth::SecondLast]));
        assert!(day_of_month_matches(date(2025, 4, 28), &[DayOfMonth::ThirdLast]));
        assert!(day_of_month_matches(date(2025, 4, 15), &[DayOfMonth::Day(15)]));
    }

    #[test]
    fn nth_weekday_rules() {
        // 2025-09-08 is the second Monday of September.
        assert!(nth_weekday_matches(date(2025, 9, 8), &[NthOccurrence::Nth(2)], &[1]));
        assert!(!nth_weekday_matches(date(2025, 9, 8), &[NthOccurrence::Nth(1)], &[1]));
        // 2025-09-29 is the last Monday.
        assert!(nth_weekday_matches(date(2025, 9, 29), &[NthOccurrence::Last], &[1]));
        assert!(!nth_weekday_matches(date(2025, 9, 22), &[NthOccurrence::Last], &[1]));
        assert!(!nth_weekday_matches(date(2025, 9, 8), &[], &[1]));
    }

    #[test]
    fn selection_serde_accepts_numbers_and_keywords() {
        let days: Vec<DayOfMonth> = serde_json::from_str(r#"[1, "15", "last"]"#).unwrap();
        assert_eq!(days, vec![DayOfMonth::Day(1), DayOfMonth::Day(15), DayOfMonth::Last]);
        assert_eq!(serde_json::to_string(&days).unwrap(), r#"[1,15,"last"]"#);
    }

    #[test]
    fn weekly_occurrences_keep_time_of_day() {
        // Mondays and Wednesdays at 09:30.
        let task = weekly(&[1, 3], "2025-09-01T09:30:00Z");
        let found = absolute_occurrences(
            &task,
            utc("2025-09-01T00:00:00Z"),
            utc("2025-09-10T23:59:59Z"),
            zero(),
        );
        assert_eq!(
            found,
            vec![
                utc("2025-09-01T09:30:00Z"),
                utc("2025-09-03T09:30:00Z"),
                utc("2025-09-08T09:30:00Z"),
                utc("2025-09-10T09:30:00Z"),
            ]
        );
    }

    #[test]
    fn absolute_occurrences_respect_window_edges() {
        let task = weekly(&[1], "2025-09-01T09:30:00Z");
        let found = absolute_occurrences(
            &task,
            utc("2025-09-01T10:00:00Z"),
            utc("2025-09-08T09:00:00Z"),
            zero(),
        );
        assert!(found.is_empty());
    }

    #[test]
    fn yearly_last_day_of_february() {
        let mut task = Task::new("_y", "Yearly");
        task.due_date = Some(utc("2024-01-01T08:00:00Z"));
        task.repetition_type = RepetitionType::Absolute;
        task.repetition_absolute_frequency = Some(AbsoluteFrequency::Yearly);
        task.repetition_absolute_yearly_months = Some(vec![1]);
        task.repetition_absolute_yearly_mode = Some(MonthlyMode::DayNumber);
        task.repetition_absolute_yearly_days_of_month = Some(vec![DayOfMonth::Last]);
        let found = absolute_occurrences(
            &task,
            utc("2024-01-01T00:00:00Z"),
            utc("2025-12-31T00:00:00Z"),
            zero(),
        );
        assert_eq!(
            found,
            vec![utc("2024-02-29T08:00:00Z"), utc("2025-02-28T08:00:00Z")]
        );
    }

    #[test]
    fn non_repeating_occurs_once_inside_window() {
        let mut task = Task::new("_n", "Once");
        task.due_date = Some(utc("2025-06-01T12:00:00Z"));
        let inside = occurrences(&task, utc("2025-06-01T00:00:00Z"), utc("2025-06-02T00:00:00Z"), zero());
        assert_eq!(inside, vec![utc("2025-06-01T12:00:00Z")]);
        let outside = occurrences(&task, utc("2025-06-02T00:00:00Z"), utc("2025-06-03T00:00:00Z"), zero());
        assert!(outside.is_empty());
    }

    #[test]
    fn relative_occurrences_skip_forward_to_window() {
        let task = relative(24, "2025-06-01T04:30:00Z");
        let found = occurrences(
            &task,
            utc("2025-06-01T12:00:00Z"),
            utc("2025-06-05T00:00:00Z"),
            zero(),
        );
        assert_eq!(
            found,
            vec![
                utc("2025-06-02T04:30:00Z"),
                utc("2025-06-03T04:30:00Z"),
                utc("2025-06-04T04:30:00Z"),
            ]
        );
    }

    #[test]
    fn relative_occurrences_are_capped() {
        let mut task = relative(1, "2025-01-01T00:00:00Z");
        task.repetition_unit = Some(DurationUnit::Minutes);
        let found = occurrences(
            &task,
            utc("2025-01-01T00:00:00Z"),
            utc("2025-12-31T00:00:00Z"),
            zero(),
        );
        assert_eq!(found.len(), MAX_RELATIVE_OCCURRENCES);
    }

    #[test]
    fn calendar_occurrences_walk_backwards() {
        let mut task = relative(24, "2025-06-10T10:00:00Z");
        task.estimated_duration_amount = Some(2);
        task.estimated_duration_unit = Some(DurationUnit::Hours);
        let found = calendar_occurrences(
            &task,
            utc("2025-06-02T00:00:00Z"),
            utc("2025-06-04T00:00:00Z"),
            zero(),
        );
        assert_eq!(
            found,
            vec![
                Occurrence {
                    start: utc("2025-06-02T08:00:00Z"),
                    due: utc("2025-06-02T10:00:00Z"),
                },
                Occurrence {
                    start: utc("2025-06-03T08:00:00Z"),
                    due: utc("2025-06-03T10:00:00Z"),
                },
            ]
        );
    }

    #[test]
    fn calendar_occurrences_include_blocks_crossing_view_start() {
        let mut task = Task::new("_sleep", "Sleep");
        task.due_date = Some(utc("2025-06-02T04:30:00Z"));
        task.estimated_duration_amount = Some(8);
        task.estimated_duration_unit = Some(DurationUnit::Hours);
        let found = calendar_occurrences(
            &task,
            utc("2025-06-02T00:00:00Z"),
            utc("2025-06-03T00:00:00Z"),
            zero(),
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start, utc("2025-06-01T20:30:00Z"));
    }

    #[test]
    fn pending_cycles_relative() {
        let task = relative(24, "2025-06-01T10:00:00Z");
        assert_eq!(pending_cycles(&task, utc("2025-06-01T11:00:00Z"), zero()), 1);
        assert_eq!(pending_cycles(&task, utc("2025-06-03T11:00:00Z"), zero()), 3);
        assert_eq!(pending_cycles(&task, utc("2025-05-31T11:00:00Z"), zero()), 0);
    }

    #[test]
    fn pending_cycles_absolute_counts_missed_occurrences() {
        let task = weekly(&[1, 3], "2025-09-01T09:30:00Z");
        // Missed Sep 3 and Sep 8 after the overdue Monday.
        assert_eq!(pending_cycles(&task, utc("2025-09-09T12:00:00Z"), zero()), 3);
    }

    #[test]
    fn pending_cycles_non_repeating_is_zero() {
        let mut task = Task::new("_n", "Once");
        task.due_date = Some(utc("2025-06-01T10:00:00Z"));
        assert_eq!(pending_cycles(&task, utc("2025-06-05T10:00:00Z"), zero()), 0);
    }

    #[test]
    fn advance_relative_and_absolute() {
        let task = relative(24, "2025-06-01T10:00:00Z");
        assert_eq!(
            advance_due_date(&task, utc("2025-06-01T10:00:00Z"), 2, zero()),
            Some(utc("2025-06-03T10:00:00Z"))
        );

        let task = weekly(&[1, 3], "2025-09-01T09:30:00Z");
        assert_eq!(
            advance_due_date(&task, utc("2025-09-01T09:30:00Z"), 1, zero()),
            Some(utc("2025-09-03T09:30:00Z"))
        );
        assert_eq!(
            advance_due_date(&task, utc("2025-09-01T09:30:00Z"), 3, zero()),
            Some(utc("2025-09-10T09:30:00Z"))
        );
    }

    #[test]
    fn oversized_intervals_stop_instead_of_overflowing() {
        let mut task = relative(i64::MAX, "2025-06-01T10:00:00Z");
        assert_eq!(
            occurrences(&task, utc("2025-06-01T00:00:00Z"), utc("2025-06-02T00:00:00Z"), zero()),
            vec![utc("2025-06-01T10:00:00Z")]
        );
        assert_eq!(advance_due_date(&task, utc("2025-06-01T10:00:00Z"), 1, zero()), None);

        task.estimated_duration_amount = Some(i64::MAX);
        task.estimated_duration_unit = Some(DurationUnit::Minutes);
        let found = calendar_occurrences(
            &task,
            utc("2025-06-01T00:00:00Z"),
            utc("2025-06-02T00:00:00Z"),
            zero(),
        );
        assert!(found.is_empty());
    }
}
