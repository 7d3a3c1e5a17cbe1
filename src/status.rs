//! Status colouring
//!
//! A task's colour reflects how urgently it needs attention given its own
//! estimate, the load of other busy tasks and its miss history. Rules are
//! applied in order; the first terminal rule wins.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

use crate::config::StatusConfig;
use crate::task::{CompletionType, ConfirmationState, StatusColor, Task};
use crate::units::{self, MS_PER_HOUR, MS_PER_MINUTE};

/// Widest yellow window, reached at full sensitivity.
const MAX_YELLOW_WINDOW_HOURS: f64 = 1176.0;

/// Incomplete tasks due within a week that map to sensitivity 0 and 1.
const ADAPTIVE_MIN_LOAD: f64 = 70.0;
const ADAPTIVE_MAX_LOAD: f64 = 490.0;

/// Thresholds derived from the sensitivity value `s` in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensitivityParams {
    pub s: f64,
    pub yellow_window_ms: i64,
    pub yellow_buffer: f64,
    pub red_buffer: f64,
    pub miss_ratio: f64,
    pub default_estimate_ms: i64,
}

impl SensitivityParams {
    pub fn new(s: f64, config: &StatusConfig) -> Self {
        let s = if s.is_finite() { s.clamp(0.0, 1.0) } else { 0.5 };
        let base = config.yellow_window_hours;
        let window_hours = base + s * (MAX_YELLOW_WINDOW_HOURS - base).max(0.0);
        Self {
            s,
            yellow_window_ms: (window_hours * MS_PER_HOUR as f64) as i64,
            yellow_buffer: 2.0 + s * 8.0,
            red_buffer: 1.0 + s * 4.0,
            miss_ratio: 0.5 - s * 0.4,
            default_estimate_ms: i64::from(config.default_estimate_minutes) * MS_PER_MINUTE,
        }
    }
}

impl Default for SensitivityParams {
    fn default() -> Self {
        Self::new(0.0, &StatusConfig::default())
    }
}

/// Sensitivity from the number of incomplete tasks due in the next seven
/// days.
pub fn adaptive_sensitivity(tasks: &[Task], now: DateTime<Utc>) -> f64 {
    let horizon = now + Duration::days(7);
    let load = tasks
        .iter()
        .filter(|task| !task.completed)
        .filter(|task| task.due_date.is_some_and(|due| due > now && due <= horizon))
        .count() as f64;
    ((load - ADAPTIVE_MIN_LOAD) / (ADAPTIVE_MAX_LOAD - ADAPTIVE_MIN_LOAD)).clamp(0.0, 1.0)
}

fn ratio_black_or_red(task: &Task) -> StatusColor {
    if task.miss_ratio() > 0.5 {
        StatusColor::Black
    } else {
        StatusColor::Red
    }
}

fn estimate_or_default(task: &Task, params: &SensitivityParams) -> i64 {
    match task.estimate_ms() {
        0 => params.default_estimate_ms,
        ms => ms,
    }
}

/// Work left on a task, in milliseconds.
fn remaining_estimate_ms(task: &Task, params: &SensitivityParams) -> i64 {
    let estimate = estimate_or_default(task, params);
    match task.completion_type {
        CompletionType::Count if task.count_target.unwrap_or(0) > 0 => {
            let target = task.count_target.unwrap_or(1) as f64;
            let ratio = (task.current_progress / target).min(1.0);
            (estimate as f64 * (1.0 - ratio)) as i64
        }
        CompletionType::Time if task.time_target_amount.is_some() => {
            (task.time_target_ms() as f64 - task.current_progress).max(0.0) as i64
        }
        _ => estimate,
    }
}

/// Other tasks whose remaining work competes for the same time.
fn is_busy(other: &Task, task: &Task, now: DateTime<Utc>) -> bool {
    if other.id == task.id || !other.counts_as_busy || other.is_finished() {
        return false;
    }
    if other.status == StatusColor::Blue && other.cycle_end_date.is_some_and(|end| end > now) {
        return false;
    }
    if other.status == StatusColor::Black || other.confirmation_state.is_some() {
        return false;
    }
    other.due_date.is_some_and(|due| due > now)
}

/// Colour for `task` at `now`, given every task in the store.
pub fn calculate_status(
    task: &Task,
    now: DateTime<Utc>,
    all_tasks: &[Task],
    params: &SensitivityParams,
) -> StatusColor {
    if task.is_finished() {
        return StatusColor::Blue;
    }
    let ratio = task.miss_ratio();
    if task.tracks_miss_ratio() && ratio >= 1.0 {
        return StatusColor::Black;
    }
    match task.confirmation_state {
        Some(ConfirmationState::AwaitingOverdueInput) | Some(ConfirmationState::ConfirmingMiss) => {
            return ratio_black_or_red(task);
        }
        Some(ConfirmationState::ConfirmingComplete)
            if task.due_date.is_some_and(|due| due <= now) =>
        {
            return StatusColor::Red;
        }
        _ => {}
    }
    if task.status == StatusColor::Blue && task.cycle_end_date.is_some_and(|end| end > now) {
        return StatusColor::Blue;
    }

    let Some(due) = task.due_date else {
        return degrade(StatusColor::Green, task);
    };
    if due <= now {
        return ratio_black_or_red(task);
    }

    let due_ms = due.timestamp_millis();
    let now_ms = now.timestamp_millis();
    let time_until_due = due_ms - now_ms;
    let estimate = estimate_or_default(task, params);
    let yellow_lookahead = now_ms + params.yellow_window_ms;

    let mut relevant = 0i64;
    let mut yellow_and_red = 0i64;
    for other in all_tasks.iter().filter(|other| is_busy(other, task, now)) {
        let remaining = remaining_estimate_ms(other, params);
        match other.status {
            StatusColor::Yellow | StatusColor::Red => {
                relevant += remaining;
                yellow_and_red += remaining;
            }
            StatusColor::Green
                if other
                    .due_date
                    .is_some_and(|due| due.timestamp_millis() <= yellow_lookahead) =>
            {
                relevant += remaining;
            }
            _ => {}
        }
    }

    let mut status = StatusColor::Green;
    if now_ms + yellow_and_red > due_ms {
        status = StatusColor::Red;
    } else if now_ms + relevant > due_ms {
        status = StatusColor::Yellow;
    }
    if time_until_due <= estimate {
        status = StatusColor::Red;
    } else if status != StatusColor::Red && time_until_due <= estimate * 2 {
        status = StatusColor::Yellow;
    }
    degrade(status, task)
}

/// A miss ratio between one half and one pushes the colour one step
/// towards black.
fn degrade(status: StatusColor, task: &Task) -> StatusColor {
    if status == StatusColor::Black || !task.tracks_miss_ratio() {
        return status;
    }
    let ratio = task.miss_ratio();
    if ratio >= 1.0 {
        return StatusColor::Black;
    }
    if ratio > 0.5 {
        return match status {
            StatusColor::Red => StatusColor::Black,
            StatusColor::Yellow => StatusColor::Red,
            StatusColor::Green => StatusColor::Yellow,
            other => other,
        };
    }
    status
}

/// Buckets used when the task list is sorted by due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DueGroup {
    Overdue,
    NextHour,
    Next4Hours,
    Next8Hours,
    EndOfDay,
    EndOfTomorrow,
    EndOfWeek,
    EndOfMonth,
    EndOfQuarter,
    EndOfYear,
    Next5Years,
    Next10Years,
    Beyond10Years,
    Unscheduled,
}

impl DueGroup {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Overdue => "Overdue",
            Self::NextHour => "Next Hour",
            Self::Next4Hours => "Next 4 Hours",
            Self::Next8Hours => "Next 8 Hours",
            Self::EndOfDay => "End of Day",
            Self::EndOfTomorrow => "End of Tomorrow",
            Self::EndOfWeek => "End of Week",
            Self::EndOfMonth => "End of Month",
            Self::EndOfQuarter => "End of Quarter",
            Self::EndOfYear => "End of Year",
            Self::Next5Years => "Next 5 Years",
            Self::Next10Years => "Next 10 Years",
            Self::Beyond10Years => "Beyond 10 Years",
            Self::Unscheduled => "Unscheduled",
        }
    }

    /// Sort index; unscheduled tasks share the last slot.
    pub fn index(&self) -> u8 {
        match self {
            Self::Unscheduled => 12,
            other => *other as u8,
        }
    }
}

fn end_of_month(year: i32, month: u32, offset: FixedOffset) -> DateTime<Utc> {
    let last = NaiveDate::from_ymd_opt(year, month, units::days_in_month(year, month))
        .unwrap_or(NaiveDate::MAX);
    units::end_of_day(last, offset)
}

fn end_of_year(year: i32, offset: FixedOffset) -> DateTime<Utc> {
    end_of_month(year, 12, offset)
}

pub fn due_group(due: Option<DateTime<Utc>>, now: DateTime<Utc>, offset: FixedOffset) -> DueGroup {
    let Some(due) = due else {
        return DueGroup::Unscheduled;
    };
    let diff = (due - now).num_milliseconds();
    if diff <= 0 {
        return DueGroup::Overdue;
    }
    if diff <= MS_PER_HOUR {
        return DueGroup::NextHour;
    }
    if diff <= 4 * MS_PER_HOUR {
        return DueGroup::Next4Hours;
    }
    if diff <= 8 * MS_PER_HOUR {
        return DueGroup::Next8Hours;
    }

    let today = units::local_date(now, offset);
    if due <= units::end_of_day(today, offset) {
        return DueGroup::EndOfDay;
    }
    if due <= units::end_of_day(today + Duration::days(1), offset) {
        return DueGroup::EndOfTomorrow;
    }
    let saturday = units::week_start_sunday(today) + Duration::days(6);
    if due <= units::end_of_day(saturday, offset) {
        return DueGroup::EndOfWeek;
    }
    let (year, month) = (today.year(), today.month());
    if due <= end_of_month(year, month, offset) {
        return DueGroup::EndOfMonth;
    }
    let quarter_end_month = (month - 1) / 3 * 3 + 3;
    if due <= end_of_month(year, quarter_end_month, offset) {
        return DueGroup::EndOfQuarter;
    }
    if due <= end_of_year(year, offset) {
        return DueGroup::EndOfYear;
    }
    if due <= end_of_year(year + 5, offset) {
        return DueGroup::Next5Years;
    }
    if due <= end_of_year(year + 10, offset) {
        return DueGroup::Next10Years;
    }
    DueGroup::Beyond10Years
}

/// Human countdown such as `2d 3h`, `45m` or `overdue 1h 5m`.
pub fn countdown(due: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(due) = due else {
        return "-".to_string();
    };
    let diff = (due - now).num_milliseconds();
    let abs = diff.abs();
    let days = abs / units::MS_PER_DAY;
    let hours = (abs % units::MS_PER_DAY) / MS_PER_HOUR;
    let minutes = (abs % MS_PER_HOUR) / MS_PER_MINUTE;
    let body = if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    };
    if diff <= 0 {
        format!("overdue {body}")
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::RepetitionType;
    use crate::units::DurationUnit;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn now() -> DateTime<Utc> {
        utc("2025-09-20T10:00:00Z")
    }

    fn task(id: &str, due: &str, amount: i64, unit: DurationUnit) -> Task {
        let mut task = Task::new(id, id);
        task.due_date = Some(utc(due));
        task.estimated_duration_amount = Some(amount);
        task.estimated_duration_unit = Some(unit);
        task
    }

    fn status(task: &Task, others: &[Task]) -> StatusColor {
        calculate_status(task, now(), others, &SensitivityParams::default())
    }

    #[test]
    fn distant_task_is_green() {
        let task = task("1", "2025-09-21T12:00:00Z", 1, DurationUnit::Hours);
        assert_eq!(status(&task, &[]), StatusColor::Green);
    }

    #[test]
    fn past_due_task_is_red() {
        let task = task("2", "2025-09-20T09:00:00Z", 1, DurationUnit::Hours);
        assert_eq!(status(&task, &[]), StatusColor::Red);
    }

    #[test]
    fn busy_load_inside_yellow_window_turns_yellow() {
        let task = task("3", "2025-09-20T22:00:00Z", 30, DurationUnit::Minutes);
        let light = task_with_status("4", "2025-09-20T20:00:00Z", 10, StatusColor::Green);
        assert_eq!(status(&task, &[light]), StatusColor::Green);
        let heavy = task_with_status("6", "2025-09-20T20:00:00Z", 13, StatusColor::Green);
        assert_eq!(status(&task, &[heavy]), StatusColor::Yellow);
    }

    fn task_with_status(id: &str, due: &str, hours: i64, status: StatusColor) -> Task {
        let mut other = task(id, due, hours, DurationUnit::Hours);
        other.status = status;
        other
    }

    #[test]
    fn red_load_turns_red() {
        let task = task("3", "2025-09-20T22:00:00Z", 30, DurationUnit::Minutes);
        let red = task_with_status("5", "2025-09-20T20:00:00Z", 13, StatusColor::Red);
        assert_eq!(status(&task, &[red]), StatusColor::Red);
    }

    #[test]
    fn non_busy_tasks_do_not_count() {
        let task = task("3", "2025-09-20T22:00:00Z", 30, DurationUnit::Minutes);
        let mut other = task_with_status("5", "2025-09-20T20:00:00Z", 13, StatusColor::Red);
        other.counts_as_busy = false;
        assert_eq!(status(&task, &[other.clone()]), StatusColor::Green);
        other.counts_as_busy = true;
        other.confirmation_state = Some(ConfirmationState::ConfirmingDelete);
        assert_eq!(status(&task, &[other]), StatusColor::Green);
    }

    #[test]
    fn due_within_estimate_is_red_and_within_double_is_yellow() {
        let task_red = task("7", "2025-09-20T10:30:00Z", 1, DurationUnit::Hours);
        assert_eq!(status(&task_red, &[]), StatusColor::Red);
        let task_yellow = task("7", "2025-09-20T11:30:00Z", 1, DurationUnit::Hours);
        assert_eq!(status(&task_yellow, &[]), StatusColor::Yellow);
    }

    #[test]
    fn missing_estimate_defaults_to_thirty_minutes() {
        let mut task = Task::new("x", "x");
        task.due_date = Some(utc("2025-09-20T10:20:00Z"));
        task.estimated_duration_amount = None;
        assert_eq!(status(&task, &[]), StatusColor::Red);
    }

    #[test]
    fn completed_one_off_is_blue() {
        let mut task = task("8", "2025-09-19T10:00:00Z", 1, DurationUnit::Hours);
        task.completed = true;
        assert_eq!(status(&task, &[]), StatusColor::Blue);
    }

    #[test]
    fn max_misses_is_black() {
        let mut task = task("9", "2025-09-21T10:00:00Z", 1, DurationUnit::Hours);
        task.repetition_type = RepetitionType::Relative;
        task.max_misses = Some(3);
        task.misses = 3.0;
        assert_eq!(status(&task, &[]), StatusColor::Black);
    }

    #[test]
    fn high_miss_ratio_degrades_one_step() {
        let mut task = task("10", "2025-09-25T10:00:00Z", 1, DurationUnit::Hours);
        task.repetition_type = RepetitionType::Relative;
        task.max_misses = Some(4);
        task.misses = 3.0;
        assert_eq!(status(&task, &[]), StatusColor::Yellow);
        task.misses = 2.0;
        assert_eq!(status(&task, &[]), StatusColor::Green);
    }

    #[test]
    fn active_cycle_stays_blue() {
        let mut task = task("11", "2025-09-21T10:00:00Z", 1, DurationUnit::Hours);
        task.repetition_type = RepetitionType::Relative;
        task.status = StatusColor::Blue;
        task.cycle_end_date = Some(utc("2025-09-20T12:00:00Z"));
        assert_eq!(status(&task, &[]), StatusColor::Blue);
        task.cycle_end_date = Some(utc("2025-09-20T09:00:00Z"));
        assert_eq!(status(&task, &[]), StatusColor::Green);
    }

    #[test]
    fn awaiting_input_is_red_or_black() {
        let mut task = task("12", "2025-09-20T09:00:00Z", 1, DurationUnit::Hours);
        task.confirmation_state = Some(ConfirmationState::AwaitingOverdueInput);
        assert_eq!(status(&task, &[]), StatusColor::Red);
        task.repetition_type = RepetitionType::Relative;
        task.max_misses = Some(2);
        task.misses = 1.5;
        assert_eq!(status(&task, &[]), StatusColor::Black);
    }

    #[test]
    fn remaining_estimate_for_count_and_time_tasks() {
        let params = SensitivityParams::default();
        let mut count = task("c", "2025-09-21T10:00:00Z", 4, DurationUnit::Hours);
        count.completion_type = CompletionType::Count;
        count.count_target = Some(4);
        count.current_progress = 1.0;
        assert_eq!(remaining_estimate_ms(&count, &params), 3 * MS_PER_HOUR);

        let mut timed = task("t", "2025-09-21T10:00:00Z", 4, DurationUnit::Hours);
        timed.completion_type = CompletionType::Time;
        timed.time_target_amount = Some(2);
        timed.time_target_unit = Some(DurationUnit::Hours);
        timed.current_progress = MS_PER_HOUR as f64;
        assert_eq!(remaining_estimate_ms(&timed, &params), MS_PER_HOUR);
    }

    #[test]
    fn sensitivity_parameters_scale() {
        let config = StatusConfig::default();
        let low = SensitivityParams::new(0.0, &config);
        assert_eq!(low.yellow_window_ms, 16 * MS_PER_HOUR);
        assert_eq!(low.miss_ratio, 0.5);
        let high = SensitivityParams::new(1.0, &config);
        assert_eq!(high.yellow_window_ms, 1176 * MS_PER_HOUR);
        assert_eq!(high.yellow_buffer, 10.0);
        assert_eq!(high.red_buffer, 5.0);
        assert!((high.miss_ratio - 0.1).abs() < 1e-9);
    }

    #[test]
    fn adaptive_sensitivity_tracks_weekly_load() {
        let few: Vec<Task> = (0..10)
            .map(|i| task(&format!("t{i}"), "2025-09-22T10:00:00Z", 1, DurationUnit::Hours))
            .collect();
        assert_eq!(adaptive_sensitivity(&few, now()), 0.0);
        let many: Vec<Task> = (0..280)
            .map(|i| task(&format!("t{i}"), "2025-09-22T10:00:00Z", 1, DurationUnit::Hours))
            .collect();
        assert_eq!(adaptive_sensitivity(&many, now()), 0.5);
    }

    #[test]
    fn due_groups() {
        let offset = FixedOffset::east_opt(0).unwrap();
        // 2025-09-20 is a Saturday.
        let cases = [
            ("2025-09-20T09:00:00Z", DueGroup::Overdue),
            ("2025-09-20T10:30:00Z", DueGroup::NextHour),
            ("2025-09-20T13:00:00Z", DueGroup::Next4Hours),
            ("2025-09-20T17:00:00Z", DueGroup::Next8Hours),
            ("2025-09-20T23:00:00Z", DueGroup::EndOfDay),
            ("2025-09-21T12:00:00Z", DueGroup::EndOfTomorrow),
            ("2025-09-29T12:00:00Z", DueGroup::EndOfMonth),
            ("2025-11-01T12:00:00Z", DueGroup::EndOfYear),
            ("2028-06-01T12:00:00Z", DueGroup::Next5Years),
            ("2033-06-01T12:00:00Z", DueGroup::Next10Years),
            ("2040-06-01T12:00:00Z", DueGroup::Beyond10Years),
        ];
        for (due, expected) in cases {
            assert_eq!(due_group(Some(utc(due)), now(), offset), expected, "{due}");
        }
        assert_eq!(due_group(None, now(), offset), DueGroup::Unscheduled);
        assert_eq!(DueGroup::Unscheduled.index(), 12);

        let wednesday = utc("2025-09-17T10:00:00Z");
        assert_eq!(
            due_group(Some(utc("2025-09-20T20:00:00Z")), wednesday, offset),
            DueGroup::EndOfWeek
        );
        assert_eq!(
            due_group(Some(utc("2025-09-25T20:00:00Z")), wednesday, offset),
            DueGroup::EndOfMonth
        );

        // Mid-August: September is still inside the quarter.
        let august = utc("2025-08-10T10:00:00Z");
        assert_eq!(
            due_group(Some(utc("2025-09-15T12:00:00Z")), august, offset),
            DueGroup::EndOfQuarter
        );
    }

    #[test]
    fn countdown_labels() {
        assert_eq!(countdown(Some(utc("2025-09-22T13:00:00Z")), now()), "2d 3h");
        assert_eq!(countdown(Some(utc("2025-09-20T10:45:00Z")), now()), "45m");
        assert_eq!(countdown(Some(utc("2025-09-20T08:55:00Z")), now()), "overdue 1h 5m");
        assert_eq!(countdown(None, now()), "-");
    }
}
