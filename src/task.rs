//! Task model
//!
//! Tasks are persisted under the `tasks` key as camelCase JSON. Older
//! exports store amounts as strings and dates without an offset, so the
//! model deserializes leniently and always writes canonical values back.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::config::IdsConfig;
use crate::error::{Error, Result};
use crate::recurrence::{AbsoluteFrequency, DayOfMonth, MonthlyMode, NthOccurrence, RepetitionType};
use crate::units::{self, DurationUnit};

pub const DEFAULT_TASK_NAME: &str = "Unnamed Task";

/// Display colour of a task. Unknown colours read as green.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    Black,
    Red,
    Yellow,
    Blue,
    #[default]
    #[serde(other)]
    Green,
}

impl StatusColor {
    pub const ALL: [StatusColor; 5] = [
        StatusColor::Black,
        StatusColor::Red,
        StatusColor::Yellow,
        StatusColor::Green,
        StatusColor::Blue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Blue => "blue",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(raw.trim()))
    }

    /// Sort rank used by status ordering (black first).
    pub fn rank(&self) -> u8 {
        match self {
            Self::Black => 0,
            Self::Red => 1,
            Self::Yellow => 2,
            Self::Green => 3,
            Self::Blue => 4,
        }
    }
}

impl std::fmt::Display for StatusColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pending confirmation prompt on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationState {
    AwaitingOverdueInput,
    ConfirmingComplete,
    ConfirmingMiss,
    ConfirmingUndo,
    ConfirmingDelete,
}

impl ConfirmationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingOverdueInput => "awaiting_overdue_input",
            Self::ConfirmingComplete => "confirming_complete",
            Self::ConfirmingMiss => "confirming_miss",
            Self::ConfirmingUndo => "confirming_undo",
            Self::ConfirmingDelete => "confirming_delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionType {
    Count,
    Time,
    #[default]
    #[serde(other)]
    Simple,
}

/// Per-occurrence edits saved from the calendar. Fields left out fall
/// back to the task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceOverride {
    #[serde(
        default,
        with = "lenient::opt_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "lenient::opt_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub occurrence_due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub estimated_duration_amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_unit: Option<DurationUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_appointment: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl OccurrenceOverride {
    /// The moved due date, preferring the occurrence-specific field.
    pub fn effective_due(&self) -> Option<DateTime<Utc>> {
        self.occurrence_due_date.or(self.due_date)
    }
}

fn default_name() -> String {
    DEFAULT_TASK_NAME.to_string()
}

fn default_true() -> bool {
    true
}

fn default_estimate_unit() -> Option<DurationUnit> {
    Some(DurationUnit::Minutes)
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default, with = "lenient::opt_datetime")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient::opt_datetime")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub repetition_type: RepetitionType,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub repetition_amount: Option<i64>,
    #[serde(default)]
    pub repetition_unit: Option<DurationUnit>,
    #[serde(default)]
    pub repetition_absolute_frequency: Option<AbsoluteFrequency>,
    #[serde(default)]
    pub repetition_absolute_weekly_days: Option<Vec<u8>>,
    #[serde(default)]
    pub repetition_absolute_monthly_mode: Option<MonthlyMode>,
    #[serde(default)]
    pub repetition_absolute_days_of_month: Option<Vec<DayOfMonth>>,
    #[serde(default)]
    pub repetition_absolute_nth_weekday_occurrence: Option<Vec<NthOccurrence>>,
    #[serde(default)]
    pub repetition_absolute_nth_weekday_days: Option<Vec<u8>>,
    #[serde(default)]
    pub repetition_absolute_yearly_months: Option<Vec<u8>>,
    #[serde(default)]
    pub repetition_absolute_yearly_mode: Option<MonthlyMode>,
    #[serde(default)]
    pub repetition_absolute_yearly_days_of_month: Option<Vec<DayOfMonth>>,
    #[serde(default)]
    pub repetition_absolute_yearly_nth_weekday_occurrence: Option<Vec<NthOccurrence>>,
    #[serde(default)]
    pub repetition_absolute_yearly_nth_weekday_days: Option<Vec<u8>>,

    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub estimated_duration_amount: Option<i64>,
    #[serde(default = "default_estimate_unit")]
    pub estimated_duration_unit: Option<DurationUnit>,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub prep_time_amount: Option<i64>,
    #[serde(default)]
    pub prep_time_unit: Option<DurationUnit>,

    #[serde(default)]
    pub status: StatusColor,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub misses: f64,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub max_misses: Option<i64>,
    #[serde(default = "default_true")]
    pub track_misses: bool,
    #[serde(default)]
    pub confirmation_state: Option<ConfirmationState>,
    #[serde(
        default,
        with = "lenient::opt_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub overdue_start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_cycles: Option<u32>,
    #[serde(default, with = "lenient::opt_datetime")]
    pub cycle_end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub completion_reduced_misses: bool,

    #[serde(default)]
    pub completion_type: CompletionType,
    /// Count for count tasks, milliseconds for time tasks.
    #[serde(default)]
    pub current_progress: f64,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub count_target: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub time_target_amount: Option<i64>,
    #[serde(default)]
    pub time_target_unit: Option<DurationUnit>,
    #[serde(default)]
    pub is_timer_running: bool,
    #[serde(default, with = "lenient::opt_datetime")]
    pub timer_last_started: Option<DateTime<Utc>>,

    #[serde(default = "default_true")]
    pub counts_as_busy: bool,
    #[serde(default)]
    pub is_appointment: bool,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub is_kpi: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub occurrence_overrides: BTreeMap<String, OccurrenceOverride>,

    /// Pre-amount estimate in minutes kept by old data files.
    #[serde(
        default,
        deserialize_with = "lenient::opt_amount",
        skip_serializing
    )]
    pub estimated_duration: Option<i64>,
}

impl Task {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            icon: None,
            due_date: None,
            created_at: None,
            repetition_type: RepetitionType::None,
            repetition_amount: None,
            repetition_unit: None,
            repetition_absolute_frequency: None,
            repetition_absolute_weekly_days: None,
            repetition_absolute_monthly_mode: None,
            repetition_absolute_days_of_month: None,
            repetition_absolute_nth_weekday_occurrence: None,
            repetition_absolute_nth_weekday_days: None,
            repetition_absolute_yearly_months: None,
            repetition_absolute_yearly_mode: None,
            repetition_absolute_yearly_days_of_month: None,
            repetition_absolute_yearly_nth_weekday_occurrence: None,
            repetition_absolute_yearly_nth_weekday_days: None,
            estimated_duration_amount: None,
            estimated_duration_unit: Some(DurationUnit::Minutes),
            prep_time_amount: None,
            prep_time_unit: None,
            status: StatusColor::Green,
            completed: false,
            misses: 0.0,
            max_misses: None,
            track_misses: true,
            confirmation_state: None,
            overdue_start_date: None,
            pending_cycles: None,
            cycle_end_date: None,
            completion_reduced_misses: false,
            completion_type: CompletionType::Simple,
            current_progress: 0.0,
            count_target: None,
            time_target_amount: None,
            time_target_unit: None,
            is_timer_running: false,
            timer_last_started: None,
            counts_as_busy: true,
            is_appointment: false,
            category_id: None,
            is_kpi: false,
            occurrence_overrides: BTreeMap::new(),
            estimated_duration: None,
        }
    }

    pub fn is_repeating(&self) -> bool {
        self.repetition_type != RepetitionType::None
    }

    pub fn is_finished(&self) -> bool {
        !self.is_repeating() && self.completed
    }

    /// Whether misses count against this task.
    pub fn tracks_miss_ratio(&self) -> bool {
        self.is_repeating() && self.track_misses && self.max_misses.unwrap_or(0) > 0
    }

    /// `misses / maxMisses`, or zero when misses are not tracked.
    pub fn miss_ratio(&self) -> f64 {
        if !self.tracks_miss_ratio() {
            return 0.0;
        }
        self.misses / self.max_misses.unwrap_or(1) as f64
    }

    pub fn estimate_ms(&self) -> i64 {
        units::duration_ms(self.estimated_duration_amount, self.estimated_duration_unit)
    }

    pub fn prep_ms(&self) -> i64 {
        units::duration_ms(self.prep_time_amount, self.prep_time_unit)
    }

    pub fn time_target_ms(&self) -> i64 {
        units::duration_ms(self.time_target_amount, self.time_target_unit)
    }

    /// Progress target in the unit of `current_progress`, if any.
    pub fn progress_target(&self) -> Option<f64> {
        match self.completion_type {
            CompletionType::Count => self
                .count_target
                .filter(|target| *target > 0)
                .map(|target| target as f64),
            CompletionType::Time => {
                let target = self.time_target_ms();
                (target > 0).then_some(target as f64)
            }
            CompletionType::Simple => None,
        }
    }

    /// Fraction of the target reached, clamped to `[0, 1]`.
    pub fn progress_ratio(&self) -> f64 {
        match self.progress_target() {
            Some(target) => (self.current_progress / target).clamp(0.0, 1.0),
            None => 0.0,
        }
    }

    pub fn repeat_label(&self) -> String {
        match self.repetition_type {
            RepetitionType::None => "once".to_string(),
            RepetitionType::Relative => format!(
                "every {}",
                units::format_amount(self.repetition_amount, self.repetition_unit)
            ),
            RepetitionType::Absolute => match self.repetition_absolute_frequency {
                Some(AbsoluteFrequency::Weekly) => "weekly".to_string(),
                Some(AbsoluteFrequency::Monthly) => "monthly".to_string(),
                Some(AbsoluteFrequency::Yearly) => "yearly".to_string(),
                None => "absolute".to_string(),
            },
        }
    }

    /// Clear fields that do not apply to the task's repetition and
    /// completion type, and upgrade legacy fields.
    pub fn sanitize(&mut self) {
        if self.name.trim().is_empty() {
            self.name = default_name();
        }
        if let Some(legacy) = self.estimated_duration.take() {
            if self.estimated_duration_amount.is_none() {
                self.estimated_duration_amount = Some(legacy);
                self.estimated_duration_unit = Some(DurationUnit::Minutes);
            }
        }
        if self.repetition_type == RepetitionType::None {
            self.max_misses = None;
        }
        if self.repetition_type != RepetitionType::Relative {
            self.repetition_amount = None;
            self.repetition_unit = None;
        }
        if self.repetition_type != RepetitionType::Absolute {
            self.clear_absolute_rule();
        }
        if self.completion_type != CompletionType::Count {
            self.count_target = None;
        }
        if self.completion_type != CompletionType::Time {
            self.time_target_amount = None;
            self.time_target_unit = None;
            self.is_timer_running = false;
            self.timer_last_started = None;
        }
        if !self.misses.is_finite() || self.misses < 0.0 {
            self.misses = 0.0;
        }
        if !self.current_progress.is_finite() || self.current_progress < 0.0 {
            self.current_progress = 0.0;
        }
    }

    pub fn clear_absolute_rule(&mut self) {
        self.repetition_absolute_frequency = None;
        self.repetition_absolute_weekly_days = None;
        self.repetition_absolute_monthly_mode = None;
        self.repetition_absolute_days_of_month = None;
        self.repetition_absolute_nth_weekday_occurrence = None;
        self.repetition_absolute_nth_weekday_days = None;
        self.repetition_absolute_yearly_months = None;
        self.repetition_absolute_yearly_mode = None;
        self.repetition_absolute_yearly_days_of_month = None;
        self.repetition_absolute_yearly_nth_weekday_occurrence = None;
        self.repetition_absolute_yearly_nth_weekday_days = None;
    }

    /// Clear the overdue bookkeeping and any pending prompt.
    pub fn clear_pending(&mut self) {
        self.confirmation_state = None;
        self.overdue_start_date = None;
        self.pending_cycles = None;
    }
}

/// Repetition rule parsed from the CLI.
///
/// Grammar: `none`, `every:<amount><unit>`, `weekly:<days>`,
/// `monthly:day:<days-of-month>`, `monthly:nth:<occurrences>:<weekdays>`,
/// `yearly:<months>:day:<days-of-month>`,
/// `yearly:<months>:nth:<occurrences>:<weekdays>`.
#[derive(Debug, Clone, PartialEq)]
pub enum RepeatSpec {
    None,
    Every(i64, DurationUnit),
    Weekly(Vec<u8>),
    MonthlyDays(Vec<DayOfMonth>),
    MonthlyNth(Vec<NthOccurrence>, Vec<u8>),
    YearlyDays(Vec<u8>, Vec<DayOfMonth>),
    YearlyNth(Vec<u8>, Vec<NthOccurrence>, Vec<u8>),
}

const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];
const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn parse_list<T>(raw: &str, label: &str, parse: impl Fn(&str) -> Option<T>) -> Result<Vec<T>> {
    let mut values = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let value = parse(part)
            .ok_or_else(|| Error::InvalidArgument(format!("invalid {label} '{part}'")))?;
        values.push(value);
    }
    if values.is_empty() {
        return Err(Error::InvalidArgument(format!("{label} list cannot be empty")));
    }
    Ok(values)
}

fn parse_weekday(raw: &str) -> Option<u8> {
    let lower = raw.to_ascii_lowercase();
    if let Ok(index) = lower.parse::<u8>() {
        return (index < 7).then_some(index);
    }
    WEEKDAY_NAMES
        .iter()
        .position(|name| lower.starts_with(name))
        .map(|index| index as u8)
}

fn parse_month(raw: &str) -> Option<u8> {
    let lower = raw.to_ascii_lowercase();
    if let Ok(number) = lower.parse::<u8>() {
        return (1..=12).contains(&number).then_some(number - 1);
    }
    MONTH_NAMES
        .iter()
        .position(|name| lower.starts_with(name))
        .map(|index| index as u8)
}

fn parse_nth(raw: &str) -> Option<NthOccurrence> {
    let trimmed = if raw.starts_with(|ch: char| ch.is_ascii_digit()) {
        raw.trim_end_matches(|ch: char| ch.is_ascii_alphabetic())
    } else {
        raw
    };
    match NthOccurrence::parse(trimmed) {
        Some(NthOccurrence::Nth(value)) if !(1..=5).contains(&value) => None,
        other => other,
    }
}

fn parse_day_of_month(raw: &str) -> Option<DayOfMonth> {
    match DayOfMonth::parse(raw) {
        Some(DayOfMonth::Day(value)) if !(1..=31).contains(&value) => None,
        other => other,
    }
}

impl RepeatSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        let value = raw.trim();
        let parts: Vec<&str> = value.split(':').map(str::trim).collect();
        let invalid = || Error::InvalidArgument(format!("invalid repeat rule '{value}'"));
        match parts.as_slice() {
            ["none"] => Ok(Self::None),
            ["every", amount] => {
                let (amount, unit) = units::parse_amount_unit(amount).ok_or_else(invalid)?;
                if amount <= 0 {
                    return Err(Error::InvalidArgument(
                        "repeat interval must be positive".to_string(),
                    ));
                }
                Ok(Self::Every(amount, unit))
            }
            ["weekly", days] => Ok(Self::Weekly(parse_list(days, "weekday", parse_weekday)?)),
            ["monthly", "day", days] => Ok(Self::MonthlyDays(parse_list(
                days,
                "day of month",
                parse_day_of_month,
            )?)),
            ["monthly", "nth", occurrences, days] => Ok(Self::MonthlyNth(
                parse_list(occurrences, "occurrence", parse_nth)?,
                parse_list(days, "weekday", parse_weekday)?,
            )),
            ["yearly", months, "day", days] => Ok(Self::YearlyDays(
                parse_list(months, "month", parse_month)?,
                parse_list(days, "day of month", parse_day_of_month)?,
            )),
            ["yearly", months, "nth", occurrences, days] => Ok(Self::YearlyNth(
                parse_list(months, "month", parse_month)?,
                parse_list(occurrences, "occurrence", parse_nth)?,
                parse_list(days, "weekday", parse_weekday)?,
            )),
            _ => Err(invalid()),
        }
    }

    pub fn apply(&self, task: &mut Task) {
        task.repetition_amount = None;
        task.repetition_unit = None;
        task.clear_absolute_rule();
        match self {
            Self::None => task.repetition_type = RepetitionType::None,
            Self::Every(amount, unit) => {
                task.repetition_type = RepetitionType::Relative;
                task.repetition_amount = Some(*amount);
                task.repetition_unit = Some(*unit);
            }
            Self::Weekly(days) => {
                task.repetition_type = RepetitionType::Absolute;
                task.repetition_absolute_frequency = Some(AbsoluteFrequency::Weekly);
                task.repetition_absolute_weekly_days = Some(days.clone());
            }
            Self::MonthlyDays(days) => {
                task.repetition_type = RepetitionType::Absolute;
                task.repetition_absolute_frequency = Some(AbsoluteFrequency::Monthly);
                task.repetition_absolute_monthly_mode = Some(MonthlyMode::DayNumber);
                task.repetition_absolute_days_of_month = Some(days.clone());
            }
            Self::MonthlyNth(occurrences, days) => {
                task.repetition_type = RepetitionType::Absolute;
                task.repetition_absolute_frequency = Some(AbsoluteFrequency::Monthly);
                task.repetition_absolute_monthly_mode = Some(MonthlyMode::DayOfWeek);
                task.repetition_absolute_nth_weekday_occurrence = Some(occurrences.clone());
                task.repetition_absolute_nth_weekday_days = Some(days.clone());
            }
            Self::YearlyDays(months, days) => {
                task.repetition_type = RepetitionType::Absolute;
                task.repetition_absolute_frequency = Some(AbsoluteFrequency::Yearly);
                task.repetition_absolute_yearly_months = Some(months.clone());
                task.repetition_absolute_yearly_mode = Some(MonthlyMode::DayNumber);
                task.repetition_absolute_yearly_days_of_month = Some(days.clone());
            }
            Self::YearlyNth(months, occurrences, days) => {
                task.repetition_type = RepetitionType::Absolute;
                task.repetition_absolute_frequency = Some(AbsoluteFrequency::Yearly);
                task.repetition_absolute_yearly_months = Some(months.clone());
                task.repetition_absolute_yearly_mode = Some(MonthlyMode::DayOfWeek);
                task.repetition_absolute_yearly_nth_weekday_occurrence = Some(occurrences.clone());
                task.repetition_absolute_yearly_nth_weekday_days = Some(days.clone());
            }
        }
    }
}

/// Completion rule parsed from the CLI: `simple`, `count:<n>`,
/// `time:<amount><unit>`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompletionSpec {
    Simple,
    Count(i64),
    Time(i64, DurationUnit),
}

impl CompletionSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        let value = raw.trim();
        let invalid = || Error::InvalidArgument(format!("invalid completion rule '{value}'"));
        match value.split_once(':') {
            None if value == "simple" => Ok(Self::Simple),
            Some(("count", target)) => {
                let target: i64 = target.trim().parse().map_err(|_| invalid())?;
                if target <= 0 {
                    return Err(invalid());
                }
                Ok(Self::Count(target))
            }
            Some(("time", target)) => {
                let (amount, unit) = units::parse_amount_unit(target).ok_or_else(invalid)?;
                if amount <= 0 {
                    return Err(invalid());
                }
                Ok(Self::Time(amount, unit))
            }
            _ => Err(invalid()),
        }
    }

    pub fn apply(&self, task: &mut Task) {
        task.count_target = None;
        task.time_target_amount = None;
        task.time_target_unit = None;
        match self {
            Self::Simple => task.completion_type = CompletionType::Simple,
            Self::Count(target) => {
                task.completion_type = CompletionType::Count;
                task.count_target = Some(*target);
            }
            Self::Time(amount, unit) => {
                task.completion_type = CompletionType::Time;
                task.time_target_amount = Some(*amount);
                task.time_target_unit = Some(*unit);
            }
        }
        task.current_progress = 0.0;
    }
}

/// Generate a short id: the configured prefix followed by base36
/// characters drawn from a fresh ULID's random bits.
pub fn generate_id(ids: &IdsConfig) -> String {
    const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut bits = ulid::Ulid::new().random();
    let mut suffix = String::with_capacity(ids.len);
    for _ in 0..ids.len {
        suffix.push(ALPHABET[(bits % 36) as usize] as char);
        bits /= 36;
    }
    format!("{}{}", ids.prefix, suffix)
}

/// Resolve user input to a task id: exact id, unique id prefix, or exact
/// (case-insensitive) name.
pub fn resolve_task_id(tasks: &[Task], input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
    }

    if let Some(task) = tasks.iter().find(|task| task.id == trimmed) {
        return Ok(task.id.clone());
    }

    let mut matches: Vec<&str> = tasks
        .iter()
        .filter(|task| {
            task.id.starts_with(trimmed)
                || task.id.trim_start_matches('_').starts_with(trimmed)
        })
        .map(|task| task.id.as_str())
        .collect();
    if matches.is_empty() {
        matches = tasks
            .iter()
            .filter(|task| task.name.eq_ignore_ascii_case(trimmed))
            .map(|task| task.id.as_str())
            .collect();
    }

    matches.sort();
    matches.dedup();
    match matches.len() {
        0 => Err(Error::TaskNotFound(trimmed.to_string())),
        1 => Ok(matches[0].to_string()),
        _ => Err(Error::InvalidArgument(format!(
            "ambiguous task id '{}': {}",
            trimmed,
            matches.join(", ")
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    Status,
    DueDate,
    Name,
    Category,
}

impl SortBy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "status" => Some(Self::Status),
            "duedate" | "due" => Some(Self::DueDate),
            "name" => Some(Self::Name),
            "category" => Some(Self::Category),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

fn category_name<'a>(categories: &'a [Category], id: Option<&str>) -> &'a str {
    id.and_then(|id| categories.iter().find(|category| category.id == id))
        .map(|category| category.name.as_str())
        .unwrap_or("Uncategorized")
}

fn compare_due(a: &Task, b: &Task) -> Ordering {
    match (a.due_date, b.due_date) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort for the task list. Finished one-off tasks always sink to the end;
/// ties fall back to the due date.
pub fn sort_tasks(tasks: &mut [Task], categories: &[Category], by: SortBy, direction: SortDirection) {
    tasks.sort_by(|a, b| {
        let finished = a.is_finished().cmp(&b.is_finished());
        if finished != Ordering::Equal {
            return finished;
        }
        let primary = match by {
            SortBy::Status => a.status.rank().cmp(&b.status.rank()),
            SortBy::DueDate => Ordering::Equal,
            SortBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortBy::Category => category_name(categories, a.category_id.as_deref())
                .to_lowercase()
                .cmp(&category_name(categories, b.category_id.as_deref()).to_lowercase()),
        };
        let ordering = primary.then_with(|| compare_due(a, b));
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

/// Serde helpers for values written by older clients.
pub(crate) mod lenient {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    /// Accepts RFC 3339, offset-less date-times (read as UTC), plain dates
    /// and epoch milliseconds.
    pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }
        if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
            return Some(parsed.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
                return Some(Utc.from_utc_datetime(&parsed));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return Some(Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)));
        }
        value.parse::<i64>().ok().and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    pub mod opt_datetime {
        use chrono::{DateTime, TimeZone, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        use super::Raw;

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_str(&crate::units::iso_millis(*value)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw: Option<Raw> = Option::deserialize(deserializer)?;
            Ok(match raw {
                None => None,
                Some(Raw::Int(ms)) => Utc.timestamp_millis_opt(ms).single(),
                Some(Raw::Float(ms)) => Utc.timestamp_millis_opt(ms as i64).single(),
                Some(Raw::Text(text)) => super::parse_datetime(&text),
            })
        }
    }

    pub fn opt_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        let raw: Option<Raw> = Option::deserialize(deserializer)?;
        Ok(match raw {
            None => None,
            Some(Raw::Int(value)) => Some(value),
            Some(Raw::Float(value)) if value.is_finite() => Some(value.trunc() as i64),
            Some(Raw::Float(_)) => None,
            Some(Raw::Text(text)) => {
                let digits: String = text
                    .trim()
                    .chars()
                    .take_while(|ch| ch.is_ascii_digit() || *ch == '-')
                    .collect();
                digits.parse().ok()
            }
        })
    }
}

pub use lenient::parse_datetime;
