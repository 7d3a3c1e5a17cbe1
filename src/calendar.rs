//! Calendar views
//!
//! Builds day, week (Sunday start) and month grids from task occurrences
//! and past history records, and applies calendar edits: moving a single
//! occurrence and creating a task from a time slot.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

use crate::category::{self, Category};
use crate::error::{Error, Result};
use crate::history::{HistoricalRecord, RecordStatus};
use crate::recurrence::{self, RepetitionType};
use crate::schedule;
use crate::settings::{self, Settings};
use crate::task::{lenient, OccurrenceOverride, StatusColor, Task};
use crate::theme;
use crate::units::{self, DurationUnit};

pub const DEFAULT_EVENT_NAME: &str = "New Event";
pub const DEFAULT_EVENT_MINUTES: i64 = 60;
const NO_CATEGORY_COLOR: &str = "#808080";

const BORDER_EARLY: &str = "#3b82f6";
const BORDER_COMPLETED: &str = "#22c55e";
const BORDER_MISSED_NONE: &str = "#000000";
const BORDER_MISSED_LOW: &str = "#ef4444";
const BORDER_MISSED_PARTIAL: &str = "#eab308";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Day,
    Week,
    Month,
}

impl ViewKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "day" | "timegridday" => Some(Self::Day),
            "week" | "timegridweek" => Some(Self::Week),
            "month" | "daygridmonth" => Some(Self::Month),
            _ => None,
        }
    }

    /// Name stored as `calendarSettings.lastView`.
    pub fn stored_name(&self) -> &'static str {
        match self {
            Self::Day => "timeGridDay",
            Self::Week => "timeGridWeek",
            Self::Month => "dayGridMonth",
        }
    }

    /// Visible days for a view containing `anchor`.
    pub fn range(&self, anchor: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Self::Day => (anchor, anchor),
            Self::Week => {
                let start = units::week_start_sunday(anchor);
                (start, start + Duration::days(6))
            }
            Self::Month => {
                let first = anchor.with_day(1).unwrap_or(anchor);
                let start = units::week_start_sunday(first);
                (start, start + Duration::days(41))
            }
        }
    }

    /// Move the anchor one view forwards (`steps > 0`) or backwards.
    pub fn step(&self, anchor: NaiveDate, steps: i64) -> NaiveDate {
        match self {
            Self::Day => anchor + Duration::days(steps),
            Self::Week => anchor + Duration::weeks(steps),
            Self::Month => {
                let months = anchor.year() as i64 * 12 + anchor.month0() as i64 + steps;
                let year = months.div_euclid(12) as i32;
                let month = months.rem_euclid(12) as u32 + 1;
                let day = anchor.day().min(units::days_in_month(year, month));
                NaiveDate::from_ymd_opt(year, month, day).unwrap_or(anchor)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Occurrence id for task events, record reference for history.
    pub id: String,
    pub task_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub category_id: Option<String>,
    pub background_color: String,
    pub border_color: String,
    pub text_color: String,
    pub status: Option<StatusColor>,
    pub is_appointment: bool,
    pub historical: Option<RecordStatus>,
    /// Occurrence edited from the calendar.
    pub overridden: bool,
}

/// Everything a view is built from.
pub struct CalendarSource<'a> {
    pub tasks: &'a [Task],
    pub categories: &'a [Category],
    pub history: &'a [HistoricalRecord],
    pub settings: &'a Settings,
    pub offset: FixedOffset,
}

impl CalendarSource<'_> {
    fn shows(&self, category_id: Option<&str>) -> bool {
        let visible = self
            .settings
            .ui
            .calendar_category_filters
            .get(category_id.unwrap_or("null"))
            .map(|flags| flags.show)
            .unwrap_or(true);
        visible && settings::filter_allows(self.settings.calendar_filter(), category_id)
    }

    fn category_color(&self, category_id: Option<&str>) -> String {
        category_id
            .and_then(|id| category::find(self.categories, id))
            .map(|category| category.color.clone())
            .unwrap_or_else(|| NO_CATEGORY_COLOR.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarView {
    pub kind: ViewKind,
    pub anchor: NaiveDate,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub events: Vec<CalendarEvent>,
}

impl CalendarView {
    pub fn build(kind: ViewKind, anchor: NaiveDate, source: &CalendarSource<'_>) -> Self {
        let (start, end) = kind.range(anchor);
        let view_start = units::start_of_day(start, source.offset);
        let view_end = units::start_of_day(end + Duration::days(1), source.offset);
        let palette = theme::resolved_status_colors(source.settings);

        let mut events = Vec::new();
        for task in source.tasks {
            if task.repetition_type == RepetitionType::None && task.completed {
                continue;
            }
            if !source.shows(task.category_id.as_deref()) {
                continue;
            }
            let border = source.category_color(task.category_id.as_deref());
            let background = palette.get(task.status).to_string();
            let event = |id: String, start: DateTime<Utc>, due: DateTime<Utc>, edit: Option<&OccurrenceOverride>| {
                CalendarEvent {
                    id,
                    task_id: task.id.clone(),
                    title: edit
                        .and_then(|fields| fields.name.clone())
                        .unwrap_or_else(|| task.name.clone()),
                    start,
                    end: due,
                    category_id: task.category_id.clone(),
                    text_color: theme::contrasting_text(&background).primary,
                    background_color: background.clone(),
                    border_color: border.clone(),
                    status: Some(task.status),
                    is_appointment: edit
                        .and_then(|fields| fields.is_appointment)
                        .unwrap_or(task.is_appointment),
                    historical: None,
                    overridden: edit.is_some(),
                }
            };

            for occurrence in recurrence::calendar_occurrences(task, view_start, view_end, source.offset) {
                let id = schedule::occurrence_id(&task.id, occurrence.due);
                let edit = task.occurrence_overrides.get(&id);
                if edit.and_then(OccurrenceOverride::effective_due).is_some() {
                    // Drawn at its target below.
                    continue;
                }
                let length = edit
                    .and_then(override_length)
                    .unwrap_or(occurrence.due - occurrence.start);
                let Some(start) = occurrence.due.checked_sub_signed(length) else {
                    continue;
                };
                if start >= view_end || occurrence.due <= view_start {
                    continue;
                }
                events.push(event(id, start, occurrence.due, edit));
            }

            let estimate = units::duration(task.estimated_duration_amount, task.estimated_duration_unit);
            for (id, edit, due) in moved_occurrences(task) {
                let length = override_length(edit).unwrap_or(estimate);
                let Some(start) = due.checked_sub_signed(length) else {
                    continue;
                };
                if start >= view_end || due <= view_start {
                    continue;
                }
                if !occurs_at(task, id, source.offset) {
                    tracing::debug!(task = %task.id, occurrence = %id, "override for an occurrence the rule no longer yields");
                    continue;
                }
                events.push(event(id.clone(), start, due, Some(edit)));
            }
        }

        for record in source.history {
            let Some(done) = record.completion_date else {
                continue;
            };
            if !source.shows(record.category_id.as_deref()) {
                continue;
            }
            let Some(start) = done.checked_sub_signed(record.duration()) else {
                continue;
            };
            if start >= view_end || done <= view_start {
                continue;
            }
            let background = theme::dulled(&source.category_color(record.category_id.as_deref()));
            events.push(CalendarEvent {
                id: record.reference(),
                task_id: record.original_task_id.clone(),
                title: record.name.clone(),
                start,
                end: done,
                category_id: record.category_id.clone(),
                text_color: theme::contrasting_text(&background).primary,
                background_color: background,
                border_color: history_border(record).to_string(),
                status: None,
                is_appointment: false,
                historical: Some(record.status),
                overridden: false,
            });
        }

        events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.title.cmp(&b.title)));
        Self {
            kind,
            anchor,
            start,
            end,
            events,
        }
    }

    /// Events overlapping a local day.
    pub fn events_on(&self, day: NaiveDate, offset: FixedOffset) -> Vec<&CalendarEvent> {
        let day_start = units::start_of_day(day, offset);
        let day_end = units::start_of_day(day + Duration::days(1), offset);
        self.events
            .iter()
            .filter(|event| event.start < day_end && event.end > day_start)
            .collect()
    }
}

fn history_border(record: &HistoricalRecord) -> &'static str {
    match record.status {
        RecordStatus::Completed if record.was_early() => BORDER_EARLY,
        RecordStatus::Completed => BORDER_COMPLETED,
        RecordStatus::Missed if record.progress <= 0.0 => BORDER_MISSED_NONE,
        RecordStatus::Missed if record.progress <= 0.5 => BORDER_MISSED_LOW,
        RecordStatus::Missed => BORDER_MISSED_PARTIAL,
    }
}

/// Length set on an override, if any.
fn override_length(edit: &OccurrenceOverride) -> Option<Duration> {
    let amount = edit.estimated_duration_amount?;
    Some(units::duration(
        Some(amount),
        edit.estimated_duration_unit.or(Some(DurationUnit::Minutes)),
    ))
}

/// Overrides that move their occurrence, with the target due date.
fn moved_occurrences(task: &Task) -> impl Iterator<Item = (&String, &OccurrenceOverride, DateTime<Utc>)> {
    task.occurrence_overrides
        .iter()
        .filter_map(|(id, edit)| Some((id, edit, edit.effective_due()?)))
}

/// Whether the task's rule still produces the occurrence named by `id`.
fn occurs_at(task: &Task, id: &str, offset: FixedOffset) -> bool {
    let Ok(due) = occurrence_due(&task.id, id) else {
        return false;
    };
    let probe = Duration::milliseconds(1);
    let (Some(from), Some(to)) = (due.checked_sub_signed(probe), due.checked_add_signed(probe)) else {
        return false;
    };
    recurrence::calendar_occurrences(task, from, to, offset)
        .iter()
        .any(|occurrence| occurrence.due == due)
}

/// Drop overrides whose original and target dates are both older than
/// `retention_days`. Zero keeps all. Returns the number removed.
pub fn prune_overrides(tasks: &mut [Task], now: DateTime<Utc>, retention_days: u32) -> usize {
    if retention_days == 0 {
        return 0;
    }
    let Some(cutoff) = now.checked_sub_signed(Duration::days(i64::from(retention_days))) else {
        return 0;
    };
    let mut removed = 0;
    for task in tasks.iter_mut() {
        let task_id = task.id.clone();
        let before = task.occurrence_overrides.len();
        task.occurrence_overrides.retain(|id, edit| {
            let original = occurrence_due(&task_id, id).ok();
            let latest = original.max(edit.effective_due());
            latest.map_or(true, |latest| latest >= cutoff)
        });
        removed += before - task.occurrence_overrides.len();
    }
    removed
}

/// Due date encoded in an occurrence id.
pub fn occurrence_due(task_id: &str, occurrence_id: &str) -> Result<DateTime<Utc>> {
    occurrence_id
        .strip_prefix(task_id)
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(lenient::parse_datetime)
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "occurrence '{occurrence_id}' does not belong to task '{task_id}'"
            ))
        })
}

/// Result of dragging an occurrence.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    pub task_id: String,
    pub occurrence_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: DateTime<Utc>,
    /// `true` when an override was stored rather than the due date moved.
    pub overridden: bool,
}

/// Move one occurrence to `new_due`. Repeating tasks keep their rule and
/// record an override for the occurrence; other tasks move their due date.
pub fn move_occurrence(
    tasks: &mut [Task],
    task_id: &str,
    occurrence_id: Option<&str>,
    new_due: DateTime<Utc>,
    duration_minutes: Option<i64>,
) -> Result<MoveOutcome> {
    let task = tasks
        .iter_mut()
        .find(|task| task.id == task_id)
        .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
    if let Some(minutes) = duration_minutes {
        if minutes <= 0 {
            return Err(Error::InvalidArgument(format!(
                "duration must be positive, got {minutes} minutes"
            )));
        }
    }

    if task.repetition_type == RepetitionType::None {
        let from = task.due_date;
        task.due_date = Some(new_due);
        if let Some(minutes) = duration_minutes {
            task.estimated_duration_amount = Some(minutes);
            task.estimated_duration_unit = Some(DurationUnit::Minutes);
        }
        tracing::debug!(task = %task.id, "moved due date");
        return Ok(MoveOutcome {
            task_id: task.id.clone(),
            occurrence_id: None,
            from,
            to: new_due,
            overridden: false,
        });
    }

    let occurrence_id = match occurrence_id {
        Some(id) => {
            occurrence_due(&task.id, id)?;
            id.to_string()
        }
        None => {
            let due = task.due_date.ok_or_else(|| {
                Error::InvalidArgument(format!("task '{}' has no due date to move", task.id))
            })?;
            schedule::occurrence_id(&task.id, due)
        }
    };
    let entry = task.occurrence_overrides.entry(occurrence_id.clone()).or_default();
    let from = entry
        .effective_due()
        .or_else(|| occurrence_due(task_id, &occurrence_id).ok());
    entry.due_date = Some(new_due);
    entry.occurrence_due_date = None;
    if let Some(minutes) = duration_minutes {
        entry.estimated_duration_amount = Some(minutes);
        entry.estimated_duration_unit = Some(DurationUnit::Minutes);
    }
    tracing::debug!(task = %task.id, occurrence = %occurrence_id, "stored occurrence override");
    Ok(MoveOutcome {
        task_id: task.id.clone(),
        occurrence_id: Some(occurrence_id),
        from,
        to: new_due,
        overridden: true,
    })
}

/// A task made by clicking an empty slot.
#[derive(Debug, Clone)]
pub struct SlotRequest {
    pub start: DateTime<Utc>,
    pub minutes: Option<i64>,
    pub name: Option<String>,
    pub category: Option<String>,
}

/// Create a task filling the slot. The category is created when missing.
pub fn create_at(
    tasks: &mut Vec<Task>,
    categories: &mut Vec<Category>,
    settings: &Settings,
    id: String,
    request: SlotRequest,
) -> Result<Task> {
    let minutes = request.minutes.unwrap_or(DEFAULT_EVENT_MINUTES);
    if minutes <= 0 {
        return Err(Error::InvalidArgument(format!(
            "duration must be positive, got {minutes} minutes"
        )));
    }
    let name = request
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string());
    let category_name = request
        .category
        .unwrap_or_else(|| settings.planner.default_category_id.clone());
    let seed = categories.len();
    let category_id = category::ensure(categories, &category_name, || {
        theme::category_color(&settings.theming, seed)
    });

    let mut task = Task::new(id, name.trim());
    task.due_date = Some(request.start + Duration::minutes(minutes));
    task.created_at = Some(request.start);
    task.estimated_duration_amount = Some(minutes);
    task.estimated_duration_unit = Some(DurationUnit::Minutes);
    task.icon = category::inherited_icon(categories, Some(&category_id));
    task.category_id = Some(category_id);
    tasks.push(task.clone());
    Ok(task)
}

// =============================================================================
// Text rendering
// =============================================================================

fn clock(at: DateTime<Utc>, offset: FixedOffset, use_24h: bool) -> String {
    let local = at.with_timezone(&offset);
    if use_24h {
        local.format("%H:%M").to_string()
    } else {
        local.format("%-I:%M%P").to_string()
    }
}

fn event_line(event: &CalendarEvent, offset: FixedOffset, use_24h: bool) -> String {
    let marker = match (event.historical, event.status) {
        (Some(RecordStatus::Completed), _) => "done".to_string(),
        (Some(RecordStatus::Missed), _) => "missed".to_string(),
        (None, Some(status)) => status.as_str().to_string(),
        (None, None) => String::new(),
    };
    format!(
        "{}-{}  {}{} [{}]",
        clock(event.start, offset, use_24h),
        clock(event.end, offset, use_24h),
        if event.is_appointment { "@ " } else { "" },
        event.title,
        marker
    )
}

/// Render a view as plain text.
pub fn render(view: &CalendarView, today: NaiveDate, offset: FixedOffset, use_24h: bool) -> String {
    match view.kind {
        ViewKind::Day | ViewKind::Week => render_days(view, today, offset, use_24h),
        ViewKind::Month => render_month(view, today, offset),
    }
}

fn render_days(view: &CalendarView, today: NaiveDate, offset: FixedOffset, use_24h: bool) -> String {
    let mut out = String::new();
    let mut day = view.start;
    while day <= view.end {
        let heading = day.format("%a %b %-d").to_string();
        if day == today {
            out.push_str(&format!("{heading} (today)\n"));
        } else {
            out.push_str(&format!("{heading}\n"));
        }
        let events = view.events_on(day, offset);
        if events.is_empty() {
            out.push_str("  -\n");
        }
        for event in events {
            out.push_str(&format!("  {}\n", event_line(event, offset, use_24h)));
        }
        day += Duration::days(1);
    }
    out
}

fn render_month(view: &CalendarView, today: NaiveDate, offset: FixedOffset) -> String {
    let mut out = format!("{}\n", view.anchor.format("%B %Y"));
    out.push_str(" Sun    Mon    Tue    Wed    Thu    Fri    Sat\n");
    let mut day = view.start;
    while day <= view.end {
        let mut row = String::new();
        for _ in 0..7 {
            let count = view.events_on(day, offset).len();
            let label = if day.month() == view.anchor.month() {
                format!("{:>2}", day.day())
            } else {
                "  ".to_string()
            };
            let cell = match (day == today, count) {
                (true, 0) => format!("[{label}]"),
                (true, n) => format!("[{label}]{n}"),
                (false, 0) => format!(" {label} "),
                (false, n) => format!(" {label} {n}"),
            };
            row.push_str(&format!("{cell:<7}"));
            day += Duration::days(1);
        }
        out.push_str(row.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::CategoryFilterFlags;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn utc0() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn daily(id: &str, due: &str) -> Task {
        let mut task = Task::new(id, id);
        task.due_date = Some(utc(due));
        task.repetition_type = RepetitionType::Relative;
        task.repetition_amount = Some(1);
        task.repetition_unit = Some(DurationUnit::Days);
        task.estimated_duration_amount = Some(30);
        task.estimated_duration_unit = Some(DurationUnit::Minutes);
        task
    }

    #[test]
    fn view_ranges_start_on_sunday() {
        // 2025-10-22 is a Wednesday.
        assert_eq!(ViewKind::Week.range(date("2025-10-22")), (date("2025-10-19"), date("2025-10-25")));
        assert_eq!(ViewKind::Month.range(date("2025-10-22")).0, date("2025-09-28"));
        assert_eq!(ViewKind::Day.range(date("2025-10-22")).1, date("2025-10-22"));
        assert_eq!(ViewKind::Month.step(date("2025-01-31"), 1), date("2025-02-28"));
        assert_eq!(ViewKind::Month.step(date("2025-01-15"), -1), date("2024-12-15"));
    }

    #[test]
    fn week_view_expands_daily_task() {
        let settings = Settings::default();
        let tasks = vec![daily("_d", "2025-10-20T09:00:00Z")];
        let source = CalendarSource {
            tasks: &tasks,
            categories: &[],
            history: &[],
            settings: &settings,
            offset: utc0(),
        };
        let view = CalendarView::build(ViewKind::Week, date("2025-10-22"), &source);
        assert_eq!(view.events.len(), 7);
        assert_eq!(view.events[0].start, utc("2025-10-19T08:30:00Z"));
        assert_eq!(view.events[0].border_color, NO_CATEGORY_COLOR);
        assert_eq!(view.events_on(date("2025-10-22"), utc0()).len(), 1);
    }

    #[test]
    fn hidden_categories_are_filtered() {
        let mut settings = Settings::default();
        settings
            .ui
            .calendar_category_filters
            .insert("Work".to_string(), CategoryFilterFlags { show: false, schedule: true });
        let mut hidden = daily("_w", "2025-10-20T09:00:00Z");
        hidden.category_id = Some("Work".to_string());
        let tasks = vec![hidden, daily("_h", "2025-10-20T18:00:00Z")];
        let source = CalendarSource {
            tasks: &tasks,
            categories: &[],
            history: &[],
            settings: &settings,
            offset: utc0(),
        };
        let view = CalendarView::build(ViewKind::Day, date("2025-10-20"), &source);
        assert_eq!(view.events.len(), 1);
        assert_eq!(view.events[0].task_id, "_h");
    }

    #[test]
    fn moved_occurrence_keeps_the_rule() {
        let mut tasks = vec![daily("_d", "2025-10-20T09:00:00Z")];
        let target = schedule::occurrence_id("_d", utc("2025-10-21T09:00:00Z"));
        let outcome = move_occurrence(&mut tasks, "_d", Some(&target), utc("2025-10-21T15:00:00Z"), None).unwrap();
        assert!(outcome.overridden);
        assert_eq!(outcome.from, Some(utc("2025-10-21T09:00:00Z")));
        assert_eq!(tasks[0].due_date, Some(utc("2025-10-20T09:00:00Z")));

        let settings = Settings::default();
        let source = CalendarSource {
            tasks: &tasks,
            categories: &[],
            history: &[],
            settings: &settings,
            offset: utc0(),
        };
        let view = CalendarView::build(ViewKind::Day, date("2025-10-21"), &source);
        assert_eq!(view.events.len(), 1);
        assert!(view.events[0].overridden);
        assert_eq!(view.events[0].end, utc("2025-10-21T15:00:00Z"));

        assert!(move_occurrence(&mut tasks, "_d", Some("_x_2025-10-21T09:00:00.000Z"), utc("2025-10-21T15:00:00Z"), None).is_err());
    }

    #[test]
    fn occurrence_moved_weeks_away_shows_only_at_target() {
        let mut tasks = vec![daily("_d", "2025-10-20T09:00:00Z")];
        let original = schedule::occurrence_id("_d", utc("2025-10-21T09:00:00Z"));
        move_occurrence(&mut tasks, "_d", Some(&original), utc("2025-11-18T15:00:00Z"), None).unwrap();

        let settings = Settings::default();
        let source = CalendarSource {
            tasks: &tasks,
            categories: &[],
            history: &[],
            settings: &settings,
            offset: utc0(),
        };
        let old_day = CalendarView::build(ViewKind::Day, date("2025-10-21"), &source);
        assert!(old_day.events.is_empty());

        let new_day = CalendarView::build(ViewKind::Day, date("2025-11-18"), &source);
        assert_eq!(new_day.events.len(), 2);
        let moved = new_day.events.iter().find(|event| event.id == original).unwrap();
        assert!(moved.overridden);
        assert_eq!(moved.start, utc("2025-11-18T14:30:00Z"));
        assert_eq!(moved.end, utc("2025-11-18T15:00:00Z"));
    }

    #[test]
    fn stale_overrides_are_pruned() {
        let mut tasks = vec![daily("_d", "2025-01-01T09:00:00Z")];
        let old = schedule::occurrence_id("_d", utc("2025-01-02T09:00:00Z"));
        let recent = schedule::occurrence_id("_d", utc("2025-01-03T09:00:00Z"));
        move_occurrence(&mut tasks, "_d", Some(&old), utc("2025-01-02T12:00:00Z"), None).unwrap();
        move_occurrence(&mut tasks, "_d", Some(&recent), utc("2025-06-01T12:00:00Z"), None).unwrap();

        let now = utc("2025-06-10T00:00:00Z");
        assert_eq!(prune_overrides(&mut tasks, now, 0), 0);
        assert_eq!(prune_overrides(&mut tasks, now, 30), 1);
        assert!(tasks[0].occurrence_overrides.contains_key(&recent));
        assert!(!tasks[0].occurrence_overrides.contains_key(&old));
    }

    #[test]
    fn moving_one_off_task_moves_due_date() {
        let mut task = Task::new("_o", "Dentist");
        task.due_date = Some(utc("2025-10-21T09:00:00Z"));
        let mut tasks = vec![task];
        let outcome = move_occurrence(&mut tasks, "_o", None, utc("2025-10-22T09:00:00Z"), Some(90)).unwrap();
        assert!(!outcome.overridden);
        assert_eq!(tasks[0].due_date, Some(utc("2025-10-22T09:00:00Z")));
        assert_eq!(tasks[0].estimated_duration_amount, Some(90));
        assert!(tasks[0].occurrence_overrides.is_empty());
    }

    #[test]
    fn create_at_uses_defaults() {
        let mut tasks = Vec::new();
        let mut categories = Vec::new();
        let settings = Settings::default();
        let request = SlotRequest {
            start: utc("2025-10-21T14:00:00Z"),
            minutes: None,
            name: None,
            category: None,
        };
        let task = create_at(&mut tasks, &mut categories, &settings, "_n".into(), request).unwrap();
        assert_eq!(task.name, DEFAULT_EVENT_NAME);
        assert_eq!(task.due_date, Some(utc("2025-10-21T15:00:00Z")));
        assert_eq!(task.category_id.as_deref(), Some("Planner"));
        assert_eq!(categories.len(), 1);
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn history_borders_follow_outcome() {
        let task = Task::new("_t", "Run");
        let early = HistoricalRecord::new(
            &task,
            RecordStatus::Completed,
            1.0,
            utc("2025-10-20T08:00:00Z"),
            Some(utc("2025-10-20T09:00:00Z")),
        );
        let missed = |progress| HistoricalRecord::new(&task, RecordStatus::Missed, progress, utc("2025-10-20T08:00:00Z"), None);
        assert_eq!(history_border(&early), BORDER_EARLY);
        assert_eq!(history_border(&missed(0.0)), BORDER_MISSED_NONE);
        assert_eq!(history_border(&missed(0.5)), BORDER_MISSED_LOW);
        assert_eq!(history_border(&missed(0.8)), BORDER_MISSED_PARTIAL);

        let settings = Settings::default();
        let history = vec![early];
        let source = CalendarSource {
            tasks: &[],
            categories: &[],
            history: &history,
            settings: &settings,
            offset: utc0(),
        };
        let view = CalendarView::build(ViewKind::Day, date("2025-10-20"), &source);
        assert_eq!(view.events.len(), 1);
        assert_eq!(view.events[0].start, utc("2025-10-20T07:00:00Z"));
        assert_eq!(view.events[0].historical, Some(RecordStatus::Completed));
    }

    #[test]
    fn month_rendering_marks_today() {
        let settings = Settings::default();
        let tasks = vec![daily("_d", "2025-10-20T09:00:00Z")];
        let source = CalendarSource {
            tasks: &tasks,
            categories: &[],
            history: &[],
            settings: &settings,
            offset: utc0(),
        };
        let view = CalendarView::build(ViewKind::Month, date("2025-10-20"), &source);
        let text = render(&view, date("2025-10-20"), utc0(), true);
        assert!(text.starts_with("October 2025\n"));
        assert!(text.contains("[20]1"));
    }
}
