//! GPA scheduling pipeline
//!
//! Expands every task into its occurrences up to a horizon, places them on
//! a shared timeline and colours them by a 4.0-scale score.
//!
//! 1. Drop tasks whose category has scheduling switched off.
//! 2. Generate occurrences, apply per-occurrence overrides and move due
//!    dates out of vacations.
//! 3. Score each occurrence (positioning GPA). Time pressure and a poor
//!    miss record both lower the score.
//! 4. Appointments are fixed busy slots. Flexible occurrences are placed
//!    lowest score first, ending at their due date and sliding earlier
//!    past busy slots.
//! 5. Re-score from the placed start (final GPA) and map to a colour.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;

use crate::category::{self, Category};
use crate::recurrence;
use crate::settings::UiSettings;
use crate::task::{StatusColor, Task};
use crate::units::{self, DurationUnit};
use crate::vacation::{self, Vacation};

/// Attempts to find a free slot before falling back to the due date.
const MAX_PLACEMENT_ATTEMPTS: usize = 500;

const MAX_TIME_DEMERIT: f64 = 3.0;
const MAX_HABIT_DEMERIT: f64 = 2.0;
const WARNING_WINDOW_FACTOR: i64 = 4;

/// One placed occurrence.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledOccurrence {
    /// `{taskId}_{iso due}`, the key used for overrides.
    pub id: String,
    pub task_id: String,
    pub name: String,
    pub category_id: Option<String>,
    pub is_appointment: bool,
    pub occurrence_due: DateTime<Utc>,
    /// Due date after overrides and vacation shifts.
    pub base_due: DateTime<Utc>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub positioning_gpa: f64,
    pub final_gpa: f64,
    pub final_status: StatusColor,
    #[serde(skip)]
    duration_ms: i64,
    #[serde(skip)]
    prep_ms: i64,
    #[serde(skip)]
    habit_demerit: f64,
}

/// Inputs shared by one pipeline run.
pub struct Pipeline<'a> {
    pub categories: &'a [Category],
    pub vacations: &'a [Vacation],
    pub ui: &'a UiSettings,
    /// User sensitivity; zero falls back to the midpoint.
    pub s_value: f64,
    pub offset: FixedOffset,
}

pub fn occurrence_id(task_id: &str, due: DateTime<Utc>) -> String {
    format!("{task_id}_{}", units::iso_millis(due))
}

fn time_demerit(urgency_ms: i64, time_until_ms: i64) -> f64 {
    let window = urgency_ms.saturating_mul(WARNING_WINDOW_FACTOR);
    if window <= 0 || time_until_ms > window {
        return 0.0;
    }
    ((1.0 - time_until_ms as f64 / window as f64) * MAX_TIME_DEMERIT).clamp(0.0, MAX_TIME_DEMERIT)
}

fn habit_demerit(task: &Task) -> f64 {
    if !task.tracks_miss_ratio() {
        return 0.0;
    }
    (task.miss_ratio() * MAX_HABIT_DEMERIT).clamp(0.0, MAX_HABIT_DEMERIT)
}

/// Colour for a final GPA. Thresholds shift with sensitivity.
pub fn status_for_gpa(gpa: f64, s_value: f64) -> StatusColor {
    let s = if s_value == 0.0 || !s_value.is_finite() { 0.5 } else { s_value };
    let shift = s - 0.5;
    if gpa < 0.5 + shift {
        StatusColor::Black
    } else if gpa < 1.5 + shift {
        StatusColor::Red
    } else if gpa < 2.5 + shift {
        StatusColor::Yellow
    } else {
        StatusColor::Green
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    start: i64,
    end: i64,
}

impl Pipeline<'_> {
    fn bypasses_vacation(&self, category_id: Option<&str>) -> bool {
        category_id
            .and_then(|id| category::find(self.categories, id))
            .is_some_and(|category| category.bypass_vacation)
    }

    fn expand(&self, task: &Task, now: DateTime<Utc>, horizon: DateTime<Utc>) -> Vec<ScheduledOccurrence> {
        let bypass = self.bypasses_vacation(task.category_id.as_deref());
        recurrence::occurrences(task, now, horizon, self.offset)
            .into_iter()
            .map(|due| {
                let id = occurrence_id(&task.id, due);
                let override_fields = task.occurrence_overrides.get(&id);
                let moved_due = override_fields
                    .and_then(|fields| fields.effective_due())
                    .unwrap_or(due);
                let name = override_fields
                    .and_then(|fields| fields.name.clone())
                    .unwrap_or_else(|| task.name.clone());
                let amount = override_fields
                    .and_then(|fields| fields.estimated_duration_amount)
                    .or(task.estimated_duration_amount);
                let unit = override_fields
                    .and_then(|fields| fields.estimated_duration_unit)
                    .or(task.estimated_duration_unit);
                let is_appointment = override_fields
                    .and_then(|fields| fields.is_appointment)
                    .unwrap_or(task.is_appointment);

                let base_due = vacation::adjust_for_vacation(moved_due, self.vacations, bypass, self.offset);
                let prep_ms = task.prep_ms();
                let duration_ms = units::duration_ms(amount, unit.or(Some(DurationUnit::Minutes)));
                let urgency = if prep_ms > 0 { prep_ms } else { duration_ms };
                let habit = habit_demerit(task);
                let positioning_gpa =
                    4.0 - time_demerit(urgency, (base_due - now).num_milliseconds()) - habit;

                ScheduledOccurrence {
                    id,
                    task_id: task.id.clone(),
                    name,
                    category_id: task.category_id.clone(),
                    is_appointment,
                    occurrence_due: due,
                    base_due,
                    scheduled_start: None,
                    scheduled_end: None,
                    positioning_gpa,
                    final_gpa: -1.0,
                    final_status: StatusColor::Green,
                    duration_ms,
                    prep_ms,
                    habit_demerit: habit,
                }
            })
            .collect()
    }

    /// Run the pipeline over `tasks` for occurrences in `[now, horizon]`.
    pub fn run(&self, tasks: &[Task], now: DateTime<Utc>, horizon: DateTime<Utc>) -> Vec<ScheduledOccurrence> {
        let mut occurrences: Vec<ScheduledOccurrence> = tasks
            .iter()
            .filter(|task| task.due_date.is_some())
            .filter(|task| self.ui.schedules_category(task.category_id.as_deref()))
            .flat_map(|task| self.expand(task, now, horizon))
            .collect();

        let mut busy: Vec<Slot> = Vec::new();
        for occurrence in occurrences.iter_mut().filter(|occurrence| occurrence.is_appointment) {
            let Some(start) = occurrence
                .base_due
                .checked_sub_signed(Duration::milliseconds(occurrence.duration_ms))
            else {
                tracing::warn!(task = %occurrence.task_id, "appointment too long to place");
                continue;
            };
            occurrence.scheduled_start = Some(start);
            occurrence.scheduled_end = Some(occurrence.base_due);
            busy.push(Slot {
                start: start.timestamp_millis(),
                end: occurrence.base_due.timestamp_millis(),
            });
        }
        busy.sort_by_key(|slot| slot.start);

        let mut flexible: Vec<usize> = (0..occurrences.len())
            .filter(|index| !occurrences[*index].is_appointment)
            .collect();
        // Stable, so equal scores keep generation order.
        flexible.sort_by(|a, b| {
            occurrences[*a]
                .positioning_gpa
                .total_cmp(&occurrences[*b].positioning_gpa)
        });
        for index in flexible {
            place_flexible(&mut occurrences[index], &mut busy);
        }

        for occurrence in occurrences.iter_mut() {
            let Some(start) = occurrence.scheduled_start else {
                occurrence.final_gpa = -1.0;
                occurrence.final_status = StatusColor::Green;
                continue;
            };
            let urgency = if occurrence.prep_ms > 0 {
                occurrence.prep_ms
            } else {
                occurrence.duration_ms
            };
            occurrence.final_gpa = 4.0
                - time_demerit(urgency, (start - now).num_milliseconds())
                - occurrence.habit_demerit;
            occurrence.final_status = status_for_gpa(occurrence.final_gpa, self.s_value);
        }

        tracing::debug!(count = occurrences.len(), "schedule pipeline finished");
        occurrences
    }
}

fn place_flexible(occurrence: &mut ScheduledOccurrence, busy: &mut Vec<Slot>) {
    let base = occurrence.base_due;
    let duration = occurrence.duration_ms;
    if duration <= 0 {
        occurrence.scheduled_start = Some(base);
        occurrence.scheduled_end = Some(base);
        return;
    }

    let mut end = base.timestamp_millis();
    for _ in 0..MAX_PLACEMENT_ATTEMPTS {
        let Some(start_at) = end
            .checked_sub(duration)
            .and_then(DateTime::from_timestamp_millis)
        else {
            break;
        };
        let start = start_at.timestamp_millis();
        match busy.iter().find(|slot| start < slot.end && end > slot.start) {
            Some(slot) => end = slot.start,
            None => {
                occurrence.scheduled_start = Some(start_at);
                occurrence.scheduled_end = DateTime::from_timestamp_millis(end);
                busy.push(Slot { start, end });
                busy.sort_by_key(|slot| slot.start);
                return;
            }
        }
    }
    occurrence.scheduled_start = base.checked_sub_signed(Duration::milliseconds(duration));
    occurrence.scheduled_end = occurrence.scheduled_start.map(|_| base);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::RepetitionType;
    use crate::settings::CategoryFilterFlags;
    use crate::task::OccurrenceOverride;
    use chrono::NaiveDate;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn task(id: &str, due: &str, minutes: i64) -> Task {
        let mut task = Task::new(id, id);
        task.due_date = Some(utc(due));
        task.estimated_duration_amount = Some(minutes);
        task.estimated_duration_unit = Some(DurationUnit::Minutes);
        task
    }

    fn pipeline<'a>(
        categories: &'a [Category],
        vacations: &'a [Vacation],
        ui: &'a UiSettings,
    ) -> Pipeline<'a> {
        Pipeline {
            categories,
            vacations,
            ui,
            s_value: 0.5,
            offset: FixedOffset::east_opt(0).unwrap(),
        }
    }

    fn now() -> DateTime<Utc> {
        utc("2025-09-20T08:00:00Z")
    }

    #[test]
    fn flexible_tasks_slide_before_appointments() {
        let mut meeting = task("meeting", "2025-09-20T12:00:00Z", 60);
        meeting.is_appointment = true;
        let report = task("report", "2025-09-20T12:00:00Z", 30);
        let ui = UiSettings::default();
        let result = pipeline(&[], &[], &ui).run(&[meeting, report], now(), utc("2025-09-21T00:00:00Z"));

        let report = result.iter().find(|o| o.task_id == "report").unwrap();
        assert_eq!(report.scheduled_end, Some(utc("2025-09-20T11:00:00Z")));
        assert_eq!(report.scheduled_start, Some(utc("2025-09-20T10:30:00Z")));
        let meeting = result.iter().find(|o| o.task_id == "meeting").unwrap();
        assert_eq!(meeting.scheduled_start, Some(utc("2025-09-20T11:00:00Z")));
    }

    #[test]
    fn oversized_estimates_are_left_unplaced() {
        let mut meeting = task("meeting", "2025-09-20T12:00:00Z", i64::MAX);
        meeting.is_appointment = true;
        let chore = task("chore", "2025-09-20T12:00:00Z", i64::MAX);
        let ui = UiSettings::default();
        let result = pipeline(&[], &[], &ui).run(&[meeting, chore], now(), utc("2025-09-21T00:00:00Z"));
        assert_eq!(result.len(), 2);
        for occurrence in &result {
            assert_eq!(occurrence.scheduled_start, None, "{}", occurrence.task_id);
            assert_eq!(occurrence.final_gpa, -1.0);
        }
    }

    #[test]
    fn urgent_occurrences_are_placed_first() {
        // Both due at the same time; the one with the larger estimate is
        // more urgent and claims the slot right before the due date.
        let big = task("big", "2025-09-20T10:00:00Z", 60);
        let small = task("small", "2025-09-20T10:00:00Z", 10);
        let ui = UiSettings::default();
        let result = pipeline(&[], &[], &ui).run(&[small, big], now(), utc("2025-09-21T00:00:00Z"));
        let big = result.iter().find(|o| o.task_id == "big").unwrap();
        let small = result.iter().find(|o| o.task_id == "small").unwrap();
        assert!(big.positioning_gpa < small.positioning_gpa);
        assert_eq!(big.scheduled_end, Some(utc("2025-09-20T10:00:00Z")));
        assert_eq!(small.scheduled_end, Some(utc("2025-09-20T09:00:00Z")));
    }

    #[test]
    fn repeating_tasks_expand_and_overrides_win() {
        let mut daily = task("d", "2025-09-20T18:00:00Z", 30);
        daily.repetition_type = RepetitionType::Relative;
        daily.repetition_amount = Some(1);
        daily.repetition_unit = Some(DurationUnit::Days);
        let moved = occurrence_id("d", utc("2025-09-21T18:00:00Z"));
        daily.occurrence_overrides.insert(
            moved.clone(),
            OccurrenceOverride {
                due_date: Some(utc("2025-09-21T20:00:00Z")),
                name: Some("Late run".to_string()),
                ..OccurrenceOverride::default()
            },
        );
        let ui = UiSettings::default();
        let result = pipeline(&[], &[], &ui).run(&[daily], now(), utc("2025-09-22T23:00:00Z"));
        assert_eq!(result.len(), 3);
        let second = result.iter().find(|o| o.id == moved).unwrap();
        assert_eq!(second.base_due, utc("2025-09-21T20:00:00Z"));
        assert_eq!(second.name, "Late run");
    }

    #[test]
    fn vacations_and_schedule_filter() {
        let trip = Vacation {
            id: "v".to_string(),
            name: "Trip".to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 9, 20).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 9, 21).unwrap(),
        };
        let mut bypass = Category::new("Health", "#00ff00");
        bypass.bypass_vacation = true;
        let categories = vec![bypass, Category::new("Hidden", "#000000")];

        let mut gym = task("gym", "2025-09-20T18:00:00Z", 60);
        gym.category_id = Some("Health".to_string());
        let chores = task("chores", "2025-09-20T18:00:00Z", 60);
        let mut hidden = task("hidden", "2025-09-20T18:00:00Z", 60);
        hidden.category_id = Some("Hidden".to_string());

        let mut ui = UiSettings::default();
        ui.calendar_category_filters.insert(
            "Hidden".to_string(),
            CategoryFilterFlags {
                show: true,
                schedule: false,
            },
        );
        let vacations = [trip];
        let result = pipeline(&categories, &vacations, &ui).run(
            &[gym, chores, hidden],
            now(),
            utc("2025-09-30T00:00:00Z"),
        );
        assert_eq!(result.len(), 2);
        let gym = result.iter().find(|o| o.task_id == "gym").unwrap();
        assert_eq!(gym.base_due, utc("2025-09-20T18:00:00Z"));
        let chores = result.iter().find(|o| o.task_id == "chores").unwrap();
        assert_eq!(chores.base_due, utc("2025-09-22T18:00:00Z"));
    }

    #[test]
    fn final_gpa_colours() {
        assert_eq!(status_for_gpa(4.0, 0.5), StatusColor::Green);
        assert_eq!(status_for_gpa(2.0, 0.5), StatusColor::Yellow);
        assert_eq!(status_for_gpa(1.0, 0.5), StatusColor::Red);
        assert_eq!(status_for_gpa(0.2, 0.5), StatusColor::Black);
        assert_eq!(status_for_gpa(2.0, 0.0), StatusColor::Yellow);
        assert_eq!(status_for_gpa(1.9, 1.0), StatusColor::Red);
    }

    #[test]
    fn zero_duration_sits_on_due_date() {
        let mut reminder = task("r", "2025-09-20T09:00:00Z", 0);
        reminder.estimated_duration_amount = None;
        let ui = UiSettings::default();
        let result = pipeline(&[], &[], &ui).run(&[reminder], now(), utc("2025-09-21T00:00:00Z"));
        assert_eq!(result[0].scheduled_start, Some(utc("2025-09-20T09:00:00Z")));
        assert_eq!(result[0].scheduled_end, Some(utc("2025-09-20T09:00:00Z")));
        assert_eq!(result[0].final_gpa, 4.0);
    }
}
