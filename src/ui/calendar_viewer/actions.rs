use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::calendar::{self, CalendarEvent, SlotRequest, ViewKind};
use crate::cli::Common;
use crate::error::{Error, Result};
use crate::lifecycle;
use crate::state::Planner;
use crate::units;

const NEW_EVENT_HOUR: u32 = 9;

#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub changed: bool,
    pub message: String,
    pub task_id: Option<String>,
}

/// Open for writing, apply `action`, refresh and save.
fn with_planner<F>(common: &Common, action: F) -> Result<ActionOutcome>
where
    F: FnOnce(&mut Planner, DateTime<Utc>) -> Result<ActionOutcome>,
{
    let (mut planner, now) = common.open()?;
    let outcome = action(&mut planner, now)?;
    if outcome.changed {
        let ctx = planner.context(now);
        lifecycle::refresh_statuses(&mut planner.tasks, &ctx);
        planner.save(now)?;
    }
    Ok(outcome)
}

fn task_event(event: &CalendarEvent) -> Result<&CalendarEvent> {
    if event.historical.is_some() {
        return Err(Error::InvalidArgument(format!(
            "'{}' is a history entry and cannot be changed here",
            event.title
        )));
    }
    Ok(event)
}

pub fn remember_view(common: &Common, kind: ViewKind) -> Result<ActionOutcome> {
    with_planner(common, |planner, _| {
        let changed = planner.settings.calendar.last_view != kind.stored_name();
        if changed {
            planner.settings.calendar.last_view = kind.stored_name().to_string();
        }
        Ok(ActionOutcome {
            changed,
            message: format!("{} view", kind.stored_name()),
            task_id: None,
        })
    })
}

/// Create an event at the default hour of `day`.
pub fn create_event(common: &Common, day: NaiveDate) -> Result<ActionOutcome> {
    with_planner(common, |planner, _| {
        let time = NaiveTime::from_hms_opt(NEW_EVENT_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
        let start = units::at_local(day, time, planner.offset);
        let id = planner.new_id();
        let created = calendar::create_at(
            &mut planner.tasks,
            &mut planner.categories,
            &planner.settings,
            id,
            SlotRequest {
                start,
                minutes: None,
                name: None,
                category: None,
            },
        )?;
        Ok(ActionOutcome {
            changed: true,
            message: format!("created '{}' on {day}", created.name),
            task_id: Some(created.id),
        })
    })
}

/// Move an event's occurrence by whole days.
pub fn shift_event(common: &Common, event: &CalendarEvent, days: i64) -> Result<ActionOutcome> {
    let event = task_event(event)?;
    let new_due = event.end + Duration::days(days);
    with_planner(common, |planner, _| {
        let outcome = calendar::move_occurrence(
            &mut planner.tasks,
            &event.task_id,
            Some(&event.id),
            new_due,
            None,
        )?;
        let due = units::local_date(outcome.to, planner.offset);
        Ok(ActionOutcome {
            changed: true,
            message: format!("moved '{}' to {due}", event.title),
            task_id: Some(outcome.task_id),
        })
    })
}

/// Request and confirm completion in one step.
pub fn complete_event(common: &Common, event: &CalendarEvent) -> Result<ActionOutcome> {
    let event = task_event(event)?;
    with_planner(common, |planner, now| {
        let ctx = planner.context(now);
        lifecycle::request_completion(&mut planner.tasks, &event.task_id, &ctx)?;
        let transition = lifecycle::confirm_completion(
            &mut planner.tasks,
            &mut planner.history,
            &event.task_id,
            true,
            &ctx,
        )?;
        Ok(ActionOutcome {
            changed: true,
            message: if transition.removed {
                format!("completed and archived '{}'", transition.name)
            } else {
                format!("completed '{}'", transition.name)
            },
            task_id: Some(transition.task_id),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarView;
    use tempfile::TempDir;

    fn common(dir: &TempDir) -> Common {
        Common {
            data_dir: Some(dir.path().to_path_buf()),
            json: false,
            quiet: true,
            verbose: false,
            now: Some("2024-03-04T08:00:00Z".to_string()),
        }
    }

    fn events_on(common: &Common, day: NaiveDate) -> Vec<CalendarEvent> {
        let (planner, _) = common.open_read_only().unwrap();
        let view: CalendarView = crate::cli::calendar::build_view(&planner, ViewKind::Day, day);
        view.events
    }

    #[test]
    fn create_then_shift_event() {
        let dir = TempDir::new().unwrap();
        let common = common(&dir);
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        let created = create_event(&common, day).unwrap();
        assert!(created.changed);
        let events = events_on(&common, day);
        assert_eq!(events.len(), 1);

        let moved = shift_event(&common, &events[0], 1).unwrap();
        assert_eq!(moved.task_id, created.task_id);
        assert!(events_on(&common, day).is_empty());
        assert_eq!(events_on(&common, day + Duration::days(1)).len(), 1);
    }

    #[test]
    fn history_events_are_read_only() {
        let dir = TempDir::new().unwrap();
        let common = common(&dir);
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        create_event(&common, day).unwrap();
        let mut event = events_on(&common, day).remove(0);
        event.historical = Some(crate::history::RecordStatus::Completed);
        assert!(shift_event(&common, &event, 1).is_err());
    }
}
