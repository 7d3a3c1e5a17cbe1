//! Overdue and miss state machine
//!
//! Every prompt the planner shows a user is a `confirmationState` on the
//! task. Requests move a task into a confirming state; confirmations leave
//! it, append history and advance repeating tasks to their next cycle.
//! Transitions out of the wrong state are refused with
//! [`Error::TransitionBlocked`].

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::history::{self, HistoricalRecord, RecordStatus};
use crate::recurrence;
use crate::status::{self, SensitivityParams};
use crate::task::{CompletionType, ConfirmationState, StatusColor, Task};
use crate::units::{MS_PER_MINUTE, MS_PER_SECOND};

/// Clock and thresholds shared by every transition of one invocation.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
    pub params: SensitivityParams,
}

/// What a transition did to a task.
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    pub task_id: String,
    pub name: String,
    pub from: Option<ConfirmationState>,
    pub to: Option<ConfirmationState>,
    pub status: StatusColor,
    pub due_date: Option<DateTime<Utc>>,
    pub pending_cycles: Option<u32>,
    pub misses: f64,
    /// The task was archived and removed from the store.
    pub removed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<HistoricalRecord>,
}

impl Transition {
    fn of(task: &Task, from: Option<ConfirmationState>) -> Self {
        Self {
            task_id: task.id.clone(),
            name: task.name.clone(),
            from,
            to: task.confirmation_state,
            status: task.status,
            due_date: task.due_date,
            pending_cycles: task.pending_cycles,
            misses: task.misses,
            removed: false,
            record: None,
        }
    }

    fn with_record(mut self, record: HistoricalRecord) -> Self {
        self.record = Some(record);
        self
    }

    fn archived(mut self) -> Self {
        self.removed = true;
        self
    }
}

fn index_of(tasks: &[Task], task_id: &str) -> Result<usize> {
    tasks
        .iter()
        .position(|task| task.id == task_id)
        .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))
}

fn require_state(task: &Task, expected: ConfirmationState) -> Result<()> {
    if task.confirmation_state == Some(expected) {
        return Ok(());
    }
    let current = task
        .confirmation_state
        .map(|state| state.as_str())
        .unwrap_or("none");
    Err(Error::blocked(
        &task.id,
        format!("expected state {} but task is in {current}", expected.as_str()),
    ))
}

fn is_past_due(task: &Task, now: DateTime<Utc>) -> bool {
    task.due_date.is_some_and(|due| due <= now)
}

// =============================================================================
// Status refresh
// =============================================================================

/// Recompute every status and raise the overdue prompt for tasks that just
/// became past due. Returns the ids of tasks whose status or state changed.
///
/// Tasks are updated in order, so later tasks see the fresh status of
/// earlier ones when measuring busy load.
pub fn refresh_statuses(tasks: &mut [Task], ctx: &Context) -> Vec<String> {
    let mut changed = Vec::new();
    for index in 0..tasks.len() {
        if tasks[index].is_finished() {
            continue;
        }
        let status = status::calculate_status(&tasks[index], ctx.now, tasks, &ctx.params);

        let task = &mut tasks[index];
        let old_status = task.status;
        let old_state = task.confirmation_state;
        task.status = status;

        let past_due = is_past_due(task, ctx.now);
        if past_due && task.status != StatusColor::Blue && task.confirmation_state.is_none() {
            task.confirmation_state = Some(ConfirmationState::AwaitingOverdueInput);
            task.status = StatusColor::Black;
            if task.overdue_start_date.is_none() {
                task.overdue_start_date = task.due_date;
            }
            task.pending_cycles = Some(recurrence::pending_cycles(task, ctx.now, ctx.offset));
            if task.is_timer_running {
                pause_timer(task, ctx.now);
            }
            tracing::debug!(task = %task.id, "task became overdue");
        } else if !past_due
            && matches!(
                task.confirmation_state,
                Some(ConfirmationState::AwaitingOverdueInput) | Some(ConfirmationState::ConfirmingMiss)
            )
        {
            task.clear_pending();
        }

        if task.status != old_status || task.confirmation_state != old_state {
            changed.push(task.id.clone());
        }
    }
    changed
}

/// Credit elapsed time to running timers. Timers that reach their target
/// stop; others restart their interval at `now`.
pub fn settle_timers(tasks: &mut [Task], now: DateTime<Utc>) -> usize {
    let mut settled = 0;
    for task in tasks
        .iter_mut()
        .filter(|task| task.is_timer_running && task.completion_type == CompletionType::Time)
    {
        let started = task.timer_last_started.unwrap_or(now);
        let elapsed = (now - started).num_milliseconds().max(0) as f64;
        let target = task.time_target_ms() as f64;
        task.current_progress += elapsed;
        if task.current_progress >= target {
            task.current_progress = target;
            task.is_timer_running = false;
            task.timer_last_started = None;
        } else {
            task.timer_last_started = Some(now);
        }
        settled += 1;
    }
    settled
}

// =============================================================================
// Completion
// =============================================================================

/// Ask to complete the task. Overdue tasks remember when they went overdue
/// and how many cycles the completion covers.
pub fn request_completion(tasks: &mut [Task], task_id: &str, ctx: &Context) -> Result<Transition> {
    let index = index_of(tasks, task_id)?;
    let task = &mut tasks[index];
    let from = task.confirmation_state;
    if task.is_finished() {
        return Err(Error::blocked(&task.id, "task is already completed"));
    }
    begin_completion(task, ctx);
    Ok(Transition::of(task, from))
}

fn begin_completion(task: &mut Task, ctx: &Context) {
    if task.is_timer_running {
        pause_timer(task, ctx.now);
    }
    task.confirmation_state = Some(ConfirmationState::ConfirmingComplete);
    if is_past_due(task, ctx.now) {
        if task.overdue_start_date.is_none() {
            task.overdue_start_date = task.due_date;
        }
        task.pending_cycles = Some(recurrence::pending_cycles(task, ctx.now, ctx.offset));
    } else {
        task.pending_cycles = Some(1);
        task.overdue_start_date = None;
    }
}

/// Answer the completion prompt.
///
/// Confirming a repeating task records a completion, forgives one miss per
/// completed cycle and moves the due date forward. One-off tasks are
/// archived and removed. Declining an overdue task returns it to the
/// overdue prompt; declining otherwise backs progress off its target.
pub fn confirm_completion(
    tasks: &mut Vec<Task>,
    history: &mut Vec<HistoricalRecord>,
    task_id: &str,
    confirmed: bool,
    ctx: &Context,
) -> Result<Transition> {
    let index = index_of(tasks, task_id)?;
    require_state(&tasks[index], ConfirmationState::ConfirmingComplete)?;
    let from = tasks[index].confirmation_state;

    let cycles = tasks[index].pending_cycles.unwrap_or(1).max(1);
    let was_overdue = tasks[index].overdue_start_date.is_some();
    let base = tasks[index]
        .overdue_start_date
        .or(tasks[index].due_date)
        .unwrap_or(ctx.now);

    if !confirmed {
        let task = &mut tasks[index];
        if was_overdue {
            task.confirmation_state = Some(ConfirmationState::AwaitingOverdueInput);
        } else {
            task.confirmation_state = None;
            if let Some(target) = task.progress_target() {
                if task.current_progress >= target {
                    let step = match task.completion_type {
                        CompletionType::Time => MS_PER_SECOND as f64,
                        _ => 1.0,
                    };
                    task.current_progress = target - step;
                }
            }
        }
        task.pending_cycles = None;
        task.overdue_start_date = None;
        return Ok(Transition::of(task, from));
    }

    let record = HistoricalRecord::new(&tasks[index], RecordStatus::Completed, 1.0, ctx.now, Some(base));
    history.push(record.clone());

    if !tasks[index].is_repeating() {
        let task = tasks.remove(index);
        tracing::info!(task = %task.id, "archived completed task");
        return Ok(Transition::of(&task, from).with_record(record).archived());
    }

    let next_due = recurrence::advance_due_date(&tasks[index], base, cycles, ctx.offset);
    let task = &mut tasks[index];
    task.is_timer_running = false;
    task.timer_last_started = None;
    let misses_before = task.misses;
    task.misses = (misses_before - f64::from(cycles)).max(0.0);
    let reduced = task.misses < misses_before;

    match next_due {
        Some(due) => {
            task.due_date = Some(due);
            task.cycle_end_date = if was_overdue { None } else { Some(base) };
            task.completion_reduced_misses = reduced;
        }
        None => {
            tracing::warn!(task = %task.id, "no next occurrence found; due date kept");
            task.completion_reduced_misses = false;
        }
    }
    task.current_progress = 0.0;
    task.completed = false;
    task.clear_pending();

    let status = if was_overdue || next_due.is_none() {
        status::calculate_status(&tasks[index], ctx.now, tasks, &ctx.params)
    } else {
        StatusColor::Blue
    };
    tasks[index].status = status;
    Ok(Transition::of(&tasks[index], from).with_record(record))
}

// =============================================================================
// Overdue prompt and misses
// =============================================================================

/// The user's answer to "was this done?" on an overdue task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverdueChoice {
    Completed,
    Missed,
}

impl OverdueChoice {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "completed" | "complete" | "done" => Some(Self::Completed),
            "missed" | "miss" => Some(Self::Missed),
            _ => None,
        }
    }
}

pub fn overdue_choice(
    tasks: &mut [Task],
    task_id: &str,
    choice: OverdueChoice,
    ctx: &Context,
) -> Result<Transition> {
    let index = index_of(tasks, task_id)?;
    let task = &mut tasks[index];
    require_state(task, ConfirmationState::AwaitingOverdueInput)?;
    let from = task.confirmation_state;
    if task.overdue_start_date.is_none() {
        task.overdue_start_date = task.due_date;
    }
    task.pending_cycles = Some(recurrence::pending_cycles(task, ctx.now, ctx.offset));
    task.confirmation_state = Some(match choice {
        OverdueChoice::Completed => ConfirmationState::ConfirmingComplete,
        OverdueChoice::Missed => ConfirmationState::ConfirmingMiss,
    });
    Ok(Transition::of(task, from))
}

/// Share of the progress target reached, for miss records.
fn partial_progress(task: &Task) -> f64 {
    let ratio = match task.completion_type {
        CompletionType::Count if task.count_target.unwrap_or(0) > 0 => {
            task.current_progress / task.count_target.unwrap_or(1) as f64
        }
        CompletionType::Time if task.time_target_ms() > 0 => {
            task.current_progress / task.time_target_ms() as f64
        }
        _ => 0.0,
    };
    ratio.clamp(0.0, 1.0)
}

/// Answer the miss prompt.
///
/// `misses` splits the pending cycles into misses and completions; it
/// defaults to all of them. The first miss is softened by partial progress.
/// Declining returns the task to the overdue prompt.
pub fn confirm_miss(
    tasks: &mut Vec<Task>,
    history: &mut Vec<HistoricalRecord>,
    task_id: &str,
    confirmed: bool,
    misses: Option<u32>,
    ctx: &Context,
) -> Result<Transition> {
    let index = index_of(tasks, task_id)?;
    require_state(&tasks[index], ConfirmationState::ConfirmingMiss)?;
    let from = tasks[index].confirmation_state;

    if !confirmed {
        let task = &mut tasks[index];
        task.confirmation_state = Some(ConfirmationState::AwaitingOverdueInput);
        task.pending_cycles = None;
        task.overdue_start_date = None;
        return Ok(Transition::of(task, from));
    }

    let total = tasks[index].pending_cycles.unwrap_or(1).max(1);
    let to_miss = match misses {
        Some(count) if count > total => {
            return Err(Error::InvalidArgument(format!(
                "cannot record {count} misses for {total} pending cycle(s)"
            )));
        }
        Some(count) if total > 1 => count,
        _ => total,
    };
    let to_complete = total - to_miss;
    let base = tasks[index]
        .overdue_start_date
        .or(tasks[index].due_date)
        .unwrap_or(ctx.now);
    let progress = partial_progress(&tasks[index]);

    if !tasks[index].is_repeating() {
        let record = HistoricalRecord::new(&tasks[index], RecordStatus::Missed, progress, ctx.now, Some(base));
        history.push(record.clone());
        let task = tasks.remove(index);
        tracing::info!(task = %task.id, "archived missed task");
        return Ok(Transition::of(&task, from).with_record(record).archived());
    }

    let mut record = None;
    if to_miss > 0 {
        let missed = HistoricalRecord::new(&tasks[index], RecordStatus::Missed, progress, ctx.now, Some(base));
        history.push(missed.clone());
        record = Some(missed);
    }

    let next_due = recurrence::advance_due_date(&tasks[index], base, total, ctx.offset);
    let task = &mut tasks[index];
    if to_complete > 0 {
        task.misses = (task.misses - f64::from(to_complete)).max(0.0);
    }
    if to_miss > 0 && task.track_misses {
        let added = f64::from(to_miss - 1) + (1.0 - progress);
        if added > 0.0 {
            let cap = task
                .max_misses
                .filter(|max| *max > 0)
                .map(|max| max as f64)
                .unwrap_or(f64::INFINITY);
            task.misses = (task.misses + added).min(cap);
        }
    }
    task.due_date = next_due;
    task.cycle_end_date = None;
    task.current_progress = 0.0;
    task.clear_pending();

    let status = status::calculate_status(&tasks[index], ctx.now, tasks, &ctx.params);
    tasks[index].status = status;
    let transition = Transition::of(&tasks[index], from);
    Ok(match record {
        Some(record) => transition.with_record(record),
        None => transition,
    })
}

// =============================================================================
// Undo and delete
// =============================================================================

/// Ask to undo the last completion of a repeating task that is still blue.
pub fn request_undo(tasks: &mut [Task], task_id: &str) -> Result<Transition> {
    let index = index_of(tasks, task_id)?;
    let task = &mut tasks[index];
    if task.status != StatusColor::Blue || !task.is_repeating() {
        return Err(Error::blocked(
            &task.id,
            "only a repeating task completed this cycle can be undone",
        ));
    }
    let from = task.confirmation_state;
    task.confirmation_state = Some(ConfirmationState::ConfirmingUndo);
    Ok(Transition::of(task, from))
}

/// Answer the undo prompt. Confirming drops the last completion record,
/// restores the previous due date and gives back a forgiven miss.
pub fn confirm_undo(
    tasks: &mut [Task],
    history: &mut Vec<HistoricalRecord>,
    task_id: &str,
    confirmed: bool,
    ctx: &Context,
) -> Result<Transition> {
    let index = index_of(tasks, task_id)?;
    require_state(&tasks[index], ConfirmationState::ConfirmingUndo)?;
    let from = tasks[index].confirmation_state;
    let mut removed = None;

    if confirmed && tasks[index].status == StatusColor::Blue && tasks[index].is_repeating() {
        removed = history::remove_last_completed(history, task_id);
        let task = &mut tasks[index];
        task.due_date = Some(task.cycle_end_date.unwrap_or(ctx.now));
        task.cycle_end_date = None;
        if task.completion_reduced_misses && task.track_misses && task.max_misses.unwrap_or(0) > 0 {
            let cap = task.max_misses.unwrap_or(0) as f64;
            task.misses = (task.misses + 1.0).min(cap);
        }
        task.completion_reduced_misses = false;
    }
    tasks[index].confirmation_state = None;
    if confirmed {
        let status = status::calculate_status(&tasks[index], ctx.now, tasks, &ctx.params);
        tasks[index].status = status;
    }
    let transition = Transition::of(&tasks[index], from);
    Ok(match removed {
        Some(record) => transition.with_record(record),
        None => transition,
    })
}

pub fn request_delete(tasks: &mut [Task], task_id: &str) -> Result<Transition> {
    let index = index_of(tasks, task_id)?;
    let task = &mut tasks[index];
    let from = task.confirmation_state;
    task.confirmation_state = Some(ConfirmationState::ConfirmingDelete);
    Ok(Transition::of(task, from))
}

/// Answer the delete prompt. Deleting never writes history.
pub fn confirm_delete(tasks: &mut Vec<Task>, task_id: &str, confirmed: bool) -> Result<Transition> {
    let index = index_of(tasks, task_id)?;
    require_state(&tasks[index], ConfirmationState::ConfirmingDelete)?;
    let from = tasks[index].confirmation_state;
    if confirmed {
        let task = tasks.remove(index);
        return Ok(Transition::of(&task, from).archived());
    }
    tasks[index].confirmation_state = None;
    Ok(Transition::of(&tasks[index], from))
}

// =============================================================================
// Progress
// =============================================================================

fn require_completion_type(task: &Task, expected: CompletionType) -> Result<()> {
    if task.completion_type == expected {
        return Ok(());
    }
    let kind = match expected {
        CompletionType::Count => "count",
        CompletionType::Time => "time",
        CompletionType::Simple => "simple",
    };
    Err(Error::InvalidArgument(format!(
        "task '{}' is not a {kind} task",
        task.name
    )))
}

/// Add one to a count task; reaching the target requests completion.
pub fn increment_count(tasks: &mut [Task], task_id: &str, ctx: &Context) -> Result<Transition> {
    let index = index_of(tasks, task_id)?;
    let task = &mut tasks[index];
    require_completion_type(task, CompletionType::Count)?;
    let Some(target) = task.count_target.filter(|target| *target > 0) else {
        return Err(Error::InvalidArgument(format!(
            "task '{}' has no count target",
            task.name
        )));
    };
    let from = task.confirmation_state;
    task.current_progress += 1.0;
    if task.current_progress >= target as f64 {
        task.current_progress = target as f64;
        begin_completion(task, ctx);
    }
    Ok(Transition::of(task, from))
}

pub fn decrement_count(tasks: &mut [Task], task_id: &str) -> Result<Transition> {
    let index = index_of(tasks, task_id)?;
    let task = &mut tasks[index];
    require_completion_type(task, CompletionType::Count)?;
    task.current_progress = (task.current_progress - 1.0).max(0.0);
    Ok(Transition::of(task, task.confirmation_state))
}

/// Stop a running timer and add the elapsed time to progress.
fn pause_timer(task: &mut Task, now: DateTime<Utc>) {
    let started = task.timer_last_started.unwrap_or(now);
    let elapsed = (now - started).num_milliseconds().max(0) as f64;
    let target = task.time_target_ms() as f64;
    task.current_progress = (task.current_progress + elapsed).min(target);
    task.is_timer_running = false;
    task.timer_last_started = None;
}

/// Start or stop the timer of a time task. Reaching the target requests
/// completion.
pub fn toggle_timer(tasks: &mut [Task], task_id: &str, ctx: &Context) -> Result<Transition> {
    let index = index_of(tasks, task_id)?;
    let task = &mut tasks[index];
    require_completion_type(task, CompletionType::Time)?;
    let from = task.confirmation_state;
    let target = task.time_target_ms() as f64;

    if task.is_timer_running {
        pause_timer(task, ctx.now);
        if task.current_progress >= target {
            begin_completion(task, ctx);
        }
    } else if task.current_progress >= target {
        begin_completion(task, ctx);
    } else {
        task.is_timer_running = true;
        task.timer_last_started = Some(ctx.now);
    }
    Ok(Transition::of(task, from))
}

/// Set progress directly. Count tasks take a count, time tasks take
/// minutes. Values are clamped to the target.
pub fn set_progress(tasks: &mut [Task], task_id: &str, value: i64, ctx: &Context) -> Result<Transition> {
    let index = index_of(tasks, task_id)?;
    let task = &mut tasks[index];
    let from = task.confirmation_state;
    if task.is_timer_running {
        pause_timer(task, ctx.now);
    }
    let target = match task.completion_type {
        CompletionType::Count => {
            let target = task
                .count_target
                .filter(|target| *target > 0)
                .map(|target| target as f64)
                .unwrap_or(f64::INFINITY);
            task.current_progress = (value as f64).clamp(0.0, target);
            target
        }
        CompletionType::Time => {
            let target = task.time_target_ms() as f64;
            let requested = value.saturating_mul(MS_PER_MINUTE) as f64;
            task.current_progress = requested.min(target).max(0.0);
            target
        }
        CompletionType::Simple => {
            return Err(Error::InvalidArgument(format!(
                "task '{}' does not track progress",
                task.name
            )));
        }
    };
    if task.current_progress >= target {
        begin_completion(task, ctx);
    }
    Ok(Transition::of(task, from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::RepetitionType;
    use crate::units::DurationUnit;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn ctx(now: &str) -> Context {
        Context {
            now: utc(now),
            offset: FixedOffset::east_opt(0).unwrap(),
            params: SensitivityParams::default(),
        }
    }

    fn daily(id: &str, due: &str) -> Task {
        let mut task = Task::new(id, id);
        task.due_date = Some(utc(due));
        task.repetition_type = RepetitionType::Relative;
        task.repetition_amount = Some(1);
        task.repetition_unit = Some(DurationUnit::Days);
        task.max_misses = Some(3);
        task.estimated_duration_amount = Some(30);
        task
    }

    #[test]
    fn overdue_task_awaits_input_and_turns_black() {
        let mut tasks = vec![daily("a", "2025-09-18T10:00:00Z")];
        let changed = refresh_statuses(&mut tasks, &ctx("2025-09-20T12:00:00Z"));
        assert_eq!(changed, vec!["a".to_string()]);
        let task = &tasks[0];
        assert_eq!(task.confirmation_state, Some(ConfirmationState::AwaitingOverdueInput));
        assert_eq!(task.status, StatusColor::Black);
        assert_eq!(task.overdue_start_date, Some(utc("2025-09-18T10:00:00Z")));
        assert_eq!(task.pending_cycles, Some(3));
    }

    #[test]
    fn moving_due_date_forward_clears_the_prompt() {
        let mut tasks = vec![daily("a", "2025-09-18T10:00:00Z")];
        let context = ctx("2025-09-20T12:00:00Z");
        refresh_statuses(&mut tasks, &context);
        tasks[0].due_date = Some(utc("2025-09-25T10:00:00Z"));
        refresh_statuses(&mut tasks, &context);
        assert_eq!(tasks[0].confirmation_state, None);
        assert_eq!(tasks[0].pending_cycles, None);
        assert_eq!(tasks[0].overdue_start_date, None);
    }

    #[test]
    fn choosing_missed_enters_confirming_miss_with_cycles() {
        let mut tasks = vec![daily("a", "2025-09-19T10:00:00Z")];
        let context = ctx("2025-09-20T12:00:00Z");
        refresh_statuses(&mut tasks, &context);
        let transition = overdue_choice(&mut tasks, "a", OverdueChoice::Missed, &context).unwrap();
        assert_eq!(transition.to, Some(ConfirmationState::ConfirmingMiss));
        assert_eq!(transition.pending_cycles, Some(2));
    }

    #[test]
    fn overdue_choice_requires_awaiting_state() {
        let mut tasks = vec![daily("a", "2025-09-25T10:00:00Z")];
        let err = overdue_choice(&mut tasks, "a", OverdueChoice::Missed, &ctx("2025-09-20T12:00:00Z"))
            .unwrap_err();
        assert!(matches!(err, Error::TransitionBlocked { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn completing_on_time_turns_blue_until_cycle_end() {
        let mut tasks = vec![daily("a", "2025-09-20T18:00:00Z")];
        tasks[0].misses = 2.0;
        let mut history = Vec::new();
        let context = ctx("2025-09-20T12:00:00Z");
        request_completion(&mut tasks, "a", &context).unwrap();
        let transition = confirm_completion(&mut tasks, &mut history, "a", true, &context).unwrap();

        let task = &tasks[0];
        assert_eq!(task.status, StatusColor::Blue);
        assert_eq!(task.due_date, Some(utc("2025-09-21T18:00:00Z")));
        assert_eq!(task.cycle_end_date, Some(utc("2025-09-20T18:00:00Z")));
        assert_eq!(task.misses, 1.0);
        assert!(task.completion_reduced_misses);
        assert_eq!(task.confirmation_state, None);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, RecordStatus::Completed);
        assert!(transition.record.is_some());
    }

    #[test]
    fn completing_one_off_archives_it() {
        let mut task = Task::new("once", "once");
        task.due_date = Some(utc("2025-09-21T18:00:00Z"));
        let mut tasks = vec![task];
        let mut history = Vec::new();
        let context = ctx("2025-09-20T12:00:00Z");
        request_completion(&mut tasks, "once", &context).unwrap();
        let transition = confirm_completion(&mut tasks, &mut history, "once", true, &context).unwrap();
        assert!(transition.removed);
        assert!(tasks.is_empty());
        assert_eq!(history[0].original_task_id, "once");
    }

    #[test]
    fn declining_completion_backs_off_progress() {
        let mut task = Task::new("c", "c");
        task.due_date = Some(utc("2025-09-21T18:00:00Z"));
        task.completion_type = CompletionType::Count;
        task.count_target = Some(3);
        task.current_progress = 2.0;
        let mut tasks = vec![task];
        let mut history = Vec::new();
        let context = ctx("2025-09-20T12:00:00Z");
        let transition = increment_count(&mut tasks, "c", &context).unwrap();
        assert_eq!(transition.to, Some(ConfirmationState::ConfirmingComplete));
        confirm_completion(&mut tasks, &mut history, "c", false, &context).unwrap();
        assert_eq!(tasks[0].current_progress, 2.0);
        assert_eq!(tasks[0].confirmation_state, None);
        assert!(history.is_empty());
    }

    #[test]
    fn declining_overdue_completion_returns_to_prompt() {
        let mut tasks = vec![daily("a", "2025-09-19T10:00:00Z")];
        let mut history = Vec::new();
        let context = ctx("2025-09-20T12:00:00Z");
        refresh_statuses(&mut tasks, &context);
        overdue_choice(&mut tasks, "a", OverdueChoice::Completed, &context).unwrap();
        confirm_completion(&mut tasks, &mut history, "a", false, &context).unwrap();
        assert_eq!(tasks[0].confirmation_state, Some(ConfirmationState::AwaitingOverdueInput));
    }

    #[test]
    fn confirming_misses_softens_first_miss_and_advances() {
        let mut tasks = vec![daily("a", "2025-09-19T10:00:00Z")];
        tasks[0].completion_type = CompletionType::Count;
        tasks[0].count_target = Some(4);
        tasks[0].current_progress = 2.0;
        let mut history = Vec::new();
        let context = ctx("2025-09-20T12:00:00Z");
        refresh_statuses(&mut tasks, &context);
        overdue_choice(&mut tasks, "a", OverdueChoice::Missed, &context).unwrap();
        let transition =
            confirm_miss(&mut tasks, &mut history, "a", true, Some(2), &context).unwrap();

        let task = &tasks[0];
        assert_eq!(task.misses, 1.5);
        assert_eq!(task.due_date, Some(utc("2025-09-21T10:00:00Z")));
        assert_eq!(task.current_progress, 0.0);
        assert_eq!(task.confirmation_state, None);
        let record = transition.record.unwrap();
        assert_eq!(record.status, RecordStatus::Missed);
        assert_eq!(record.progress, 0.5);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn misses_are_capped_and_completions_forgiven() {
        let mut tasks = vec![daily("a", "2025-09-18T10:00:00Z")];
        tasks[0].misses = 2.5;
        let mut history = Vec::new();
        let context = ctx("2025-09-20T12:00:00Z");
        refresh_statuses(&mut tasks, &context);
        overdue_choice(&mut tasks, "a", OverdueChoice::Missed, &context).unwrap();
        assert_eq!(tasks[0].pending_cycles, Some(3));
        confirm_miss(&mut tasks, &mut history, "a", true, Some(1), &context).unwrap();
        // Two completions forgive two misses; one miss adds one.
        assert_eq!(tasks[0].misses, 1.5);

        let err = confirm_miss(&mut tasks, &mut history, "a", true, None, &context).unwrap_err();
        assert!(matches!(err, Error::TransitionBlocked { .. }));
    }

    #[test]
    fn too_many_misses_is_rejected() {
        let mut tasks = vec![daily("a", "2025-09-19T10:00:00Z")];
        let mut history = Vec::new();
        let context = ctx("2025-09-20T12:00:00Z");
        refresh_statuses(&mut tasks, &context);
        overdue_choice(&mut tasks, "a", OverdueChoice::Missed, &context).unwrap();
        let err = confirm_miss(&mut tasks, &mut history, "a", true, Some(5), &context).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn declining_miss_returns_to_prompt() {
        let mut tasks = vec![daily("a", "2025-09-19T10:00:00Z")];
        let mut history = Vec::new();
        let context = ctx("2025-09-20T12:00:00Z");
        refresh_statuses(&mut tasks, &context);
        overdue_choice(&mut tasks, "a", OverdueChoice::Missed, &context).unwrap();
        confirm_miss(&mut tasks, &mut history, "a", false, None, &context).unwrap();
        assert_eq!(tasks[0].confirmation_state, Some(ConfirmationState::AwaitingOverdueInput));
        assert!(history.is_empty());
    }

    #[test]
    fn undo_restores_previous_cycle() {
        let mut tasks = vec![daily("a", "2025-09-20T18:00:00Z")];
        tasks[0].misses = 1.0;
        let mut history = Vec::new();
        let context = ctx("2025-09-20T12:00:00Z");
        request_completion(&mut tasks, "a", &context).unwrap();
        confirm_completion(&mut tasks, &mut history, "a", true, &context).unwrap();
        assert_eq!(tasks[0].misses, 0.0);

        request_undo(&mut tasks, "a").unwrap();
        confirm_undo(&mut tasks, &mut history, "a", true, &context).unwrap();
        let task = &tasks[0];
        assert_eq!(task.due_date, Some(utc("2025-09-20T18:00:00Z")));
        assert_eq!(task.cycle_end_date, None);
        assert_eq!(task.misses, 1.0);
        assert_ne!(task.status, StatusColor::Blue);
        assert!(history.is_empty());
    }

    #[test]
    fn undo_requires_blue_repeating_task() {
        let mut tasks = vec![daily("a", "2025-09-22T18:00:00Z")];
        assert!(matches!(
            request_undo(&mut tasks, "a"),
            Err(Error::TransitionBlocked { .. })
        ));
    }

    #[test]
    fn delete_needs_confirmation() {
        let mut tasks = vec![daily("a", "2025-09-22T18:00:00Z")];
        assert!(confirm_delete(&mut tasks, "a", true).is_err());
        request_delete(&mut tasks, "a").unwrap();
        confirm_delete(&mut tasks, "a", false).unwrap();
        assert_eq!(tasks[0].confirmation_state, None);
        request_delete(&mut tasks, "a").unwrap();
        assert!(confirm_delete(&mut tasks, "a", true).unwrap().removed);
        assert!(tasks.is_empty());
    }

    #[test]
    fn timer_accumulates_and_triggers_completion() {
        let mut task = Task::new("t", "t");
        task.due_date = Some(utc("2025-09-21T18:00:00Z"));
        task.completion_type = CompletionType::Time;
        task.time_target_amount = Some(30);
        task.time_target_unit = Some(DurationUnit::Minutes);
        let mut tasks = vec![task];

        toggle_timer(&mut tasks, "t", &ctx("2025-09-20T12:00:00Z")).unwrap();
        assert!(tasks[0].is_timer_running);
        let stopped = toggle_timer(&mut tasks, "t", &ctx("2025-09-20T12:10:00Z")).unwrap();
        assert!(!tasks[0].is_timer_running);
        assert_eq!(tasks[0].current_progress, (10 * MS_PER_MINUTE) as f64);
        assert_eq!(stopped.to, None);

        toggle_timer(&mut tasks, "t", &ctx("2025-09-20T13:00:00Z")).unwrap();
        let done = toggle_timer(&mut tasks, "t", &ctx("2025-09-20T14:00:00Z")).unwrap();
        assert_eq!(tasks[0].current_progress, (30 * MS_PER_MINUTE) as f64);
        assert_eq!(done.to, Some(ConfirmationState::ConfirmingComplete));
    }

    #[test]
    fn settle_timers_credits_elapsed_time() {
        let mut task = Task::new("t", "t");
        task.completion_type = CompletionType::Time;
        task.time_target_amount = Some(1);
        task.time_target_unit = Some(DurationUnit::Hours);
        task.is_timer_running = true;
        task.timer_last_started = Some(utc("2025-09-20T12:00:00Z"));
        let mut tasks = vec![task];
        assert_eq!(settle_timers(&mut tasks, utc("2025-09-20T12:20:00Z")), 1);
        assert_eq!(tasks[0].current_progress, (20 * MS_PER_MINUTE) as f64);
        assert_eq!(tasks[0].timer_last_started, Some(utc("2025-09-20T12:20:00Z")));
        settle_timers(&mut tasks, utc("2025-09-20T14:00:00Z"));
        assert!(!tasks[0].is_timer_running);
        assert_eq!(tasks[0].current_progress, (60 * MS_PER_MINUTE) as f64);
    }

    #[test]
    fn set_progress_clamps_and_completes() {
        let mut task = Task::new("t", "t");
        task.completion_type = CompletionType::Time;
        task.time_target_amount = Some(1);
        task.time_target_unit = Some(DurationUnit::Hours);
        let mut tasks = vec![task];
        let context = ctx("2025-09-20T12:00:00Z");
        set_progress(&mut tasks, "t", 15, &context).unwrap();
        assert_eq!(tasks[0].current_progress, (15 * MS_PER_MINUTE) as f64);
        let transition = set_progress(&mut tasks, "t", 90, &context).unwrap();
        assert_eq!(tasks[0].current_progress, (60 * MS_PER_MINUTE) as f64);
        assert_eq!(transition.to, Some(ConfirmationState::ConfirmingComplete));

        let mut simple = vec![Task::new("s", "s")];
        assert!(set_progress(&mut simple, "s", 1, &context).is_err());
    }
}
