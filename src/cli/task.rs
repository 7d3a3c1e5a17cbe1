//! planner task command implementations.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;

use crate::calendar;
use crate::category;
use crate::cli::{format_local, parse_timestamp, parse_yes_no, Common, TaskCommands, TaskFieldArgs};
use crate::error::{Error, Result};
use crate::history::{self, TaskStats};
use crate::kpi;
use crate::lifecycle::{self, OverdueChoice, Transition};
use crate::output::{emit_success, HumanOutput};
use crate::recurrence;
use crate::state::{Planner, RefreshReport};
use crate::status;
use crate::task::{
    self, CompletionSpec, CompletionType, ConfirmationState, RepeatSpec, SortBy, SortDirection,
    StatusColor, Task,
};
use crate::theme;
use crate::units::{self, DurationUnit};
use crate::vacation;

const UPCOMING_OCCURRENCES: usize = 5;
const UPCOMING_WINDOW_DAYS: i64 = 400;

pub fn run(command: TaskCommands, common: Common) -> Result<()> {
    match command {
        TaskCommands::New { name, fields } => run_new(NewOptions { name, fields, common }),
        TaskCommands::List {
            category,
            status,
            sort,
            desc,
            all,
            limit,
        } => run_list(ListOptions {
            categories: category,
            status,
            sort,
            desc,
            all,
            limit,
            common,
        }),
        TaskCommands::Show { task } => run_show(task, common),
        TaskCommands::Edit {
            task,
            name,
            no_category,
            no_due,
            fields,
        } => run_edit(EditOptions {
            task,
            name,
            no_category,
            no_due,
            fields,
            common,
        }),
        TaskCommands::Done { task, yes } => run_done(task, yes, common),
        TaskCommands::Miss { task, misses } => run_miss(task, misses, common),
        TaskCommands::Choose { task, choice } => run_choose(task, choice, common),
        TaskCommands::Confirm {
            task,
            answer,
            misses,
        } => run_confirm(task, answer, misses, common),
        TaskCommands::Undo { task, yes } => run_undo(task, yes, common),
        TaskCommands::Delete { task, yes } => run_delete(task, yes, common),
        TaskCommands::Count { task, down } => run_count(task, down, common),
        TaskCommands::Timer { task } => run_timer(task, common),
        TaskCommands::Progress { task, value } => run_progress(task, value, common),
        TaskCommands::Move {
            task,
            to,
            occurrence,
            minutes,
        } => run_move(MoveOptions {
            task,
            to,
            occurrence,
            minutes,
            common,
        }),
        TaskCommands::Kpi { task, off } => super::kpi::run_flag("task kpi", task, !off, common),
    }
}

pub struct NewOptions {
    pub name: String,
    pub fields: TaskFieldArgs,
    pub common: Common,
}

pub struct ListOptions {
    pub categories: Vec<String>,
    pub status: Option<String>,
    pub sort: Option<String>,
    pub desc: bool,
    pub all: bool,
    pub limit: Option<usize>,
    pub common: Common,
}

pub struct EditOptions {
    pub task: String,
    pub name: Option<String>,
    pub no_category: bool,
    pub no_due: bool,
    pub fields: TaskFieldArgs,
    pub common: Common,
}

pub struct MoveOptions {
    pub task: String,
    pub to: String,
    pub occurrence: Option<String>,
    pub minutes: Option<i64>,
    pub common: Common,
}

// =============================================================================
// Output types
// =============================================================================

#[derive(Serialize)]
pub(crate) struct TaskSummary {
    id: String,
    name: String,
    status: StatusColor,
    status_name: String,
    due_date: Option<DateTime<Utc>>,
    countdown: String,
    due_group: &'static str,
    repeat: String,
    category_id: Option<String>,
    category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    confirmation_state: Option<ConfirmationState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pending_cycles: Option<u32>,
    misses: f64,
    max_misses: Option<i64>,
    completion_type: CompletionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<String>,
    is_kpi: bool,
    is_appointment: bool,
}

#[derive(Serialize)]
struct TaskListOutput {
    total: usize,
    sort_by: SortBy,
    sort_direction: SortDirection,
    tasks: Vec<TaskSummary>,
}

#[derive(Serialize)]
struct TaskShowOutput<'a> {
    summary: TaskSummary,
    task: &'a Task,
    history: TaskStats,
    gpa: Option<f64>,
    grade: Option<&'static str>,
    upcoming: Vec<DateTime<Utc>>,
}

#[derive(Serialize)]
struct TaskChangedOutput {
    task: TaskSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    moved_from_vacation: Option<String>,
}

#[derive(Serialize)]
struct TransitionOutput {
    transitions: Vec<Transition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<TaskSummary>,
}

#[derive(Serialize)]
struct RefreshOutput {
    #[serde(flatten)]
    report: RefreshReport,
    pruned_history: usize,
    relocated_history: usize,
    prompts: Vec<TaskSummary>,
}

pub(crate) fn summarize(planner: &Planner, task: &Task, now: DateTime<Utc>) -> TaskSummary {
    TaskSummary {
        id: task.id.clone(),
        name: task.name.clone(),
        status: task.status,
        status_name: planner.settings.status_names.get(task.status).to_string(),
        due_date: task.due_date,
        countdown: status::countdown(task.due_date, now),
        due_group: status::due_group(task.due_date, now, planner.offset).label(),
        repeat: task.repeat_label(),
        category_id: task.category_id.clone(),
        category: category::display_name(&planner.categories, task.category_id.as_deref()),
        confirmation_state: task.confirmation_state,
        pending_cycles: task.pending_cycles,
        misses: task.misses,
        max_misses: task.max_misses,
        completion_type: task.completion_type,
        progress: progress_label(task),
        is_kpi: task.is_kpi,
        is_appointment: task.is_appointment,
    }
}

fn progress_label(task: &Task) -> Option<String> {
    match task.completion_type {
        CompletionType::Simple => None,
        CompletionType::Count => Some(format!(
            "{}/{}",
            task.current_progress as i64,
            task.count_target.unwrap_or(0)
        )),
        CompletionType::Time => Some(format!(
            "{} / {}{}",
            units::format_hms(task.current_progress as i64),
            units::format_hms(task.time_target_ms()),
            if task.is_timer_running { " (running)" } else { "" }
        )),
    }
}

fn summary_line(summary: &TaskSummary, offset: FixedOffset) -> String {
    let mut line = format!(
        "{}  {:<6}  {}  due {} ({})  [{}]",
        summary.id,
        summary.status.as_str(),
        summary.name,
        format_local(summary.due_date, offset),
        summary.countdown,
        summary.category
    );
    if let Some(progress) = &summary.progress {
        line.push_str(&format!("  {progress}"));
    }
    if let Some(state) = summary.confirmation_state {
        line.push_str(&format!("  <{}>", state.as_str()));
    }
    line
}

// =============================================================================
// Field handling
// =============================================================================

fn parse_duration(label: &str, raw: &str) -> Result<(i64, DurationUnit)> {
    match units::parse_amount_unit(raw) {
        Some((amount, unit)) if amount >= 0 => Ok((amount, unit)),
        _ => Err(Error::InvalidArgument(format!(
            "invalid {label} '{raw}' (expected e.g. 30m, 2h, 1d)"
        ))),
    }
}

/// Category id for user input, creating the category when it is new.
pub(crate) fn category_for_input(planner: &mut Planner, input: &str) -> Result<String> {
    let name = input.trim();
    if name.is_empty() {
        return Err(Error::InvalidArgument("category cannot be empty".to_string()));
    }
    let color = theme::category_color(&planner.settings.theming, planner.categories.len());
    Ok(category::ensure(&mut planner.categories, name, || color))
}

fn fields_empty(fields: &TaskFieldArgs) -> bool {
    fields.due.is_none()
        && fields.repeat.is_none()
        && fields.estimate.is_none()
        && fields.prep.is_none()
        && fields.completion.is_none()
        && fields.category.is_none()
        && fields.icon.is_none()
        && fields.description.is_none()
        && fields.max_misses.is_none()
        && fields.track_misses.is_none()
        && fields.appointment.is_none()
        && fields.busy.is_none()
        && fields.kpi.is_none()
}

fn apply_fields(planner: &mut Planner, task: &mut Task, fields: &TaskFieldArgs) -> Result<()> {
    if let Some(due) = fields.due.as_deref() {
        task.due_date = Some(parse_timestamp("due", due, planner.offset)?);
    }
    if let Some(repeat) = fields.repeat.as_deref() {
        RepeatSpec::parse(repeat)?.apply(task);
    }
    if let Some(estimate) = fields.estimate.as_deref() {
        let (amount, unit) = parse_duration("estimate", estimate)?;
        task.estimated_duration_amount = Some(amount);
        task.estimated_duration_unit = Some(unit);
    }
    if let Some(prep) = fields.prep.as_deref() {
        let (amount, unit) = parse_duration("prep time", prep)?;
        task.prep_time_amount = Some(amount);
        task.prep_time_unit = Some(unit);
    }
    if let Some(completion) = fields.completion.as_deref() {
        CompletionSpec::parse(completion)?.apply(task);
    }
    if let Some(input) = fields.category.as_deref() {
        task.category_id = Some(category_for_input(planner, input)?);
    }
    if let Some(icon) = fields.icon.as_deref() {
        let icon = icon.trim();
        task.icon = (!icon.is_empty()).then(|| icon.to_string());
    }
    if let Some(description) = &fields.description {
        task.description = description.clone();
    }
    if let Some(max_misses) = fields.max_misses {
        if max_misses < 0 {
            return Err(Error::InvalidArgument(format!(
                "max misses must not be negative, got {max_misses}"
            )));
        }
        task.max_misses = Some(max_misses);
    }
    if let Some(track) = fields.track_misses {
        task.track_misses = track;
    }
    if let Some(appointment) = fields.appointment {
        task.is_appointment = appointment;
    }
    if let Some(busy) = fields.busy {
        task.counts_as_busy = busy;
    }
    if let Some(kpi) = fields.kpi {
        task.is_kpi = kpi;
    }
    task.sanitize();
    Ok(())
}

/// Push the due date past any vacation unless the category bypasses them.
/// Returns the new due date when it moved.
fn shift_out_of_vacation(planner: &Planner, task: &mut Task) -> Option<DateTime<Utc>> {
    let due = task.due_date?;
    let bypass = task
        .category_id
        .as_deref()
        .and_then(|id| category::find(&planner.categories, id))
        .is_some_and(|category| category.bypass_vacation);
    let adjusted = vacation::adjust_for_vacation(due, &planner.vacations, bypass, planner.offset);
    if adjusted == due {
        return None;
    }
    tracing::debug!(task = %task.id, from = %due, to = %adjusted, "moved due date out of vacation");
    task.due_date = Some(adjusted);
    Some(adjusted)
}

fn refresh_statuses(planner: &mut Planner, now: DateTime<Utc>) {
    let ctx = planner.context(now);
    lifecycle::refresh_statuses(&mut planner.tasks, &ctx);
}

fn find<'a>(planner: &'a Planner, id: &str) -> Result<&'a Task> {
    planner
        .tasks
        .iter()
        .find(|task| task.id == id)
        .ok_or_else(|| Error::TaskNotFound(id.to_string()))
}

fn push_task_summary(human: &mut HumanOutput, summary: &TaskSummary, offset: FixedOffset) {
    human.push_summary("ID", summary.id.clone());
    human.push_summary("Name", summary.name.clone());
    human.push_summary("Status", format!("{} ({})", summary.status_name, summary.status.as_str()));
    human.push_summary(
        "Due",
        format!("{} ({})", format_local(summary.due_date, offset), summary.countdown),
    );
    human.push_summary("Repeat", summary.repeat.clone());
    human.push_summary("Category", summary.category.clone());
    if let Some(progress) = &summary.progress {
        human.push_summary("Progress", progress.clone());
    }
    if let Some(state) = summary.confirmation_state {
        human.push_summary("Prompt", state.as_str());
    }
}

// =============================================================================
// Create, list, show, edit
// =============================================================================

pub fn run_new(options: NewOptions) -> Result<()> {
    let (mut planner, now) = options.common.open()?;
    let name = options.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidArgument("task name cannot be empty".to_string()));
    }

    let mut task = Task::new(planner.new_id(), name);
    task.created_at = Some(now);
    apply_fields(&mut planner, &mut task, &options.fields)?;
    if options.fields.icon.is_none() {
        task.icon = category::inherited_icon(&planner.categories, task.category_id.as_deref());
    }
    let moved = shift_out_of_vacation(&planner, &mut task);
    let id = task.id.clone();
    planner.tasks.push(task);
    refresh_statuses(&mut planner, now);
    planner.save(now)?;
    tracing::info!(task = %id, "created task");

    let summary = summarize(&planner, find(&planner, &id)?, now);
    let mut human = HumanOutput::new("Task created");
    push_task_summary(&mut human, &summary, planner.offset);
    if let Some(due) = moved {
        human.push_warning(format!(
            "due date falls in a vacation; moved to {}",
            format_local(Some(due), planner.offset)
        ));
    }
    human.push_next_step(format!("planner task show {id}"));

    let output = TaskChangedOutput {
        task: summary,
        moved_from_vacation: moved.map(|due| due.to_rfc3339()),
    };
    emit_success(options.common.output(), "task new", &output, Some(&human))
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let (planner, now) = options.common.open_read_only()?;

    let category_filter: Option<Vec<Option<String>>> = if options.categories.is_empty() {
        None
    } else {
        Some(
            options
                .categories
                .iter()
                .map(|input| {
                    if input.eq_ignore_ascii_case("none") {
                        Ok(None)
                    } else {
                        category::resolve(&planner.categories, input).map(Some)
                    }
                })
                .collect::<Result<_>>()?,
        )
    };
    let status_filter = match options.status.as_deref() {
        Some(raw) => Some(StatusColor::parse(raw).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "invalid status '{raw}' (expected green|yellow|red|black|blue)"
            ))
        })?),
        None => None,
    };
    let sort_by = match options.sort.as_deref() {
        Some(raw) => SortBy::parse(raw).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "invalid sort '{raw}' (expected status|dueDate|name|category)"
            ))
        })?,
        None => planner.settings.sort_by,
    };
    let sort_direction = if options.desc {
        SortDirection::Desc
    } else if options.sort.is_some() {
        SortDirection::Asc
    } else {
        planner.settings.sort_direction
    };

    let mut tasks: Vec<Task> = planner
        .tasks
        .iter()
        .filter(|task| options.all || !task.is_finished())
        .filter(|task| match &category_filter {
            Some(filter) => crate::settings::filter_allows(filter, task.category_id.as_deref()),
            None => planner.settings.list_filter_allows(task.category_id.as_deref()),
        })
        .filter(|task| status_filter.map_or(true, |status| task.status == status))
        .cloned()
        .collect();
    task::sort_tasks(&mut tasks, &planner.categories, sort_by, sort_direction);
    let total = tasks.len();
    if let Some(limit) = options.limit {
        tasks.truncate(limit);
    }

    let summaries: Vec<TaskSummary> = tasks
        .iter()
        .map(|task| summarize(&planner, task, now))
        .collect();

    let mut human = HumanOutput::new(format!("Tasks ({total})"));
    if summaries.is_empty() {
        human.push_detail("no tasks");
        human.push_next_step("planner task new <name> --due <when>");
    }
    let mut group: Option<&str> = None;
    for summary in &summaries {
        if sort_by == SortBy::DueDate && group != Some(summary.due_group) {
            group = Some(summary.due_group);
            human.push_detail(format!("== {} ==", summary.due_group));
        }
        human.push_detail(summary_line(summary, planner.offset));
    }
    let prompts = summaries
        .iter()
        .filter(|summary| summary.confirmation_state == Some(ConfirmationState::AwaitingOverdueInput))
        .count();
    if prompts > 0 {
        human.push_warning(format!("{prompts} overdue task(s) waiting for an answer"));
        human.push_next_step("planner task choose <id> completed|missed");
    }

    let output = TaskListOutput {
        total,
        sort_by,
        sort_direction,
        tasks: summaries,
    };
    emit_success(options.common.output(), "task list", &output, Some(&human))
}

pub fn run_show(input: String, common: Common) -> Result<()> {
    let (planner, now) = common.open_read_only()?;
    let id = task::resolve_task_id(&planner.tasks, &input)?;
    let task = find(&planner, &id)?;

    let records = history::for_task(&planner.history, &id);
    let stats = history::task_stats(&records);
    let gpa = kpi::history_gpa(&records);
    let upcoming: Vec<DateTime<Utc>> = if task.is_finished() {
        Vec::new()
    } else {
        recurrence::occurrences(task, now, now + Duration::days(UPCOMING_WINDOW_DAYS), planner.offset)
            .into_iter()
            .take(UPCOMING_OCCURRENCES)
            .collect()
    };

    let summary = summarize(&planner, task, now);
    let mut human = HumanOutput::new(format!("Task {}", task.name));
    push_task_summary(&mut human, &summary, planner.offset);
    if !task.description.is_empty() {
        human.push_summary("Description", task.description.clone());
    }
    human.push_summary(
        "Estimate",
        units::format_amount(task.estimated_duration_amount, task.estimated_duration_unit),
    );
    if task.prep_ms() > 0 {
        human.push_summary(
            "Prep",
            units::format_amount(task.prep_time_amount, task.prep_time_unit),
        );
    }
    if task.tracks_miss_ratio() {
        human.push_summary(
            "Misses",
            format!("{:.2} / {}", task.misses, task.max_misses.unwrap_or(0)),
        );
    }
    human.push_summary(
        "History",
        format!(
            "{} completed, {} missed ({})",
            stats.completions,
            stats.misses,
            stats.rate_label()
        ),
    );
    if let Some(gpa) = gpa {
        human.push_summary("Grade", format!("{} ({gpa:.2})", kpi::letter_grade(gpa)));
    }
    for due in &upcoming {
        human.push_detail(format!("next: {}", format_local(Some(*due), planner.offset)));
    }
    for (occurrence, change) in &task.occurrence_overrides {
        human.push_detail(format!(
            "override {occurrence}: due {}",
            format_local(change.effective_due(), planner.offset)
        ));
    }
    match task.confirmation_state {
        Some(ConfirmationState::AwaitingOverdueInput) => {
            human.push_next_step(format!("planner task choose {id} completed|missed"))
        }
        Some(_) => human.push_next_step(format!("planner task confirm {id} yes|no")),
        None => {}
    }

    let output = TaskShowOutput {
        summary,
        task,
        history: stats,
        gpa,
        grade: gpa.map(kpi::letter_grade),
        upcoming,
    };
    emit_success(common.output(), "task show", &output, Some(&human))
}

pub fn run_edit(options: EditOptions) -> Result<()> {
    if options.name.is_none() && !options.no_category && !options.no_due && fields_empty(&options.fields) {
        return Err(Error::InvalidArgument(
            "no changes specified; see planner task edit --help".to_string(),
        ));
    }
    let (mut planner, now) = options.common.open()?;
    let id = task::resolve_task_id(&planner.tasks, &options.task)?;
    let index = planner
        .tasks
        .iter()
        .position(|task| task.id == id)
        .ok_or_else(|| Error::TaskNotFound(id.clone()))?;

    let mut task = planner.tasks[index].clone();
    if let Some(name) = &options.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument("task name cannot be empty".to_string()));
        }
        task.name = name.to_string();
    }
    if options.no_category {
        task.category_id = None;
    }
    if options.no_due {
        task.due_date = None;
        task.clear_pending();
    }
    apply_fields(&mut planner, &mut task, &options.fields)?;
    let moved = if options.fields.due.is_some() {
        shift_out_of_vacation(&planner, &mut task)
    } else {
        None
    };
    planner.tasks[index] = task;
    refresh_statuses(&mut planner, now);
    planner.save(now)?;

    let summary = summarize(&planner, find(&planner, &id)?, now);
    let mut human = HumanOutput::new("Task updated");
    push_task_summary(&mut human, &summary, planner.offset);
    if let Some(due) = moved {
        human.push_warning(format!(
            "due date falls in a vacation; moved to {}",
            format_local(Some(due), planner.offset)
        ));
    }
    let output = TaskChangedOutput {
        task: summary,
        moved_from_vacation: moved.map(|due| due.to_rfc3339()),
    };
    emit_success(options.common.output(), "task edit", &output, Some(&human))
}

// =============================================================================
// Prompts
// =============================================================================

fn describe(human: &mut HumanOutput, transition: &Transition, offset: FixedOffset) {
    let from = transition.from.map(|state| state.as_str()).unwrap_or("none");
    let to = transition.to.map(|state| state.as_str()).unwrap_or("none");
    human.push_detail(format!("{}: {from} -> {to}", transition.name));
    if let Some(record) = &transition.record {
        human.push_detail(format!(
            "recorded {} (progress {:.0}%)",
            record.status.as_str(),
            record.progress * 100.0
        ));
    }
    if transition.removed {
        human.push_detail("task removed from the list");
    } else if transition.to.is_none() {
        human.push_detail(format!("due {}", format_local(transition.due_date, offset)));
    }
}

fn next_step_for(human: &mut HumanOutput, transition: &Transition) {
    let id = &transition.task_id;
    match transition.to {
        Some(ConfirmationState::AwaitingOverdueInput) => {
            human.push_next_step(format!("planner task choose {id} completed|missed"))
        }
        Some(ConfirmationState::ConfirmingMiss) => {
            human.push_next_step(format!("planner task confirm {id} yes [--misses <n>]"))
        }
        Some(_) => human.push_next_step(format!("planner task confirm {id} yes|no")),
        None => {}
    }
}

fn emit_transitions(
    planner: &Planner,
    common: &Common,
    command: &str,
    header: &str,
    transitions: Vec<Transition>,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut human = HumanOutput::new(header);
    for transition in &transitions {
        describe(&mut human, transition, planner.offset);
    }
    if let Some(last) = transitions.last() {
        next_step_for(&mut human, last);
        if let Some(cycles) = last.pending_cycles.filter(|cycles| *cycles > 1) {
            if last.to.is_some() {
                human.push_summary("Pending cycles", cycles.to_string());
            }
        }
    }
    let task = transitions
        .last()
        .and_then(|last| planner.tasks.iter().find(|task| task.id == last.task_id))
        .map(|task| summarize(planner, task, now));
    let output = TransitionOutput { transitions, task };
    emit_success(common.output(), command, &output, Some(&human))
}

pub fn run_done(input: String, yes: bool, common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let id = task::resolve_task_id(&planner.tasks, &input)?;
    let ctx = planner.context(now);

    let mut transitions = vec![lifecycle::request_completion(&mut planner.tasks, &id, &ctx)?];
    if yes {
        transitions.push(lifecycle::confirm_completion(
            &mut planner.tasks,
            &mut planner.history,
            &id,
            true,
            &ctx,
        )?);
    }
    planner.save(now)?;
    let header = if yes { "Task completed" } else { "Confirm completion" };
    emit_transitions(&planner, &common, "task done", header, transitions, now)
}

pub fn run_miss(input: String, misses: Option<u32>, common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let id = task::resolve_task_id(&planner.tasks, &input)?;
    let ctx = planner.context(now);

    let mut transitions = Vec::new();
    let state = find(&planner, &id)?.confirmation_state;
    if state != Some(ConfirmationState::ConfirmingMiss) {
        transitions.push(lifecycle::overdue_choice(
            &mut planner.tasks,
            &id,
            OverdueChoice::Missed,
            &ctx,
        )?);
    }
    transitions.push(lifecycle::confirm_miss(
        &mut planner.tasks,
        &mut planner.history,
        &id,
        true,
        misses,
        &ctx,
    )?);
    planner.save(now)?;
    emit_transitions(&planner, &common, "task miss", "Miss recorded", transitions, now)
}

pub fn run_choose(input: String, choice: String, common: Common) -> Result<()> {
    let choice = OverdueChoice::parse(&choice).ok_or_else(|| {
        Error::InvalidArgument(format!("invalid choice '{choice}' (expected completed|missed)"))
    })?;
    let (mut planner, now) = common.open()?;
    let id = task::resolve_task_id(&planner.tasks, &input)?;
    let ctx = planner.context(now);
    let transition = lifecycle::overdue_choice(&mut planner.tasks, &id, choice, &ctx)?;
    planner.save(now)?;
    emit_transitions(&planner, &common, "task choose", "Overdue answer recorded", vec![transition], now)
}

pub fn run_confirm(input: String, answer: String, misses: Option<u32>, common: Common) -> Result<()> {
    let confirmed = parse_yes_no(&answer)?;
    let (mut planner, now) = common.open()?;
    let id = task::resolve_task_id(&planner.tasks, &input)?;
    let ctx = planner.context(now);

    let state = find(&planner, &id)?.confirmation_state;
    let transition = match state {
        Some(ConfirmationState::ConfirmingComplete) => lifecycle::confirm_completion(
            &mut planner.tasks,
            &mut planner.history,
            &id,
            confirmed,
            &ctx,
        )?,
        Some(ConfirmationState::ConfirmingMiss) => lifecycle::confirm_miss(
            &mut planner.tasks,
            &mut planner.history,
            &id,
            confirmed,
            misses,
            &ctx,
        )?,
        Some(ConfirmationState::ConfirmingUndo) => lifecycle::confirm_undo(
            &mut planner.tasks,
            &mut planner.history,
            &id,
            confirmed,
            &ctx,
        )?,
        Some(ConfirmationState::ConfirmingDelete) => {
            lifecycle::confirm_delete(&mut planner.tasks, &id, confirmed)?
        }
        Some(ConfirmationState::AwaitingOverdueInput) => {
            return Err(Error::blocked(
                &id,
                "task is waiting for completed|missed; use planner task choose",
            ))
        }
        None => return Err(Error::blocked(&id, "no confirmation pending")),
    };
    planner.save(now)?;
    let header = if confirmed { "Confirmed" } else { "Declined" };
    emit_transitions(&planner, &common, "task confirm", header, vec![transition], now)
}

pub fn run_undo(input: String, yes: bool, common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let id = task::resolve_task_id(&planner.tasks, &input)?;
    let ctx = planner.context(now);

    let mut transitions = vec![lifecycle::request_undo(&mut planner.tasks, &id)?];
    if yes {
        transitions.push(lifecycle::confirm_undo(
            &mut planner.tasks,
            &mut planner.history,
            &id,
            true,
            &ctx,
        )?);
    }
    planner.save(now)?;
    let header = if yes { "Completion undone" } else { "Confirm undo" };
    emit_transitions(&planner, &common, "task undo", header, transitions, now)
}

pub fn run_delete(input: String, yes: bool, common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let id = task::resolve_task_id(&planner.tasks, &input)?;

    let mut transitions = vec![lifecycle::request_delete(&mut planner.tasks, &id)?];
    if yes {
        transitions.push(lifecycle::confirm_delete(&mut planner.tasks, &id, true)?);
    }
    planner.save(now)?;
    let header = if yes { "Task deleted" } else { "Confirm delete" };
    emit_transitions(&planner, &common, "task delete", header, transitions, now)
}

// =============================================================================
// Progress
// =============================================================================

pub fn run_count(input: String, down: bool, common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let id = task::resolve_task_id(&planner.tasks, &input)?;
    let ctx = planner.context(now);
    let transition = if down {
        lifecycle::decrement_count(&mut planner.tasks, &id)?
    } else {
        lifecycle::increment_count(&mut planner.tasks, &id, &ctx)?
    };
    planner.save(now)?;
    emit_transitions(&planner, &common, "task count", "Count updated", vec![transition], now)
}

pub fn run_timer(input: String, common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let id = task::resolve_task_id(&planner.tasks, &input)?;
    let ctx = planner.context(now);
    let transition = lifecycle::toggle_timer(&mut planner.tasks, &id, &ctx)?;
    planner.save(now)?;
    let running = find(&planner, &id).is_ok_and(|task| task.is_timer_running);
    let header = if running { "Timer started" } else { "Timer stopped" };
    emit_transitions(&planner, &common, "task timer", header, vec![transition], now)
}

pub fn run_progress(input: String, value: i64, common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let id = task::resolve_task_id(&planner.tasks, &input)?;
    let ctx = planner.context(now);
    let transition = lifecycle::set_progress(&mut planner.tasks, &id, value, &ctx)?;
    planner.save(now)?;
    emit_transitions(&planner, &common, "task progress", "Progress updated", vec![transition], now)
}

// =============================================================================
// Calendar moves
// =============================================================================

pub fn run_move(options: MoveOptions) -> Result<()> {
    let (mut planner, now) = options.common.open()?;
    let id = task::resolve_task_id(&planner.tasks, &options.task)?;
    let to = parse_timestamp("to", &options.to, planner.offset)?;
    let outcome = calendar::move_occurrence(
        &mut planner.tasks,
        &id,
        options.occurrence.as_deref(),
        to,
        options.minutes,
    )?;
    refresh_statuses(&mut planner, now);
    planner.save(now)?;

    let mut human = HumanOutput::new(if outcome.overridden {
        "Occurrence moved"
    } else {
        "Task moved"
    });
    human.push_summary("Task", outcome.task_id.clone());
    if let Some(occurrence) = &outcome.occurrence_id {
        human.push_summary("Occurrence", occurrence.clone());
    }
    human.push_summary("From", format_local(outcome.from, planner.offset));
    human.push_summary("To", format_local(Some(outcome.to), planner.offset));
    emit_success(options.common.output(), "task move", &outcome, Some(&human))
}

// =============================================================================
// Refresh
// =============================================================================

pub fn run_refresh(common: Common) -> Result<()> {
    let mut planner = Planner::open(common.storage()?)?;
    let now = common.now()?;
    let report = planner.refresh(now);
    let pruned_history = planner.save(now)?;

    let prompts: Vec<TaskSummary> = planner
        .tasks
        .iter()
        .filter(|task| task.confirmation_state.is_some())
        .map(|task| summarize(&planner, task, now))
        .collect();

    let mut human = HumanOutput::new("Statuses refreshed");
    human.push_summary(
        "Sensitivity",
        format!(
            "{:.2}{}",
            report.s_value,
            if report.adaptive { " (adaptive)" } else { "" }
        ),
    );
    human.push_summary("Changed", report.changed.len().to_string());
    if report.timers_settled > 0 {
        human.push_summary("Timers settled", report.timers_settled.to_string());
    }
    if pruned_history > 0 {
        human.push_summary("History pruned", pruned_history.to_string());
    }
    if planner.relocated_history > 0 {
        human.push_warning(format!(
            "moved {} legacy history record(s) into the archive",
            planner.relocated_history
        ));
    }
    for prompt in &prompts {
        human.push_detail(summary_line(prompt, planner.offset));
    }
    if prompts
        .iter()
        .any(|prompt| prompt.confirmation_state == Some(ConfirmationState::AwaitingOverdueInput))
    {
        human.push_next_step("planner task choose <id> completed|missed");
    }

    let output = RefreshOutput {
        report,
        pruned_history,
        relocated_history: planner.relocated_history,
        prompts,
    };
    emit_success(common.output(), "refresh", &output, Some(&human))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_need_a_unit() {
        assert_eq!(parse_duration("estimate", "90m").unwrap(), (90, DurationUnit::Minutes));
        assert!(parse_duration("estimate", "soon").is_err());
    }

    #[test]
    fn progress_labels_follow_completion_type() {
        let mut task = Task::new("_a", "Read");
        assert_eq!(progress_label(&task), None);
        CompletionSpec::Count(3).apply(&mut task);
        task.current_progress = 2.0;
        assert_eq!(progress_label(&task).as_deref(), Some("2/3"));
    }

    #[test]
    fn empty_field_args_detected() {
        assert!(fields_empty(&TaskFieldArgs::default()));
        let fields = TaskFieldArgs {
            kpi: Some(true),
            ..TaskFieldArgs::default()
        };
        assert!(!fields_empty(&fields));
    }
}
