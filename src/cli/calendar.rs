//! planner calendar and schedule command implementations.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::calendar::{self, CalendarSource, CalendarView, SlotRequest, ViewKind};
use crate::cli::{format_local, parse_day, parse_timestamp, CalendarCommands, CalendarViewArgs, Common};
use crate::error::Result;
use crate::lifecycle;
use crate::output::{emit_success, HumanOutput};
use crate::schedule::{Pipeline, ScheduledOccurrence};
use crate::state::Planner;
use crate::task;
use crate::units;

pub fn run(command: CalendarCommands, common: Common) -> Result<()> {
    match command {
        CalendarCommands::Day(args) => run_view(ViewKind::Day, args, common),
        CalendarCommands::Week(args) => run_view(ViewKind::Week, args, common),
        CalendarCommands::Month(args) => run_view(ViewKind::Month, args, common),
        CalendarCommands::Create {
            at,
            minutes,
            name,
            category,
        } => run_create(CreateOptions {
            at,
            minutes,
            name,
            category,
            common,
        }),
    }
}

pub struct CreateOptions {
    pub at: String,
    pub minutes: Option<i64>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub common: Common,
}

pub struct ScheduleOptions {
    pub days: Option<u32>,
    pub task: Option<String>,
    pub common: Common,
}

/// Build a view over the planner's current state.
pub(crate) fn build_view(planner: &Planner, kind: ViewKind, anchor: chrono::NaiveDate) -> CalendarView {
    let source = CalendarSource {
        tasks: &planner.tasks,
        categories: &planner.categories,
        history: &planner.history,
        settings: &planner.settings,
        offset: planner.offset,
    };
    CalendarView::build(kind, anchor, &source)
}

pub fn run_view(kind: ViewKind, args: CalendarViewArgs, common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let today = units::local_date(now, planner.offset);
    let anchor = kind.step(parse_day("calendar", args.date.as_deref(), today)?, args.step);

    if planner.settings.calendar.last_view != kind.stored_name() {
        planner.settings.calendar.last_view = kind.stored_name().to_string();
        planner.save(now)?;
    }

    let view = build_view(&planner, kind, anchor);
    let rendered = calendar::render(&view, today, planner.offset, planner.settings.app.use_24_hour_format);
    let mut human = HumanOutput::new(rendered);
    human.push_summary("Events", view.events.len().to_string());
    let command = match kind {
        ViewKind::Day => "calendar day",
        ViewKind::Week => "calendar week",
        ViewKind::Month => "calendar month",
    };
    emit_success(common.output(), command, &view, Some(&human))
}

pub fn run_create(options: CreateOptions) -> Result<()> {
    let (mut planner, now) = options.common.open()?;
    let start = parse_timestamp("at", &options.at, planner.offset)?;
    let id = planner.new_id();
    let created = calendar::create_at(
        &mut planner.tasks,
        &mut planner.categories,
        &planner.settings,
        id,
        SlotRequest {
            start,
            minutes: options.minutes,
            name: options.name,
            category: options.category,
        },
    )?;
    let ctx = planner.context(now);
    lifecycle::refresh_statuses(&mut planner.tasks, &ctx);
    planner.save(now)?;
    tracing::info!(task = %created.id, "created task from calendar slot");

    let mut human = HumanOutput::new("Event created");
    human.push_summary("ID", created.id.clone());
    human.push_summary("Name", created.name.clone());
    human.push_summary("Start", format_local(Some(start), planner.offset));
    human.push_summary("Due", format_local(created.due_date, planner.offset));
    if let Some(category) = &created.category_id {
        human.push_summary("Category", category.clone());
    }
    human.push_next_step(format!("planner task edit {} --name <name>", created.id));
    emit_success(options.common.output(), "calendar create", &created, Some(&human))
}

#[derive(Serialize)]
struct ScheduleOutput {
    s_value: f64,
    horizon: DateTime<Utc>,
    occurrences: Vec<ScheduledOccurrence>,
}

pub fn run_schedule(options: ScheduleOptions) -> Result<()> {
    let (planner, now) = options.common.open_read_only()?;
    let days = options.days.unwrap_or(planner.config.schedule.horizon_days);
    let horizon = now + Duration::days(i64::from(days));
    let task_id = options
        .task
        .as_deref()
        .map(|input| task::resolve_task_id(&planner.tasks, input))
        .transpose()?;

    let s_value = planner.s_value(now);
    let pipeline = Pipeline {
        categories: &planner.categories,
        vacations: &planner.vacations,
        ui: &planner.settings.ui,
        s_value,
        offset: planner.offset,
    };
    let mut occurrences = pipeline.run(&planner.tasks, now, horizon);
    if let Some(id) = &task_id {
        occurrences.retain(|occurrence| &occurrence.task_id == id);
    }
    occurrences.sort_by_key(|occurrence| (occurrence.scheduled_start, occurrence.base_due));

    let mut human = HumanOutput::new(format!("Schedule for the next {days} day(s)"));
    human.push_summary("Occurrences", occurrences.len().to_string());
    human.push_summary("Sensitivity", format!("{s_value:.2}"));
    for occurrence in &occurrences {
        let slot = match (occurrence.scheduled_start, occurrence.scheduled_end) {
            (Some(start), Some(end)) => format!(
                "{} - {}",
                format_local(Some(start), planner.offset),
                end.with_timezone(&planner.offset).format("%H:%M")
            ),
            _ => "unplaced".to_string(),
        };
        human.push_detail(format!(
            "{slot}  {:<6} gpa {:.2}  {}{}  (due {})",
            occurrence.final_status.as_str(),
            occurrence.final_gpa,
            if occurrence.is_appointment { "@ " } else { "" },
            occurrence.name,
            format_local(Some(occurrence.base_due), planner.offset)
        ));
    }
    if occurrences.is_empty() {
        human.push_detail("nothing to schedule");
    }
    let output = ScheduleOutput {
        s_value,
        horizon,
        occurrences,
    };
    emit_success(options.common.output(), "schedule", &output, Some(&human))
}
