//! planner history command implementations.

use serde::Serialize;

use crate::cli::{format_local, Common, HistoryCommands};
use crate::error::{Error, Result};
use crate::history::{self, HistoricalRecord, RecordStatus, TaskStats, WeekBucket};
use crate::kpi;
use crate::output::{emit_success, HumanOutput};
use crate::task;

const CHART_WIDTH: usize = 20;

pub fn run(command: HistoryCommands, common: Common) -> Result<()> {
    match command {
        HistoryCommands::List {
            task,
            status,
            limit,
        } => run_list(task, status, limit, common),
        HistoryCommands::Stats { task } => run_stats(task, common),
        HistoryCommands::Clean { dry_run } => run_clean(dry_run, common),
        HistoryCommands::Delete { reference } => run_delete(reference, common),
        HistoryCommands::Prune { days } => run_prune(days, common),
    }
}

#[derive(Serialize)]
struct HistoryRow<'a> {
    reference: String,
    #[serde(flatten)]
    record: &'a HistoricalRecord,
    orphaned: bool,
}

#[derive(Serialize)]
struct HistoryListOutput<'a> {
    total: usize,
    records: Vec<HistoryRow<'a>>,
}

#[derive(Serialize)]
struct HistoryStatsOutput {
    task_id: String,
    name: String,
    stats: TaskStats,
    gpa: Option<f64>,
    grade: Option<&'static str>,
    weeks: Vec<WeekBucket>,
}

#[derive(Serialize)]
struct HistoryCleanOutput {
    dry_run: bool,
    removed: usize,
    references: Vec<String>,
}

fn parse_status(raw: &str) -> Result<RecordStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "completed" => Ok(RecordStatus::Completed),
        "missed" => Ok(RecordStatus::Missed),
        other => Err(Error::InvalidArgument(format!(
            "invalid record status '{other}' (expected completed|missed)"
        ))),
    }
}

pub fn run_list(
    task_filter: Option<String>,
    status: Option<String>,
    limit: Option<usize>,
    common: Common,
) -> Result<()> {
    let (planner, _) = common.open_read_only()?;
    let status = status.as_deref().map(parse_status).transpose()?;
    // Records of deleted tasks are still addressable by their raw id.
    let task_id = task_filter.map(|input| {
        task::resolve_task_id(&planner.tasks, &input).unwrap_or_else(|_| input.trim().to_string())
    });

    let mut records: Vec<&HistoricalRecord> = planner
        .history
        .iter()
        .filter(|record| task_id.as_deref().map_or(true, |id| record.original_task_id == id))
        .filter(|record| status.map_or(true, |status| record.status == status))
        .collect();
    records.sort_by(|a, b| b.completion_date.cmp(&a.completion_date));
    let total = records.len();
    if let Some(limit) = limit {
        records.truncate(limit);
    }

    let rows: Vec<HistoryRow> = records
        .into_iter()
        .map(|record| HistoryRow {
            reference: record.reference(),
            orphaned: !planner
                .tasks
                .iter()
                .any(|task| task.id == record.original_task_id),
            record,
        })
        .collect();

    let mut human = HumanOutput::new(format!("History ({total})"));
    for row in &rows {
        let progress = if row.record.status == RecordStatus::Missed && row.record.progress > 0.0 {
            format!(" {:.0}%", row.record.progress * 100.0)
        } else {
            String::new()
        };
        human.push_detail(format!(
            "{}  {:<9}{progress}  {}  ({}){}",
            format_local(row.record.completion_date, planner.offset),
            row.record.status.as_str(),
            row.record.name,
            row.reference,
            if row.orphaned { "  [orphaned]" } else { "" }
        ));
    }
    if rows.iter().any(|row| row.orphaned) {
        human.push_next_step("planner history clean");
    }
    let output = HistoryListOutput {
        total,
        records: rows,
    };
    emit_success(common.output(), "history list", &output, Some(&human))
}

pub fn run_stats(input: String, common: Common) -> Result<()> {
    let (planner, _) = common.open_read_only()?;
    let id = task::resolve_task_id(&planner.tasks, &input)?;
    let name = planner
        .tasks
        .iter()
        .find(|task| task.id == id)
        .map(|task| task.name.clone())
        .unwrap_or_default();
    let records = history::for_task(&planner.history, &id);
    let stats = history::task_stats(&records);
    let weeks = history::weekly_chart(&records, planner.offset);
    let gpa = kpi::history_gpa(&records);

    let mut human = HumanOutput::new(format!("History of {name}"));
    human.push_summary("Completions", stats.completions.to_string());
    human.push_summary("Misses", stats.misses.to_string());
    human.push_summary("Completion rate", stats.rate_label());
    if let Some(gpa) = gpa {
        human.push_summary("Grade", format!("{} ({gpa:.2})", kpi::letter_grade(gpa)));
    }
    let busiest = weeks
        .iter()
        .map(|week| week.completions + week.misses)
        .max()
        .unwrap_or(0)
        .max(1);
    for week in &weeks {
        let width = (week.completions + week.misses) * CHART_WIDTH / busiest;
        let done = week.completions * CHART_WIDTH / busiest;
        human.push_detail(format!(
            "{}  {}{}  {}/{}",
            week.week_start,
            "#".repeat(done),
            "x".repeat(width.saturating_sub(done)),
            week.completions,
            week.misses
        ));
    }

    let output = HistoryStatsOutput {
        task_id: id,
        name,
        stats,
        gpa,
        grade: gpa.map(kpi::letter_grade),
        weeks,
    };
    emit_success(common.output(), "history stats", &output, Some(&human))
}

pub fn run_clean(dry_run: bool, common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let references: Vec<String> = history::orphans(&planner.history, &planner.tasks)
        .into_iter()
        .map(HistoricalRecord::reference)
        .collect();
    let removed = if dry_run {
        references.len()
    } else {
        let removed = history::clean_orphans(&mut planner.history, &planner.tasks);
        planner.save(now)?;
        removed
    };

    let header = match (dry_run, references.len()) {
        (_, 0) => "No orphaned history",
        (true, _) => "Orphaned history (dry run)",
        (false, _) => "Orphaned history removed",
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("Orphaned", references.len().to_string());
    for reference in &references {
        human.push_detail(reference.clone());
    }
    if dry_run && !references.is_empty() {
        human.push_next_step("planner history clean");
    }
    let output = HistoryCleanOutput {
        dry_run,
        removed,
        references,
    };
    emit_success(common.output(), "history clean", &output, Some(&human))
}

pub fn run_delete(reference: String, common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let record = history::delete_record(&mut planner.history, &reference)?;
    planner.save(now)?;

    let mut human = HumanOutput::new("History record deleted");
    human.push_summary("Task", record.name.clone());
    human.push_summary("Status", record.status.as_str());
    human.push_summary("Date", format_local(record.completion_date, planner.offset));
    emit_success(common.output(), "history delete", &record, Some(&human))
}

#[derive(Serialize)]
struct HistoryPruneOutput {
    retention_days: u32,
    pruned: usize,
    remaining: usize,
}

pub fn run_prune(days: Option<u32>, common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let retention_days = days.unwrap_or(planner.config.history.retention_days);
    if retention_days == 0 {
        return Err(Error::InvalidArgument(
            "retention must be at least one day".to_string(),
        ));
    }
    planner.config.history.retention_days = retention_days;
    let pruned = planner.save(now)?;

    let mut human = HumanOutput::new("History pruned");
    human.push_summary("Retention", format!("{retention_days} day(s)"));
    human.push_summary("Removed", pruned.to_string());
    human.push_summary("Remaining", planner.history.len().to_string());
    let output = HistoryPruneOutput {
        retention_days,
        pruned,
        remaining: planner.history.len(),
    };
    emit_success(common.output(), "history prune", &output, Some(&human))
}
