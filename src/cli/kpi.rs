//! planner kpi command implementations.

use serde::Serialize;

use crate::cli::{Common, KpiCommands};
use crate::error::{Error, Result};
use crate::history;
use crate::kpi::{self, KpiChart, KpiRange};
use crate::output::{emit_success, HumanOutput};
use crate::settings::KpiChartMode;
use crate::state::Planner;
use crate::task;

const BAR_WIDTH: usize = 20;

pub fn run(command: KpiCommands, common: Common) -> Result<()> {
    match command {
        KpiCommands::List { range } => run_list(range, common),
        KpiCommands::Chart {
            range,
            week_offset,
            mode,
        } => run_chart(ChartOptions {
            range,
            week_offset,
            mode,
            common,
        }),
        KpiCommands::Add { task } => run_flag("kpi add", task, true, common),
        KpiCommands::Remove { task } => run_flag("kpi remove", task, false, common),
    }
}

pub struct ChartOptions {
    pub range: Option<String>,
    pub week_offset: Option<i64>,
    pub mode: Option<String>,
    pub common: Common,
}

fn parse_range(raw: &str) -> Result<KpiRange> {
    KpiRange::parse(raw).ok_or_else(|| {
        Error::InvalidArgument(format!("invalid range '{raw}' (expected 8d|30d|90d)"))
    })
}

fn parse_mode(raw: &str) -> Result<KpiChartMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "single" => Ok(KpiChartMode::Single),
        "stacked" => Ok(KpiChartMode::Stacked),
        other => Err(Error::InvalidArgument(format!(
            "invalid chart mode '{other}' (expected single|stacked)"
        ))),
    }
}

/// Range in effect: the flag, then the stored chart range, then config.
fn effective_range(planner: &Planner, flag: Option<&str>) -> Result<KpiRange> {
    if let Some(raw) = flag {
        return parse_range(raw);
    }
    KpiRange::parse(&planner.settings.ui.kpi_chart_date_range)
        .map(Ok)
        .unwrap_or_else(|| parse_range(&planner.config.kpi.default_range))
}

#[derive(Serialize)]
struct KpiRow {
    task_id: String,
    name: String,
    gpa: Option<f64>,
    grade: Option<&'static str>,
    average_accuracy: f64,
    completions: usize,
    misses: usize,
}

#[derive(Serialize)]
struct KpiListOutput {
    range: KpiRange,
    tasks: Vec<KpiRow>,
}

pub fn run_list(range: Option<String>, common: Common) -> Result<()> {
    let (planner, now) = common.open_read_only()?;
    let range = effective_range(&planner, range.as_deref())?;
    let chart = kpi::kpi_series(
        &planner.tasks,
        &planner.history,
        &planner.categories,
        range,
        0,
        now,
        planner.offset,
    )?;

    let rows: Vec<KpiRow> = chart
        .series
        .iter()
        .map(|series| {
            let records = history::for_task(&planner.history, &series.task_id);
            let gpa = kpi::history_gpa(&records);
            KpiRow {
                task_id: series.task_id.clone(),
                name: series.label.clone(),
                gpa,
                grade: gpa.map(kpi::letter_grade),
                average_accuracy: series.average(),
                completions: series.completions,
                misses: series.misses,
            }
        })
        .collect();

    let mut human = HumanOutput::new(format!("KPI tasks ({})", rows.len()));
    human.push_summary("Range", range.as_str());
    for row in &rows {
        human.push_detail(format!(
            "{}  {}  grade {}  avg {:.1}%  ({} done, {} missed)",
            row.task_id,
            row.name,
            row.grade.unwrap_or("-"),
            row.average_accuracy,
            row.completions,
            row.misses
        ));
    }
    if rows.is_empty() {
        human.push_next_step("planner kpi add <task>");
    }
    let output = KpiListOutput { range, tasks: rows };
    emit_success(common.output(), "kpi list", &output, Some(&human))
}

fn render_chart(human: &mut HumanOutput, chart: &KpiChart, mode: KpiChartMode) {
    match mode {
        KpiChartMode::Single => {
            for series in &chart.series {
                human.push_detail(format!("{} ({})", series.label, series.color));
                for (day, value) in chart.labels.iter().zip(&series.data) {
                    human.push_detail(format!(
                        "  {}  {}  {value:>5.1}%",
                        day.format("%a %m-%d"),
                        kpi::bar(*value, BAR_WIDTH)
                    ));
                }
            }
        }
        KpiChartMode::Stacked => {
            let count = chart.series.len().max(1) as f64;
            for (index, day) in chart.labels.iter().enumerate() {
                let parts: Vec<String> = chart
                    .series
                    .iter()
                    .map(|series| format!("{}={:.0}", series.label, series.data[index]))
                    .collect();
                let total: f64 = chart.series.iter().map(|series| series.data[index]).sum();
                human.push_detail(format!(
                    "{}  {}  {}",
                    day.format("%a %m-%d"),
                    kpi::bar(total / count, BAR_WIDTH),
                    parts.join(" ")
                ));
            }
        }
    }
}

pub fn run_chart(options: ChartOptions) -> Result<()> {
    let (mut planner, now) = options.common.open()?;
    let range = effective_range(&planner, options.range.as_deref())?;
    let week_offset = options
        .week_offset
        .unwrap_or(planner.settings.ui.kpi_week_offset);
    let mode = match options.mode.as_deref() {
        Some(raw) => parse_mode(raw)?,
        None => planner.settings.ui.kpi_chart_mode,
    };

    let chart = kpi::kpi_series(
        &planner.tasks,
        &planner.history,
        &planner.categories,
        range,
        week_offset,
        now,
        planner.offset,
    )?;

    // The chart remembers its last range, page and mode.
    let changed = planner.settings.ui.kpi_chart_date_range != range.as_str()
        || planner.settings.ui.kpi_week_offset != week_offset
        || planner.settings.ui.kpi_chart_mode != mode;
    if changed {
        planner.settings.ui.kpi_chart_date_range = range.as_str().to_string();
        planner.settings.ui.kpi_week_offset = week_offset;
        planner.settings.ui.kpi_chart_mode = mode;
        planner.save(now)?;
    }

    let mut human = HumanOutput::new(format!("KPI chart {} to {}", chart.start, chart.end));
    human.push_summary("Range", range.as_str());
    if week_offset != 0 {
        human.push_summary("Week offset", week_offset.to_string());
    }
    if chart.series.is_empty() {
        human.push_detail("no KPI tasks");
        human.push_next_step("planner kpi add <task>");
    }
    render_chart(&mut human, &chart, mode);
    emit_success(options.common.output(), "kpi chart", &chart, Some(&human))
}

#[derive(Serialize)]
struct KpiFlagOutput {
    task_id: String,
    is_kpi: bool,
    changed: bool,
}

pub fn run_flag(command: &str, input: String, is_kpi: bool, common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let id = task::resolve_task_id(&planner.tasks, &input)?;
    let changed = kpi::set_kpi(&mut planner.tasks, &id, is_kpi)?;
    if changed {
        planner.save(now)?;
    }

    let mut human = HumanOutput::new(match (is_kpi, changed) {
        (true, true) => "KPI added",
        (false, true) => "KPI removed",
        _ => "KPI flag unchanged",
    });
    human.push_summary("Task", id.clone());
    if is_kpi {
        human.push_next_step("planner kpi chart");
    }
    let output = KpiFlagOutput {
        task_id: id,
        is_kpi,
        changed,
    };
    emit_success(common.output(), command, &output, Some(&human))
}
