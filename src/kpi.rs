//! KPI aggregation
//!
//! KPI tasks are charted as a daily completion accuracy over the last 8,
//! 30 or 90 days. The window can be paged back by whole weeks.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

use crate::category::{self, Category};
use crate::error::{Error, Result};
use crate::history::{HistoricalRecord, RecordStatus};
use crate::task::Task;
use crate::units;

/// Colour for KPIs without a category.
pub const DEFAULT_SERIES_COLOR: &str = "#808080";

const COMPLETED_POINTS: f64 = 4.0;
const MISSED_POINTS_PER_PROGRESS: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KpiRange {
    #[serde(rename = "8d")]
    Days8,
    #[serde(rename = "30d")]
    Days30,
    #[serde(rename = "90d")]
    Days90,
}

impl KpiRange {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "8d" | "8" => Some(Self::Days8),
            "30d" | "30" => Some(Self::Days30),
            "90d" | "90" => Some(Self::Days90),
            _ => None,
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            Self::Days8 => 8,
            Self::Days30 => 30,
            Self::Days90 => 90,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Days8 => "8d",
            Self::Days30 => "30d",
            Self::Days90 => "90d",
        }
    }
}

/// Accuracy series for one KPI task.
#[derive(Debug, Clone, Serialize)]
pub struct KpiSeries {
    pub task_id: String,
    pub label: String,
    pub color: String,
    /// Percent per day, `0` for days without records.
    pub data: Vec<f64>,
    pub completions: usize,
    pub misses: usize,
}

impl KpiSeries {
    pub fn average(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KpiChart {
    pub range: KpiRange,
    pub week_offset: i64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub labels: Vec<NaiveDate>,
    pub series: Vec<KpiSeries>,
}

/// Build the chart for every KPI task. The window ends on the day
/// `week_offset` weeks from `now`.
pub fn kpi_series(
    tasks: &[Task],
    history: &[HistoricalRecord],
    categories: &[Category],
    range: KpiRange,
    week_offset: i64,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<KpiChart> {
    let (start_day, end_day) = Duration::try_weeks(week_offset)
        .and_then(|shift| now.checked_add_signed(shift))
        .map(|end| units::local_date(end, offset))
        .and_then(|end_day| {
            let start_day = end_day.checked_sub_signed(Duration::days(range.days() - 1))?;
            end_day.checked_add_signed(Duration::days(1))?;
            Some((start_day, end_day))
        })
        .ok_or_else(|| Error::InvalidArgument(format!("week offset {week_offset} is out of range")))?;
    let window_start = units::start_of_day(start_day, offset);
    let window_end = units::end_of_day(end_day, offset);
    let labels: Vec<NaiveDate> = (0..range.days())
        .map(|day| start_day + Duration::days(day))
        .collect();

    let series = tasks
        .iter()
        .filter(|task| task.is_kpi)
        .map(|task| {
            let mut daily: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();
            for record in history.iter().filter(|record| record.original_task_id == task.id) {
                let Some(date) = record.completion_date else {
                    continue;
                };
                if date < window_start || date > window_end {
                    continue;
                }
                let entry = daily.entry(units::local_date(date, offset)).or_default();
                match record.status {
                    RecordStatus::Completed => entry.0 += 1,
                    RecordStatus::Missed => entry.1 += 1,
                }
            }
            let data = labels
                .iter()
                .map(|label| match daily.get(label) {
                    Some((completions, misses)) if completions + misses > 0 => {
                        *completions as f64 / (completions + misses) as f64 * 100.0
                    }
                    _ => 0.0,
                })
                .collect();
            let color = task
                .category_id
                .as_deref()
                .and_then(|id| category::find(categories, id))
                .map(|category| category.color.clone())
                .unwrap_or_else(|| DEFAULT_SERIES_COLOR.to_string());
            KpiSeries {
                task_id: task.id.clone(),
                label: task.name.clone(),
                color,
                data,
                completions: daily.values().map(|day| day.0).sum(),
                misses: daily.values().map(|day| day.1).sum(),
            }
        })
        .collect();

    Ok(KpiChart {
        range,
        week_offset,
        start: start_day,
        end: end_day,
        labels,
        series,
    })
}

/// Grade-point average over a task's history. A completion scores 4.0; a
/// miss scores twice its partial progress.
pub fn history_gpa(records: &[&HistoricalRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    let total: f64 = records
        .iter()
        .map(|record| match record.status {
            RecordStatus::Completed => COMPLETED_POINTS,
            RecordStatus::Missed => record.progress.clamp(0.0, 1.0) * MISSED_POINTS_PER_PROGRESS,
        })
        .sum();
    Some(total / records.len() as f64)
}

pub fn letter_grade(gpa: f64) -> &'static str {
    if gpa >= 3.5 {
        "A"
    } else if gpa >= 2.5 {
        "B"
    } else if gpa >= 1.5 {
        "C"
    } else if gpa >= 0.5 {
        "D"
    } else {
        "F"
    }
}

/// Mark or unmark a task as KPI. Returns whether the flag changed.
pub fn set_kpi(tasks: &mut [Task], task_id: &str, is_kpi: bool) -> Result<bool> {
    let task = tasks
        .iter_mut()
        .find(|task| task.id == task_id)
        .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
    let changed = task.is_kpi != is_kpi;
    task.is_kpi = is_kpi;
    Ok(changed)
}

/// Render a sparkline-style bar for a percentage.
pub fn bar(percent: f64, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("{}{}", "#".repeat(filled), ".".repeat(width.saturating_sub(filled)))
}
