//! Historical archive
//!
//! Completed and missed occurrences are appended here. Records refer to
//! their task by id only; once a one-off task is archived the record is the
//! only trace of it.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::{lenient, Task};
use crate::units::{self, DurationUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Completed,
    Missed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Missed => "missed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalRecord {
    pub original_task_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(with = "lenient::opt_datetime")]
    pub completion_date: Option<DateTime<Utc>>,
    pub status: RecordStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub duration_amount: Option<i64>,
    #[serde(default)]
    pub duration_unit: Option<DurationUnit>,
    #[serde(default, with = "lenient::opt_datetime")]
    pub original_due_date: Option<DateTime<Utc>>,
}

impl HistoricalRecord {
    pub fn new(
        task: &Task,
        status: RecordStatus,
        progress: f64,
        completed_at: DateTime<Utc>,
        original_due: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            original_task_id: task.id.clone(),
            name: task.name.clone(),
            completion_date: Some(completed_at),
            status,
            progress,
            category_id: task.category_id.clone(),
            duration_amount: task.estimated_duration_amount,
            duration_unit: task.estimated_duration_unit,
            original_due_date: original_due,
        }
    }

    /// Stable reference used to address a single record from the CLI.
    pub fn reference(&self) -> String {
        match self.completion_date {
            Some(date) => format!("{}@{}", self.original_task_id, units::iso_millis(date)),
            None => format!("{}@-", self.original_task_id),
        }
    }

    /// Length shown on the calendar; one hour when the record has none.
    pub fn duration(&self) -> Duration {
        let ms = units::duration_ms(self.duration_amount, self.duration_unit);
        Duration::milliseconds(if ms > 0 { ms } else { units::MS_PER_HOUR })
    }

    /// Completed before the original due date.
    pub fn was_early(&self) -> bool {
        match (self.completion_date, self.original_due_date) {
            (Some(done), Some(due)) => self.status == RecordStatus::Completed && done < due,
            _ => false,
        }
    }
}

/// Keep records that carry the fields every consumer relies on.
pub fn parse_valid(values: Vec<serde_json::Value>) -> Vec<HistoricalRecord> {
    values
        .into_iter()
        .filter_map(|value| {
            let record: HistoricalRecord = serde_json::from_value(value).ok()?;
            (!record.original_task_id.is_empty() && record.completion_date.is_some())
                .then_some(record)
        })
        .collect()
}

/// Records for one task, newest first.
pub fn for_task<'a>(history: &'a [HistoricalRecord], task_id: &str) -> Vec<&'a HistoricalRecord> {
    let mut records: Vec<&HistoricalRecord> = history
        .iter()
        .filter(|record| record.original_task_id == task_id)
        .collect();
    records.sort_by(|a, b| b.completion_date.cmp(&a.completion_date));
    records
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStats {
    pub completions: usize,
    pub misses: usize,
    pub total: usize,
    /// Percentage with one decimal, `None` without history
    pub completion_rate: Option<f64>,
}

impl TaskStats {
    pub fn rate_label(&self) -> String {
        match self.completion_rate {
            Some(rate) => format!("{rate:.1}%"),
            None => "N/A".to_string(),
        }
    }
}

pub fn task_stats(records: &[&HistoricalRecord]) -> TaskStats {
    let completions = records
        .iter()
        .filter(|record| record.status == RecordStatus::Completed)
        .count();
    let misses = records
        .iter()
        .filter(|record| record.status == RecordStatus::Missed)
        .count();
    let total = completions + misses;
    let completion_rate =
        (total > 0).then(|| (completions as f64 / total as f64 * 1000.0).round() / 10.0);
    TaskStats {
        completions,
        misses,
        total,
        completion_rate,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekBucket {
    pub week_start: NaiveDate,
    pub completions: usize,
    pub misses: usize,
}

/// Completions and misses per Monday-start week, oldest first.
pub fn weekly_chart(records: &[&HistoricalRecord], offset: FixedOffset) -> Vec<WeekBucket> {
    let mut weeks: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();
    for record in records {
        let Some(date) = record.completion_date else {
            continue;
        };
        let week = units::week_start_monday(units::local_date(date, offset));
        let entry = weeks.entry(week).or_default();
        match record.status {
            RecordStatus::Completed => entry.0 += 1,
            RecordStatus::Missed => entry.1 += 1,
        }
    }
    weeks
        .into_iter()
        .map(|(week_start, (completions, misses))| WeekBucket {
            week_start,
            completions,
            misses,
        })
        .collect()
}

/// Drop records completed before `now - retention_days`. Zero keeps all.
pub fn prune(history: &mut Vec<HistoricalRecord>, now: DateTime<Utc>, retention_days: u32) -> usize {
    if retention_days == 0 {
        return 0;
    }
    let cutoff = now - Duration::days(i64::from(retention_days));
    let before = history.len();
    history.retain(|record| record.completion_date.is_some_and(|date| date >= cutoff));
    before - history.len()
}

/// Records whose task no longer exists.
pub fn orphans<'a>(history: &'a [HistoricalRecord], tasks: &[Task]) -> Vec<&'a HistoricalRecord> {
    let ids: HashSet<&str> = tasks.iter().map(|task| task.id.as_str()).collect();
    history
        .iter()
        .filter(|record| !ids.contains(record.original_task_id.as_str()))
        .collect()
}

pub fn clean_orphans(history: &mut Vec<HistoricalRecord>, tasks: &[Task]) -> usize {
    let ids: HashSet<&str> = tasks.iter().map(|task| task.id.as_str()).collect();
    let before = history.len();
    history.retain(|record| ids.contains(record.original_task_id.as_str()));
    before - history.len()
}

/// Delete the record addressed by [`HistoricalRecord::reference`].
pub fn delete_record(history: &mut Vec<HistoricalRecord>, reference: &str) -> Result<HistoricalRecord> {
    let index = history
        .iter()
        .position(|record| record.reference() == reference.trim())
        .ok_or_else(|| Error::EntryNotFound(format!("history record {reference}")))?;
    Ok(history.remove(index))
}

/// Remove the newest record for the task if it is a completion.
pub fn remove_last_completed(history: &mut Vec<HistoricalRecord>, task_id: &str) -> Option<HistoricalRecord> {
    let index = history
        .iter()
        .enumerate()
        .filter(|(_, record)| record.original_task_id == task_id)
        .max_by_key(|(index, record)| (record.completion_date, *index))
        .map(|(index, _)| index)?;
    if history[index].status != RecordStatus::Completed {
        return None;
    }
    Some(history.remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn record(task: &str, status: RecordStatus, at: &str) -> HistoricalRecord {
        HistoricalRecord::new(&Task::new(task, task), status, 1.0, utc(at), None)
    }

    #[test]
    fn stats_and_rate() {
        let history = vec![
            record("_a", RecordStatus::Completed, "2025-09-01T10:00:00Z"),
            record("_a", RecordStatus::Completed, "2025-09-02T10:00:00Z"),
            record("_a", RecordStatus::Missed, "2025-09-03T10:00:00Z"),
            record("_b", RecordStatus::Missed, "2025-09-03T10:00:00Z"),
        ];
        let records = for_task(&history, "_a");
        assert_eq!(records[0].completion_date, Some(utc("2025-09-03T10:00:00Z")));
        let stats = task_stats(&records);
        assert_eq!(stats.completions, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.completion_rate, Some(66.7));
        assert_eq!(task_stats(&[]).rate_label(), "N/A");
    }

    #[test]
    fn weekly_chart_uses_monday_weeks() {
        let history = vec![
            // Sunday belongs to the week starting the previous Monday.
            record("_a", RecordStatus::Completed, "2025-09-14T10:00:00Z"),
            record("_a", RecordStatus::Missed, "2025-09-15T10:00:00Z"),
            record("_a", RecordStatus::Completed, "2025-09-16T10:00:00Z"),
        ];
        let records = for_task(&history, "_a");
        let chart = weekly_chart(&records, FixedOffset::east_opt(0).unwrap());
        assert_eq!(chart.len(), 2);
        assert_eq!(chart[0].week_start, NaiveDate::from_ymd_opt(2025, 9, 8).unwrap());
        assert_eq!((chart[0].completions, chart[0].misses), (1, 0));
        assert_eq!((chart[1].completions, chart[1].misses), (1, 1));
    }

    #[test]
    fn prune_respects_retention() {
        let mut history = vec![
            record("_a", RecordStatus::Completed, "2025-08-01T10:00:00Z"),
            record("_a", RecordStatus::Completed, "2025-09-10T10:00:00Z"),
        ];
        let now = utc("2025-09-20T10:00:00Z");
        assert_eq!(prune(&mut history.clone(), now, 0), 0);
        assert_eq!(prune(&mut history, now, 28), 1);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn orphan_cleanup() {
        let tasks = vec![Task::new("_a", "Kept")];
        let mut history = vec![
            record("_a", RecordStatus::Completed, "2025-09-01T10:00:00Z"),
            record("_gone", RecordStatus::Missed, "2025-09-01T10:00:00Z"),
        ];
        assert_eq!(orphans(&history, &tasks).len(), 1);
        assert_eq!(clean_orphans(&mut history, &tasks), 1);
        assert_eq!(history[0].original_task_id, "_a");
    }

    #[test]
    fn delete_by_reference() {
        let mut history = vec![record("_a", RecordStatus::Completed, "2025-09-01T10:00:00Z")];
        assert_eq!(history[0].reference(), "_a@2025-09-01T10:00:00.000Z");
        assert!(delete_record(&mut history, "_a@2025-09-02T10:00:00.000Z").is_err());
        delete_record(&mut history, "_a@2025-09-01T10:00:00.000Z").unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn remove_last_completed_only_when_newest_is_completion() {
        let mut history = vec![
            record("_a", RecordStatus::Completed, "2025-09-01T10:00:00Z"),
            record("_a", RecordStatus::Missed, "2025-09-02T10:00:00Z"),
        ];
        assert!(remove_last_completed(&mut history, "_a").is_none());
        history.push(record("_a", RecordStatus::Completed, "2025-09-03T10:00:00Z"));
        let removed = remove_last_completed(&mut history, "_a").unwrap();
        assert_eq!(removed.completion_date, Some(utc("2025-09-03T10:00:00Z")));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn legacy_records_are_filtered() {
        let values = vec![
            serde_json::json!({"originalTaskId": "_a", "completionDate": "2025-09-01T10:00:00.000Z", "status": "completed"}),
            serde_json::json!({"originalTaskId": "_b", "status": "missed"}),
            serde_json::json!({"name": "no id", "completionDate": "2025-09-01", "status": "missed"}),
            serde_json::json!(null),
        ];
        let records = parse_valid(values);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].original_task_id, "_a");
    }
}
