//! Planner state
//!
//! Loads every storage key of a data directory into memory, runs the
//! per-invocation refresh (timers, adaptive sensitivity, statuses) and
//! writes the collections back. Writers hold the data-directory lock
//! from load until drop.

use std::fs;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::calendar;
use crate::category::Category;
use crate::config::Config;
use crate::error::Result;
use crate::history::{self, HistoricalRecord};
use crate::journal::{self, PlannerData};
use crate::lifecycle::{self, Context};
use crate::lock::FileLock;
use crate::settings::Settings;
use crate::status::{self, SensitivityParams};
use crate::storage::{keys, Storage};
use crate::task::{self, Task};
use crate::vacation::Vacation;

/// What a refresh changed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshReport {
    pub s_value: f64,
    pub adaptive: bool,
    pub timers_settled: usize,
    pub changed: Vec<String>,
}

/// In-memory view of a data directory.
pub struct Planner {
    storage: Storage,
    pub config: Config,
    pub offset: FixedOffset,
    pub tasks: Vec<Task>,
    pub categories: Vec<Category>,
    pub history: Vec<HistoricalRecord>,
    pub planner_data: PlannerData,
    pub vacations: Vec<Vacation>,
    pub settings: Settings,
    /// Records moved out of the legacy planner-data field on load.
    pub relocated_history: usize,
    lock: Option<FileLock>,
}

impl Planner {
    /// Open for writing. Creates the data directory when missing and holds
    /// the lock until the planner is dropped.
    pub fn open(storage: Storage) -> Result<Self> {
        fs::create_dir_all(storage.data_dir())?;
        let config = Config::load_from_dir(storage.data_dir())?;
        let lock = storage.lock(config.lock.timeout_ms)?;
        Self::load(storage, config, Some(lock))
    }

    /// Open without taking the lock. Nothing can be saved.
    pub fn open_read_only(storage: Storage) -> Result<Self> {
        let config = Config::load_from_dir(storage.data_dir())?;
        Self::load(storage, config, None)
    }

    fn load(storage: Storage, config: Config, lock: Option<FileLock>) -> Result<Self> {
        let offset = config.offset()?;

        let raw_tasks: Vec<serde_json::Value> = storage.read_key(keys::TASKS)?;
        let mut tasks = parse_tasks(raw_tasks);
        for task in &mut tasks {
            task.sanitize();
        }

        let raw_history: Vec<serde_json::Value> = storage.read_key(keys::HISTORY)?;
        let mut history = history::parse_valid(raw_history);

        let mut planner_data: PlannerData = storage.read_key(keys::PLANNER_DATA)?;
        let mut relocated_history = 0;
        if let Some(legacy) = journal::take_legacy_history(&mut planner_data) {
            if history.is_empty() {
                history = history::parse_valid(legacy);
                relocated_history = history.len();
                tracing::info!(records = relocated_history, "relocated legacy history");
            } else {
                tracing::info!("dropping legacy history; archive already populated");
            }
        }

        Ok(Self {
            categories: storage.read_key(keys::CATEGORIES)?,
            vacations: storage.read_key(keys::VACATIONS)?,
            settings: Settings::load(&storage)?,
            storage,
            config,
            offset,
            tasks,
            history,
            planner_data,
            relocated_history,
            lock,
        })
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn is_writable(&self) -> bool {
        self.lock.is_some()
    }

    /// Sensitivity in effect: derived from the coming week's load when
    /// adaptive, otherwise the stored value.
    pub fn s_value(&self, now: DateTime<Utc>) -> f64 {
        if self.settings.sensitivity.is_adaptive {
            status::adaptive_sensitivity(&self.tasks, now)
        } else {
            self.settings.sensitivity.s_value
        }
    }

    pub fn context(&self, now: DateTime<Utc>) -> Context {
        Context {
            now,
            offset: self.offset,
            params: SensitivityParams::new(self.s_value(now), &self.config.status),
        }
    }

    /// Settle running timers and recompute statuses and overdue prompts.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> RefreshReport {
        let timers_settled = lifecycle::settle_timers(&mut self.tasks, now);
        let adaptive = self.settings.sensitivity.is_adaptive;
        let ctx = self.context(now);
        if adaptive {
            self.settings.sensitivity.s_value = ctx.params.s;
        }
        let changed = lifecycle::refresh_statuses(&mut self.tasks, &ctx);
        RefreshReport {
            s_value: ctx.params.s,
            adaptive,
            timers_settled,
            changed,
        }
    }

    /// A fresh task id not used by any task.
    pub fn new_id(&self) -> String {
        loop {
            let id = task::generate_id(&self.config.ids);
            if !self.tasks.iter().any(|task| task.id == id)
                && !self.planner_data.journal.iter().any(|entry| entry.id == id)
            {
                return id;
            }
        }
    }

    /// Write every collection back. History older than the retention
    /// window is pruned first; returns the number of pruned records.
    pub fn save(&mut self, now: DateTime<Utc>) -> Result<usize> {
        if self.lock.is_none() {
            return Err(crate::error::Error::OperationFailed(
                "planner was opened read-only".to_string(),
            ));
        }
        let retention_days = self.config.history.retention_days;
        let pruned = history::prune(&mut self.history, now, retention_days);
        if pruned > 0 {
            tracing::debug!(pruned, "pruned history past retention");
        }
        let stale = calendar::prune_overrides(&mut self.tasks, now, retention_days);
        if stale > 0 {
            tracing::debug!(stale, "pruned occurrence overrides past retention");
        }
        self.storage.write_key(keys::TASKS, &self.tasks)?;
        self.storage.write_key(keys::CATEGORIES, &self.categories)?;
        self.storage.write_key(keys::HISTORY, &self.history)?;
        self.storage.write_key(keys::PLANNER_DATA, &self.planner_data)?;
        self.storage.write_key(keys::VACATIONS, &self.vacations)?;
        self.settings.save(&self.storage)?;
        Ok(pruned)
    }
}

/// Keep the tasks that deserialize; log and skip the rest.
fn parse_tasks(values: Vec<serde_json::Value>) -> Vec<Task> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Task>(value) {
            Ok(task) if seen.insert(task.id.clone()) => Some(task),
            Ok(task) => {
                tracing::warn!(task = %task.id, "skipping duplicate task id");
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable task");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{ConfirmationState, StatusColor};
    use tempfile::TempDir;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn storage(temp: &TempDir) -> Storage {
        let storage = Storage::new(temp.path());
        storage.init().unwrap();
        storage
    }

    #[test]
    fn empty_directory_loads_defaults() {
        let temp = TempDir::new().unwrap();
        let planner = Planner::open(storage(&temp)).unwrap();
        assert!(planner.tasks.is_empty());
        assert!(planner.history.is_empty());
        assert!(planner.is_writable());
    }

    #[test]
    fn skips_bad_tasks_and_duplicates() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp);
        let raw = serde_json::json!([
            {"id": "_a", "name": "A"},
            {"id": "_a", "name": "Dup"},
            {"name": "no id"},
        ]);
        storage.write_key(keys::TASKS, &raw).unwrap();
        let planner = Planner::open_read_only(storage).unwrap();
        assert_eq!(planner.tasks.len(), 1);
        assert_eq!(planner.tasks[0].name, "A");
    }

    #[test]
    fn legacy_history_moves_into_archive() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp);
        let data = serde_json::json!({
            "journal": [],
            "weeks": [],
            "historicalTasks": [{
                "originalTaskId": "_a",
                "name": "A",
                "completionDate": "2025-10-01T10:00:00.000Z",
                "status": "completed"
            }]
        });
        storage.write_key(keys::PLANNER_DATA, &data).unwrap();
        let mut planner = Planner::open(storage.clone()).unwrap();
        assert_eq!(planner.relocated_history, 1);
        assert_eq!(planner.history.len(), 1);
        planner.config.history.retention_days = 0;
        planner.save(utc("2025-10-02T00:00:00Z")).unwrap();
        drop(planner);

        let raw = storage.read_raw(keys::PLANNER_DATA).unwrap().unwrap();
        assert!(raw.get("historicalTasks").is_none());
        assert!(raw.get("weeks").is_some());
        let history = storage.read_raw(keys::HISTORY).unwrap().unwrap();
        assert_eq!(history.as_array().unwrap().len(), 1);
    }

    #[test]
    fn refresh_flags_overdue_tasks() {
        let temp = TempDir::new().unwrap();
        let mut planner = Planner::open(storage(&temp)).unwrap();
        planner.settings.sensitivity.is_adaptive = false;
        let mut task = Task::new("_a", "Late");
        task.due_date = Some(utc("2025-10-01T09:00:00Z"));
        planner.tasks.push(task);

        let report = planner.refresh(utc("2025-10-02T09:00:00Z"));
        assert_eq!(report.changed, vec!["_a".to_string()]);
        assert_eq!(planner.tasks[0].status, StatusColor::Black);
        assert_eq!(
            planner.tasks[0].confirmation_state,
            Some(ConfirmationState::AwaitingOverdueInput)
        );
    }

    #[test]
    fn save_prunes_and_read_only_refuses() {
        let temp = TempDir::new().unwrap();
        let mut planner = Planner::open(storage(&temp)).unwrap();
        let task = Task::new("_a", "A");
        planner.history.push(HistoricalRecord::new(
            &task,
            history::RecordStatus::Completed,
            1.0,
            utc("2025-01-01T00:00:00Z"),
            None,
        ));
        let pruned = planner.save(utc("2025-10-01T00:00:00Z")).unwrap();
        assert_eq!(pruned, 1);
        drop(planner);

        let mut reader = Planner::open_read_only(Storage::new(temp.path())).unwrap();
        assert!(reader.save(utc("2025-10-01T00:00:00Z")).is_err());
    }
}
