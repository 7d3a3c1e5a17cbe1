//! Data portability and migration
//!
//! - Export bundles: `{exportFormatVersion, exportDate, dataType, data}`
//! - Import in `overwrite` or `merge` mode, writing storage keys directly
//! - Field-mapping migration of task lists from older exports
//! - `doctor`: a read-only health report over every storage key

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::category::Category;
use crate::config::IdsConfig;
use crate::error::{Error, Result};
use crate::history::{self, HistoricalRecord};
use crate::journal::{PlannerData, LEGACY_HISTORY_FIELD};
use crate::state::Planner;
use crate::storage::{keys, Storage};
use crate::task::{self, lenient, Task};
use crate::units;

pub const EXPORT_FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    All,
    Tasks,
    Categories,
    History,
    Settings,
}

impl DataType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "tasks" => Some(Self::Tasks),
            "categories" => Some(Self::Categories),
            "history" => Some(Self::History),
            "settings" => Some(Self::Settings),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Tasks => "tasks",
            Self::Categories => "categories",
            Self::History => "history",
            Self::Settings => "settings",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    Overwrite,
    Merge,
}

impl ImportMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Some(Self::Overwrite),
            "merge" => Some(Self::Merge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub export_format_version: String,
    pub export_date: String,
    pub data_type: String,
    pub data: Map<String, Value>,
}

// =============================================================================
// Export
// =============================================================================

/// `task-planner-backup-{type}-{YYYY-MM-DDTHH-MM-SS}.json`
pub fn export_file_name(kind: DataType, now: DateTime<Utc>) -> String {
    format!(
        "task-planner-backup-{}-{}.json",
        kind.as_str(),
        now.format("%Y-%m-%dT%H-%M-%S")
    )
}

pub fn export(planner: &Planner, kind: DataType, now: DateTime<Utc>) -> Result<ExportBundle> {
    let mut data = Map::new();
    match kind {
        DataType::All => {
            data.insert("tasks".into(), serde_json::to_value(&planner.tasks)?);
            data.insert("categories".into(), serde_json::to_value(&planner.categories)?);
            data.insert("appState".into(), serde_json::to_value(&planner.planner_data)?);
            data.insert("history".into(), serde_json::to_value(&planner.history)?);
            data.insert("vacations".into(), serde_json::to_value(&planner.vacations)?);
            data.insert("settings".into(), Value::Object(planner.settings.to_export()?));
        }
        DataType::Tasks => {
            let used: HashSet<&str> = planner
                .tasks
                .iter()
                .filter_map(|task| task.category_id.as_deref())
                .collect();
            let categories: Vec<&Category> = planner
                .categories
                .iter()
                .filter(|category| used.contains(category.id.as_str()))
                .collect();
            data.insert("tasks".into(), serde_json::to_value(&planner.tasks)?);
            data.insert("categories".into(), serde_json::to_value(categories)?);
        }
        DataType::Categories => {
            data.insert("categories".into(), serde_json::to_value(&planner.categories)?);
        }
        DataType::History => {
            let mut app_state = Map::new();
            app_state.insert(LEGACY_HISTORY_FIELD.into(), serde_json::to_value(&planner.history)?);
            data.insert("appState".into(), Value::Object(app_state));
        }
        DataType::Settings => {
            data.insert("settings".into(), Value::Object(planner.settings.to_export()?));
        }
    }
    Ok(ExportBundle {
        export_format_version: EXPORT_FORMAT_VERSION.to_string(),
        export_date: units::iso_millis(now),
        data_type: kind.as_str().to_string(),
        data,
    })
}

// =============================================================================
// Import
// =============================================================================

/// Parse and validate a backup file.
pub fn parse_bundle(raw: &str) -> Result<ExportBundle> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| Error::InvalidArgument(format!("backup is not valid JSON: {err}")))?;
    let complete = value.get("exportFormatVersion").is_some_and(|v| !v.is_null())
        && value.get("dataType").is_some_and(|v| !v.is_null())
        && value.get("data").is_some_and(Value::is_object);
    if !complete {
        return Err(Error::InvalidArgument(
            "invalid or corrupted backup file: missing exportFormatVersion, dataType or data".to_string(),
        ));
    }
    serde_json::from_value(value)
        .map_err(|err| Error::InvalidArgument(format!("invalid backup file: {err}")))
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub tasks: usize,
    pub categories: usize,
    pub history: usize,
    pub keys_written: Vec<String>,
    pub skipped_settings: Vec<String>,
}

fn array<'a>(data: &'a Map<String, Value>, field: &str) -> Option<&'a Vec<Value>> {
    data.get(field).and_then(Value::as_array)
}

fn history_in(data: &Map<String, Value>) -> Option<Vec<Value>> {
    array(data, "history").cloned().or_else(|| {
        data.get("appState")
            .and_then(|state| state.get(LEGACY_HISTORY_FIELD))
            .and_then(Value::as_array)
            .cloned()
    })
}

fn id_of<'a>(item: &'a Value, field: &str) -> Option<&'a str> {
    item.get(field).and_then(Value::as_str)
}

/// Append incoming items whose id is not present yet.
fn merge_by(existing: &mut Vec<Value>, incoming: &[Value], key: impl Fn(&Value) -> Option<String>) -> usize {
    let mut seen: HashSet<String> = existing.iter().filter_map(&key).collect();
    let mut added = 0;
    for item in incoming {
        if let Some(id) = key(item) {
            if seen.insert(id) {
                existing.push(item.clone());
                added += 1;
            }
        }
    }
    added
}

fn record_key(item: &Value) -> Option<String> {
    serde_json::from_value::<HistoricalRecord>(item.clone())
        .ok()
        .map(|record| record.reference())
}

fn write_settings(storage: &Storage, settings: &Map<String, Value>, summary: &mut ImportSummary) -> Result<()> {
    for (key, value) in settings {
        if keys::SETTINGS.contains(&key.as_str()) {
            storage.write_key(key, value)?;
            summary.keys_written.push(key.clone());
        } else {
            summary.skipped_settings.push(key.clone());
        }
    }
    Ok(())
}

/// Apply a bundle to storage. The caller must hold the data-directory lock
/// and reload afterwards.
pub fn import(storage: &Storage, bundle: &ExportBundle, mode: ImportMode) -> Result<ImportSummary> {
    let kind = DataType::parse(&bundle.data_type).ok_or_else(|| {
        Error::InvalidArgument(format!("unknown data type '{}' in backup", bundle.data_type))
    })?;
    let data = &bundle.data;
    let mut summary = ImportSummary::default();

    match mode {
        ImportMode::Overwrite => match kind {
            DataType::All => {
                if let Some(tasks) = array(data, "tasks") {
                    storage.write_key(keys::TASKS, tasks)?;
                    summary.tasks = tasks.len();
                    summary.keys_written.push(keys::TASKS.into());
                }
                if let Some(categories) = array(data, "categories") {
                    storage.write_key(keys::CATEGORIES, categories)?;
                    summary.categories = categories.len();
                    summary.keys_written.push(keys::CATEGORIES.into());
                }
                if let Some(state) = data.get("appState").filter(|state| state.is_object()) {
                    storage.write_key(keys::PLANNER_DATA, state)?;
                    summary.keys_written.push(keys::PLANNER_DATA.into());
                }
                if let Some(records) = array(data, "history") {
                    storage.write_key(keys::HISTORY, records)?;
                    summary.history = records.len();
                    summary.keys_written.push(keys::HISTORY.into());
                }
                if let Some(vacations) = array(data, "vacations") {
                    storage.write_key(keys::VACATIONS, vacations)?;
                    summary.keys_written.push(keys::VACATIONS.into());
                }
                if let Some(settings) = data.get("settings").and_then(Value::as_object) {
                    write_settings(storage, settings, &mut summary)?;
                }
            }
            DataType::Tasks => {
                let tasks = array(data, "tasks")
                    .ok_or_else(|| Error::InvalidArgument("backup has no tasks".to_string()))?;
                let mut categories: Vec<Value> = storage.read_key(keys::CATEGORIES)?;
                for incoming in array(data, "categories").into_iter().flatten() {
                    let id = id_of(incoming, "id");
                    match categories.iter_mut().find(|existing| id.is_some() && id_of(existing, "id") == id) {
                        Some(existing) => *existing = incoming.clone(),
                        None => categories.push(incoming.clone()),
                    }
                    summary.categories += 1;
                }
                storage.write_key(keys::CATEGORIES, &categories)?;
                storage.write_key(keys::TASKS, tasks)?;
                summary.tasks = tasks.len();
                summary.keys_written.extend([keys::CATEGORIES.to_string(), keys::TASKS.to_string()]);
            }
            DataType::Categories => {
                let categories = array(data, "categories")
                    .ok_or_else(|| Error::InvalidArgument("backup has no categories".to_string()))?;
                storage.write_key(keys::CATEGORIES, categories)?;
                summary.categories = categories.len();
                summary.keys_written.push(keys::CATEGORIES.into());
            }
            DataType::History => {
                let records = history_in(data)
                    .ok_or_else(|| Error::InvalidArgument("backup has no history".to_string()))?;
                let records = history::parse_valid(records);
                storage.write_key(keys::HISTORY, &records)?;
                summary.history = records.len();
                summary.keys_written.push(keys::HISTORY.into());
            }
            DataType::Settings => {
                let settings = data
                    .get("settings")
                    .and_then(Value::as_object)
                    .ok_or_else(|| Error::InvalidArgument("backup has no settings".to_string()))?;
                write_settings(storage, settings, &mut summary)?;
            }
        },
        ImportMode::Merge => {
            let by_id = |item: &Value| id_of(item, "id").map(str::to_string);
            if matches!(kind, DataType::All | DataType::Tasks | DataType::Categories) {
                if let Some(incoming) = array(data, "categories") {
                    let mut existing: Vec<Value> = storage.read_key(keys::CATEGORIES)?;
                    summary.categories = merge_by(&mut existing, incoming, by_id);
                    storage.write_key(keys::CATEGORIES, &existing)?;
                    summary.keys_written.push(keys::CATEGORIES.into());
                }
            }
            if matches!(kind, DataType::All | DataType::Tasks) {
                if let Some(incoming) = array(data, "tasks") {
                    let mut existing: Vec<Value> = storage.read_key(keys::TASKS)?;
                    summary.tasks = merge_by(&mut existing, incoming, by_id);
                    storage.write_key(keys::TASKS, &existing)?;
                    summary.keys_written.push(keys::TASKS.into());
                }
            }
            if matches!(kind, DataType::All | DataType::History) {
                if let Some(incoming) = history_in(data) {
                    let mut existing: Vec<Value> = storage.read_key(keys::HISTORY)?;
                    summary.history = merge_by(&mut existing, &incoming, record_key);
                    storage.write_key(keys::HISTORY, &existing)?;
                    summary.keys_written.push(keys::HISTORY.into());
                }
            }
            if kind == DataType::Settings {
                summary.skipped_settings = data
                    .get("settings")
                    .and_then(Value::as_object)
                    .map(|settings| settings.keys().cloned().collect())
                    .unwrap_or_default();
            }
        }
    }

    tracing::info!(kind = kind.as_str(), ?mode, keys = ?summary.keys_written, "imported backup");
    Ok(summary)
}

// =============================================================================
// Field-mapping migration
// =============================================================================

/// Fields a task document can carry.
pub fn task_fields() -> Vec<String> {
    let mut fields: BTreeSet<String> = match serde_json::to_value(Task::new("id", "name")) {
        Ok(Value::Object(map)) => map.keys().cloned().collect(),
        _ => BTreeSet::new(),
    };
    for always in ["pendingCycles", "completionReducedMisses", "occurrenceOverrides"] {
        fields.insert(always.to_string());
    }
    fields.into_iter().collect()
}

/// Comparison of the fields of an old task list with the current model.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FieldReport {
    /// Old field -> current field, matched case-insensitively.
    pub identical: BTreeMap<String, String>,
    /// Old fields with no counterpart.
    pub unmapped: Vec<String>,
    /// Current fields the old data lacks.
    pub missing: Vec<String>,
}

pub fn field_report(old_tasks: &[Value]) -> FieldReport {
    let current = task_fields();
    let old_fields: Vec<String> = old_tasks
        .first()
        .and_then(Value::as_object)
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default();

    let mut report = FieldReport::default();
    for old in &old_fields {
        match current.iter().find(|field| field.eq_ignore_ascii_case(old)) {
            Some(field) => {
                report.identical.insert(old.clone(), field.clone());
            }
            None => report.unmapped.push(old.clone()),
        }
    }
    report.missing = current
        .into_iter()
        .filter(|field| !old_fields.iter().any(|old| old.eq_ignore_ascii_case(field)))
        .collect();
    report
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationOutcome {
    pub added: Vec<Task>,
    /// Names skipped because a task with that name already exists.
    pub skipped: Vec<String>,
    /// Entries that could not be turned into tasks.
    pub invalid: usize,
}

/// Build tasks from `old_tasks`, copying each mapped field. Every task gets
/// a new id; values of `*date*` fields are parsed and dropped if invalid.
pub fn migrate_with_mapping(
    old_tasks: &[Value],
    mapping: &BTreeMap<String, String>,
    existing: &[Task],
    ids: &IdsConfig,
    now: DateTime<Utc>,
) -> MigrationOutcome {
    let existing_names: HashSet<&str> = existing.iter().map(|task| task.name.as_str()).collect();
    let mut used_ids: HashSet<String> = existing.iter().map(|task| task.id.clone()).collect();
    let mut outcome = MigrationOutcome::default();

    for old in old_tasks {
        let Some(old) = old.as_object() else {
            outcome.invalid += 1;
            continue;
        };
        let id = loop {
            let candidate = task::generate_id(ids);
            if used_ids.insert(candidate.clone()) {
                break candidate;
            }
        };
        let mut fields = Map::new();
        fields.insert("id".into(), Value::String(id));
        fields.insert("createdAt".into(), Value::String(units::iso_millis(now)));

        for (from, to) in mapping {
            if to == "id" {
                continue;
            }
            let Some(value) = old.get(from) else {
                continue;
            };
            if to.to_ascii_lowercase().contains("date") {
                if let Some(text) = value.as_str() {
                    if let Some(parsed) = lenient::parse_datetime(text) {
                        fields.insert(to.clone(), Value::String(units::iso_millis(parsed)));
                    }
                    continue;
                }
            }
            fields.insert(to.clone(), value.clone());
        }

        match serde_json::from_value::<Task>(Value::Object(fields)) {
            Ok(mut task) => {
                task.sanitize();
                if existing_names.contains(task.name.as_str()) {
                    outcome.skipped.push(task.name);
                } else {
                    outcome.added.push(task);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "skipping task that does not fit the model");
                outcome.invalid += 1;
            }
        }
    }
    outcome
}

/// Parse `old=new` pairs.
pub fn parse_mapping(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(from, to)| (from.trim().to_string(), to.trim().to_string()))
                .filter(|(from, to)| !from.is_empty() && !to.is_empty())
                .ok_or_else(|| Error::InvalidArgument(format!("invalid mapping '{pair}' (expected old=new)")))
        })
        .collect()
}

// =============================================================================
// Doctor
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct KeyCheck {
    pub key: String,
    pub present: bool,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DoctorReport {
    pub keys: Vec<KeyCheck>,
    pub unknown_keys: Vec<String>,
    pub unreadable_tasks: usize,
    pub invalid_history: usize,
    pub orphaned_history: usize,
    pub archived_tasks_present: bool,
    pub legacy_history_present: bool,
    pub goal_fix_pending: bool,
}

impl DoctorReport {
    pub fn problems(&self) -> usize {
        self.keys.iter().filter(|check| !check.ok).count()
            + self.unreadable_tasks
            + self.invalid_history
            + self.orphaned_history
            + usize::from(self.archived_tasks_present)
            + usize::from(self.legacy_history_present)
            + usize::from(self.goal_fix_pending)
    }
}

fn check_key(storage: &Storage, key: &str) -> (KeyCheck, Option<Value>) {
    match storage.read_key_strict::<Value>(key) {
        Ok(None) => (
            KeyCheck {
                key: key.to_string(),
                present: false,
                ok: true,
                items: None,
                error: None,
            },
            None,
        ),
        Ok(Some(value)) => (
            KeyCheck {
                key: key.to_string(),
                present: true,
                ok: true,
                items: value.as_array().map(Vec::len),
                error: None,
            },
            Some(value),
        ),
        Err(err) => (
            KeyCheck {
                key: key.to_string(),
                present: true,
                ok: false,
                items: None,
                error: Some(err.to_string()),
            },
            None,
        ),
    }
}

/// Inspect every key without modifying anything.
pub fn doctor(storage: &Storage) -> Result<DoctorReport> {
    let mut report = DoctorReport::default();
    let mut tasks = Vec::new();
    let mut records = Vec::new();

    let tracked = [keys::TASKS, keys::CATEGORIES, keys::HISTORY, keys::PLANNER_DATA, keys::VACATIONS];
    for key in tracked.iter().chain(keys::SETTINGS.iter()) {
        let (check, value) = check_key(storage, key);
        report.keys.push(check);
        let Some(value) = value else {
            continue;
        };
        match *key {
            keys::TASKS => {
                for item in value.as_array().into_iter().flatten() {
                    match serde_json::from_value::<Task>(item.clone()) {
                        Ok(task) => tasks.push(task),
                        Err(_) => report.unreadable_tasks += 1,
                    }
                }
            }
            keys::HISTORY => {
                let raw = value.as_array().cloned().unwrap_or_default();
                let total = raw.len();
                records = history::parse_valid(raw);
                report.invalid_history = total - records.len();
            }
            keys::PLANNER_DATA => {
                report.legacy_history_present = value.get(LEGACY_HISTORY_FIELD).is_some();
                if let Ok(data) = serde_json::from_value::<PlannerData>(value) {
                    report.goal_fix_pending = !data.goal_timezone_fix_v2_applied
                        && data.journal.iter().any(|entry| entry.is_weekly_goal);
                }
            }
            _ => {}
        }
    }

    report.orphaned_history = history::orphans(&records, &tasks).len();
    report.archived_tasks_present = storage.key_file(keys::ARCHIVED_TASKS).exists();
    report.unknown_keys = storage
        .list_keys()?
        .into_iter()
        .filter(|key| !keys::is_known(key))
        .collect();
    Ok(report)
}
