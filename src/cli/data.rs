//! planner data command implementations.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::cli::{Common, DataCommands};
use crate::error::{Error, Result};
use crate::journal;
use crate::lock;
use crate::migrate::{self, DataType, DoctorReport, FieldReport, ImportMode, ImportSummary};
use crate::output::{emit_success, HumanOutput};
use crate::state::Planner;

pub fn run(command: DataCommands, common: Common) -> Result<()> {
    match command {
        DataCommands::Export {
            kind,
            output,
            stdout,
        } => run_export(ExportOptions {
            kind,
            output,
            stdout,
            common,
        }),
        DataCommands::Import { file, mode } => run_import(file, mode, common),
        DataCommands::Migrate { file, map, dry_run } => run_migrate(MigrateOptions {
            file,
            map,
            dry_run,
            common,
        }),
        DataCommands::Doctor => run_doctor(common),
        DataCommands::FixGoals => run_fix_goals(common),
    }
}

pub struct ExportOptions {
    pub kind: String,
    pub output: Option<PathBuf>,
    pub stdout: bool,
    pub common: Common,
}

pub struct MigrateOptions {
    pub file: PathBuf,
    pub map: Vec<String>,
    pub dry_run: bool,
    pub common: Common,
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| {
        Error::InvalidArgument(format!("cannot read {}: {err}", path.display()))
    })
}

// =============================================================================
// Export
// =============================================================================

#[derive(Serialize)]
struct ExportOutput {
    data_type: DataType,
    path: PathBuf,
    keys: Vec<String>,
}

pub fn run_export(options: ExportOptions) -> Result<()> {
    let kind = DataType::parse(&options.kind).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "invalid data type '{}' (expected all|tasks|categories|history|settings)",
            options.kind
        ))
    })?;
    let (planner, now) = options.common.open_read_only()?;
    let bundle = migrate::export(&planner, kind, now)?;
    let text = serde_json::to_string_pretty(&bundle)?;

    if options.stdout {
        println!("{text}");
        return Ok(());
    }

    let file_name = migrate::export_file_name(kind, now);
    let path = match options.output {
        Some(path) if path.is_dir() => path.join(file_name),
        Some(path) => path,
        None => PathBuf::from(file_name),
    };
    lock::write_atomic_str(&path, &text)?;
    tracing::info!(path = %path.display(), kind = kind.as_str(), "exported backup");

    let keys: Vec<String> = bundle.data.keys().cloned().collect();
    let mut human = HumanOutput::new("Backup exported");
    human.push_summary("Type", kind.as_str());
    human.push_summary("File", path.display().to_string());
    human.push_summary("Contents", keys.join(", "));
    human.push_next_step(format!("planner data import {}", path.display()));
    let output = ExportOutput {
        data_type: kind,
        path,
        keys,
    };
    emit_success(options.common.output(), "data export", &output, Some(&human))
}

// =============================================================================
// Import
// =============================================================================

#[derive(Serialize)]
struct ImportOutput {
    file: PathBuf,
    data_type: String,
    mode: ImportMode,
    #[serde(flatten)]
    summary: ImportSummary,
}

pub fn run_import(file: PathBuf, mode: String, common: Common) -> Result<()> {
    let mode = ImportMode::parse(&mode).ok_or_else(|| {
        Error::InvalidArgument(format!("invalid mode '{mode}' (expected overwrite|merge)"))
    })?;
    let bundle = migrate::parse_bundle(&read_file(&file)?)?;

    // Held for the lock; import writes keys directly.
    let planner = Planner::open(common.storage()?)?;
    let summary = migrate::import(planner.storage(), &bundle, mode)?;
    drop(planner);
    tracing::info!(file = %file.display(), keys = summary.keys_written.len(), "imported backup");

    let mut human = HumanOutput::new("Backup imported");
    human.push_summary("Type", bundle.data_type.clone());
    human.push_summary(
        "Mode",
        match mode {
            ImportMode::Overwrite => "overwrite",
            ImportMode::Merge => "merge",
        },
    );
    human.push_summary("Tasks", summary.tasks.to_string());
    human.push_summary("Categories", summary.categories.to_string());
    human.push_summary("History", summary.history.to_string());
    if !summary.keys_written.is_empty() {
        human.push_detail(format!("wrote {}", summary.keys_written.join(", ")));
    }
    for key in &summary.skipped_settings {
        human.push_warning(format!("skipped unknown setting '{key}'"));
    }
    let output = ImportOutput {
        file,
        data_type: bundle.data_type,
        mode,
        summary,
    };
    emit_success(common.output(), "data import", &output, Some(&human))
}

// =============================================================================
// Migrate
// =============================================================================

/// Task documents in `raw`: a bare array or a backup bundle's task list.
fn old_tasks(raw: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| Error::InvalidArgument(format!("migration file is not valid JSON: {err}")))?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(map) => map
            .get("data")
            .and_then(|data| data.get("tasks"))
            .or_else(|| map.get("tasks"))
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| Error::InvalidArgument("migration file has no task list".to_string())),
        _ => Err(Error::InvalidArgument(
            "migration file must hold a task array".to_string(),
        )),
    }
}

#[derive(Serialize)]
struct MigrateOutput {
    dry_run: bool,
    report: FieldReport,
    mapping: BTreeMap<String, String>,
    added: Vec<String>,
    skipped: Vec<String>,
    invalid: usize,
}

pub fn run_migrate(options: MigrateOptions) -> Result<()> {
    let old = old_tasks(&read_file(&options.file)?)?;
    let report = migrate::field_report(&old);
    let mut mapping = report.identical.clone();
    mapping.extend(migrate::parse_mapping(&options.map)?);

    let (mut planner, now) = if options.dry_run {
        options.common.open_read_only()?
    } else {
        options.common.open()?
    };
    let outcome = migrate::migrate_with_mapping(&old, &mapping, &planner.tasks, &planner.config.ids, now);
    let added: Vec<String> = outcome.added.iter().map(|task| task.id.clone()).collect();

    let mut human = HumanOutput::new(if options.dry_run {
        "Migration preview"
    } else {
        "Migration complete"
    });
    human.push_summary("Read", old.len().to_string());
    human.push_summary("Added", outcome.added.len().to_string());
    human.push_summary("Skipped", outcome.skipped.len().to_string());
    for (from, to) in &mapping {
        human.push_detail(format!("{from} -> {to}"));
    }
    for field in &report.unmapped {
        if !mapping.contains_key(field) {
            human.push_warning(format!("field '{field}' is not mapped and will be dropped"));
        }
    }
    for name in &outcome.skipped {
        human.push_warning(format!("'{name}' already exists"));
    }
    if outcome.invalid > 0 {
        human.push_warning(format!("{} entr(ies) could not be migrated", outcome.invalid));
    }

    if !options.dry_run && !outcome.added.is_empty() {
        planner.tasks.extend(outcome.added);
        planner.refresh(now);
        planner.save(now)?;
    }
    if options.dry_run {
        human.push_next_step("rerun without --dry-run to save");
    }

    let output = MigrateOutput {
        dry_run: options.dry_run,
        report,
        mapping,
        added,
        skipped: outcome.skipped,
        invalid: outcome.invalid,
    };
    emit_success(options.common.output(), "data migrate", &output, Some(&human))
}

// =============================================================================
// Doctor
// =============================================================================

#[derive(Serialize)]
struct DoctorOutput {
    problems: usize,
    #[serde(flatten)]
    report: DoctorReport,
}

pub fn run_doctor(common: Common) -> Result<()> {
    let storage = common.storage()?;
    let report = migrate::doctor(&storage)?;
    let problems = report.problems();

    let mut human = HumanOutput::new(if problems == 0 {
        "Data looks healthy".to_string()
    } else {
        format!("{problems} problem(s) found")
    });
    human.push_summary("Data dir", storage.data_dir().display().to_string());
    for check in &report.keys {
        let state = match (check.present, check.ok) {
            (false, _) => "absent".to_string(),
            (true, true) => match check.items {
                Some(items) => format!("ok ({items} items)"),
                None => "ok".to_string(),
            },
            (true, false) => format!("unreadable: {}", check.error.as_deref().unwrap_or("?")),
        };
        human.push_detail(format!("{:<24} {state}", check.key));
    }
    for key in &report.unknown_keys {
        human.push_detail(format!("{key:<24} unknown key"));
    }
    if report.unreadable_tasks > 0 {
        human.push_warning(format!("{} task(s) cannot be read", report.unreadable_tasks));
    }
    if report.invalid_history > 0 {
        human.push_warning(format!("{} invalid history record(s)", report.invalid_history));
    }
    if report.orphaned_history > 0 {
        human.push_warning(format!(
            "{} history record(s) belong to deleted tasks",
            report.orphaned_history
        ));
        human.push_next_step("planner history clean");
    }
    if report.archived_tasks_present {
        human.push_warning("legacy archivedTasks key is present and ignored");
    }
    if report.legacy_history_present {
        human.push_warning("history is still stored in planner data; any write relocates it");
    }
    if report.goal_fix_pending {
        human.push_next_step("planner data fix-goals");
    }
    let output = DoctorOutput { problems, report };
    emit_success(common.output(), "data doctor", &output, Some(&human))
}

// =============================================================================
// Fix goals
// =============================================================================

#[derive(Serialize)]
struct FixGoalsOutput {
    already_applied: bool,
    fixed: usize,
}

pub fn run_fix_goals(common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let already_applied = planner.planner_data.goal_timezone_fix_v2_applied;
    let fixed = journal::fix_goal_timezones(&mut planner.planner_data);
    if !already_applied {
        planner.save(now)?;
    }

    let mut human = HumanOutput::new(if already_applied {
        "Weekly goals already fixed"
    } else {
        "Weekly goals fixed"
    });
    human.push_summary("Moved", fixed.to_string());
    let output = FixGoalsOutput {
        already_applied,
        fixed,
    };
    emit_success(common.output(), "data fix-goals", &output, Some(&human))
}
