//! planner init command implementation
//!
//! Creates the data directory and a default `.planner.toml`.

use std::path::PathBuf;

use crate::cli::Common;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};

#[derive(serde::Serialize)]
struct InitReport {
    data_dir: PathBuf,
    created: InitCreated,
    existing_keys: Vec<String>,
}

#[derive(serde::Serialize)]
struct InitCreated {
    data_dir: bool,
    config: bool,
}

pub fn run(common: Common) -> Result<()> {
    let storage = common.storage()?;
    let created_dir = !storage.data_dir().exists();
    let created_config = storage.init()?;
    let existing_keys = storage.list_keys()?;
    tracing::debug!(dir = %storage.data_dir().display(), created_config, "initialized data directory");

    let report = InitReport {
        data_dir: storage.data_dir().to_path_buf(),
        created: InitCreated {
            data_dir: created_dir,
            config: created_config,
        },
        existing_keys,
    };

    let header = if created_config {
        "planner initialized"
    } else {
        "planner already initialized"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("Data dir", report.data_dir.display().to_string());
    if created_config {
        human.push_summary("Created", crate::config::CONFIG_FILE);
    }
    if !report.existing_keys.is_empty() {
        human.push_summary("Stored keys", report.existing_keys.join(", "));
    }
    if report.existing_keys.is_empty() {
        human.push_next_step("planner task new \"First task\" --due \"<YYYY-MM-DD HH:MM>\"");
    } else {
        human.push_next_step("planner task list");
    }

    emit_success(common.output(), "init", &report, Some(&human))
}
