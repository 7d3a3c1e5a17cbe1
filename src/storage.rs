//! Storage layer for planner
//!
//! Every persisted value lives under a storage key, one JSON document per
//! key, inside the data directory.
//!
//! # Directory Structure
//!
//! ```text
//! <data-dir>/
//!   .planner.toml               # Engine configuration
//!   .lock                       # Advisory lock held by mutating commands
//!   tasks.json                  # Task store
//!   categories.json             # Categories
//!   historicalTasksV1.json      # Completed/missed occurrence records
//!   pilotPlannerDataV8.json     # Journal, weekly goals, legacy history
//!   vacations.json              # Vacation periods
//!   <settings key>.json         # statusColors, theming, uiSettings, ...
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::config::CONFIG_FILE;
use crate::error::{Error, Result};
use crate::lock::{self, FileLock};

/// Environment variable naming the data directory
pub const DATA_DIR_ENV: &str = "PLANNER_DATA_DIR";

/// Name of the lock file inside the data directory
pub const LOCK_FILE: &str = ".lock";

/// Storage key names. These match the keys older exports use.
pub mod keys {
    pub const TASKS: &str = "tasks";
    pub const CATEGORIES: &str = "categories";
    pub const HISTORY: &str = "historicalTasksV1";
    pub const PLANNER_DATA: &str = "pilotPlannerDataV8";
    pub const ARCHIVED_TASKS: &str = "archivedTasks";
    pub const VACATIONS: &str = "vacations";
    pub const STATUS_COLORS: &str = "statusColors";
    pub const STATUS_NAMES: &str = "statusNames";
    pub const THEMING: &str = "theming";
    pub const SENSITIVITY: &str = "sensitivitySettings";
    pub const APP_SETTINGS: &str = "appSettings";
    pub const PLANNER_SETTINGS: &str = "plannerSettings";
    pub const CALENDAR_SETTINGS: &str = "calendarSettings";
    pub const UI_SETTINGS: &str = "uiSettings";
    pub const TASK_DISPLAY: &str = "taskDisplaySettings";
    pub const SORT_BY: &str = "sortBy";
    pub const SORT_DIRECTION: &str = "sortDirection";
    pub const CATEGORY_FILTER: &str = "categoryFilter";

    /// Keys that hold user settings, in export order.
    pub const SETTINGS: &[&str] = &[
        STATUS_COLORS,
        STATUS_NAMES,
        SORT_BY,
        SORT_DIRECTION,
        THEMING,
        CALENDAR_SETTINGS,
        CATEGORY_FILTER,
        PLANNER_SETTINGS,
        TASK_DISPLAY,
        APP_SETTINGS,
        UI_SETTINGS,
        SENSITIVITY,
    ];

    pub fn is_known(key: &str) -> bool {
        [
            TASKS,
            CATEGORIES,
            HISTORY,
            PLANNER_DATA,
            ARCHIVED_TASKS,
            VACATIONS,
        ]
        .contains(&key)
            || SETTINGS.contains(&key)
    }
}

/// Storage manager for a data directory
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Resolve the data directory: explicit path (flag or environment),
    /// otherwise the platform data directory.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }
        let dirs = directories::ProjectDirs::from("", "", "planner").ok_or_else(|| {
            Error::OperationFailed(format!(
                "cannot determine a data directory; pass --data-dir or set {DATA_DIR_ENV}"
            ))
        })?;
        Ok(Self::new(dirs.data_dir()))
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path to the JSON document for a storage key
    pub fn key_file(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }

    pub fn lock_file(&self) -> PathBuf {
        self.data_dir.join(LOCK_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    // =========================================================================
    // Directory initialization
    // =========================================================================

    /// Create the data directory and a default config file.
    ///
    /// Returns `true` when the config file was created.
    pub fn init(&self) -> Result<bool> {
        fs::create_dir_all(&self.data_dir)?;
        let config_path = self.config_file();
        if config_path.exists() {
            return Ok(false);
        }
        crate::config::Config::default().save(&config_path)?;
        Ok(true)
    }

    pub fn is_initialized(&self) -> bool {
        self.config_file().exists()
    }

    /// Take the exclusive data-directory lock
    pub fn lock(&self, timeout_ms: u64) -> Result<FileLock> {
        FileLock::acquire(self.lock_file(), timeout_ms)
    }

    // =========================================================================
    // Key I/O
    // =========================================================================

    /// Raw JSON stored under `key`, or `None` when the key is absent.
    pub fn read_raw(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let path = self.key_file(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Read a key, falling back to the default when it is missing or
    /// cannot be parsed. A corrupt key never blocks the rest of the load.
    pub fn read_key<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        let path = self.key_file(key);
        if !path.exists() {
            return Ok(T::default());
        }
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(T::default());
        }
        match serde_json::from_str(&content) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(key, error = %err, "ignoring unreadable storage key");
                Ok(T::default())
            }
        }
    }

    /// Strict variant of [`Storage::read_key`] used by diagnostics.
    pub fn read_key_strict<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.key_file(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write a key atomically
    pub fn write_key<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        lock::write_atomic_str(self.key_file(key), &json)
    }

    pub fn remove_key(&self, key: &str) -> Result<bool> {
        let path = self.key_file(key);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    /// Keys currently present in the data directory, sorted
    pub fn list_keys(&self) -> Result<Vec<String>> {
        let pattern = self.data_dir.join("*.json");
        let pattern = pattern.to_string_lossy();
        let entries = glob::glob(&pattern)
            .map_err(|err| Error::OperationFailed(format!("invalid key pattern: {err}")))?;

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| Error::Io(err.into_error()))?;
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_creates_config_once() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path().join("data"));
        assert!(!storage.is_initialized());
        assert!(storage.init().unwrap());
        assert!(storage.is_initialized());
        assert!(!storage.init().unwrap());
    }

    #[test]
    fn missing_and_corrupt_keys_fall_back_to_default() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        let empty: Vec<String> = storage.read_key(keys::TASKS).unwrap();
        assert!(empty.is_empty());

        fs::write(storage.key_file(keys::TASKS), "{not json").unwrap();
        let recovered: Vec<String> = storage.read_key(keys::TASKS).unwrap();
        assert!(recovered.is_empty());
        assert!(storage.read_key_strict::<Vec<String>>(keys::TASKS).is_err());
    }

    #[test]
    fn write_then_list_keys() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        storage.write_key(keys::VACATIONS, &Vec::<String>::new()).unwrap();
        storage.write_key(keys::SORT_BY, "status").unwrap();
        assert_eq!(storage.list_keys().unwrap(), vec!["sortBy", "vacations"]);
        assert_eq!(
            storage.read_raw(keys::SORT_BY).unwrap(),
            Some(serde_json::json!("status"))
        );
        assert!(storage.remove_key(keys::SORT_BY).unwrap());
        assert!(!storage.remove_key(keys::SORT_BY).unwrap());
    }

    #[test]
    fn known_keys() {
        assert!(keys::is_known("uiSettings"));
        assert!(keys::is_known("historicalTasksV1"));
        assert!(!keys::is_known("notificationSettings"));
    }
}
