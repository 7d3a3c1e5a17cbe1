//! Configuration loading and management
//!
//! Handles parsing of the `.planner.toml` file that lives in the data
//! directory. User-facing preferences edited from the CLI (status colours,
//! theming, sensitivity) are persisted as storage keys instead; this file
//! holds the knobs of the engine itself.

use std::path::Path;

use chrono::{FixedOffset, Local, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the configuration file inside the data directory
pub const CONFIG_FILE: &str = ".planner.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Time zone handling
    #[serde(default)]
    pub time: TimeConfig,

    /// Status colouring
    #[serde(default)]
    pub status: StatusConfig,

    /// Scheduling pipeline
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Historical archive
    #[serde(default)]
    pub history: HistoryConfig,

    /// KPI dashboard
    #[serde(default)]
    pub kpi: KpiConfig,

    /// Identifier generation
    #[serde(default)]
    pub ids: IdsConfig,

    /// Data directory locking
    #[serde(default)]
    pub lock: LockConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time: TimeConfig::default(),
            status: StatusConfig::default(),
            schedule: ScheduleConfig::default(),
            history: HistoryConfig::default(),
            kpi: KpiConfig::default(),
            ids: IdsConfig::default(),
            lock: LockConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// `local` or a fixed offset such as `+02:00`. Calendar days, weeks and
    /// recurrence rules are evaluated in this offset.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

fn default_utc_offset() -> String {
    "local".to_string()
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Green tasks due within this window count towards the busy load
    #[serde(default = "default_yellow_window_hours")]
    pub yellow_window_hours: f64,

    /// Estimate assumed for tasks without one
    #[serde(default = "default_estimate_minutes")]
    pub default_estimate_minutes: u32,
}

fn default_yellow_window_hours() -> f64 {
    16.0
}

fn default_estimate_minutes() -> u32 {
    30
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            yellow_window_hours: default_yellow_window_hours(),
            default_estimate_minutes: default_estimate_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// How far ahead the pipeline projects occurrences
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
}

fn default_horizon_days() -> u32 {
    14
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Records older than this are pruned on save. Zero disables pruning.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_retention_days() -> u32 {
    28
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiConfig {
    /// Range used when the UI settings do not name one
    #[serde(default = "default_kpi_range")]
    pub default_range: String,
}

fn default_kpi_range() -> String {
    "30d".to_string()
}

impl Default for KpiConfig {
    fn default() -> Self {
        Self {
            default_range: default_kpi_range(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdsConfig {
    #[serde(default = "default_id_prefix")]
    pub prefix: String,

    #[serde(default = "default_id_len")]
    pub len: usize,
}

fn default_id_prefix() -> String {
    "_".to_string()
}

fn default_id_len() -> usize {
    9
}

impl Default for IdsConfig {
    fn default() -> Self {
        Self {
            prefix: default_id_prefix(),
            len: default_id_len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    crate::lock::DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a `.planner.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a data directory, or return defaults
    pub fn load_from_dir(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        crate::lock::write_atomic_str(path, &content)?;
        Ok(())
    }

    /// Offset used for calendar-day arithmetic
    pub fn offset(&self) -> Result<FixedOffset> {
        parse_offset(&self.time.utc_offset)
    }

    fn validate(&self) -> Result<()> {
        parse_offset(&self.time.utc_offset)?;
        let window = self.status.yellow_window_hours;
        if window.is_nan() || window < 0.0 {
            return Err(Error::InvalidConfig(
                "status.yellow_window_hours must be >= 0".to_string(),
            ));
        }
        if self.schedule.horizon_days == 0 {
            return Err(Error::InvalidConfig(
                "schedule.horizon_days must be >= 1".to_string(),
            ));
        }
        if crate::kpi::KpiRange::parse(&self.kpi.default_range).is_none() {
            return Err(Error::InvalidConfig(format!(
                "kpi.default_range: invalid range '{}' (expected 8d|30d|90d)",
                self.kpi.default_range
            )));
        }
        if self.ids.len < 4 || self.ids.len > 26 {
            return Err(Error::InvalidConfig(
                "ids.len must be between 4 and 26".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse `local`, `utc`/`Z` or a `+HH:MM` offset.
pub fn parse_offset(raw: &str) -> Result<FixedOffset> {
    let value = raw.trim();
    if value.eq_ignore_ascii_case("local") {
        return Ok(Local::now().offset().fix());
    }
    if value.eq_ignore_ascii_case("utc") || value == "Z" {
        return Ok(Utc.fix());
    }

    let invalid = || {
        Error::InvalidConfig(format!(
            "time.utc_offset: invalid offset '{value}' (expected local|utc|+HH:MM)"
        ))
    };

    let (sign, rest) = match value.chars().next() {
        Some('+') => (1, &value[1..]),
        Some('-') => (-1, &value[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.time.utc_offset, "local");
        assert_eq!(cfg.status.yellow_window_hours, 16.0);
        assert_eq!(cfg.status.default_estimate_minutes, 30);
        assert_eq!(cfg.schedule.horizon_days, 14);
        assert_eq!(cfg.history.retention_days, 28);
        assert_eq!(cfg.kpi.default_range, "30d");
        assert_eq!(cfg.ids.prefix, "_");
        assert_eq!(cfg.ids.len, 9);
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[time]
utc_offset = "+02:00"

[history]
retention_days = 0

[kpi]
default_range = "90d"
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load");
        assert_eq!(cfg.offset().unwrap().local_minus_utc(), 7200);
        assert_eq!(cfg.history.retention_days, 0);
        assert_eq!(cfg.kpi.default_range, "90d");
        assert_eq!(cfg.schedule.horizon_days, 14);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from_dir(dir.path()).expect("defaults");
        assert_eq!(cfg.ids.len, 9);
    }

    #[test]
    fn invalid_offset_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[time]\nutc_offset = \"noon\"").expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_kpi_range_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[kpi]\ndefault_range = \"7d\"").expect("write config");
        assert!(matches!(Config::load(&path), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn parse_offset_variants() {
        assert_eq!(parse_offset("utc").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_offset("-05:30").unwrap().local_minus_utc(), -19800);
        assert_eq!(parse_offset("+9").unwrap().local_minus_utc(), 32400);
        assert!(parse_offset("+25:00").is_err());
    }
}
