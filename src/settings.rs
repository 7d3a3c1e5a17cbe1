//! User settings
//!
//! Each group is stored under its own key. Stored objects are merged over
//! the defaults field by field, so partial or older documents still load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{keys, Storage};
use crate::task::{SortBy, SortDirection, StatusColor};

/// One string per status colour. Used for both colours and names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPalette {
    pub blue: String,
    pub green: String,
    pub yellow: String,
    pub red: String,
    pub black: String,
}

impl StatusPalette {
    pub fn default_colors() -> Self {
        Self {
            blue: "#00BFFF".to_string(),
            green: "#22c55e".to_string(),
            yellow: "#facc15".to_string(),
            red: "#dc2626".to_string(),
            black: "#4b5563".to_string(),
        }
    }

    pub fn default_names() -> Self {
        Self {
            blue: "Locked".to_string(),
            green: "Ready".to_string(),
            yellow: "Start Soon".to_string(),
            red: "Do Right Now".to_string(),
            black: "Overdue".to_string(),
        }
    }

    pub fn get(&self, status: StatusColor) -> &str {
        match status {
            StatusColor::Blue => &self.blue,
            StatusColor::Green => &self.green,
            StatusColor::Yellow => &self.yellow,
            StatusColor::Red => &self.red,
            StatusColor::Black => &self.black,
        }
    }

    pub fn set(&mut self, status: StatusColor, value: impl Into<String>) {
        let slot = match status {
            StatusColor::Blue => &mut self.blue,
            StatusColor::Green => &mut self.green,
            StatusColor::Yellow => &mut self.yellow,
            StatusColor::Red => &mut self.red,
            StatusColor::Black => &mut self.black,
        };
        *slot = value.into();
    }
}

/// Partial palette as stored; missing entries fall back per field.
#[derive(Debug, Default, Deserialize)]
struct PartialPalette {
    blue: Option<String>,
    green: Option<String>,
    yellow: Option<String>,
    red: Option<String>,
    black: Option<String>,
}

impl PartialPalette {
    fn over(self, base: StatusPalette) -> StatusPalette {
        StatusPalette {
            blue: self.blue.unwrap_or(base.blue),
            green: self.green.unwrap_or(base.green),
            yellow: self.yellow.unwrap_or(base.yellow),
            red: self.red.unwrap_or(base.red),
            black: self.black.unwrap_or(base.black),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    #[default]
    Auto,
    #[serde(other)]
    Night,
}

impl ThemeMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Self::Light),
            "night" | "dark" => Some(Self::Night),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Night => "night",
            Self::Auto => "auto",
        }
    }

    pub fn is_light(&self) -> bool {
        matches!(self, Self::Light)
    }
}

fn default_base_color() -> String {
    "#3b82f6".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theming {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_base_color")]
    pub base_color: String,
    #[serde(default)]
    pub mode: ThemeMode,
    #[serde(default = "default_true")]
    pub use_theme_for_status: bool,
}

impl Default for Theming {
    fn default() -> Self {
        Self {
            enabled: false,
            base_color: default_base_color(),
            mode: ThemeMode::Auto,
            use_theme_for_status: true,
        }
    }
}

fn default_s_value() -> f64 {
    0.5
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensitivity {
    #[serde(default = "default_s_value")]
    pub s_value: f64,
    #[serde(default = "default_true")]
    pub is_adaptive: bool,
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self {
            s_value: default_s_value(),
            is_adaptive: true,
        }
    }
}

fn default_title() -> String {
    "Task & Mission Planner".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub use_24_hour_format: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            title: default_title(),
            use_24_hour_format: false,
        }
    }
}

fn default_category_id() -> String {
    "Planner".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerSettings {
    /// Category given to tasks created from the calendar
    #[serde(default = "default_category_id")]
    pub default_category_id: String,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            default_category_id: default_category_id(),
        }
    }
}

fn default_last_view() -> String {
    "timeGridWeek".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSettings {
    /// Category ids shown on the calendar; empty shows everything
    #[serde(default)]
    pub category_filter: Vec<Option<String>>,
    /// Whether the calendar filter follows the task list filter
    #[serde(default = "default_true")]
    pub sync_filter: bool,
    #[serde(default = "default_last_view")]
    pub last_view: String,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            category_filter: Vec::new(),
            sync_filter: true,
            last_view: default_last_view(),
        }
    }
}

/// Per-category calendar switches keyed by category id (`"null"` for
/// uncategorized tasks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFilterFlags {
    #[serde(default = "default_true")]
    pub show: bool,
    #[serde(default = "default_true")]
    pub schedule: bool,
}

impl Default for CategoryFilterFlags {
    fn default() -> Self {
        Self {
            show: true,
            schedule: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiChartMode {
    Stacked,
    #[default]
    #[serde(other)]
    Single,
}

fn default_active_view() -> String {
    "calendar-view".to_string()
}

fn default_chart_range() -> String {
    "8d".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiSettings {
    #[serde(default = "default_true")]
    pub is_simple_mode: bool,
    #[serde(default = "default_active_view")]
    pub active_view: String,
    #[serde(default)]
    pub kpi_chart_mode: KpiChartMode,
    #[serde(default = "default_chart_range")]
    pub kpi_chart_date_range: String,
    #[serde(default)]
    pub kpi_week_offset: i64,
    #[serde(default)]
    pub calendar_category_filters: BTreeMap<String, CategoryFilterFlags>,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            is_simple_mode: true,
            active_view: default_active_view(),
            kpi_chart_mode: KpiChartMode::Single,
            kpi_chart_date_range: default_chart_range(),
            kpi_week_offset: 0,
            calendar_category_filters: BTreeMap::new(),
        }
    }
}

impl UiSettings {
    /// Whether tasks of this category take part in scheduling. Only an
    /// explicit `schedule: false` excludes them.
    pub fn schedules_category(&self, category_id: Option<&str>) -> bool {
        self.calendar_category_filters
            .get(category_id.unwrap_or("null"))
            .map(|flags| flags.schedule)
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDisplaySettings {
    #[serde(default = "default_true")]
    pub show_due_date: bool,
    #[serde(default = "default_true")]
    pub show_repetition: bool,
    #[serde(default = "default_true")]
    pub show_duration: bool,
    #[serde(default = "default_true")]
    pub show_category: bool,
    #[serde(default = "default_true")]
    pub show_countdown: bool,
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

impl Default for TaskDisplaySettings {
    fn default() -> Self {
        Self {
            show_due_date: true,
            show_repetition: true,
            show_duration: true,
            show_category: true,
            show_countdown: true,
            show_progress: true,
        }
    }
}

/// Every settings group, loaded together.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub status_colors: StatusPalette,
    pub status_names: StatusPalette,
    pub theming: Theming,
    pub sensitivity: Sensitivity,
    pub app: AppSettings,
    pub planner: PlannerSettings,
    pub calendar: CalendarSettings,
    pub ui: UiSettings,
    pub task_display: TaskDisplaySettings,
    pub sort_by: SortBy,
    pub sort_direction: SortDirection,
    /// Task list category filter; `None` entries select uncategorized tasks
    pub category_filter: Vec<Option<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            status_colors: StatusPalette::default_colors(),
            status_names: StatusPalette::default_names(),
            theming: Theming::default(),
            sensitivity: Sensitivity::default(),
            app: AppSettings::default(),
            planner: PlannerSettings::default(),
            calendar: CalendarSettings::default(),
            ui: UiSettings::default(),
            task_display: TaskDisplaySettings::default(),
            sort_by: SortBy::default(),
            sort_direction: SortDirection::default(),
            category_filter: Vec::new(),
        }
    }
}

impl Settings {
    pub fn load(storage: &Storage) -> Result<Self> {
        let colors: Option<PartialPalette> = storage.read_key(keys::STATUS_COLORS)?;
        let names: Option<PartialPalette> = storage.read_key(keys::STATUS_NAMES)?;
        let sort_by: Option<SortBy> = storage.read_key(keys::SORT_BY)?;
        let sort_direction: Option<SortDirection> = storage.read_key(keys::SORT_DIRECTION)?;

        Ok(Self {
            status_colors: colors
                .unwrap_or_default()
                .over(StatusPalette::default_colors()),
            status_names: names
                .unwrap_or_default()
                .over(StatusPalette::default_names()),
            theming: storage.read_key(keys::THEMING)?,
            sensitivity: storage.read_key(keys::SENSITIVITY)?,
            app: storage.read_key(keys::APP_SETTINGS)?,
            planner: storage.read_key(keys::PLANNER_SETTINGS)?,
            calendar: storage.read_key(keys::CALENDAR_SETTINGS)?,
            ui: storage.read_key(keys::UI_SETTINGS)?,
            task_display: storage.read_key(keys::TASK_DISPLAY)?,
            sort_by: sort_by.unwrap_or_default(),
            sort_direction: sort_direction.unwrap_or_default(),
            category_filter: storage.read_key(keys::CATEGORY_FILTER)?,
        })
    }

    pub fn save(&self, storage: &Storage) -> Result<()> {
        storage.write_key(keys::STATUS_COLORS, &self.status_colors)?;
        storage.write_key(keys::STATUS_NAMES, &self.status_names)?;
        storage.write_key(keys::THEMING, &self.theming)?;
        storage.write_key(keys::SENSITIVITY, &self.sensitivity)?;
        storage.write_key(keys::APP_SETTINGS, &self.app)?;
        storage.write_key(keys::PLANNER_SETTINGS, &self.planner)?;
        storage.write_key(keys::CALENDAR_SETTINGS, &self.calendar)?;
        storage.write_key(keys::UI_SETTINGS, &self.ui)?;
        storage.write_key(keys::TASK_DISPLAY, &self.task_display)?;
        storage.write_key(keys::SORT_BY, &self.sort_by)?;
        storage.write_key(keys::SORT_DIRECTION, &self.sort_direction)?;
        storage.write_key(keys::CATEGORY_FILTER, &self.category_filter)?;
        Ok(())
    }

    /// Settings as one JSON object keyed by storage key, for export.
    pub fn to_export(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        let mut map = serde_json::Map::new();
        map.insert(keys::STATUS_COLORS.into(), serde_json::to_value(&self.status_colors)?);
        map.insert(keys::STATUS_NAMES.into(), serde_json::to_value(&self.status_names)?);
        map.insert(keys::SORT_BY.into(), serde_json::to_value(self.sort_by)?);
        map.insert(keys::SORT_DIRECTION.into(), serde_json::to_value(self.sort_direction)?);
        map.insert(keys::THEMING.into(), serde_json::to_value(&self.theming)?);
        map.insert(keys::CALENDAR_SETTINGS.into(), serde_json::to_value(&self.calendar)?);
        map.insert(keys::CATEGORY_FILTER.into(), serde_json::to_value(&self.category_filter)?);
        map.insert(keys::PLANNER_SETTINGS.into(), serde_json::to_value(&self.planner)?);
        map.insert(keys::TASK_DISPLAY.into(), serde_json::to_value(&self.task_display)?);
        map.insert(keys::APP_SETTINGS.into(), serde_json::to_value(&self.app)?);
        map.insert(keys::UI_SETTINGS.into(), serde_json::to_value(&self.ui)?);
        map.insert(keys::SENSITIVITY.into(), serde_json::to_value(self.sensitivity)?);
        Ok(map)
    }

    /// Whether a task with this category passes the task list filter.
    pub fn list_filter_allows(&self, category_id: Option<&str>) -> bool {
        filter_allows(&self.category_filter, category_id)
    }

    /// Category filter applied to the calendar, honouring `syncFilter`.
    pub fn calendar_filter(&self) -> &[Option<String>] {
        if self.calendar.sync_filter {
            &self.category_filter
        } else {
            &self.calendar.category_filter
        }
    }
}

/// An empty filter allows everything.
pub fn filter_allows(filter: &[Option<String>], category_id: Option<&str>) -> bool {
    filter.is_empty()
        || filter
            .iter()
            .any(|entry| entry.as_deref() == category_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_documents_merge_over_defaults() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        std::fs::write(storage.key_file(keys::STATUS_COLORS), r##"{"red":"#ff0000"}"##).unwrap();
        std::fs::write(storage.key_file(keys::THEMING), r#"{"enabled":true,"mode":"sepia"}"#).unwrap();
        std::fs::write(storage.key_file(keys::UI_SETTINGS), r#"{"kpiWeekOffset":-2,"kpiChartMode":"pie"}"#).unwrap();

        let settings = Settings::load(&storage).unwrap();
        assert_eq!(settings.status_colors.red, "#ff0000");
        assert_eq!(settings.status_colors.blue, "#00BFFF");
        assert_eq!(settings.status_names.black, "Overdue");
        assert!(settings.theming.enabled);
        assert_eq!(settings.theming.mode, ThemeMode::Night);
        assert_eq!(settings.theming.base_color, "#3b82f6");
        assert_eq!(settings.ui.kpi_week_offset, -2);
        assert_eq!(settings.ui.kpi_chart_mode, KpiChartMode::Single);
        assert_eq!(settings.ui.kpi_chart_date_range, "8d");
    }

    #[test]
    fn save_and_reload() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        let mut settings = Settings::default();
        settings.sort_by = SortBy::DueDate;
        settings.status_names.set(StatusColor::Green, "Go");
        settings.save(&storage).unwrap();

        let loaded = Settings::load(&storage).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(
            storage.read_raw(keys::SORT_BY).unwrap(),
            Some(serde_json::json!("dueDate"))
        );
    }

    #[test]
    fn schedule_flag_only_excludes_when_false() {
        let mut ui = UiSettings::default();
        assert!(ui.schedules_category(Some("Work")));
        ui.calendar_category_filters.insert(
            "null".to_string(),
            CategoryFilterFlags {
                show: true,
                schedule: false,
            },
        );
        assert!(!ui.schedules_category(None));
        assert!(ui.schedules_category(Some("Work")));
    }

    #[test]
    fn filters() {
        assert!(filter_allows(&[], Some("Work")));
        let filter = vec![Some("Work".to_string()), None];
        assert!(filter_allows(&filter, Some("Work")));
        assert!(filter_allows(&filter, None));
        assert!(!filter_allows(&filter, Some("Home")));
    }
}
