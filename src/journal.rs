//! Journal and weekly goals
//!
//! Journal entries live inside the planner data document next to the
//! mission planner's weeks and indicators, which are carried through
//! untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::task::lenient;
use crate::units;

/// Key of the history list older versions kept inside planner data.
pub const LEGACY_HISTORY_FIELD: &str = "historicalTasks";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerData {
    #[serde(default)]
    pub journal: Vec<JournalEntry>,
    #[serde(default)]
    pub goal_timezone_fix_v2_applied: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,
    #[serde(default, with = "lenient::opt_datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub is_weekly_goal: bool,
    #[serde(default, with = "week_date", skip_serializing_if = "Option::is_none")]
    pub week_start_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// `YYYY-MM-DD`, tolerating full timestamps and junk on read.
mod week_date {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_str(&date.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error> {
        let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
        Ok(raw
            .as_ref()
            .and_then(|value| value.as_str())
            .and_then(|text| text.get(..10))
            .and_then(|text| NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()))
    }
}

impl JournalEntry {
    /// Week the entry belongs to: the goal's week, or the Sunday week of
    /// its creation day.
    pub fn week(&self, offset: FixedOffset) -> Option<NaiveDate> {
        if self.is_weekly_goal {
            if let Some(week) = self.week_start_date {
                return Some(week);
            }
        }
        self.created_at
            .map(|created| units::week_start_sunday(units::local_date(created, offset)))
    }

    /// Display label of the icon: `fa-solid fa-plane` becomes `Plane`.
    pub fn icon_label(&self) -> String {
        icon_label(self.icon.as_deref())
    }
}

pub fn icon_label(icon: Option<&str>) -> String {
    let Some(last) = icon.and_then(|icon| icon.split_whitespace().last()) else {
        return "No Icon".to_string();
    };
    let name = last.strip_prefix("fa-").unwrap_or(last).replace('-', " ");
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "No Icon".to_string(),
    }
}

pub fn find<'a>(data: &'a PlannerData, id: &str) -> Result<&'a JournalEntry> {
    data.journal
        .iter()
        .find(|entry| entry.id == id)
        .ok_or_else(|| Error::EntryNotFound(id.to_string()))
}

/// Fields for a new entry.
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub title: String,
    pub content: String,
    pub icon: Option<String>,
    /// Any day of the week the entry is a goal for.
    pub goal_week: Option<NaiveDate>,
}

pub fn add(data: &mut PlannerData, id: String, entry: NewEntry, now: DateTime<Utc>) -> Result<JournalEntry> {
    if entry.title.trim().is_empty() && entry.content.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "journal entry needs a title or content".to_string(),
        ));
    }
    let created = JournalEntry {
        id,
        created_at: Some(now),
        title: entry.title.trim().to_string(),
        content: entry.content,
        icon: entry.icon.filter(|icon| !icon.trim().is_empty()),
        is_weekly_goal: entry.goal_week.is_some(),
        week_start_date: entry.goal_week.map(units::week_start_sunday),
        extra: BTreeMap::new(),
    };
    data.journal.push(created.clone());
    Ok(created)
}

#[derive(Debug, Clone, Default)]
pub struct EntryEdit {
    pub title: Option<String>,
    pub content: Option<String>,
    /// `Some(None)` clears the icon.
    pub icon: Option<Option<String>>,
}

pub fn edit(data: &mut PlannerData, id: &str, edit: EntryEdit) -> Result<JournalEntry> {
    let entry = data
        .journal
        .iter_mut()
        .find(|entry| entry.id == id)
        .ok_or_else(|| Error::EntryNotFound(id.to_string()))?;
    if let Some(title) = edit.title {
        entry.title = title.trim().to_string();
    }
    if let Some(content) = edit.content {
        entry.content = content;
    }
    if let Some(icon) = edit.icon {
        entry.icon = icon.filter(|icon| !icon.trim().is_empty());
    }
    Ok(entry.clone())
}

pub fn delete(data: &mut PlannerData, id: &str) -> Result<JournalEntry> {
    let index = data
        .journal
        .iter()
        .position(|entry| entry.id == id)
        .ok_or_else(|| Error::EntryNotFound(id.to_string()))?;
    Ok(data.journal.remove(index))
}

/// The goal for the Sunday week containing `day`.
pub fn weekly_goal(data: &PlannerData, day: NaiveDate) -> Option<&JournalEntry> {
    let week = units::week_start_sunday(day);
    data.journal
        .iter()
        .find(|entry| entry.is_weekly_goal && entry.week_start_date == Some(week))
}

/// Create or replace the goal for the week containing `day`.
pub fn set_weekly_goal(
    data: &mut PlannerData,
    id: String,
    day: NaiveDate,
    content: &str,
    now: DateTime<Utc>,
) -> Result<(JournalEntry, bool)> {
    let week = units::week_start_sunday(day);
    if let Some(existing) = data
        .journal
        .iter_mut()
        .find(|entry| entry.is_weekly_goal && entry.week_start_date == Some(week))
    {
        existing.content = content.to_string();
        return Ok((existing.clone(), false));
    }
    let entry = add(
        data,
        id,
        NewEntry {
            title: format!("Weekly goal {}", week.format("%Y-%m-%d")),
            content: content.to_string(),
            icon: None,
            goal_week: Some(week),
        },
        now,
    )?;
    Ok((entry, true))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JournalSort {
    #[default]
    Date,
    Icon,
}

impl JournalSort {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "date" => Some(Self::Date),
            "icon" => Some(Self::Icon),
            _ => None,
        }
    }
}

/// Entries under one heading.
#[derive(Debug, Clone, Serialize)]
pub struct JournalGroup {
    pub heading: String,
    pub week_start: Option<NaiveDate>,
    pub entries: Vec<JournalEntry>,
}

/// Group entries by Sunday week (newest first) or by icon label.
/// Entries inside a group are newest first.
pub fn grouped(data: &PlannerData, sort: JournalSort, offset: FixedOffset) -> Vec<JournalGroup> {
    let mut entries = data.journal.clone();
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    match sort {
        JournalSort::Date => {
            let mut weeks: BTreeMap<Option<NaiveDate>, Vec<JournalEntry>> = BTreeMap::new();
            for entry in entries {
                weeks.entry(entry.week(offset)).or_default().push(entry);
            }
            weeks
                .into_iter()
                .rev()
                .map(|(week, entries)| JournalGroup {
                    heading: match week {
                        Some(start) => format!(
                            "Week of {} - {}",
                            start.format("%b %-d, %Y"),
                            (start + Duration::days(6)).format("%b %-d, %Y")
                        ),
                        None => "Undated".to_string(),
                    },
                    week_start: week,
                    entries,
                })
                .collect()
        }
        JournalSort::Icon => {
            let mut icons: BTreeMap<String, Vec<JournalEntry>> = BTreeMap::new();
            for entry in entries {
                icons.entry(entry.icon_label()).or_default().push(entry);
            }
            icons
                .into_iter()
                .map(|(heading, entries)| JournalGroup {
                    heading,
                    week_start: None,
                    entries,
                })
                .collect()
        }
    }
}

/// Move weekly goals whose week does not start on a Sunday to the
/// following Sunday. Runs once per data set.
pub fn fix_goal_timezones(data: &mut PlannerData) -> usize {
    if data.goal_timezone_fix_v2_applied {
        return 0;
    }
    let mut fixed = 0;
    for entry in data.journal.iter_mut().filter(|entry| entry.is_weekly_goal) {
        let Some(week) = entry.week_start_date else {
            continue;
        };
        let from_sunday = week.weekday().num_days_from_sunday();
        if from_sunday != 0 {
            entry.week_start_date = Some(week + Duration::days(i64::from(7 - from_sunday)));
            fixed += 1;
        }
    }
    data.goal_timezone_fix_v2_applied = true;
    if fixed > 0 {
        tracing::info!(fixed, "moved weekly goals to Sunday weeks");
    }
    fixed
}

/// Remove and return the legacy history list, if any.
pub fn take_legacy_history(data: &mut PlannerData) -> Option<Vec<serde_json::Value>> {
    match data.extra.remove(LEGACY_HISTORY_FIELD)? {
        serde_json::Value::Array(values) => Some(values),
        other => {
            tracing::warn!(kind = ?other, "dropping malformed legacy history");
            Some(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn utc0() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn icon_labels() {
        assert_eq!(icon_label(Some("fa-solid fa-plane")), "Plane");
        assert_eq!(icon_label(Some("fa-solid fa-person-running")), "Person running");
        assert_eq!(icon_label(Some("star")), "Star");
        assert_eq!(icon_label(None), "No Icon");
    }

    #[test]
    fn preserves_unknown_planner_fields() {
        let raw = r#"{"journal":[{"id":"_a","title":"T","content":"C","mood":3}],"weeks":[{"startDate":"x"}],"indicators":{}}"#;
        let data: PlannerData = serde_json::from_str(raw).unwrap();
        assert!(data.extra.contains_key("weeks"));
        assert_eq!(data.journal[0].extra.get("mood"), Some(&serde_json::json!(3)));
        let round: serde_json::Value = serde_json::to_value(&data).unwrap();
        assert_eq!(round["weeks"][0]["startDate"], "x");
        assert_eq!(round["journal"][0]["mood"], 3);
    }

    #[test]
    fn goals_snap_to_sunday_weeks() {
        let mut data = PlannerData::default();
        let now = utc("2025-10-22T10:00:00Z");
        let (goal, created) = set_weekly_goal(&mut data, "_g".into(), date("2025-10-22"), "Ship it", now).unwrap();
        assert!(created);
        assert_eq!(goal.week_start_date, Some(date("2025-10-19")));
        let (goal, created) = set_weekly_goal(&mut data, "_h".into(), date("2025-10-25"), "Ship more", now).unwrap();
        assert!(!created);
        assert_eq!(goal.id, "_g");
        assert_eq!(weekly_goal(&data, date("2025-10-20")).unwrap().content, "Ship more");
        assert!(weekly_goal(&data, date("2025-10-26")).is_none());
    }

    #[test]
    fn timezone_fix_moves_saturday_goal_once() {
        let raw = r#"{"journal":[{"id":"_badgoal","isWeeklyGoal":true,"weekStartDate":"2025-10-18","content":"x"},
                     {"id":"_ok","isWeeklyGoal":true,"weekStartDate":"2025-10-19"}],"goalTimezoneFixV2Applied":false}"#;
        let mut data: PlannerData = serde_json::from_str(raw).unwrap();
        assert_eq!(fix_goal_timezones(&mut data), 1);
        assert_eq!(data.journal[0].week_start_date, Some(date("2025-10-19")));
        assert_eq!(data.journal[1].week_start_date, Some(date("2025-10-19")));
        assert!(data.goal_timezone_fix_v2_applied);
        data.journal[0].week_start_date = Some(date("2025-10-18"));
        assert_eq!(fix_goal_timezones(&mut data), 0);
    }

    #[test]
    fn entries_group_by_week_and_icon() {
        let mut data = PlannerData::default();
        let plane = NewEntry {
            title: "Trip".into(),
            content: "Packed".into(),
            icon: Some("fa-solid fa-plane".into()),
            goal_week: None,
        };
        let star = NewEntry {
            title: "Win".into(),
            icon: Some("fa-solid fa-star".into()),
            ..NewEntry::default()
        };
        add(&mut data, "_1".into(), plane, utc("2025-10-20T10:00:00Z")).unwrap();
        add(&mut data, "_2".into(), star, utc("2025-10-27T10:00:00Z")).unwrap();

        let weeks = grouped(&data, JournalSort::Date, utc0());
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].week_start, Some(date("2025-10-26")));
        assert_eq!(weeks[1].heading, "Week of Oct 19, 2025 - Oct 25, 2025");

        let icons = grouped(&data, JournalSort::Icon, utc0());
        let headings: Vec<&str> = icons.iter().map(|group| group.heading.as_str()).collect();
        assert_eq!(headings, vec!["Plane", "Star"]);
    }

    #[test]
    fn edit_and_delete() {
        let mut data = PlannerData::default();
        let entry = NewEntry {
            title: "Draft".into(),
            content: "x".into(),
            ..NewEntry::default()
        };
        add(&mut data, "_1".into(), entry, utc("2025-10-20T10:00:00Z")).unwrap();
        let edited = edit(
            &mut data,
            "_1",
            EntryEdit {
                title: Some("Final".into()),
                icon: Some(Some("fa-solid fa-pen".into())),
                ..EntryEdit::default()
            },
        )
        .unwrap();
        assert_eq!(edited.title, "Final");
        assert_eq!(edited.icon_label(), "Pen");
        assert!(add(&mut data, "_2".into(), NewEntry::default(), utc("2025-10-20T10:00:00Z")).is_err());
        delete(&mut data, "_1").unwrap();
        assert!(matches!(delete(&mut data, "_1"), Err(Error::EntryNotFound(_))));
    }

    #[test]
    fn legacy_history_is_taken_once() {
        let raw = r#"{"historicalTasks":[{"originalTaskId":"a"}],"weeks":[]}"#;
        let mut data: PlannerData = serde_json::from_str(raw).unwrap();
        assert_eq!(take_legacy_history(&mut data).unwrap().len(), 1);
        assert!(take_legacy_history(&mut data).is_none());
        assert!(data.extra.contains_key("weeks"));
    }
}
