//! Vacation periods
//!
//! Due dates that fall on a vacation day move to the day after the
//! vacation, keeping their time of day. Categories flagged
//! `bypassVacation` are never moved.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::units;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vacation {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(deserialize_with = "lenient_date")]
    pub start_date: NaiveDate,
    #[serde(deserialize_with = "lenient_date")]
    pub end_date: NaiveDate,
}

/// Accept `YYYY-MM-DD` as well as full timestamps, keeping the date part.
fn lenient_date<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    let date_part = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(serde::de::Error::custom)
}

impl Vacation {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

pub fn parse_date(label: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|err| {
        Error::InvalidArgument(format!("invalid {label} date '{raw}': {err} (expected YYYY-MM-DD)"))
    })
}

/// Add a vacation. The end date may equal the start date.
pub fn add(
    vacations: &mut Vec<Vacation>,
    id: String,
    name: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vacation> {
    if end < start {
        return Err(Error::InvalidArgument(format!(
            "vacation ends ({end}) before it starts ({start})"
        )));
    }
    let vacation = Vacation {
        id,
        name: name.trim().to_string(),
        start_date: start,
        end_date: end,
    };
    vacations.push(vacation.clone());
    vacations.sort_by_key(|vacation| vacation.start_date);
    Ok(vacation)
}

/// Remove by id, or by case-insensitive name.
pub fn remove(vacations: &mut Vec<Vacation>, key: &str) -> Result<Vacation> {
    let index = vacations
        .iter()
        .position(|vacation| vacation.id == key)
        .or_else(|| {
            vacations
                .iter()
                .position(|vacation| vacation.name.eq_ignore_ascii_case(key))
        })
        .ok_or_else(|| Error::InvalidArgument(format!("no vacation matches '{key}'")))?;
    Ok(vacations.remove(index))
}

/// The vacation covering the local day of `at`, if any.
pub fn vacation_on(
    at: DateTime<Utc>,
    vacations: &[Vacation],
    offset: FixedOffset,
) -> Option<&Vacation> {
    let day = units::local_date(at, offset);
    vacations.iter().find(|vacation| vacation.contains(day))
}

/// Move `at` past any vacation it falls in. Chained vacations are skipped
/// one after another.
pub fn adjust_for_vacation(
    at: DateTime<Utc>,
    vacations: &[Vacation],
    bypass: bool,
    offset: FixedOffset,
) -> DateTime<Utc> {
    if bypass {
        return at;
    }
    let time = units::local_time(at, offset);
    let mut current = at;
    // Each step lands strictly after a vacation end, so this terminates.
    while let Some(vacation) = vacation_on(current, vacations, offset) {
        let next_day = vacation.end_date + Duration::days(1);
        current = units::at_local(next_day, time, offset);
    }
    current
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

    fn vacation(id: &str, start: &str, end: &str) -> Vacation {
        Vacation {
            id: id.to_string(),
            name: id.to_string(),
            start_date: date(start),
            end_date: date(end),
        }
    }

    #[test]
    fn dates_inside_vacation_move_past_it() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let vacations = vec![vacation("v", "2025-10-01", "2025-10-03")];
        assert_eq!(
            adjust_for_vacation(utc("2025-10-02T09:30:00Z"), &vacations, false, offset),
            utc("2025-10-04T09:30:00Z")
        );
        assert_eq!(
            adjust_for_vacation(utc("2025-10-02T09:30:00Z"), &vacations, true, offset),
            utc("2025-10-02T09:30:00Z")
        );
        assert_eq!(
            adjust_for_vacation(utc("2025-09-30T23:59:00Z"), &vacations, false, offset),
            utc("2025-09-30T23:59:00Z")
        );
    }

    #[test]
    fn back_to_back_vacations_are_chained() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let vacations = vec![
            vacation("a", "2025-10-01", "2025-10-03"),
            vacation("b", "2025-10-04", "2025-10-05"),
        ];
        assert_eq!(
            adjust_for_vacation(utc("2025-10-01T08:00:00Z"), &vacations, false, offset),
            utc("2025-10-06T08:00:00Z")
        );
    }

    #[test]
    fn local_day_decides() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let vacations = vec![vacation("v", "2025-10-01", "2025-10-01")];
        // 23:30 UTC on Sep 30 is already Oct 1 locally.
        assert!(vacation_on(utc("2025-09-30T23:30:00Z"), &vacations, offset).is_some());
    }

    #[test]
    fn add_validates_and_remove_by_name() {
        let mut vacations = Vec::new();
        assert!(add(&mut vacations, "x".into(), "Bad", date("2025-10-05"), date("2025-10-01")).is_err());
        let added = add(&mut vacations, "v1".into(), "Trip", date("2025-10-01"), date("2025-10-05")).unwrap();
        assert_eq!(added.days(), 5);
        assert_eq!(remove(&mut vacations, "trip").unwrap().id, "v1");
        assert!(remove(&mut vacations, "trip").is_err());
    }

    #[test]
    fn deserializes_timestamps_and_dates() {
        let parsed: Vacation = serde_json::from_str(
            r#"{"id":"v","name":"Trip","startDate":"2025-10-01T00:00:00.000Z","endDate":"2025-10-03"}"#,
        )
        .unwrap();
        assert_eq!(parsed.start_date, date("2025-10-01"));
        assert_eq!(parsed.end_date, date("2025-10-03"));
    }
}
