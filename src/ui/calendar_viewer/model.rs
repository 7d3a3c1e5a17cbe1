use chrono::{Duration, FixedOffset, NaiveDate};
use ratatui::style::Color;

use crate::calendar::{CalendarEvent, CalendarView, ViewKind};
use crate::theme;
use crate::units;

/// One visible day and the indices of the events overlapping it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub events: Vec<usize>,
}

/// Split a view into day cells, events ordered by start then title.
pub fn day_cells(view: &CalendarView, offset: FixedOffset) -> Vec<DayCell> {
    let mut cells = Vec::new();
    let mut date = view.start;
    while date <= view.end {
        let day_start = units::start_of_day(date, offset);
        let day_end = units::start_of_day(date + Duration::days(1), offset);
        let mut events: Vec<usize> = view
            .events
            .iter()
            .enumerate()
            .filter(|(_, event)| event.start < day_end && event.end > day_start)
            .map(|(index, _)| index)
            .collect();
        events.sort_by(|a, b| {
            let (a, b) = (&view.events[*a], &view.events[*b]);
            a.start.cmp(&b.start).then_with(|| a.title.cmp(&b.title))
        });
        cells.push(DayCell { date, events });
        date += Duration::days(1);
    }
    cells
}

/// Grid shape (rows, columns) of a view.
pub fn grid(kind: ViewKind, cells: usize) -> (usize, usize) {
    match kind {
        ViewKind::Day => (1, 1),
        ViewKind::Week => (1, cells.clamp(1, 7)),
        ViewKind::Month => (cells.div_ceil(7).max(1), 7),
    }
}

pub fn color(hex: &str) -> Color {
    match theme::parse_hex(hex) {
        Some(rgb) => Color::Rgb(rgb.r, rgb.g, rgb.b),
        None => Color::Reset,
    }
}

pub fn time_span(event: &CalendarEvent, offset: FixedOffset, use_24h: bool) -> String {
    let format = if use_24h { "%H:%M" } else { "%-I:%M%P" };
    format!(
        "{}-{}",
        event.start.with_timezone(&offset).format(format),
        event.end.with_timezone(&offset).format(format)
    )
}

/// Short label for an event inside a cell.
pub fn event_label(event: &CalendarEvent, offset: FixedOffset, use_24h: bool, compact: bool) -> String {
    let marker = match (&event.historical, event.is_appointment) {
        (Some(_), _) => "~ ",
        (None, true) => "@ ",
        (None, false) => "",
    };
    if compact {
        let format = if use_24h { "%H:%M" } else { "%-I%P" };
        format!(
            "{} {marker}{}",
            event.start.with_timezone(&offset).format(format),
            event.title
        )
    } else {
        format!("{} {marker}{}", time_span(event, offset, use_24h), event.title)
    }
}

/// Keep `selected` inside `0..len`.
pub fn clamp_index(selected: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else {
        selected.min(len - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(id: &str, title: &str, start_hour: u32, end_hour: u32, day: u32) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            task_id: id.to_string(),
            title: title.to_string(),
            start: Utc.with_ymd_and_hms(2024, 3, day, start_hour, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 3, day, end_hour, 0, 0).unwrap(),
            category_id: None,
            background_color: "#22c55e".to_string(),
            border_color: "#808080".to_string(),
            text_color: "#000000".to_string(),
            status: None,
            is_appointment: false,
            historical: None,
            overridden: false,
        }
    }

    fn week_view(events: Vec<CalendarEvent>) -> CalendarView {
        let start = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();
        CalendarView {
            kind: ViewKind::Week,
            anchor: start,
            start,
            end: start + Duration::days(6),
            events,
        }
    }

    #[test]
    fn day_cells_place_and_order_events() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let view = week_view(vec![
            event("b", "Late", 15, 16, 4),
            event("a", "Early", 9, 10, 4),
            event("c", "Friday", 9, 10, 8),
        ]);
        let cells = day_cells(&view, offset);
        assert_eq!(cells.len(), 7);
        assert_eq!(cells[1].date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(cells[1].events, vec![1, 0]);
        assert_eq!(cells[5].events, vec![2]);
        assert!(cells[0].events.is_empty());
    }

    #[test]
    fn grid_shapes() {
        assert_eq!(grid(ViewKind::Day, 1), (1, 1));
        assert_eq!(grid(ViewKind::Week, 7), (1, 7));
        assert_eq!(grid(ViewKind::Month, 42), (6, 7));
    }

    #[test]
    fn colors_parse_hex() {
        assert_eq!(color("#ff0000"), Color::Rgb(255, 0, 0));
        assert_eq!(color("nope"), Color::Reset);
    }

    #[test]
    fn labels_mark_appointments_and_history() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let mut appointment = event("a", "Dentist", 9, 10, 4);
        appointment.is_appointment = true;
        assert_eq!(event_label(&appointment, offset, true, false), "09:00-10:00 @ Dentist");
        assert_eq!(event_label(&appointment, offset, true, true), "09:00 @ Dentist");
    }

    #[test]
    fn clamp_index_handles_empty() {
        assert_eq!(clamp_index(3, 0), 0);
        assert_eq!(clamp_index(3, 2), 1);
        assert_eq!(clamp_index(0, 2), 0);
    }
}
