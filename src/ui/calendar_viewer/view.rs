use chrono::Datelike;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::calendar::{CalendarEvent, ViewKind};

use super::app::{AppState, Snapshot, StatusKind};
use super::model::{self, DayCell};

const HELP_KEY_WIDTH: usize = 10;
const DETAIL_HEIGHT: u16 = 4;
const COLOR_TEXT: Color = Color::Rgb(234, 236, 239);
const COLOR_MUTED: Color = Color::Rgb(160, 165, 172);
const COLOR_MUTED_DARK: Color = Color::Rgb(118, 124, 130);
const COLOR_INFO: Color = Color::Rgb(116, 198, 219);
const COLOR_WARNING: Color = Color::Rgb(244, 200, 98);
const COLOR_ERROR: Color = Color::Rgb(255, 107, 107);
const COLOR_ACCENT: Color = Color::Rgb(122, 170, 255);
const COLOR_BORDER: Color = Color::Rgb(92, 126, 166);
const COLOR_TODAY: Color = Color::Rgb(180, 156, 92);
const COLOR_MAGENTA: Color = Color::Rgb(214, 140, 230);

pub fn render(frame: &mut Frame, app: &AppState) {
    let area = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(DETAIL_HEIGHT),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(area);

    render_tabs(frame, app, chunks[0]);
    match &app.snapshot {
        Some(snapshot) => {
            render_grid(frame, app, snapshot, chunks[1]);
            render_detail(frame, app, snapshot, chunks[2]);
        }
        None => {
            let loading = Paragraph::new("loading...")
                .alignment(Alignment::Center)
                .style(Style::default().fg(COLOR_MUTED));
            frame.render_widget(loading, chunks[1]);
        }
    }
    render_footer(frame, app, chunks[3]);

    if app.show_help {
        render_help_modal(frame, area);
    }
}

fn render_tabs(frame: &mut Frame, app: &AppState, area: Rect) {
    let tabs = [
        ("d Day", ViewKind::Day),
        ("w Week", ViewKind::Week),
        ("m Month", ViewKind::Month),
    ];
    let mut spans = Vec::new();
    for (label, kind) in tabs {
        let style = if app.kind == kind {
            Style::default()
                .fg(COLOR_INFO)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(COLOR_MUTED)
        };
        spans.push(Span::styled(label, style));
        spans.push(Span::styled("  ", Style::default().fg(COLOR_MUTED_DARK)));
    }
    spans.push(Span::styled(
        app.title(),
        Style::default().fg(COLOR_MAGENTA).add_modifier(Modifier::BOLD),
    ));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_grid(frame: &mut Frame, app: &AppState, snapshot: &Snapshot, area: Rect) {
    let (rows, columns) = model::grid(app.kind, app.cells.len());
    let row_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, rows as u32); rows])
        .split(area);
    for (row, row_area) in row_areas.iter().enumerate() {
        let cell_areas = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, columns as u32); columns])
            .split(*row_area);
        for (column, cell_area) in cell_areas.iter().enumerate() {
            if let Some(cell) = app.cells.get(row * columns + column) {
                render_cell(frame, app, snapshot, cell, *cell_area);
            }
        }
    }
}

fn render_cell(frame: &mut Frame, app: &AppState, snapshot: &Snapshot, cell: &DayCell, area: Rect) {
    let selected = app.selected_date == Some(cell.date);
    let is_today = cell.date == snapshot.today;
    let outside_month = app.kind == ViewKind::Month && cell.date.month() != snapshot.view.anchor.month();

    let title = match app.kind {
        ViewKind::Month => cell.date.format(" %-d ").to_string(),
        _ => cell.date.format(" %a %-d ").to_string(),
    };
    let border = if selected {
        Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD)
    } else if is_today {
        Style::default().fg(COLOR_TODAY)
    } else {
        Style::default().fg(COLOR_BORDER)
    };
    let title_style = if outside_month {
        Style::default().fg(COLOR_MUTED_DARK)
    } else {
        Style::default().fg(COLOR_TEXT)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(Span::styled(title, title_style));

    let compact = app.kind != ViewKind::Day;
    let inner_height = area.height.saturating_sub(2) as usize;
    let mut lines: Vec<Line<'static>> = Vec::new();
    for (position, index) in cell.events.iter().enumerate() {
        let Some(event) = snapshot.view.events.get(*index) else {
            continue;
        };
        if inner_height > 0 && lines.len() + 1 == inner_height && position + 1 < cell.events.len() {
            lines.push(Line::from(Span::styled(
                format!("+{} more", cell.events.len() - position),
                Style::default().fg(COLOR_MUTED),
            )));
            break;
        }
        let highlighted = selected && position == app.selected_event;
        lines.push(event_line(event, snapshot, compact, highlighted));
    }

    let widget = Paragraph::new(lines).block(block);
    frame.render_widget(widget, area);
}

fn event_line(event: &CalendarEvent, snapshot: &Snapshot, compact: bool, highlighted: bool) -> Line<'static> {
    let label = model::event_label(event, snapshot.offset, snapshot.use_24h, compact);
    let mut style = Style::default()
        .fg(model::color(&event.text_color))
        .bg(model::color(&event.background_color));
    if highlighted {
        style = style.add_modifier(Modifier::REVERSED | Modifier::BOLD);
    }
    Line::from(vec![
        Span::styled("▎", Style::default().fg(model::color(&event.border_color))),
        Span::styled(label, style),
    ])
}

fn render_detail(frame: &mut Frame, app: &AppState, snapshot: &Snapshot, area: Rect) {
    let lines = match app.current_event() {
        Some(event) => {
            let kind = match (&event.historical, event.is_appointment) {
                (Some(status), _) => format!("history ({})", status.as_str()),
                (None, true) => "appointment".to_string(),
                (None, false) => "task".to_string(),
            };
            let status = event
                .status
                .map(|status| status.as_str().to_string())
                .unwrap_or_else(|| "-".to_string());
            vec![
                Line::from(vec![
                    label_span("Event "),
                    Span::styled(
                        event.title.clone(),
                        Style::default().fg(COLOR_TEXT).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(format!("  {}", event.id), Style::default().fg(COLOR_MUTED)),
                ]),
                Line::from(vec![
                    label_span("When  "),
                    Span::raw(format!(
                        "{} {}",
                        event.start.with_timezone(&snapshot.offset).format("%Y-%m-%d"),
                        model::time_span(event, snapshot.offset, snapshot.use_24h)
                    )),
                ]),
                Line::from(vec![
                    label_span("Kind  "),
                    Span::raw(kind),
                    label_span("  Status "),
                    Span::raw(status),
                    label_span("  Category "),
                    Span::raw(event.category_id.clone().unwrap_or_else(|| "-".to_string())),
                    Span::raw(if event.overridden { "  (moved)" } else { "" }),
                ]),
            ]
        }
        None => vec![Line::from(Span::styled(
            "no event selected",
            Style::default().fg(COLOR_MUTED),
        ))],
    };
    let widget = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(COLOR_BORDER)),
    );
    frame.render_widget(widget, area);
}

fn render_footer(frame: &mut Frame, app: &AppState, area: Rect) {
    let hint_span = Span::styled(app.footer_hint(), Style::default().fg(COLOR_INFO));
    let line = if let Some((status, kind)) = app.status_line() {
        let status_style = match kind {
            StatusKind::Error => Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD),
            StatusKind::Info => Style::default().fg(COLOR_WARNING),
        };
        Line::from(vec![hint_span, Span::raw("  |  "), Span::styled(status, status_style)])
    } else {
        Line::from(hint_span)
    };
    let events = app
        .snapshot
        .as_ref()
        .map_or(0, |snapshot| snapshot.view.events.len());
    let counts_line = Line::from(Span::styled(
        format!("{events} event(s) in view"),
        Style::default().fg(COLOR_ACCENT),
    ));
    let widget = Paragraph::new(vec![line, counts_line])
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(COLOR_BORDER)),
        );
    frame.render_widget(widget, area);
}

fn render_help_modal(frame: &mut Frame, area: Rect) {
    let entries = [
        ("d w m", "day, week or month view"),
        ("← → h l", "previous or next day"),
        ("[ ]", "previous or next page"),
        ("t", "jump to today"),
        ("j k ↑ ↓", "select event"),
        ("n", "new event on the selected day"),
        ("< >", "move event a day earlier or later"),
        ("c", "complete the selected task"),
        ("r", "reload"),
        ("q Esc", "quit"),
    ];
    let mut lines = vec![help_header("Calendar")];
    for (keys, desc) in entries {
        lines.push(help_line(keys, desc));
    }
    let modal = centered_rect(48, entries.len() as u16 + 4, area);
    frame.render_widget(Clear, modal);
    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_ACCENT))
            .title(" Help "),
    );
    frame.render_widget(widget, modal);
}

fn help_header(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default().fg(COLOR_MAGENTA).add_modifier(Modifier::BOLD),
    ))
}

fn help_line(keys: &str, desc: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("{keys:<HELP_KEY_WIDTH$}"),
            Style::default().fg(COLOR_INFO),
        ),
        Span::styled(desc.to_string(), Style::default().fg(COLOR_TEXT)),
    ])
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width.saturating_sub(2));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn label_span(label: &str) -> Span<'static> {
    Span::styled(label.to_string(), Style::default().fg(COLOR_MUTED_DARK))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_rect_fits_inside_area() {
        let area = Rect::new(0, 0, 40, 10);
        let rect = centered_rect(60, 20, area);
        assert_eq!(rect, Rect::new(1, 1, 38, 8));
        let small = centered_rect(10, 4, area);
        assert_eq!(small, Rect::new(15, 3, 10, 4));
    }

    #[test]
    fn help_lines_pad_keys() {
        let line = help_line("q", "quit");
        assert_eq!(line.spans[0].content, "q         ");
    }
}
