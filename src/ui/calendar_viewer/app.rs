use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{Duration as Days, FixedOffset, NaiveDate};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::calendar::{CalendarEvent, CalendarView, ViewKind};
use crate::cli::calendar::build_view;
use crate::cli::{parse_day, Common};
use crate::error::{Error, Result};
use crate::units;

use super::actions::{self, ActionOutcome};
use super::model::{self, DayCell};
use super::view;

const EVENT_POLL_MS: u64 = 120;
const WATCH_DEBOUNCE_MS: u64 = 200;

pub struct ViewerOptions {
    pub view: String,
    pub date: Option<String>,
    pub common: Common,
}

enum LoadRequest {
    Reload(ViewKind, Option<NaiveDate>),
    /// Reload whatever view was requested last.
    Refresh,
}

pub(crate) struct Snapshot {
    pub(crate) view: CalendarView,
    pub(crate) offset: FixedOffset,
    pub(crate) today: NaiveDate,
    pub(crate) use_24h: bool,
}

enum UiMsg {
    Loaded(Snapshot),
    LoadError(String),
    WatchError(String),
}

#[derive(Clone, Copy)]
pub(crate) enum StatusKind {
    Error,
    Info,
}

pub struct AppState {
    pub(crate) kind: ViewKind,
    anchor: Option<NaiveDate>,
    pub(crate) snapshot: Option<Snapshot>,
    pub(crate) cells: Vec<DayCell>,
    pub(crate) selected_date: Option<NaiveDate>,
    pub(crate) selected_event: usize,
    pub(crate) show_help: bool,
    status: Option<(String, StatusKind)>,
    watch_error: Option<String>,
    common: Common,
}

impl AppState {
    fn new(kind: ViewKind, anchor: Option<NaiveDate>, common: Common) -> Self {
        Self {
            kind,
            anchor,
            snapshot: None,
            cells: Vec::new(),
            selected_date: anchor,
            selected_event: 0,
            show_help: false,
            status: None,
            watch_error: None,
            common,
        }
    }

    fn request_reload(&self, req_tx: &Sender<LoadRequest>) {
        let _ = req_tx.send(LoadRequest::Reload(self.kind, self.anchor));
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.cells = model::day_cells(&snapshot.view, snapshot.offset);
        let in_view = |date: NaiveDate| date >= snapshot.view.start && date <= snapshot.view.end;
        self.selected_date = match self.selected_date {
            Some(date) if in_view(date) => Some(date),
            _ if in_view(snapshot.view.anchor) => Some(snapshot.view.anchor),
            _ => Some(snapshot.view.start),
        };
        self.snapshot = Some(snapshot);
        self.selected_event = model::clamp_index(self.selected_event, self.selected_cell_len());
    }

    pub(crate) fn selected_cell(&self) -> Option<&DayCell> {
        let date = self.selected_date?;
        self.cells.iter().find(|cell| cell.date == date)
    }

    fn selected_cell_len(&self) -> usize {
        self.selected_cell().map_or(0, |cell| cell.events.len())
    }

    pub(crate) fn current_event(&self) -> Option<&CalendarEvent> {
        let snapshot = self.snapshot.as_ref()?;
        let index = *self.selected_cell()?.events.get(self.selected_event)?;
        snapshot.view.events.get(index)
    }

    /// Move the selected day; leaving the visible range re-anchors the view.
    fn move_day(&mut self, days: i64, req_tx: &Sender<LoadRequest>) {
        let Some(current) = self.selected_date else {
            return;
        };
        let target = current + Days::days(days);
        self.selected_date = Some(target);
        self.selected_event = 0;
        let visible = self
            .snapshot
            .as_ref()
            .is_some_and(|snapshot| target >= snapshot.view.start && target <= snapshot.view.end);
        if !visible || self.kind == ViewKind::Day {
            self.anchor = Some(target);
            self.request_reload(req_tx);
        }
    }

    fn step_period(&mut self, steps: i64, req_tx: &Sender<LoadRequest>) {
        let Some(anchor) = self
            .anchor
            .or_else(|| self.snapshot.as_ref().map(|snapshot| snapshot.view.anchor))
        else {
            return;
        };
        let next = self.kind.step(anchor, steps);
        self.anchor = Some(next);
        self.selected_date = Some(next);
        self.selected_event = 0;
        self.request_reload(req_tx);
    }

    fn go_today(&mut self, req_tx: &Sender<LoadRequest>) {
        let today = self.snapshot.as_ref().map(|snapshot| snapshot.today);
        self.anchor = today;
        self.selected_date = today;
        self.selected_event = 0;
        self.request_reload(req_tx);
    }

    fn switch_view(&mut self, kind: ViewKind, req_tx: &Sender<LoadRequest>) {
        if self.kind == kind {
            return;
        }
        self.kind = kind;
        self.anchor = self.selected_date.or(self.anchor);
        let result = actions::remember_view(&self.common, kind);
        self.apply_outcome(result, req_tx);
    }

    fn select_event(&mut self, delta: isize) {
        let len = self.selected_cell_len();
        if len == 0 {
            return;
        }
        let next = self.selected_event as isize + delta;
        self.selected_event = next.rem_euclid(len as isize) as usize;
    }

    fn apply_outcome(&mut self, result: Result<ActionOutcome>, req_tx: &Sender<LoadRequest>) {
        match result {
            Ok(outcome) => {
                if outcome.changed {
                    tracing::debug!(task = ?outcome.task_id, "viewer action applied");
                }
                self.status = Some((outcome.message, StatusKind::Info));
            }
            Err(err) => {
                self.status = Some((err.to_string(), StatusKind::Error));
            }
        }
        self.request_reload(req_tx);
    }

    pub(crate) fn status_line(&self) -> Option<(String, StatusKind)> {
        if let Some(err) = &self.watch_error {
            return Some((err.clone(), StatusKind::Error));
        }
        self.status.clone()
    }

    pub(crate) fn footer_hint(&self) -> &'static str {
        "d/w/m view  ←/→ day  [/] page  t today  j/k event  n new  </> move  c complete  ? help  q quit"
    }

    pub(crate) fn title(&self) -> String {
        match &self.snapshot {
            Some(snapshot) => match self.kind {
                ViewKind::Day => snapshot.view.start.format("%A %B %-d, %Y").to_string(),
                ViewKind::Week => format!(
                    "{} - {}",
                    snapshot.view.start.format("%b %-d"),
                    snapshot.view.end.format("%b %-d, %Y")
                ),
                ViewKind::Month => snapshot.view.anchor.format("%B %Y").to_string(),
            },
            None => "loading...".to_string(),
        }
    }
}

pub fn run(options: ViewerOptions) -> Result<()> {
    let kind = ViewKind::parse(&options.view).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "invalid view '{}' (expected day|week|month)",
            options.view
        ))
    })?;
    let anchor = options
        .date
        .as_deref()
        .map(|raw| parse_day("date", Some(raw), NaiveDate::MIN))
        .transpose()?;
    let storage = options.common.storage()?;
    if !storage.data_dir().exists() {
        return Err(Error::InvalidArgument(format!(
            "no planner data at {}; run planner init first",
            storage.data_dir().display()
        )));
    }

    let (ui_tx, ui_rx) = mpsc::channel();
    let (req_tx, req_rx) = mpsc::channel();

    spawn_loader(options.common.clone(), req_rx, ui_tx.clone());
    spawn_watch(storage.data_dir().to_path_buf(), req_tx.clone(), ui_tx);

    let mut app = AppState::new(kind, anchor, options.common);
    if req_tx.send(LoadRequest::Reload(app.kind, app.anchor)).is_err() {
        return Err(Error::OperationFailed(
            "failed to start calendar loader".to_string(),
        ));
    }
    run_terminal(&mut app, ui_rx, req_tx)
}

fn run_terminal(app: &mut AppState, ui_rx: Receiver<UiMsg>, req_tx: Sender<LoadRequest>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, app, ui_rx, req_tx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    ui_rx: Receiver<UiMsg>,
    req_tx: Sender<LoadRequest>,
) -> Result<()> {
    let mut dirty = true;
    loop {
        while let Ok(msg) = ui_rx.try_recv() {
            handle_ui_msg(app, msg);
            dirty = true;
        }

        if dirty {
            terminal.draw(|frame| view::render(frame, app))?;
            dirty = false;
        }

        if event::poll(Duration::from_millis(EVENT_POLL_MS))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if handle_key(app, key, &req_tx) {
                        break;
                    }
                    dirty = true;
                }
                Event::Resize(_, _) => dirty = true,
                _ => {}
            }
        }
    }
    Ok(())
}

fn handle_ui_msg(app: &mut AppState, msg: UiMsg) {
    match msg {
        UiMsg::Loaded(snapshot) => app.apply_snapshot(snapshot),
        UiMsg::LoadError(err) => {
            app.status = Some((format!("load error: {err}"), StatusKind::Error));
        }
        UiMsg::WatchError(err) => {
            app.watch_error = Some(format!("watch error: {err}"));
        }
    }
}

/// Returns `true` when the viewer should exit.
fn handle_key(app: &mut AppState, key: KeyEvent, req_tx: &Sender<LoadRequest>) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }
    if app.show_help {
        app.show_help = false;
        return false;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Char('d') => app.switch_view(ViewKind::Day, req_tx),
        KeyCode::Char('w') => app.switch_view(ViewKind::Week, req_tx),
        KeyCode::Char('m') => app.switch_view(ViewKind::Month, req_tx),
        KeyCode::Left | KeyCode::Char('h') => app.move_day(-1, req_tx),
        KeyCode::Right | KeyCode::Char('l') => app.move_day(1, req_tx),
        KeyCode::Char('[') => app.step_period(-1, req_tx),
        KeyCode::Char(']') => app.step_period(1, req_tx),
        KeyCode::Char('t') => app.go_today(req_tx),
        KeyCode::Down | KeyCode::Char('j') => app.select_event(1),
        KeyCode::Up | KeyCode::Char('k') => app.select_event(-1),
        KeyCode::Char('r') => {
            app.status = None;
            app.request_reload(req_tx);
        }
        KeyCode::Char('n') => {
            if let Some(day) = app.selected_date {
                let result = actions::create_event(&app.common, day);
                app.apply_outcome(result, req_tx);
            }
        }
        KeyCode::Char('<') | KeyCode::Char('>') => {
            let days = if key.code == KeyCode::Char('<') { -1 } else { 1 };
            if let Some(event) = app.current_event().cloned() {
                let result = actions::shift_event(&app.common, &event, days);
                app.selected_date = app.selected_date.map(|date| date + Days::days(days));
                app.apply_outcome(result, req_tx);
            }
        }
        KeyCode::Char('c') => {
            if let Some(event) = app.current_event().cloned() {
                let result = actions::complete_event(&app.common, &event);
                app.apply_outcome(result, req_tx);
            }
        }
        _ => {}
    }
    false
}

fn load(common: &Common, kind: ViewKind, anchor: Option<NaiveDate>) -> Result<Snapshot> {
    let (planner, now) = common.open_read_only()?;
    let today = units::local_date(now, planner.offset);
    let view = build_view(&planner, kind, anchor.unwrap_or(today));
    Ok(Snapshot {
        view,
        offset: planner.offset,
        today,
        use_24h: planner.settings.app.use_24_hour_format,
    })
}

fn track(current: &mut Option<(ViewKind, Option<NaiveDate>)>, req: LoadRequest) {
    if let LoadRequest::Reload(kind, anchor) = req {
        *current = Some((kind, anchor));
    }
}

fn spawn_loader(common: Common, req_rx: Receiver<LoadRequest>, ui_tx: Sender<UiMsg>) {
    thread::spawn(move || {
        let mut current: Option<(ViewKind, Option<NaiveDate>)> = None;
        while let Ok(req) = req_rx.recv() {
            track(&mut current, req);
            // Only the newest view matters.
            while let Ok(next) = req_rx.try_recv() {
                track(&mut current, next);
            }
            let Some((kind, anchor)) = current else {
                continue;
            };
            let msg = match load(&common, kind, anchor) {
                Ok(snapshot) => UiMsg::Loaded(snapshot),
                Err(err) => UiMsg::LoadError(err.to_string()),
            };
            if ui_tx.send(msg).is_err() {
                break;
            }
        }
    });
}

fn spawn_watch(data_dir: PathBuf, req_tx: Sender<LoadRequest>, ui_tx: Sender<UiMsg>) {
    thread::spawn(move || {
        let (event_tx, event_rx) = mpsc::channel();
        let watcher: notify::Result<RecommendedWatcher> = notify::recommended_watcher(move |res| {
            let _ = event_tx.send(res);
        });

        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(err) => {
                let _ = ui_tx.send(UiMsg::WatchError(err.to_string()));
                return;
            }
        };
        if let Err(err) = watcher.watch(&data_dir, RecursiveMode::NonRecursive) {
            let _ = ui_tx.send(UiMsg::WatchError(err.to_string()));
            return;
        }

        let debounce = Duration::from_millis(WATCH_DEBOUNCE_MS);
        let mut pending: Option<Instant> = None;

        loop {
            let timeout = pending
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_secs(3600));
            match event_rx.recv_timeout(timeout) {
                Ok(Ok(event)) => {
                    // Lock churn is not a data change.
                    let data_change = event.paths.iter().any(|path| {
                        path.extension().is_some_and(|ext| ext == "json")
                    });
                    if data_change {
                        pending = Some(Instant::now() + debounce);
                    }
                }
                Ok(Err(err)) => {
                    let _ = ui_tx.send(UiMsg::WatchError(err.to_string()));
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if pending.take().is_some() {
                        if req_tx.send(LoadRequest::Refresh).is_err() {
                            break;
                        }
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn common() -> Common {
        Common {
            data_dir: None,
            json: false,
            quiet: true,
            verbose: false,
            now: None,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn event(id: &str, day: u32, hour: u32) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            task_id: id.to_string(),
            title: id.to_string(),
            start: Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 3, day, hour + 1, 0, 0).unwrap(),
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

    fn snapshot(anchor: NaiveDate, events: Vec<CalendarEvent>) -> Snapshot {
        let (start, end) = ViewKind::Week.range(anchor);
        Snapshot {
            view: CalendarView {
                kind: ViewKind::Week,
                anchor,
                start,
                end,
                events,
            },
            offset: FixedOffset::east_opt(0).unwrap(),
            today: anchor,
            use_24h: true,
        }
    }

    #[test]
    fn snapshot_selects_anchor_and_cycles_events() {
        let mut app = AppState::new(ViewKind::Week, None, common());
        app.apply_snapshot(snapshot(date(6), vec![event("a", 6, 9), event("b", 6, 11)]));
        assert_eq!(app.selected_date, Some(date(6)));
        assert_eq!(app.current_event().map(|e| e.id.as_str()), Some("a"));

        app.select_event(1);
        assert_eq!(app.current_event().map(|e| e.id.as_str()), Some("b"));
        app.select_event(1);
        assert_eq!(app.current_event().map(|e| e.id.as_str()), Some("a"));
        app.select_event(-1);
        assert_eq!(app.current_event().map(|e| e.id.as_str()), Some("b"));
    }

    #[test]
    fn moving_past_the_week_reanchors() {
        let (req_tx, req_rx) = mpsc::channel();
        let mut app = AppState::new(ViewKind::Week, None, common());
        app.apply_snapshot(snapshot(date(9), Vec::new()));

        // Saturday to Friday stays inside the week.
        app.move_day(-1, &req_tx);
        assert_eq!(app.selected_date, Some(date(8)));
        assert!(req_rx.try_recv().is_err());

        app.move_day(2, &req_tx);
        assert_eq!(app.selected_date, Some(date(10)));
        match req_rx.try_recv() {
            Ok(LoadRequest::Reload(ViewKind::Week, Some(anchor))) => assert_eq!(anchor, date(10)),
            _ => panic!("expected a reload anchored on the new day"),
        }
    }

    #[test]
    fn paging_steps_the_anchor() {
        let (req_tx, req_rx) = mpsc::channel();
        let mut app = AppState::new(ViewKind::Week, Some(date(6)), common());
        app.step_period(1, &req_tx);
        assert_eq!(app.selected_date, Some(date(13)));
        assert!(matches!(
            req_rx.try_recv(),
            Ok(LoadRequest::Reload(ViewKind::Week, Some(anchor))) if anchor == date(13)
        ));
    }

    #[test]
    fn loader_keeps_the_newest_view() {
        let mut current = None;
        track(&mut current, LoadRequest::Reload(ViewKind::Day, Some(date(1))));
        track(&mut current, LoadRequest::Refresh);
        assert_eq!(current, Some((ViewKind::Day, Some(date(1)))));
        track(&mut current, LoadRequest::Reload(ViewKind::Month, None));
        assert_eq!(current, Some((ViewKind::Month, None)));
    }
}
