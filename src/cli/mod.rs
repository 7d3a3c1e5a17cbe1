//! Command-line interface for planner
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use clap::{Parser, Subcommand};

use crate::error::{Error, Result};
use crate::output::OutputOptions;
use crate::state::Planner;
use crate::storage::{Storage, DATA_DIR_ENV};

use crate::units;

pub(crate) mod calendar;
mod category;
mod data;
mod history;
mod init;
mod journal;
mod kpi;
mod task;
mod theme;
mod vacation;

/// planner - tasks, recurring habits and a calendar in the terminal
///
/// Tracks recurring and one-off tasks, asks about overdue ones, keeps a
/// history of completions and misses, and charts KPI tasks.
#[derive(Parser, Debug)]
#[command(name = "planner")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to the platform data directory)
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    pub data_dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Fixed clock for this invocation (RFC 3339 or local "YYYY-MM-DD HH:MM")
    #[arg(long, global = true, env = "PLANNER_NOW")]
    pub now: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory and default config
    Init,

    /// Task management and the overdue/miss prompts
    #[command(subcommand)]
    Task(TaskCommands),

    /// Category management
    #[command(subcommand)]
    Category(CategoryCommands),

    /// Completed and missed occurrences
    #[command(subcommand)]
    History(HistoryCommands),

    /// KPI dashboard
    #[command(subcommand)]
    Kpi(KpiCommands),

    /// Calendar views and click-to-create
    #[command(subcommand)]
    Calendar(CalendarCommands),

    /// Run the scheduling pipeline and list placed occurrences
    Schedule {
        /// Days ahead to schedule (defaults to schedule.horizon_days)
        #[arg(long)]
        days: Option<u32>,

        /// Show only occurrences of this task
        #[arg(long)]
        task: Option<String>,
    },

    /// Theme and status colours
    #[command(subcommand)]
    Theme(ThemeCommands),

    /// Journal entries and weekly goals
    #[command(subcommand)]
    Journal(JournalCommands),

    /// Vacation periods
    #[command(subcommand)]
    Vacation(VacationCommands),

    /// Export, import, migration and diagnostics
    #[command(subcommand)]
    Data(DataCommands),

    /// Recompute statuses and overdue prompts
    Refresh,

    /// Interactive calendar viewer
    Tui {
        /// Initial view: day, week, month
        #[arg(long, default_value = "week")]
        view: String,

        /// Day to open at (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task
    New {
        /// Task name
        name: String,

        #[command(flatten)]
        fields: TaskFieldArgs,
    },

    /// List tasks
    List {
        /// Only these categories (repeatable; "none" for uncategorized)
        #[arg(long)]
        category: Vec<String>,

        /// Only this status: green, yellow, red, black, blue
        #[arg(long)]
        status: Option<String>,

        /// Sort by: status, dueDate, name, category
        #[arg(long)]
        sort: Option<String>,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Include completed one-off tasks
        #[arg(long)]
        all: bool,

        /// Maximum tasks to show
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show a task
    Show {
        /// Task id, id prefix or name
        task: String,
    },

    /// Edit a task
    Edit {
        /// Task id, id prefix or name
        task: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// Remove the category
        #[arg(long, conflicts_with = "category")]
        no_category: bool,

        /// Remove the due date
        #[arg(long, conflicts_with = "due")]
        no_due: bool,

        #[command(flatten)]
        fields: TaskFieldArgs,
    },

    /// Mark a task done (asks for confirmation unless --yes)
    Done {
        task: String,

        /// Confirm immediately
        #[arg(short, long)]
        yes: bool,
    },

    /// Record a miss for an overdue task
    Miss {
        task: String,

        /// Cycles to count as missed (defaults to all pending cycles)
        #[arg(long)]
        misses: Option<u32>,
    },

    /// Answer the overdue prompt: completed or missed
    Choose {
        task: String,

        /// completed | missed
        choice: String,
    },

    /// Answer the pending prompt of a task
    Confirm {
        task: String,

        /// yes | no
        answer: String,

        /// Cycles to count as missed when confirming a miss
        #[arg(long)]
        misses: Option<u32>,
    },

    /// Undo this cycle's completion of a repeating task
    Undo {
        task: String,

        #[arg(short, long)]
        yes: bool,
    },

    /// Delete a task
    Delete {
        task: String,

        #[arg(short, long)]
        yes: bool,
    },

    /// Increment (or decrement) the count of a count task
    Count {
        task: String,

        /// Decrement instead
        #[arg(long)]
        down: bool,
    },

    /// Start or stop the timer of a time task
    Timer { task: String },

    /// Set progress: a count, or minutes for time tasks
    Progress { task: String, value: i64 },

    /// Move one occurrence (or a one-off task) to a new due date
    Move {
        task: String,

        /// New due date
        #[arg(long)]
        to: String,

        /// Occurrence id (defaults to the current occurrence)
        #[arg(long)]
        occurrence: Option<String>,

        /// New length in minutes
        #[arg(long)]
        minutes: Option<i64>,
    },

    /// Mark or unmark a task as KPI
    Kpi {
        task: String,

        /// Unmark instead
        #[arg(long)]
        off: bool,
    },
}

/// Fields shared by `task new` and `task edit`
#[derive(clap::Args, Debug, Default)]
pub struct TaskFieldArgs {
    /// Due date (RFC 3339 or local "YYYY-MM-DD HH:MM")
    #[arg(long)]
    pub due: Option<String>,

    /// Repeat rule: none, every:2d, weekly:mon,wed, monthly:day:1,last,
    /// monthly:nth:1,last:fri, yearly:jan:day:1, yearly:mar:nth:2:sun
    #[arg(long)]
    pub repeat: Option<String>,

    /// Estimated duration (30m, 2h, 1d)
    #[arg(long)]
    pub estimate: Option<String>,

    /// Preparation time (30m, 2h, 1d)
    #[arg(long)]
    pub prep: Option<String>,

    /// Completion rule: simple, count:<n>, time:<duration>
    #[arg(long)]
    pub completion: Option<String>,

    /// Category id or name (created when missing)
    #[arg(long)]
    pub category: Option<String>,

    /// Icon class (e.g. "fa-solid fa-book")
    #[arg(long)]
    pub icon: Option<String>,

    /// Description
    #[arg(long)]
    pub description: Option<String>,

    /// Misses allowed before the task is flagged
    #[arg(long)]
    pub max_misses: Option<i64>,

    /// Track misses: true | false
    #[arg(long)]
    pub track_misses: Option<bool>,

    /// Fixed appointment: true | false
    #[arg(long)]
    pub appointment: Option<bool>,

    /// Counts towards busy time: true | false
    #[arg(long)]
    pub busy: Option<bool>,

    /// KPI task: true | false
    #[arg(long)]
    pub kpi: Option<bool>,
}

/// Category subcommands
#[derive(Subcommand, Debug)]
pub enum CategoryCommands {
    /// Create a category
    New {
        name: String,

        /// Colour (#rrggbb); defaults to the theme
        #[arg(long)]
        color: Option<String>,

        /// Move due dates out of vacations: false keeps them
        #[arg(long)]
        bypass_vacation: bool,
    },

    /// List categories with task counts
    List,

    /// Rename a category; its tasks follow
    Rename { category: String, new_name: String },

    /// Delete a category and its tasks
    Delete {
        category: String,

        #[arg(short, long)]
        yes: bool,
    },

    /// Delete the tasks of a category, keeping the category
    Clear {
        category: String,

        #[arg(short, long)]
        yes: bool,
    },

    /// Change every task of a category
    Bulk {
        category: String,

        /// Estimated duration for every task
        #[arg(long)]
        estimate: Option<String>,

        /// Completion rule for every task
        #[arg(long)]
        completion: Option<String>,
    },

    /// Set or clear the category icon
    Icon {
        category: String,

        /// Icon class; omit with --clear
        icon: Option<String>,

        /// Remove the icon
        #[arg(long, conflicts_with = "icon")]
        clear: bool,

        /// Give the icon to tasks created in this category
        #[arg(long)]
        apply_to_new: bool,

        /// Also set it on existing tasks without an icon
        #[arg(long)]
        apply_to_existing: bool,
    },
}

/// History subcommands
#[derive(Subcommand, Debug)]
pub enum HistoryCommands {
    /// List records, newest first
    List {
        /// Only records of this task
        #[arg(long)]
        task: Option<String>,

        /// completed | missed
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Completion statistics and weekly chart for a task
    Stats { task: String },

    /// Remove records whose task no longer exists
    Clean {
        /// Report without deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete a single record by reference (taskId@timestamp)
    Delete { reference: String },

    /// Drop records older than the retention window
    Prune {
        /// Retention in days (defaults to history.retention_days)
        #[arg(long)]
        days: Option<u32>,
    },
}

/// KPI subcommands
#[derive(Subcommand, Debug)]
pub enum KpiCommands {
    /// KPI tasks with their history grade and average accuracy
    List {
        /// 8d | 30d | 90d
        #[arg(long)]
        range: Option<String>,
    },

    /// Daily accuracy chart
    Chart {
        /// 8d | 30d | 90d
        #[arg(long)]
        range: Option<String>,

        /// Weeks to page back (negative) or forward
        #[arg(long, allow_hyphen_values = true)]
        week_offset: Option<i64>,

        /// single | stacked
        #[arg(long)]
        mode: Option<String>,
    },

    /// Mark a task as KPI
    Add { task: String },

    /// Unmark a KPI task
    Remove { task: String },
}

/// Calendar subcommands
#[derive(Subcommand, Debug)]
pub enum CalendarCommands {
    /// One day
    Day(CalendarViewArgs),

    /// Sunday to Saturday
    Week(CalendarViewArgs),

    /// Month grid
    Month(CalendarViewArgs),

    /// Create a task filling a slot
    Create {
        /// Slot start
        #[arg(long)]
        at: String,

        /// Length in minutes
        #[arg(long)]
        minutes: Option<i64>,

        /// Task name
        #[arg(long)]
        name: Option<String>,

        /// Category (defaults to the planner category)
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
pub struct CalendarViewArgs {
    /// Day inside the view (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub date: Option<String>,

    /// Views to step forward (negative for back)
    #[arg(long, allow_hyphen_values = true, default_value_t = 0)]
    pub step: i64,
}

/// Theme subcommands
#[derive(Subcommand, Debug)]
pub enum ThemeCommands {
    /// Show theme settings and the resolved palettes
    Show,

    /// Change theme settings
    Set {
        /// Enable theming
        #[arg(long, conflicts_with = "disable")]
        enable: bool,

        /// Disable theming
        #[arg(long)]
        disable: bool,

        /// Base colour (#rrggbb)
        #[arg(long)]
        base: Option<String>,

        /// night | light | auto
        #[arg(long)]
        mode: Option<String>,

        /// Use the theme gradient for status colours: true | false
        #[arg(long)]
        theme_status: Option<bool>,

        /// Status colour, status=#rrggbb (repeatable)
        #[arg(long)]
        color: Vec<String>,

        /// Status name, status=label (repeatable)
        #[arg(long)]
        name: Vec<String>,

        /// Sensitivity in [0, 1]; disables adaptive sensitivity
        #[arg(long)]
        sensitivity: Option<f64>,

        /// Derive sensitivity from the coming week's load
        #[arg(long, conflicts_with = "sensitivity")]
        adaptive: bool,

        /// Use 24-hour clock
        #[arg(long)]
        clock24: Option<bool>,
    },

    /// Restore default colours and theme
    Reset,
}

/// Journal subcommands
#[derive(Subcommand, Debug)]
pub enum JournalCommands {
    /// Add an entry
    New {
        title: String,

        #[arg(long, default_value = "")]
        content: String,

        #[arg(long)]
        icon: Option<String>,
    },

    /// List entries grouped by week or icon
    List {
        /// date | icon
        #[arg(long, default_value = "date")]
        sort: String,
    },

    /// Edit an entry
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        content: Option<String>,

        #[arg(long)]
        icon: Option<String>,

        #[arg(long, conflicts_with = "icon")]
        clear_icon: bool,
    },

    /// Delete an entry
    Delete { id: String },

    /// Show or set the weekly goal
    Goal {
        /// Goal text; omit to show the current goal
        content: Option<String>,

        /// Any day of the week (YYYY-MM-DD); defaults to this week
        #[arg(long)]
        week: Option<String>,
    },
}

/// Vacation subcommands
#[derive(Subcommand, Debug)]
pub enum VacationCommands {
    /// Add a vacation (dates inclusive)
    Add {
        name: String,
        /// YYYY-MM-DD
        start: String,
        /// YYYY-MM-DD
        end: String,
    },

    /// List vacations
    List,

    /// Remove a vacation by id or name
    Remove { vacation: String },
}

/// Data subcommands
#[derive(Subcommand, Debug)]
pub enum DataCommands {
    /// Export a backup: all, tasks, categories, history, settings
    Export {
        #[arg(default_value = "all")]
        kind: String,

        /// Output file or directory (defaults to the current directory)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Print the bundle instead of writing a file
        #[arg(long)]
        stdout: bool,
    },

    /// Import a backup
    Import {
        file: PathBuf,

        /// overwrite | merge
        #[arg(long, default_value = "merge")]
        mode: String,
    },

    /// Migrate a task list from an older export with a field mapping
    Migrate {
        file: PathBuf,

        /// Field mapping old=new (repeatable); identical fields map automatically
        #[arg(long)]
        map: Vec<String>,

        /// Show the field report and result without saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Check every storage key
    Doctor,

    /// Move weekly goals to Sunday-start weeks (runs once)
    FixGoals,
}

// =============================================================================
// Shared command context
// =============================================================================

/// Global flags every command receives
#[derive(Debug, Clone)]
pub struct Common {
    pub data_dir: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
    pub verbose: bool,
    pub now: Option<String>,
}

impl Common {
    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }

    pub fn storage(&self) -> Result<Storage> {
        Storage::resolve(self.data_dir.clone())
    }

    /// Clock of this invocation.
    pub fn now(&self) -> Result<DateTime<Utc>> {
        match self.now.as_deref() {
            Some(raw) => parse_timestamp("now", raw, Utc.fix()),
            None => Ok(Utc::now()),
        }
    }

    /// Open for writing and refresh statuses.
    pub fn open(&self) -> Result<(Planner, DateTime<Utc>)> {
        let mut planner = Planner::open(self.storage()?)?;
        let now = self.now()?;
        planner.refresh(now);
        Ok((planner, now))
    }

    /// Open without the lock and refresh in memory only.
    pub fn open_read_only(&self) -> Result<(Planner, DateTime<Utc>)> {
        let mut planner = Planner::open_read_only(self.storage()?)?;
        let now = self.now()?;
        planner.refresh(now);
        Ok((planner, now))
    }
}

/// Parse a user timestamp. Values without an offset are local to `offset`;
/// a bare date is local midnight.
pub(crate) fn parse_timestamp(label: &str, value: &str, offset: FixedOffset) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            if let Some(local) = offset.from_local_datetime(&naive).single() {
                return Ok(local.with_timezone(&Utc));
            }
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(units::start_of_day(date, offset));
    }
    crate::task::parse_datetime(trimmed).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "invalid {label} timestamp '{value}' (expected RFC 3339 or YYYY-MM-DD HH:MM)"
        ))
    })
}

pub(crate) fn parse_day(label: &str, value: Option<&str>, fallback: NaiveDate) -> Result<NaiveDate> {
    match value {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|err| {
            Error::InvalidArgument(format!("invalid {label} date '{raw}': {err} (expected YYYY-MM-DD)"))
        }),
        None => Ok(fallback),
    }
}

pub(crate) fn parse_yes_no(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" => Ok(true),
        "no" | "n" | "false" => Ok(false),
        other => Err(Error::InvalidArgument(format!(
            "invalid answer '{other}' (expected yes|no)"
        ))),
    }
}

pub(crate) fn format_local(value: Option<DateTime<Utc>>, offset: FixedOffset) -> String {
    match value {
        Some(value) => value.with_timezone(&offset).format("%Y-%m-%d %H:%M").to_string(),
        None => "-".to_string(),
    }
}

impl Cli {
    fn common(&self) -> Common {
        Common {
            data_dir: self.data_dir.clone(),
            json: self.json,
            quiet: self.quiet,
            verbose: self.verbose,
            now: self.now.clone(),
        }
    }

    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let common = self.common();
        match self.command {
            Commands::Init => init::run(common),
            Commands::Task(cmd) => task::run(cmd, common),
            Commands::Category(cmd) => category::run(cmd, common),
            Commands::History(cmd) => history::run(cmd, common),
            Commands::Kpi(cmd) => kpi::run(cmd, common),
            Commands::Calendar(cmd) => calendar::run(cmd, common),
            Commands::Schedule { days, task } => {
                calendar::run_schedule(calendar::ScheduleOptions { days, task, common })
            }
            Commands::Theme(cmd) => theme::run(cmd, common),
            Commands::Journal(cmd) => journal::run(cmd, common),
            Commands::Vacation(cmd) => vacation::run(cmd, common),
            Commands::Data(cmd) => data::run(cmd, common),
            Commands::Refresh => task::run_refresh(common),
            Commands::Tui { view, date } => {
                crate::ui::calendar_viewer::run(crate::ui::calendar_viewer::ViewerOptions {
                    view,
                    date,
                    common,
                })
            }
        }
    }
}
