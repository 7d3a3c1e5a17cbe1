//! planner - task and calendar planner library
//!
//! This library provides the core functionality for the planner CLI:
//! recurring tasks with an overdue workflow, a history of completions and
//! misses, KPI charts and a calendar over everything.
//!
//! # Core Concepts
//!
//! - **Tasks**: one-off or repeating, with a confirmation state machine
//! - **Status**: urgency colour derived from due date, load and sensitivity
//! - **History**: archived completions and misses feeding GPA and KPIs
//! - **Schedule**: occurrences expanded, shifted out of vacations and placed
//! - **Calendar**: day, week and month views of tasks and history
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.planner.toml`
//! - `error`: Error types and result aliases
//! - `storage`: Key-value JSON documents in the data directory
//! - `lock`: File locking and atomic writes
//! - `state`: Loading, refreshing and saving a data directory
//! - `task`, `recurrence`, `status`, `lifecycle`: the task model
//! - `history`, `kpi`, `schedule`, `calendar`, `vacation`: derived views
//! - `settings`, `theme`, `journal`, `category`: preferences and extras
//! - `migrate`: backup export and import, field mapping, doctor
//! - `ui`: interactive terminal calendar

pub mod calendar;
pub mod category;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod journal;
pub mod kpi;
pub mod lifecycle;
pub mod lock;
pub mod migrate;
pub mod output;
pub mod recurrence;
pub mod schedule;
pub mod settings;
pub mod state;
pub mod status;
pub mod storage;
pub mod task;
pub mod theme;
pub mod ui;
pub mod units;
pub mod vacation;

pub use error::{Error, Result};
