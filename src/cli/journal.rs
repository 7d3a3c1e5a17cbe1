//! planner journal command implementations.

use serde::Serialize;

use crate::cli::{format_local, parse_day, Common, JournalCommands};
use crate::error::{Error, Result};
use crate::journal::{self, EntryEdit, JournalEntry, JournalGroup, JournalSort, NewEntry};
use crate::output::{emit_success, HumanOutput};
use crate::units;

const PREVIEW_CHARS: usize = 60;

pub fn run(command: JournalCommands, common: Common) -> Result<()> {
    match command {
        JournalCommands::New {
            title,
            content,
            icon,
        } => run_new(title, content, icon, common),
        JournalCommands::List { sort } => run_list(sort, common),
        JournalCommands::Edit {
            id,
            title,
            content,
            icon,
            clear_icon,
        } => {
            let icon = if clear_icon { Some(None) } else { icon.map(Some) };
            run_edit(id, EntryEdit { title, content, icon }, common)
        }
        JournalCommands::Delete { id } => run_delete(id, common),
        JournalCommands::Goal { content, week } => run_goal(content, week, common),
    }
}

fn preview(content: &str) -> String {
    let line = content.lines().next().unwrap_or_default();
    if line.chars().count() > PREVIEW_CHARS {
        let cut: String = line.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

fn push_entry(human: &mut HumanOutput, entry: &JournalEntry) {
    human.push_summary("ID", entry.id.clone());
    human.push_summary("Title", entry.title.clone());
    human.push_summary("Icon", entry.icon_label());
    if !entry.content.is_empty() {
        human.push_summary("Content", preview(&entry.content));
    }
}

pub fn run_new(title: String, content: String, icon: Option<String>, common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let id = planner.new_id();
    let entry = journal::add(
        &mut planner.planner_data,
        id,
        NewEntry {
            title,
            content,
            icon: icon.filter(|icon| !icon.trim().is_empty()),
            goal_week: None,
        },
        now,
    )?;
    planner.save(now)?;

    let mut human = HumanOutput::new("Journal entry added");
    push_entry(&mut human, &entry);
    emit_success(common.output(), "journal new", &entry, Some(&human))
}

#[derive(Serialize)]
struct JournalListOutput {
    total: usize,
    groups: Vec<JournalGroup>,
}

pub fn run_list(sort: String, common: Common) -> Result<()> {
    let sort = JournalSort::parse(&sort).ok_or_else(|| {
        Error::InvalidArgument(format!("invalid sort '{sort}' (expected date|icon)"))
    })?;
    let (planner, _) = common.open_read_only()?;
    let groups = journal::grouped(&planner.planner_data, sort, planner.offset);
    let total = groups.iter().map(|group| group.entries.len()).sum();

    let mut human = HumanOutput::new(format!("Journal ({total})"));
    for group in &groups {
        human.push_detail(format!("== {} ==", group.heading));
        for entry in &group.entries {
            human.push_detail(format!(
                "{}  {}{}  {}  {}",
                entry.id,
                if entry.is_weekly_goal { "[goal] " } else { "" },
                entry.title,
                format_local(entry.created_at, planner.offset),
                preview(&entry.content)
            ));
        }
    }
    if total == 0 {
        human.push_next_step("planner journal new <title>");
    }
    let output = JournalListOutput { total, groups };
    emit_success(common.output(), "journal list", &output, Some(&human))
}

pub fn run_edit(id: String, edit: EntryEdit, common: Common) -> Result<()> {
    if edit.title.is_none() && edit.content.is_none() && edit.icon.is_none() {
        return Err(Error::InvalidArgument(
            "no changes specified; pass --title, --content, --icon or --clear-icon".to_string(),
        ));
    }
    let (mut planner, now) = common.open()?;
    let entry = journal::edit(&mut planner.planner_data, id.trim(), edit)?;
    planner.save(now)?;

    let mut human = HumanOutput::new("Journal entry updated");
    push_entry(&mut human, &entry);
    emit_success(common.output(), "journal edit", &entry, Some(&human))
}

pub fn run_delete(id: String, common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let entry = journal::delete(&mut planner.planner_data, id.trim())?;
    planner.save(now)?;

    let mut human = HumanOutput::new("Journal entry deleted");
    push_entry(&mut human, &entry);
    emit_success(common.output(), "journal delete", &entry, Some(&human))
}

#[derive(Serialize)]
struct GoalOutput {
    week_start: chrono::NaiveDate,
    goal: Option<JournalEntry>,
    created: bool,
}

pub fn run_goal(content: Option<String>, week: Option<String>, common: Common) -> Result<()> {
    match content {
        None => {
            let (planner, now) = common.open_read_only()?;
            let day = parse_day("week", week.as_deref(), units::local_date(now, planner.offset))?;
            let week_start = units::week_start_sunday(day);
            let goal = journal::weekly_goal(&planner.planner_data, day).cloned();

            let mut human = HumanOutput::new(format!("Weekly goal for the week of {week_start}"));
            match &goal {
                Some(entry) => human.push_detail(entry.content.clone()),
                None => {
                    human.push_detail("no goal set");
                    human.push_next_step("planner journal goal \"<goal>\"");
                }
            }
            let output = GoalOutput {
                week_start,
                goal,
                created: false,
            };
            emit_success(common.output(), "journal goal", &output, Some(&human))
        }
        Some(content) => {
            let (mut planner, now) = common.open()?;
            let day = parse_day("week", week.as_deref(), units::local_date(now, planner.offset))?;
            let id = planner.new_id();
            let (entry, created) =
                journal::set_weekly_goal(&mut planner.planner_data, id, day, &content, now)?;
            planner.save(now)?;

            let week_start = units::week_start_sunday(day);
            let mut human = HumanOutput::new(if created {
                "Weekly goal set"
            } else {
                "Weekly goal updated"
            });
            human.push_summary("Week", week_start.to_string());
            human.push_detail(entry.content.clone());
            let output = GoalOutput {
                week_start,
                goal: Some(entry),
                created,
            };
            emit_success(common.output(), "journal goal", &output, Some(&human))
        }
    }
}
