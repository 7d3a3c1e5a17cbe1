//! planner vacation command implementations.

use serde::Serialize;

use crate::cli::{Common, VacationCommands};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::units;
use crate::vacation::{self, Vacation};

pub fn run(command: VacationCommands, common: Common) -> Result<()> {
    match command {
        VacationCommands::Add { name, start, end } => run_add(name, start, end, common),
        VacationCommands::List => run_list(common),
        VacationCommands::Remove { vacation } => run_remove(vacation, common),
    }
}

fn describe(vacation: &Vacation) -> String {
    format!(
        "{}  {}  {} to {} ({} day(s))",
        vacation.id,
        vacation.name,
        vacation.start_date,
        vacation.end_date,
        vacation.days()
    )
}

pub fn run_add(name: String, start: String, end: String, common: Common) -> Result<()> {
    let start = vacation::parse_date("start", &start)?;
    let end = vacation::parse_date("end", &end)?;
    let (mut planner, now) = common.open()?;
    let id = planner.new_id();
    let added = vacation::add(&mut planner.vacations, id, &name, start, end)?;
    planner.save(now)?;

    let mut human = HumanOutput::new("Vacation added");
    human.push_detail(describe(&added));
    let affected = planner
        .tasks
        .iter()
        .filter_map(|task| task.due_date)
        .filter(|due| added.contains(units::local_date(*due, planner.offset)))
        .count();
    if affected > 0 {
        human.push_warning(format!(
            "{affected} task(s) fall due during this vacation; the schedule moves them after it"
        ));
    }
    emit_success(common.output(), "vacation add", &added, Some(&human))
}

#[derive(Serialize)]
struct VacationListOutput<'a> {
    vacations: &'a [Vacation],
}

pub fn run_list(common: Common) -> Result<()> {
    let (planner, _) = common.open_read_only()?;
    let mut human = HumanOutput::new(format!("Vacations ({})", planner.vacations.len()));
    for vacation in &planner.vacations {
        human.push_detail(describe(vacation));
    }
    if planner.vacations.is_empty() {
        human.push_next_step("planner vacation add <name> <start> <end>");
    }
    let output = VacationListOutput {
        vacations: &planner.vacations,
    };
    emit_success(common.output(), "vacation list", &output, Some(&human))
}

pub fn run_remove(key: String, common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let removed = vacation::remove(&mut planner.vacations, key.trim())?;
    planner.save(now)?;

    let mut human = HumanOutput::new("Vacation removed");
    human.push_detail(describe(&removed));
    emit_success(common.output(), "vacation remove", &removed, Some(&human))
}
