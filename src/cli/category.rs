//! planner category command implementations.

use serde::Serialize;

use crate::category::{self, BulkEdit, Category};
use crate::cli::{CategoryCommands, Common};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::task::CompletionSpec;
use crate::theme;
use crate::units;

pub fn run(command: CategoryCommands, common: Common) -> Result<()> {
    match command {
        CategoryCommands::New {
            name,
            color,
            bypass_vacation,
        } => run_new(name, color, bypass_vacation, common),
        CategoryCommands::List => run_list(common),
        CategoryCommands::Rename { category, new_name } => run_rename(category, new_name, common),
        CategoryCommands::Delete { category, yes } => run_delete(category, yes, false, common),
        CategoryCommands::Clear { category, yes } => run_delete(category, yes, true, common),
        CategoryCommands::Bulk {
            category,
            estimate,
            completion,
        } => run_bulk(category, estimate, completion, common),
        CategoryCommands::Icon {
            category,
            icon,
            clear,
            apply_to_new,
            apply_to_existing,
        } => run_icon(IconOptions {
            category,
            icon,
            clear,
            apply_to_new,
            apply_to_existing,
            common,
        }),
    }
}

pub struct IconOptions {
    pub category: String,
    pub icon: Option<String>,
    pub clear: bool,
    pub apply_to_new: bool,
    pub apply_to_existing: bool,
    pub common: Common,
}

#[derive(Serialize)]
struct CategoryRow {
    #[serde(flatten)]
    category: Category,
    tasks: usize,
}

#[derive(Serialize)]
struct CategoryListOutput {
    categories: Vec<CategoryRow>,
    uncategorized: usize,
}

#[derive(Serialize)]
struct CategoryChangeOutput {
    category: Option<Category>,
    tasks_updated: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tasks_removed: Vec<String>,
}

fn task_count(tasks: &[crate::task::Task], id: Option<&str>) -> usize {
    tasks
        .iter()
        .filter(|task| task.category_id.as_deref() == id)
        .count()
}

pub fn run_new(name: String, color: Option<String>, bypass_vacation: bool, common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let color = match color {
        Some(color) => theme::validate_hex(&color)?,
        None => theme::category_color(&planner.settings.theming, planner.categories.len()),
    };
    let mut created = category::add(&mut planner.categories, &name, color)?;
    if bypass_vacation {
        if let Some(stored) = planner
            .categories
            .iter_mut()
            .find(|category| category.id == created.id)
        {
            stored.bypass_vacation = true;
            created.bypass_vacation = true;
        }
    }
    planner.save(now)?;
    tracing::info!(category = %created.id, "created category");

    let mut human = HumanOutput::new("Category created");
    human.push_summary("Name", created.name.clone());
    human.push_summary("Colour", created.color.clone());
    if created.bypass_vacation {
        human.push_summary("Vacations", "ignored");
    }
    human.push_next_step(format!("planner task new <name> --category \"{}\"", created.name));
    let output = CategoryChangeOutput {
        category: Some(created),
        tasks_updated: 0,
        tasks_removed: Vec::new(),
    };
    emit_success(common.output(), "category new", &output, Some(&human))
}

pub fn run_list(common: Common) -> Result<()> {
    let (planner, _) = common.open_read_only()?;
    let rows: Vec<CategoryRow> = planner
        .categories
        .iter()
        .map(|category| CategoryRow {
            tasks: task_count(&planner.tasks, Some(&category.id)),
            category: category.clone(),
        })
        .collect();
    let uncategorized = task_count(&planner.tasks, None);

    let mut human = HumanOutput::new(format!("Categories ({})", rows.len()));
    for row in &rows {
        let icon = row
            .category
            .icon
            .as_deref()
            .map(|icon| format!("  {icon}"))
            .unwrap_or_default();
        human.push_detail(format!(
            "{}  {}  {} task(s){icon}",
            row.category.color, row.category.name, row.tasks
        ));
    }
    if uncategorized > 0 {
        human.push_detail(format!("{}  {uncategorized} task(s)", category::UNCATEGORIZED));
    }
    if rows.is_empty() {
        human.push_next_step("planner category new <name>");
    }
    let output = CategoryListOutput {
        categories: rows,
        uncategorized,
    };
    emit_success(common.output(), "category list", &output, Some(&human))
}

pub fn run_rename(input: String, new_name: String, common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    let id = category::resolve(&planner.categories, &input)?;
    let updated = category::rename(&mut planner.categories, &mut planner.tasks, &id, &new_name)?;
    for entry in planner.settings.category_filter.iter_mut() {
        if entry.as_deref() == Some(id.as_str()) {
            *entry = Some(new_name.trim().to_string());
        }
    }
    if let Some(flags) = planner.settings.ui.calendar_category_filters.remove(&id) {
        planner
            .settings
            .ui
            .calendar_category_filters
            .insert(new_name.trim().to_string(), flags);
    }
    planner.save(now)?;

    let renamed = category::find(&planner.categories, new_name.trim()).cloned();
    let mut human = HumanOutput::new("Category renamed");
    human.push_summary("From", id);
    human.push_summary("To", new_name.trim());
    human.push_summary("Tasks updated", updated.to_string());
    let output = CategoryChangeOutput {
        category: renamed,
        tasks_updated: updated,
        tasks_removed: Vec::new(),
    };
    emit_success(common.output(), "category rename", &output, Some(&human))
}

/// Delete a category with its tasks, or (`tasks_only`) just its tasks.
pub fn run_delete(input: String, yes: bool, tasks_only: bool, common: Common) -> Result<()> {
    let command = if tasks_only { "category clear" } else { "category delete" };
    let (mut planner, now) = common.open()?;
    let id = category::resolve(&planner.categories, &input)?;
    let affected = task_count(&planner.tasks, Some(&id));
    if !yes {
        let mut human = HumanOutput::new(if tasks_only {
            "Clear category tasks?"
        } else {
            "Delete category?"
        });
        human.push_summary("Category", id.clone());
        human.push_summary("Tasks affected", affected.to_string());
        human.push_next_step(format!("planner {command} \"{id}\" --yes"));
        let output = CategoryChangeOutput {
            category: category::find(&planner.categories, &id).cloned(),
            tasks_updated: 0,
            tasks_removed: Vec::new(),
        };
        return emit_success(common.output(), command, &output, Some(&human));
    }

    let (removed_category, removed) = if tasks_only {
        let removed = category::clear_tasks(&planner.categories, &mut planner.tasks, &id)?;
        (None, removed)
    } else {
        let existing = category::find(&planner.categories, &id).cloned();
        let removed = category::delete(&mut planner.categories, &mut planner.tasks, &id)?;
        planner.settings.category_filter.retain(|entry| entry.as_deref() != Some(id.as_str()));
        planner.settings.ui.calendar_category_filters.remove(&id);
        (existing, removed)
    };
    planner.save(now)?;
    tracing::info!(category = %id, tasks = removed.len(), tasks_only, "removed category data");

    let mut human = HumanOutput::new(if tasks_only {
        "Category tasks deleted"
    } else {
        "Category deleted"
    });
    human.push_summary("Category", id);
    human.push_summary("Tasks removed", removed.len().to_string());
    let output = CategoryChangeOutput {
        category: removed_category,
        tasks_updated: 0,
        tasks_removed: removed.into_iter().map(|task| task.id).collect(),
    };
    emit_success(common.output(), command, &output, Some(&human))
}

pub fn run_bulk(
    input: String,
    estimate: Option<String>,
    completion: Option<String>,
    common: Common,
) -> Result<()> {
    let estimate = match estimate.as_deref() {
        Some(raw) => Some(units::parse_amount_unit(raw).filter(|(amount, _)| *amount >= 0).ok_or_else(
            || Error::InvalidArgument(format!("invalid estimate '{raw}' (expected e.g. 30m, 2h)")),
        )?),
        None => None,
    };
    let completion = match completion.as_deref() {
        Some(raw) => Some(CompletionSpec::parse(raw)?),
        None => None,
    };
    let edit = BulkEdit { estimate, completion };

    let (mut planner, now) = common.open()?;
    let id = category::resolve(&planner.categories, &input)?;
    let updated = category::bulk_edit(&planner.categories, &mut planner.tasks, &id, &edit)?;
    planner.save(now)?;

    let mut human = HumanOutput::new("Category tasks updated");
    human.push_summary("Category", id.clone());
    human.push_summary("Tasks updated", updated.to_string());
    let output = CategoryChangeOutput {
        category: category::find(&planner.categories, &id).cloned(),
        tasks_updated: updated,
        tasks_removed: Vec::new(),
    };
    emit_success(common.output(), "category bulk", &output, Some(&human))
}

pub fn run_icon(options: IconOptions) -> Result<()> {
    let icon = if options.clear {
        None
    } else {
        match options.icon.as_deref().map(str::trim) {
            Some(icon) if !icon.is_empty() => Some(icon.to_string()),
            _ => {
                return Err(Error::InvalidArgument(
                    "pass an icon class or --clear".to_string(),
                ))
            }
        }
    };

    let (mut planner, now) = options.common.open()?;
    let id = category::resolve(&planner.categories, &options.category)?;
    let updated = category::set_icon(
        &mut planner.categories,
        &mut planner.tasks,
        &id,
        icon.clone(),
        options.apply_to_new,
        options.apply_to_existing,
    )?;
    planner.save(now)?;

    let mut human = HumanOutput::new(if icon.is_some() {
        "Category icon set"
    } else {
        "Category icon cleared"
    });
    human.push_summary("Category", id.clone());
    if let Some(icon) = &icon {
        human.push_summary("Icon", icon.clone());
    }
    if updated > 0 {
        human.push_summary("Tasks updated", updated.to_string());
    }
    let output = CategoryChangeOutput {
        category: category::find(&planner.categories, &id).cloned(),
        tasks_updated: updated,
        tasks_removed: Vec::new(),
    };
    emit_success(options.common.output(), "category icon", &output, Some(&human))
}
