//! Categories
//!
//! A category's id is its name at creation time; renaming re-keys the id
//! and every task that references it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::{CompletionSpec, Task};
use crate::units::DurationUnit;

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub apply_icon_to_new_tasks: bool,
    #[serde(default)]
    pub bypass_vacation: bool,
}

impl Category {
    pub fn new(name: &str, color: impl Into<String>) -> Self {
        Self {
            id: name.to_string(),
            name: name.to_string(),
            color: color.into(),
            icon: None,
            apply_icon_to_new_tasks: false,
            bypass_vacation: false,
        }
    }
}

pub fn find<'a>(categories: &'a [Category], id: &str) -> Option<&'a Category> {
    categories.iter().find(|category| category.id == id)
}

/// Resolve by id, then by case-insensitive name.
pub fn resolve(categories: &[Category], input: &str) -> Result<String> {
    let trimmed = input.trim();
    if let Some(category) = find(categories, trimmed) {
        return Ok(category.id.clone());
    }
    categories
        .iter()
        .find(|category| category.name.eq_ignore_ascii_case(trimmed))
        .map(|category| category.id.clone())
        .ok_or_else(|| Error::CategoryNotFound(trimmed.to_string()))
}

pub fn display_name(categories: &[Category], id: Option<&str>) -> String {
    id.and_then(|id| find(categories, id))
        .map(|category| category.name.clone())
        .unwrap_or_else(|| UNCATEGORIZED.to_string())
}

fn name_taken(categories: &[Category], name: &str, except: Option<&str>) -> bool {
    categories.iter().any(|category| {
        category.name.eq_ignore_ascii_case(name) && Some(category.id.as_str()) != except
    })
}

/// Add a category. Names are unique ignoring case.
pub fn add(categories: &mut Vec<Category>, name: &str, color: String) -> Result<Category> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidArgument("category name cannot be empty".to_string()));
    }
    if name_taken(categories, name, None) || find(categories, name).is_some() {
        return Err(Error::DuplicateCategory(name.to_string()));
    }
    let category = Category::new(name, color);
    categories.push(category.clone());
    Ok(category)
}

/// Return the category with this name, creating it if needed.
pub fn ensure(categories: &mut Vec<Category>, name: &str, color: impl FnOnce() -> String) -> String {
    if let Some(existing) = categories
        .iter()
        .find(|category| category.id == name || category.name.eq_ignore_ascii_case(name))
    {
        return existing.id.clone();
    }
    let category = Category::new(name, color());
    let id = category.id.clone();
    categories.push(category);
    id
}

/// Rename a category and re-key the tasks that reference it.
///
/// Returns the number of tasks updated.
pub fn rename(
    categories: &mut [Category],
    tasks: &mut [Task],
    id: &str,
    new_name: &str,
) -> Result<usize> {
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(Error::InvalidArgument("category name cannot be empty".to_string()));
    }
    if name_taken(categories, new_name, Some(id))
        || categories.iter().any(|category| category.id == new_name && category.id != id)
    {
        return Err(Error::DuplicateCategory(new_name.to_string()));
    }
    let category = categories
        .iter_mut()
        .find(|category| category.id == id)
        .ok_or_else(|| Error::CategoryNotFound(id.to_string()))?;
    category.name = new_name.to_string();
    category.id = new_name.to_string();

    let mut updated = 0;
    for task in tasks.iter_mut() {
        if task.category_id.as_deref() == Some(id) {
            task.category_id = Some(new_name.to_string());
            updated += 1;
        }
    }
    Ok(updated)
}

/// Delete a category together with its tasks. Returns the removed tasks.
pub fn delete(categories: &mut Vec<Category>, tasks: &mut Vec<Task>, id: &str) -> Result<Vec<Task>> {
    let before = categories.len();
    categories.retain(|category| category.id != id);
    if categories.len() == before {
        return Err(Error::CategoryNotFound(id.to_string()));
    }
    Ok(take_tasks(tasks, id))
}

/// Delete only the tasks of a category.
pub fn clear_tasks(categories: &[Category], tasks: &mut Vec<Task>, id: &str) -> Result<Vec<Task>> {
    if find(categories, id).is_none() {
        return Err(Error::CategoryNotFound(id.to_string()));
    }
    Ok(take_tasks(tasks, id))
}

fn take_tasks(tasks: &mut Vec<Task>, id: &str) -> Vec<Task> {
    let (removed, kept): (Vec<Task>, Vec<Task>) = std::mem::take(tasks)
        .into_iter()
        .partition(|task| task.category_id.as_deref() == Some(id));
    *tasks = kept;
    removed
}

/// Fields a bulk edit may change on every task of a category.
#[derive(Debug, Clone, Default)]
pub struct BulkEdit {
    pub estimate: Option<(i64, DurationUnit)>,
    pub completion: Option<CompletionSpec>,
}

impl BulkEdit {
    pub fn is_empty(&self) -> bool {
        self.estimate.is_none() && self.completion.is_none()
    }
}

pub fn bulk_edit(categories: &[Category], tasks: &mut [Task], id: &str, edit: &BulkEdit) -> Result<usize> {
    if edit.is_empty() {
        return Err(Error::InvalidArgument(
            "no changes specified; pass --estimate or --completion".to_string(),
        ));
    }
    if find(categories, id).is_none() {
        return Err(Error::CategoryNotFound(id.to_string()));
    }
    let mut updated = 0;
    for task in tasks.iter_mut().filter(|task| task.category_id.as_deref() == Some(id)) {
        if let Some((amount, unit)) = edit.estimate {
            task.estimated_duration_amount = Some(amount);
            task.estimated_duration_unit = Some(unit);
        }
        if let Some(completion) = edit.completion {
            completion.apply(task);
        }
        updated += 1;
    }
    Ok(updated)
}

/// Set or clear the icon. When `apply_to_tasks` is set the icon is also
/// copied onto existing tasks of the category that have none.
pub fn set_icon(
    categories: &mut [Category],
    tasks: &mut [Task],
    id: &str,
    icon: Option<String>,
    apply_to_new: bool,
    apply_to_tasks: bool,
) -> Result<usize> {
    let category = categories
        .iter_mut()
        .find(|category| category.id == id)
        .ok_or_else(|| Error::CategoryNotFound(id.to_string()))?;
    category.icon = icon.clone();
    category.apply_icon_to_new_tasks = apply_to_new && icon.is_some();

    let mut updated = 0;
    if apply_to_tasks {
        for task in tasks
            .iter_mut()
            .filter(|task| task.category_id.as_deref() == Some(id) && task.icon.is_none())
        {
            task.icon = icon.clone();
            updated += 1;
        }
    }
    Ok(updated)
}

/// Icon a new task in this category should inherit, if any.
pub fn inherited_icon(categories: &[Category], id: Option<&str>) -> Option<String> {
    id.and_then(|id| find(categories, id))
        .filter(|category| category.apply_icon_to_new_tasks)
        .and_then(|category| category.icon.clone())
}
