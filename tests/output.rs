use planner::output::{format_human, HumanOutput};

#[test]
fn format_human_includes_sections() {
    let mut human = HumanOutput::new("Task created");
    human.push_summary("ID", "_k3x9");
    human.push_detail("due date falls in a vacation; moved to 2024-03-13 10:00");
    human.push_warning("category 'Work' was created");
    human.push_next_step("planner task list");

    let rendered = format_human(&human);
    assert!(rendered.contains("Task created"));
    assert!(rendered.contains("Summary:"));
    assert!(rendered.contains("- ID: _k3x9"));
    assert!(rendered.contains("Details:"));
    assert!(rendered.contains("- due date falls in a vacation"));
    assert!(rendered.contains("Warnings:"));
    assert!(rendered.contains("- category 'Work' was created"));
    assert!(rendered.contains("Next steps:"));
    assert!(rendered.contains("- planner task list"));
}

#[test]
fn format_human_omits_empty_sections() {
    let human = HumanOutput::new("planner already initialized");
    let rendered = format_human(&human);
    assert_eq!(rendered, "planner already initialized");
}
