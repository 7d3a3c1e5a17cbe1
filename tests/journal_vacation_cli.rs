mod support;

use serde_json::Value;
use support::TestData;

fn titles(listed: &Value) -> Vec<String> {
    listed["groups"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|group| group["entries"].as_array().unwrap().iter())
        .filter_map(|entry| entry["title"].as_str().map(str::to_string))
        .collect()
}

#[test]
fn journal_entries_round_trip_through_the_cli() {
    let data = TestData::new();
    let entry = data.json(&["journal", "new", "Retro", "--content", "went well"]);
    let id = entry["id"].as_str().unwrap().to_string();
    assert_eq!(entry["content"], "went well");

    assert!(titles(&data.json(&["journal", "list"])).contains(&"Retro".to_string()));

    let edited = data.json(&["journal", "edit", &id, "--title", "Sprint retro"]);
    assert_eq!(edited["title"], "Sprint retro");

    data.json(&["journal", "delete", &id]);
    assert!(titles(&data.json(&["journal", "list"])).is_empty());

    let (code, _) = data.json_err(&["journal", "delete", &id]);
    assert_eq!(code, 2);
}

#[test]
fn weekly_goal_is_per_sunday_week() {
    let data = TestData::new();
    let shown = data.json(&["journal", "goal"]);
    assert!(shown["goal"].is_null());
    assert_eq!(shown["week_start"], "2024-03-03");

    let set = data.json(&["journal", "goal", "Run three times"]);
    assert_eq!(set["created"], true);
    assert_eq!(set["week_start"], "2024-03-03");

    let updated = data.json(&["journal", "goal", "Run twice", "--week", "2024-03-09"]);
    assert_eq!(updated["created"], false);
    assert_eq!(updated["goal"]["content"], "Run twice");

    let next = data.json(&["journal", "goal", "--week", "2024-03-10"]);
    assert!(next["goal"].is_null());
}

#[test]
fn tasks_due_in_a_vacation_move_after_it() {
    let data = TestData::new();
    let vacation = data.json(&["vacation", "add", "Trip", "2024-03-10", "2024-03-12"]);
    assert_eq!(vacation["startDate"], "2024-03-10");
    assert_eq!(vacation["endDate"], "2024-03-12");

    let created = data.json(&["task", "new", "Pay rent", "--due", "2024-03-11 10:00"]);
    assert!(!created["moved_from_vacation"].is_null());
    assert!(created["task"]["due_date"]
        .as_str()
        .unwrap()
        .starts_with("2024-03-13T10:00:00"));

    let listed = data.json(&["vacation", "list"]);
    assert_eq!(listed["vacations"].as_array().map(Vec::len), Some(1));

    data.json(&["vacation", "remove", "Trip"]);
    let listed = data.json(&["vacation", "list"]);
    assert_eq!(listed["vacations"].as_array().map(Vec::len), Some(0));
}

#[test]
fn backwards_vacation_is_rejected() {
    let data = TestData::new();
    let (code, err) = data.json_err(&["vacation", "add", "Oops", "2024-03-12", "2024-03-10"]);
    assert_eq!(code, 2);
    assert_eq!(err["error"]["kind"], "user_error");
}
