mod support;

use support::TestData;

#[test]
fn created_events_show_in_the_week() {
    let data = TestData::new();
    let created = data.json(&[
        "calendar", "create", "--at", "2024-03-05 14:00", "--minutes", "30", "--name", "Standup",
    ]);
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["name"], "Standup");

    let week = data.json(&["calendar", "week", "--date", "2024-03-05"]);
    assert_eq!(week["start"], "2024-03-03");
    assert_eq!(week["end"], "2024-03-09");
    let events = week["events"].as_array().unwrap();
    let event = events
        .iter()
        .find(|event| event["taskId"] == id.as_str())
        .expect("event in week");
    assert_eq!(event["title"], "Standup");
    assert!(event["start"].as_str().unwrap().starts_with("2024-03-05T14:00:00"));

    let next_week = data.json(&["calendar", "week", "--date", "2024-03-05", "--step", "1"]);
    assert_eq!(next_week["start"], "2024-03-10");
    assert!(next_week["events"]
        .as_array()
        .unwrap()
        .iter()
        .all(|event| event["taskId"] != id.as_str()));
}

#[test]
fn views_remember_the_last_kind() {
    let data = TestData::new();
    data.json(&["calendar", "month", "--date", "2024-03-15"]);
    assert_eq!(data.read_key("calendarSettings")["lastView"], "dayGridMonth");

    data.json(&["calendar", "day"]);
    assert_eq!(data.read_key("calendarSettings")["lastView"], "timeGridDay");
}

#[test]
fn history_appears_on_the_calendar() {
    let data = TestData::new();
    let id = data.new_task("Read", &["--due", "2024-03-04 20:00"]);
    data.json(&["task", "done", &id, "--yes"]);

    let day = data.json(&["calendar", "day", "--date", "2024-03-04"]);
    let events = day["events"].as_array().unwrap();
    assert!(events
        .iter()
        .any(|event| event["taskId"] == id.as_str() && event["historical"] == "completed"));
}

#[test]
fn schedule_places_appointments_at_their_slot() {
    let data = TestData::new();
    let id = data.new_task(
        "Dentist",
        &["--due", "2024-03-05 10:00", "--estimate", "1h", "--appointment", "true"],
    );
    data.new_task("Stretch", &["--due", "2024-03-05 18:00", "--repeat", "every:1d"]);

    let schedule = data.json(&["schedule", "--days", "7", "--task", &id]);
    let occurrences = schedule["occurrences"].as_array().unwrap();
    assert_eq!(occurrences.len(), 1);
    assert!(occurrences[0]["scheduledStart"]
        .as_str()
        .unwrap()
        .starts_with("2024-03-05T09:00:00"));
    assert_eq!(occurrences[0]["isAppointment"], true);

    let everything = data.json(&["schedule", "--days", "7"]);
    assert!(everything["occurrences"].as_array().unwrap().len() > 1);
}

#[test]
fn invalid_calendar_date_is_a_user_error() {
    let data = TestData::new();
    let (code, _) = data.json_err(&["calendar", "week", "--date", "March 5"]);
    assert_eq!(code, 2);
}
