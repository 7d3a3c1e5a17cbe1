mod support;

use serde_json::json;
use support::TestData;

#[test]
fn export_then_import_into_a_fresh_directory() {
    let source = TestData::new();
    source.json(&["category", "new", "Work"]);
    source.new_task("Quarterly report", &["--due", "2024-03-20 12:00", "--category", "Work"]);

    let out = tempfile::tempdir().unwrap();
    let exported = source.json(&["data", "export", "--output", out.path().to_str().unwrap()]);
    let path = exported["path"].as_str().unwrap().to_string();
    assert!(std::path::Path::new(&path).exists());
    assert!(path.contains("task-planner-backup-all-"));
    let keys: Vec<&str> = exported["keys"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|key| key.as_str())
        .collect();
    for key in ["tasks", "categories", "history", "settings"] {
        assert!(keys.contains(&key), "missing {key} in {keys:?}");
    }

    let target = TestData::new();
    let imported = target.json(&["data", "import", &path, "--mode", "overwrite"]);
    assert_eq!(imported["tasks"], 1);
    assert_eq!(imported["categories"], 1);

    let listed = target.json(&["task", "list"]);
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["tasks"][0]["name"], "Quarterly report");
    assert_eq!(listed["tasks"][0]["category_id"], "Work");
}

#[test]
fn export_to_stdout_prints_the_bundle() {
    let data = TestData::new();
    data.new_task("Anything", &[]);
    let output = data
        .cmd()
        .args(["--now", support::NOW, "data", "export", "tasks", "--stdout"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let bundle: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(bundle["dataType"], "tasks");
    assert_eq!(bundle["data"]["tasks"][0]["name"], "Anything");
}

#[test]
fn doctor_flags_legacy_archive() {
    let data = TestData::new();
    data.new_task("Healthy", &[]);
    let report = data.json(&["data", "doctor"]);
    assert_eq!(report["problems"], 0);

    data.write_key("archivedTasks", &json!([{ "id": "old" }]));
    let report = data.json(&["data", "doctor"]);
    assert_eq!(report["archived_tasks_present"], true);
    assert!(report["problems"].as_u64().unwrap() >= 1);
}

#[test]
fn migrate_maps_old_fields() {
    let data = TestData::new();
    let old = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(
        old.path(),
        serde_json::to_string(&json!([
            { "title": "Imported chore", "dueDate": "2024-03-10T10:00:00Z", "legacyFlag": true },
            { "title": "Second chore", "dueDate": "not a date" }
        ]))
        .unwrap(),
    )
    .unwrap();
    let file = old.path().to_str().unwrap();

    let preview = data.json(&["data", "migrate", file, "--map", "title=name", "--dry-run"]);
    assert_eq!(preview["dry_run"], true);
    assert_eq!(preview["added"].as_array().map(Vec::len), Some(2));
    assert_eq!(preview["mapping"]["title"], "name");
    assert_eq!(preview["mapping"]["dueDate"], "dueDate");
    assert_eq!(data.json(&["task", "list"])["total"], 0);

    data.json(&["data", "migrate", file, "--map", "title=name"]);
    let listed = data.json(&["task", "list", "--sort", "name"]);
    assert_eq!(listed["total"], 2);
    assert_eq!(listed["sort_by"], "name");
    assert_eq!(listed["tasks"][0]["name"], "Imported chore");
    let reversed = data.json(&["task", "list", "--sort", "name", "--desc"]);
    assert_eq!(reversed["tasks"][0]["name"], "Second chore");

    let again = data.json(&["data", "migrate", file, "--map", "title=name"]);
    assert_eq!(again["skipped"].as_array().map(Vec::len), Some(2));
}

#[test]
fn bad_mapping_is_a_user_error() {
    let data = TestData::new();
    let old = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(old.path(), "[]").unwrap();
    let (code, _) = data.json_err(&["data", "migrate", old.path().to_str().unwrap(), "--map", "title"]);
    assert_eq!(code, 2);
}
