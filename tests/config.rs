use std::fs;

use planner::config::{Config, CONFIG_FILE};

#[test]
fn load_from_dir_defaults_without_a_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = Config::load_from_dir(dir.path()).expect("defaults");
    assert_eq!(cfg.time.utc_offset, "local");
    assert_eq!(cfg.history.retention_days, 28);
    assert_eq!(cfg.schedule.horizon_days, 14);
}

#[test]
fn load_from_dir_reads_partial_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let content = r#"
[time]
utc_offset = "+02:00"

[history]
retention_days = 90
"#;
    fs::write(dir.path().join(CONFIG_FILE), content.trim()).expect("write config");

    let cfg = Config::load_from_dir(dir.path()).expect("config");
    assert_eq!(cfg.offset().expect("offset").local_minus_utc(), 7200);
    assert_eq!(cfg.history.retention_days, 90);
    assert_eq!(cfg.schedule.horizon_days, 14);
}

#[test]
fn load_from_dir_rejects_invalid_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(CONFIG_FILE);

    fs::write(&path, "[time]\nutc_offset = \"mars\"").expect("write config");
    assert!(Config::load_from_dir(dir.path()).is_err());

    fs::write(&path, "[schedule]\nhorizon_days = 0").expect("write config");
    assert!(Config::load_from_dir(dir.path()).is_err());
}
