mod common;

use std::process::Command;

use common::{
    EXIT_RUNTIME_FAILURE, EXIT_SUCCESS, EXIT_USAGE_ERROR, EXIT_VALIDATION_FAILURE, Workspace,
    stdout_envelope, unique_temp_dir,
};

#[test]
fn missing_required_args_exits_with_usage_code() {
    let status = Command::new(env!("CARGO_BIN_EXE_querylens"))
        .arg("errors")
        .status()
        .expect("command should execute");

    assert_eq!(status.code(), Some(EXIT_USAGE_ERROR));
}

#[test]
fn unknown_subsystem_value_exits_with_usage_code() {
    let status = Command::new(env!("CARGO_BIN_EXE_querylens"))
        .args(["errors", "--subsystem", "gateway"])
        .status()
        .expect("command should execute");

    assert_eq!(status.code(), Some(EXIT_USAGE_ERROR));
}

#[test]
fn help_exits_with_success_code() {
    let status = Command::new(env!("CARGO_BIN_EXE_querylens"))
        .arg("--help")
        .status()
        .expect("command should execute");

    assert_eq!(status.code(), Some(EXIT_SUCCESS));
}

#[test]
fn runtime_path_resolution_failures_exit_with_runtime_code() {
    let status = Command::new(env!("CARGO_BIN_EXE_querylens"))
        .args(["--home-dir", "relative", "stats", "--date", "2024-03-05"])
        .status()
        .expect("command should execute");

    assert_eq!(status.code(), Some(EXIT_RUNTIME_FAILURE));
}

#[test]
fn malformed_date_exits_with_validation_code_and_envelope() {
    let workspace = Workspace::seeded("querylens-exit-bad-date");
    let output = workspace.run(&["stats", "--date", "2024-13-01"]);

    assert_eq!(output.status.code(), Some(EXIT_VALIDATION_FAILURE));
    let envelope = stdout_envelope(&output);
    assert_eq!(envelope["ok"], false);
    assert_eq!(envelope["command"], "stats");
    assert_eq!(envelope["error"]["code"], "input_invalid");
    assert_eq!(envelope["error"]["details"]["field"], "date");
}

#[test]
fn inverted_trend_range_exits_with_validation_code() {
    let workspace = Workspace::seeded("querylens-exit-inverted");
    let output = workspace.run(&[
        "trend", "queries", "--start", "2024-03-10", "--end", "2024-03-01",
    ]);

    assert_eq!(output.status.code(), Some(EXIT_VALIDATION_FAILURE));
    let envelope = stdout_envelope(&output);
    assert_eq!(envelope["command"], "trend.queries");
    assert_eq!(envelope["error"]["details"]["field"], "start");
}

#[test]
fn missing_database_exits_with_runtime_code_and_envelope() {
    let temp = unique_temp_dir("querylens-exit-no-db");
    let home_dir = temp.join("home");
    std::fs::create_dir_all(&home_dir).expect("home dir should be creatable");

    let output = Command::new(env!("CARGO_BIN_EXE_querylens"))
        .arg("--home-dir")
        .arg(&home_dir)
        .arg("--cwd")
        .arg(&temp)
        .args(["stats", "--date", "2024-03-05"])
        .output()
        .expect("command should execute");

    assert_eq!(output.status.code(), Some(EXIT_RUNTIME_FAILURE));
    let envelope = stdout_envelope(&output);
    assert_eq!(envelope["ok"], false);
    assert_eq!(envelope["error"]["code"], "store_unavailable");
    assert!(
        envelope["error"]["details"]["db_path"]
            .as_str()
            .is_some_and(|path| path.ends_with("querylens.sqlite"))
    );
}

#[test]
fn explicit_config_that_does_not_exist_is_a_runtime_failure() {
    let workspace = Workspace::seeded("querylens-exit-no-config");
    std::fs::remove_file(&workspace.config_path).expect("config should be removable");

    let output = workspace.run(&["users", "--date", "2024-03-05"]);

    assert_eq!(output.status.code(), Some(EXIT_RUNTIME_FAILURE));
    let envelope = stdout_envelope(&output);
    assert_eq!(envelope["error"]["code"], "config_invalid");
}

#[test]
fn successful_report_exits_with_success_code() {
    let workspace = Workspace::seeded("querylens-exit-ok");
    let output = workspace.run(&["stats", "--date", "2024-03-05"]);

    assert_eq!(output.status.code(), Some(EXIT_SUCCESS));
    let envelope = stdout_envelope(&output);
    assert_eq!(envelope["ok"], true);
    assert_eq!(
        envelope["meta"]["schema_version"],
        "querylens.report-envelope.v1"
    );
}

#[test]
fn config_schema_needs_no_runtime_paths() {
    let output = Command::new(env!("CARGO_BIN_EXE_querylens"))
        .args(["--home-dir", "relative", "config-schema"])
        .output()
        .expect("command should execute");

    assert_eq!(output.status.code(), Some(EXIT_SUCCESS));
    let envelope = stdout_envelope(&output);
    assert!(envelope["data"]["properties"]["project_members"].is_object());
}
