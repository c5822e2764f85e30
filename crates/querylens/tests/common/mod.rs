#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use querylens::models::{ExecutionRecord, SqlExecution, StepTiming};
use querylens::store::{
    create_log_schema, insert_execution, insert_production_route, insert_sql_execution,
    insert_step_timing,
};
use rusqlite::Connection;
use serde_json::Value;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_RUNTIME_FAILURE: i32 = 1;
pub const EXIT_VALIDATION_FAILURE: i32 = 2;
pub const EXIT_USAGE_ERROR: i32 = 64;

pub const FIXTURE_DAY: &str = "2024-03-05";

pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()))
}

pub fn execution(
    biz_seq: &str,
    result_code: &str,
    request: &str,
    channel: Option<&str>,
    user_id: Option<&str>,
    create_time: &str,
) -> ExecutionRecord {
    ExecutionRecord {
        biz_seq: biz_seq.to_string(),
        result_code: Some(result_code.to_string()),
        request_payload: Some(request.to_string()),
        response_payload: None,
        create_time: create_time.to_string(),
        channel: channel.map(str::to_string),
        user_id: user_id.map(str::to_string),
    }
}

/// A step timing recorded on the fixture day at `clock` (`HH:MM:SS`).
pub fn timing(
    biz_seq: &str,
    step_name: &str,
    sub_step_name: Option<&str>,
    cost: f64,
    clock: &str,
) -> StepTiming {
    StepTiming {
        biz_seq: biz_seq.to_string(),
        step_name: step_name.to_string(),
        sub_step_name: sub_step_name.map(str::to_string),
        cost,
        create_time: format!("2024-03-05 {clock}"),
    }
}

/// One day of traffic on 2024-03-05 plus a single execution the day before.
///
/// Members of the project roster written by [`write_config`]: `u1`.
pub fn fixture_executions() -> Vec<ExecutionRecord> {
    let mut answered = execution(
        "s1",
        "0000",
        r####"{"dbType":"TDSQL","tpl":"###","sysNameList": []}"####,
        Some("DKK"),
        Some("u1"),
        "2024-03-05 09:00:00",
    );
    answered.response_payload = Some("查询执行成功".to_string());

    vec![
        answered,
        execution(
            "s2",
            "B2DU0010",
            r####"{"dbType":"TDSQL","tpl":"###"}"####,
            Some("DQ_WEB"),
            Some("u2"),
            "2024-03-05 10:00:00",
        ),
        execution(
            "s3",
            "20301002",
            r#"{"dbType":"TIDB"}"#,
            Some("DKK"),
            Some("u1"),
            "2024-03-05 11:00:00",
        ),
        execution(
            "s4",
            "20303002",
            r####"{"dbType":"TDSQL","tpl":"###"}"####,
            None,
            None,
            "2024-03-05 12:00:00",
        ),
        execution(
            "s5",
            "B2DU0030",
            r####"{"dbType":"HIVE","tpl":"###"}"####,
            Some("DKK"),
            Some("u3"),
            "2024-03-05 13:00:00",
        ),
        execution(
            "s0",
            "0000",
            r#"{"dbType":"TDSQL"}"#,
            Some("DKK"),
            Some("u1"),
            "2024-03-04 18:00:00",
        ),
    ]
}

pub fn fixture_timings() -> Vec<StepTiming> {
    vec![
        timing("s1", "QUERY_SCHEMA", Some("SCHEMA_LLM"), 1200.0, "09:00:01"),
        timing("s1", "RESULT_DEAL", Some("FORMAT"), 300.0, "09:00:02"),
        timing("s1", "DS_REQUEST", Some("REQ_DS"), 5000.0, "09:00:03"),
        timing("s2", "QUERY_SCHEMA", Some("SCHEMA_LLM"), 1400.0, "10:00:01"),
        timing("s2", "RESULT_DEAL", Some("FORMAT"), 100.0, "10:00:02"),
        timing("s4", "QUERY_SCHEMA", Some("SCHEMA_LLM"), 800.0, "12:00:01"),
        timing("s5", "QUERY_SCHEMA", Some("SCHEMA_LLM"), 9000.0, "13:00:01"),
    ]
}

/// Writes the fixture log database under `dir` and returns its path.
pub fn write_fixture_store(dir: &Path) -> PathBuf {
    std::fs::create_dir_all(dir).expect("fixture dir should be creatable");
    let path = dir.join("logs.sqlite");
    let connection = Connection::open(&path).expect("fixture db should open");
    create_log_schema(&connection).expect("schema should be created");

    for record in fixture_executions() {
        insert_execution(&connection, &record).expect("execution should insert");
    }
    for record in fixture_timings() {
        insert_step_timing(&connection, &record).expect("timing should insert");
    }
    insert_production_route(&connection, "s4", "2024-03-05 12:00:00")
        .expect("route should insert");
    insert_sql_execution(
        &connection,
        "s1",
        &SqlExecution {
            sql_text: Some("SELECT 1".to_string()),
            query_time: Some("12".to_string()),
            execute_time: Some("2024-03-05 09:00:02".to_string()),
            create_time: Some("2024-03-05 09:00:02".to_string()),
        },
    )
    .expect("sql execution should insert");

    path
}

pub fn write_config(dir: &Path) -> PathBuf {
    std::fs::create_dir_all(dir).expect("config dir should be creatable");
    let path = dir.join("config.json");
    std::fs::write(&path, r#"{"project_members":["u1"]}"#).expect("config should be writable");
    path
}

pub struct Workspace {
    pub root: PathBuf,
    pub home_dir: PathBuf,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

impl Workspace {
    pub fn seeded(prefix: &str) -> Self {
        let root = unique_temp_dir(prefix);
        let home_dir = root.join("home");
        std::fs::create_dir_all(&home_dir).expect("home dir should be creatable");
        Self {
            db_path: write_fixture_store(&root),
            config_path: write_config(&root),
            home_dir,
            root,
        }
    }

    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_querylens"))
            .arg("--home-dir")
            .arg(&self.home_dir)
            .arg("--cwd")
            .arg(&self.root)
            .arg("--db")
            .arg(&self.db_path)
            .arg("--config")
            .arg(&self.config_path)
            .args(args)
            .output()
            .expect("command should execute")
    }
}

pub fn stdout_envelope(output: &Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout
        .lines()
        .rev()
        .find(|line| line.trim_start().starts_with('{'))
        .unwrap_or_else(|| panic!("stdout should carry an envelope, got: {stdout}"));
    serde_json::from_str(line).expect("envelope should be valid JSON")
}
