//! Read access to a SQLite mirror of the execution log tables.
//!
//! The tables are owned elsewhere; this module only reads them. The schema
//! helpers exist so fixtures and local mirrors can be created with the same
//! column layout.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags, Row, params};
use tracing::{debug, warn};

use crate::aggregate::DateWindow;
use crate::models::{ExecutionRecord, SqlExecution, StepTiming};

pub const EXECUTIONS_TABLE: &str = "t_handler_logs";
pub const STEP_TIMINGS_TABLE: &str = "t_step_time_record";
pub const PRODUCTION_ROUTES_TABLE: &str = "req_aomp_log";
pub const SQL_EXECUTIONS_TABLE: &str = "query_sql_log";

const CREATE_EXECUTIONS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS t_handler_logs (
    biz_seq TEXT NOT NULL,
    result_code TEXT,
    req_info TEXT,
    rsp_info TEXT,
    create_time TEXT NOT NULL,
    channel TEXT,
    user_id TEXT
);
"#;

const CREATE_STEP_TIMINGS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS t_step_time_record (
    biz_seq TEXT NOT NULL,
    step_name TEXT NOT NULL,
    sub_step_name TEXT,
    cost REAL,
    create_time TEXT NOT NULL
);
"#;

const CREATE_PRODUCTION_ROUTES_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS req_aomp_log (
    biz_seq TEXT,
    create_time TEXT NOT NULL
);
"#;

const CREATE_SQL_EXECUTIONS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS query_sql_log (
    biz_seq TEXT NOT NULL,
    sql_str TEXT,
    query_time TEXT,
    sql_execute_time TEXT,
    create_time TEXT
);
"#;

const CREATE_INDEXES_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_handler_logs_time ON t_handler_logs (create_time);
CREATE INDEX IF NOT EXISTS idx_handler_logs_seq ON t_handler_logs (biz_seq);
CREATE INDEX IF NOT EXISTS idx_step_time_time ON t_step_time_record (create_time);
CREATE INDEX IF NOT EXISTS idx_step_time_seq ON t_step_time_record (biz_seq);
CREATE INDEX IF NOT EXISTS idx_aomp_time ON req_aomp_log (create_time);
CREATE INDEX IF NOT EXISTS idx_sql_log_seq ON query_sql_log (biz_seq);
"#;

#[must_use]
pub fn schema_statements() -> &'static [&'static str] {
    &[
        CREATE_EXECUTIONS_TABLE_SQL,
        CREATE_STEP_TIMINGS_TABLE_SQL,
        CREATE_PRODUCTION_ROUTES_TABLE_SQL,
        CREATE_SQL_EXECUTIONS_TABLE_SQL,
        CREATE_INDEXES_SQL,
    ]
}

/// Opens an existing mirror read-only.
pub fn open_log_store(path: &Path) -> Result<Connection> {
    if !path.is_file() {
        bail!("log database not found: {}", path.display());
    }
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open log database: {}", path.display()))
}

pub fn create_log_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(&schema_statements().join("\n"))
        .context("failed to create log schema")
}

/// Executions created inside `window`, oldest first.
pub fn load_executions(
    connection: &Connection,
    window: &DateWindow,
) -> Result<Vec<ExecutionRecord>> {
    let (lower, upper) = window.text_bounds()?;
    let query = format!(
        "SELECT biz_seq, result_code, req_info, rsp_info, create_time, channel, user_id \
         FROM {EXECUTIONS_TABLE} WHERE create_time >= ?1 AND create_time < ?2 \
         ORDER BY create_time, biz_seq"
    );
    let mut statement = connection
        .prepare(&query)
        .context("failed to prepare execution query")?;
    let rows = statement
        .query_map(params![lower, upper], execution_from_row)
        .context("failed to execute execution query")?;

    let mut executions = Vec::new();
    for row in rows {
        executions.push(row.context("failed to decode execution row")?);
    }
    debug!(count = executions.len(), %lower, %upper, "loaded executions");
    Ok(executions)
}

/// Step timings created inside `window`. Rows without a usable cost are
/// dropped.
pub fn load_step_timings(connection: &Connection, window: &DateWindow) -> Result<Vec<StepTiming>> {
    let (lower, upper) = window.text_bounds()?;
    let query = format!(
        "SELECT biz_seq, step_name, sub_step_name, cost, create_time \
         FROM {STEP_TIMINGS_TABLE} WHERE create_time >= ?1 AND create_time < ?2 \
         ORDER BY create_time, biz_seq"
    );
    let timings = read_step_timings(connection, &query, params![lower, upper])?;
    debug!(count = timings.len(), %lower, %upper, "loaded step timings");
    Ok(timings)
}

/// `biz_seq`s routed to production inside `window`.
pub fn load_production_biz_seqs(
    connection: &Connection,
    window: &DateWindow,
) -> Result<HashSet<String>> {
    let (lower, upper) = window.text_bounds()?;
    let query = format!(
        "SELECT DISTINCT biz_seq FROM {PRODUCTION_ROUTES_TABLE} \
         WHERE create_time >= ?1 AND create_time < ?2 AND biz_seq IS NOT NULL"
    );
    let mut statement = connection
        .prepare(&query)
        .context("failed to prepare production route query")?;
    let rows = statement
        .query_map(params![lower, upper], |row| row.get::<usize, SqlValue>(0))
        .context("failed to execute production route query")?;

    let mut biz_seqs = HashSet::new();
    for row in rows {
        let value = row.context("failed to decode production route row")?;
        if let Some(biz_seq) = value_to_text(value) {
            biz_seqs.insert(biz_seq);
        }
    }
    debug!(count = biz_seqs.len(), "loaded production routes");
    Ok(biz_seqs)
}

/// The first logged execution with `biz_seq`, if any.
pub fn load_execution(connection: &Connection, biz_seq: &str) -> Result<Option<ExecutionRecord>> {
    let query = format!(
        "SELECT biz_seq, result_code, req_info, rsp_info, create_time, channel, user_id \
         FROM {EXECUTIONS_TABLE} WHERE biz_seq = ?1 ORDER BY create_time LIMIT 1"
    );
    let mut statement = connection
        .prepare(&query)
        .context("failed to prepare execution lookup")?;
    let mut rows = statement
        .query_map([biz_seq], execution_from_row)
        .context("failed to execute execution lookup")?;
    rows.next()
        .transpose()
        .context("failed to decode execution row")
}

pub fn load_step_timings_for(connection: &Connection, biz_seq: &str) -> Result<Vec<StepTiming>> {
    let query = format!(
        "SELECT biz_seq, step_name, sub_step_name, cost, create_time \
         FROM {STEP_TIMINGS_TABLE} WHERE biz_seq = ?1 ORDER BY create_time"
    );
    read_step_timings(connection, &query, params![biz_seq])
}

pub fn load_sql_executions(connection: &Connection, biz_seq: &str) -> Result<Vec<SqlExecution>> {
    let query = format!(
        "SELECT sql_str, query_time, sql_execute_time, create_time \
         FROM {SQL_EXECUTIONS_TABLE} WHERE biz_seq = ?1 ORDER BY create_time"
    );
    let mut statement = connection
        .prepare(&query)
        .context("failed to prepare sql execution query")?;
    let rows = statement
        .query_map([biz_seq], |row| {
            Ok(SqlExecution {
                sql_text: value_to_text(row.get::<usize, SqlValue>(0)?),
                query_time: value_to_text(row.get::<usize, SqlValue>(1)?),
                execute_time: value_to_text(row.get::<usize, SqlValue>(2)?),
                create_time: value_to_text(row.get::<usize, SqlValue>(3)?),
            })
        })
        .context("failed to execute sql execution query")?;

    let mut executions = Vec::new();
    for row in rows {
        executions.push(row.context("failed to decode sql execution row")?);
    }
    Ok(executions)
}

pub fn insert_execution(connection: &Connection, record: &ExecutionRecord) -> Result<()> {
    connection
        .execute(
            &format!(
                "INSERT INTO {EXECUTIONS_TABLE} \
                 (biz_seq, result_code, req_info, rsp_info, create_time, channel, user_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ),
            params![
                record.biz_seq,
                record.result_code,
                record.request_payload,
                record.response_payload,
                record.create_time,
                record.channel,
                record.user_id,
            ],
        )
        .with_context(|| format!("failed to insert execution {}", record.biz_seq))?;
    Ok(())
}

pub fn insert_step_timing(connection: &Connection, timing: &StepTiming) -> Result<()> {
    connection
        .execute(
            &format!(
                "INSERT INTO {STEP_TIMINGS_TABLE} \
                 (biz_seq, step_name, sub_step_name, cost, create_time) \
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            ),
            params![
                timing.biz_seq,
                timing.step_name,
                timing.sub_step_name,
                timing.cost,
                timing.create_time,
            ],
        )
        .with_context(|| format!("failed to insert step timing for {}", timing.biz_seq))?;
    Ok(())
}

pub fn insert_production_route(
    connection: &Connection,
    biz_seq: &str,
    create_time: &str,
) -> Result<()> {
    connection
        .execute(
            &format!(
                "INSERT INTO {PRODUCTION_ROUTES_TABLE} (biz_seq, create_time) VALUES (?1, ?2)"
            ),
            params![biz_seq, create_time],
        )
        .with_context(|| format!("failed to insert production route for {biz_seq}"))?;
    Ok(())
}

pub fn insert_sql_execution(
    connection: &Connection,
    biz_seq: &str,
    execution: &SqlExecution,
) -> Result<()> {
    connection
        .execute(
            &format!(
                "INSERT INTO {SQL_EXECUTIONS_TABLE} \
                 (biz_seq, sql_str, query_time, sql_execute_time, create_time) \
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            ),
            params![
                biz_seq,
                execution.sql_text,
                execution.query_time,
                execution.execute_time,
                execution.create_time,
            ],
        )
        .with_context(|| format!("failed to insert sql execution for {biz_seq}"))?;
    Ok(())
}

fn execution_from_row(row: &Row<'_>) -> rusqlite::Result<ExecutionRecord> {
    Ok(ExecutionRecord {
        biz_seq: value_to_text(row.get::<usize, SqlValue>(0)?).unwrap_or_default(),
        result_code: value_to_text(row.get::<usize, SqlValue>(1)?),
        request_payload: value_to_text(row.get::<usize, SqlValue>(2)?),
        response_payload: value_to_text(row.get::<usize, SqlValue>(3)?),
        create_time: value_to_text(row.get::<usize, SqlValue>(4)?).unwrap_or_default(),
        channel: value_to_text(row.get::<usize, SqlValue>(5)?),
        user_id: value_to_text(row.get::<usize, SqlValue>(6)?),
    })
}

fn read_step_timings(
    connection: &Connection,
    query: &str,
    parameters: impl rusqlite::Params,
) -> Result<Vec<StepTiming>> {
    let mut statement = connection
        .prepare(query)
        .context("failed to prepare step timing query")?;
    let rows = statement
        .query_map(parameters, |row| {
            Ok((
                value_to_text(row.get::<usize, SqlValue>(0)?).unwrap_or_default(),
                value_to_text(row.get::<usize, SqlValue>(1)?).unwrap_or_default(),
                value_to_text(row.get::<usize, SqlValue>(2)?),
                row.get::<usize, SqlValue>(3)?,
                value_to_text(row.get::<usize, SqlValue>(4)?).unwrap_or_default(),
            ))
        })
        .context("failed to execute step timing query")?;

    let mut timings = Vec::new();
    let mut dropped = 0usize;
    for row in rows {
        let (biz_seq, step_name, sub_step_name, cost, create_time) =
            row.context("failed to decode step timing row")?;
        match value_to_cost(cost) {
            Some(cost) => timings.push(StepTiming {
                biz_seq,
                step_name,
                sub_step_name,
                cost,
                create_time,
            }),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!(dropped, "skipped step timings without a numeric cost");
    }
    Ok(timings)
}

/// Text form of a column the mirror may have stored with any affinity.
fn value_to_text(value: SqlValue) -> Option<String> {
    match value {
        SqlValue::Null => None,
        SqlValue::Integer(value) => Some(value.to_string()),
        SqlValue::Real(value) => Some(value.to_string()),
        SqlValue::Text(value) => Some(value),
        SqlValue::Blob(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

fn value_to_cost(value: SqlValue) -> Option<f64> {
    let cost = match value {
        SqlValue::Integer(value) => value as f64,
        SqlValue::Real(value) => value,
        SqlValue::Text(value) => value.trim().parse::<f64>().ok()?,
        SqlValue::Null | SqlValue::Blob(_) => return None,
    };
    cost.is_finite().then_some(cost)
}
