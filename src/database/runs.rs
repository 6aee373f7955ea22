use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{conversion_error, RatingRun};
use crate::domain::RunStatus;

const COLUMNS: &str = "id, start_tournament_id, last_tournament_id, start_rorder, \
    last_rorder, status, report, claimed_at, created_at";

pub fn insert_run(
    conn: &Connection,
    start_tournament_id: i64,
    last_tournament_id: i64,
    start_rorder: i64,
    last_rorder: i64,
) -> Result<RatingRun> {
    let sql = format!(
        "INSERT INTO rating_runs \
         (start_tournament_id, last_tournament_id, start_rorder, last_rorder, status) \
         VALUES (?1, ?2, ?3, ?4, 'waiting') RETURNING {COLUMNS}"
    );

    conn.query_row(
        &sql,
        params![start_tournament_id, last_tournament_id, start_rorder, last_rorder],
        parse_run_row,
    )
    .context("Failed to insert rating run")
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<RatingRun>> {
    let sql = format!("SELECT {COLUMNS} FROM rating_runs WHERE id = ?1");

    conn.query_row(&sql, params![id], parse_run_row)
        .optional()
        .context("Failed to query rating run by id")
}

/// Rivals check: is any run still waiting or processing?
pub fn any_active(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM rating_runs WHERE status IN ('waiting', 'processing')",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn next_waiting(conn: &Connection) -> Result<Option<RatingRun>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM rating_runs WHERE status = 'waiting' ORDER BY id LIMIT 1"
    );

    conn.query_row(&sql, [], parse_run_row)
        .optional()
        .context("Failed to query next waiting run")
}

/// Atomically claim a waiting run. Zero rows updated means another worker
/// got there first.
pub fn claim(conn: &Connection, id: i64, now: NaiveDateTime) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE rating_runs SET status = 'processing', claimed_at = ?1 \
             WHERE id = ?2 AND status = 'waiting'",
            params![now, id],
        )
        .context("Failed to claim rating run")?;
    Ok(changed == 1)
}

pub fn set_status(conn: &Connection, id: i64, status: RunStatus) -> Result<()> {
    conn.execute(
        "UPDATE rating_runs SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )
    .context("Failed to update run status")
    .map(|_| ())
}

pub fn update_report(conn: &Connection, id: i64, report: &str) -> Result<()> {
    conn.execute(
        "UPDATE rating_runs SET report = ?1 WHERE id = ?2",
        params![report, id],
    )
    .context("Failed to update run report")
    .map(|_| ())
}

/// Processing runs claimed at or before the cut-off, i.e. probable crashes.
pub fn stale_processing(conn: &Connection, cutoff: NaiveDateTime) -> Result<Vec<RatingRun>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM rating_runs \
         WHERE status = 'processing' AND claimed_at IS NOT NULL AND claimed_at <= ?1 \
         ORDER BY id"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![cutoff], parse_run_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

pub fn insert_failure(conn: &Connection, message: &str, details: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT INTO failures (message, details) VALUES (?1, ?2)",
        params![message, details],
    )
    .context("Failed to insert failure record")
    .map(|_| ())
}

pub fn failure_count(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM failures", [], |row| row.get(0))
        .context("Failed to count failures")
}

fn parse_run_row(row: &rusqlite::Row) -> rusqlite::Result<RatingRun> {
    let status: String = row.get(5)?;
    Ok(RatingRun {
        id: row.get(0)?,
        start_tournament_id: row.get(1)?,
        last_tournament_id: row.get(2)?,
        start_rorder: row.get(3)?,
        last_rorder: row.get(4)?,
        status: RunStatus::parse(&status).map_err(|e| conversion_error(5, e))?,
        report: row.get(6)?,
        claimed_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}
