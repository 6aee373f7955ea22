use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{conversion_error, Tournament};
use crate::domain::{Stage, TournamentSnapshot};
use crate::errors::RatingError;

const COLUMNS: &str = "id, name, start_date, finish_date, stage, rorder, \
    last_tournament_id, next_tournament_id, last_signature, curr_signature, \
    reratings, first_rated, last_rated, locked, created_at";

pub fn insert_tournament(
    conn: &Connection,
    name: &str,
    start_date: NaiveDate,
    finish_date: NaiveDate,
) -> Result<Tournament> {
    let sql = format!(
        "INSERT INTO tournaments (name, start_date, finish_date, stage) \
         VALUES (?1, ?2, ?3, 'initial') RETURNING {COLUMNS}"
    );

    conn.query_row(&sql, params![name, start_date, finish_date], parse_tournament_row)
        .context("Failed to insert new tournament")
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Tournament>> {
    let sql = format!("SELECT {COLUMNS} FROM tournaments WHERE id = ?1");

    conn.query_row(&sql, params![id], parse_tournament_row)
        .optional()
        .context("Failed to query tournament by id")
}

pub fn get(conn: &Connection, id: i64) -> Result<Tournament> {
    find_by_id(conn, id)?.ok_or_else(|| RatingError::TournamentNotFound { id }.into())
}

pub fn find_by_rorder(conn: &Connection, rorder: i64) -> Result<Option<Tournament>> {
    let sql = format!("SELECT {COLUMNS} FROM tournaments WHERE rorder = ?1");

    conn.query_row(&sql, params![rorder], parse_tournament_row)
        .optional()
        .context("Failed to query tournament by rorder")
}

/// All queued/rated tournaments in ascending rating order.
pub fn all_in_queue(conn: &Connection) -> Result<Vec<Tournament>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM tournaments \
         WHERE stage IN ('queued', 'rated') AND rorder IS NOT NULL \
         ORDER BY rorder"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], parse_tournament_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// Every queued/rated tournament in the order the queue should hold them:
/// finish date, then start date, ties broken by creation order.
pub fn all_queued_or_rated(conn: &Connection) -> Result<Vec<Tournament>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM tournaments \
         WHERE stage IN ('queued', 'rated') \
         ORDER BY finish_date, start_date, id"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], parse_tournament_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// Free every held rorder before renumbering, so the unique constraint
/// cannot trip over transient duplicates mid-update.
pub fn release_rorders(conn: &Connection) -> Result<()> {
    conn.execute(
        "UPDATE tournaments SET rorder = NULL WHERE stage IN ('queued', 'rated')",
        [],
    )
    .context("Failed to release rating order numbers")
    .map(|_| ())
}

pub fn set_last_pointer(conn: &Connection, id: i64, last_tournament_id: Option<i64>) -> Result<()> {
    conn.execute(
        "UPDATE tournaments SET last_tournament_id = ?1 WHERE id = ?2",
        params![last_tournament_id, id],
    )
    .context("Failed to update last-tournament pointer")
    .map(|_| ())
}

pub fn set_next_pointer(conn: &Connection, id: i64, next_tournament_id: Option<i64>) -> Result<()> {
    conn.execute(
        "UPDATE tournaments SET next_tournament_id = ?1 WHERE id = ?2",
        params![next_tournament_id, id],
    )
    .context("Failed to update next-tournament pointer")
    .map(|_| ())
}

pub fn set_stage(conn: &Connection, id: i64, stage: Stage) -> Result<()> {
    conn.execute(
        "UPDATE tournaments SET stage = ?1 WHERE id = ?2",
        params![stage.as_str(), id],
    )
    .context("Failed to update tournament stage")
    .map(|_| ())
}

pub fn set_dates(
    conn: &Connection,
    id: i64,
    start_date: NaiveDate,
    finish_date: NaiveDate,
) -> Result<()> {
    conn.execute(
        "UPDATE tournaments SET start_date = ?1, finish_date = ?2 WHERE id = ?3",
        params![start_date, finish_date, id],
    )
    .context("Failed to update tournament dates")
    .map(|_| ())
}

pub fn set_order_fields(
    conn: &Connection,
    id: i64,
    rorder: Option<i64>,
    last_tournament_id: Option<i64>,
    next_tournament_id: Option<i64>,
) -> Result<()> {
    conn.execute(
        "UPDATE tournaments \
         SET rorder = ?1, last_tournament_id = ?2, next_tournament_id = ?3 \
         WHERE id = ?4",
        params![rorder, last_tournament_id, next_tournament_id, id],
    )
    .context("Failed to update tournament order fields")
    .map(|_| ())
}

pub fn clear_last_signature(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE tournaments SET last_signature = NULL WHERE id = ?1",
        params![id],
    )
    .context("Failed to clear tournament signature")
    .map(|_| ())
}

pub fn set_curr_signature(conn: &Connection, id: i64, signature: &str) -> Result<()> {
    conn.execute(
        "UPDATE tournaments SET curr_signature = ?1 WHERE id = ?2",
        params![signature, id],
    )
    .context("Failed to update tournament signature")
    .map(|_| ())
}

/// Record a successful rating pass: both signatures converge, timestamps
/// advance and the rerate counter grows when this was already rated.
pub fn mark_rated(
    conn: &Connection,
    id: i64,
    signature: &str,
    was_rated: bool,
    now: NaiveDateTime,
) -> Result<()> {
    conn.execute(
        "UPDATE tournaments SET stage = 'rated', \
         last_signature = ?1, curr_signature = ?1, \
         first_rated = COALESCE(first_rated, ?2), last_rated = ?2, \
         reratings = reratings + ?3 \
         WHERE id = ?4",
        params![signature, now, if was_rated { 1 } else { 0 }, id],
    )
    .context("Failed to mark tournament rated")
    .map(|_| ())
}

pub fn set_locked(conn: &Connection, id: i64, locked: bool) -> Result<()> {
    conn.execute(
        "UPDATE tournaments SET locked = ?1 WHERE id = ?2",
        params![locked, id],
    )
    .context("Failed to update tournament lock")
    .map(|_| ())
}

/// Highest rorder among rated tournaments finishing before the given date,
/// used as the tournament cut-off when publishing a rating list.
pub fn max_rorder_before(conn: &Connection, date: NaiveDate) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT MAX(rorder) FROM tournaments \
         WHERE stage = 'rated' AND finish_date < ?1",
        params![date],
        |row| row.get(0),
    )
    .context("Failed to query tournament cut-off")
}

/// Load the immutable snapshot the engine and signature computation work on.
pub fn load_snapshot(conn: &Connection, id: i64) -> Result<TournamentSnapshot> {
    let tournament = get(conn, id)?;
    let players = super::players::list_by_tournament(conn, id)?;

    let mut snapshot_players = Vec::with_capacity(players.len());
    for player in &players {
        let results = super::results::list_by_player(conn, player.id)?;
        let snapshot_results = results
            .iter()
            .map(|r| crate::domain::ResultSnapshot {
                id: r.id,
                round: r.round,
                score: r.score,
                colour: r.colour,
                opponent_id: r.opponent_id,
                opponent_num: r
                    .opponent_id
                    .and_then(|oid| players.iter().find(|p| p.id == oid))
                    .map(|p| p.num),
                rateable: r.rateable,
            })
            .collect();

        snapshot_players.push(crate::domain::PlayerSnapshot {
            id: player.id,
            num: player.num,
            name: player.name.clone(),
            category: player.category,
            icu_id: player.icu_id,
            fide_rating: player.fide_rating,
            old_rating: player.old_rating,
            old_games: player.old_games,
            old_full: player.old_full,
            results: snapshot_results,
        });
    }

    Ok(TournamentSnapshot {
        id: tournament.id,
        name: tournament.name,
        start_date: tournament.start_date,
        finish_date: tournament.finish_date,
        rorder: tournament.rorder,
        players: snapshot_players,
    })
}

fn parse_tournament_row(row: &rusqlite::Row) -> rusqlite::Result<Tournament> {
    let stage: String = row.get(4)?;
    Ok(Tournament {
        id: row.get(0)?,
        name: row.get(1)?,
        start_date: row.get(2)?,
        finish_date: row.get(3)?,
        stage: Stage::parse(&stage).map_err(|e| conversion_error(4, e))?,
        rorder: row.get(5)?,
        last_tournament_id: row.get(6)?,
        next_tournament_id: row.get(7)?,
        last_signature: row.get(8)?,
        curr_signature: row.get(9)?,
        reratings: row.get(10)?,
        first_rated: row.get(11)?,
        last_rated: row.get(12)?,
        locked: row.get(13)?,
        created_at: row.get(14)?,
    })
}
