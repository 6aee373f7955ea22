use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{conversion_error, GameResult};
use crate::domain::{Colour, Outcome};

const COLUMNS: &str = "id, player_id, round, opponent_id, score, colour, rateable, \
    expected_score, rating_change";

/// Insert or replace one side of a game. Mirror maintenance lives in
/// `queue::signature::record_result`, which calls this for both sides
/// inside one transaction.
pub fn upsert_result(
    conn: &Connection,
    player_id: i64,
    round: i32,
    opponent_id: Option<i64>,
    score: Outcome,
    colour: Option<Colour>,
    rateable: bool,
) -> Result<GameResult> {
    let sql = format!(
        "INSERT INTO results (player_id, round, opponent_id, score, colour, rateable) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
         ON CONFLICT (player_id, round) DO UPDATE SET \
         opponent_id = excluded.opponent_id, score = excluded.score, \
         colour = excluded.colour, rateable = excluded.rateable, \
         expected_score = NULL, rating_change = NULL \
         RETURNING {COLUMNS}"
    );

    conn.query_row(
        &sql,
        params![
            player_id,
            round,
            opponent_id,
            score.as_str(),
            colour.map(|c| c.as_str()),
            rateable
        ],
        parse_result_row,
    )
    .context("Failed to upsert result")
}

pub fn find_for_round(
    conn: &Connection,
    player_id: i64,
    round: i32,
) -> Result<Option<GameResult>> {
    let sql = format!("SELECT {COLUMNS} FROM results WHERE player_id = ?1 AND round = ?2");

    conn.query_row(&sql, params![player_id, round], parse_result_row)
        .optional()
        .context("Failed to query result for round")
}

pub fn list_by_player(conn: &Connection, player_id: i64) -> Result<Vec<GameResult>> {
    let sql = format!("SELECT {COLUMNS} FROM results WHERE player_id = ?1 ORDER BY round");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![player_id], parse_result_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

pub fn set_rating_fields(
    conn: &Connection,
    id: i64,
    expected_score: Option<f64>,
    rating_change: Option<f64>,
) -> Result<()> {
    conn.execute(
        "UPDATE results SET expected_score = ?1, rating_change = ?2 WHERE id = ?3",
        params![expected_score, rating_change, id],
    )
    .context("Failed to update result rating fields")
    .map(|_| ())
}

fn parse_result_row(row: &rusqlite::Row) -> rusqlite::Result<GameResult> {
    let score: String = row.get(4)?;
    let colour: Option<String> = row.get(5)?;
    Ok(GameResult {
        id: row.get(0)?,
        player_id: row.get(1)?,
        round: row.get(2)?,
        opponent_id: row.get(3)?,
        score: Outcome::parse(&score).map_err(|e| conversion_error(4, e))?,
        colour: colour
            .map(|c| Colour::parse(&c).map_err(|e| conversion_error(5, e)))
            .transpose()?,
        rateable: row.get(6)?,
        expected_score: row.get(7)?,
        rating_change: row.get(8)?,
    })
}
