use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{conversion_error, Player};
use crate::domain::PlayerCategory;
use crate::rating::PlayerRatingOutcome;

const COLUMNS: &str = "id, tournament_id, num, name, category, icu_id, fide_rating, \
    old_rating, old_games, old_full, new_rating, new_games, new_full, \
    k_factor, bonus, actual_score, expected_score, trn_rating, unrateable, \
    last_player_id";

pub fn insert_player(
    conn: &Connection,
    tournament_id: i64,
    num: i32,
    name: &str,
    category: PlayerCategory,
    icu_id: Option<i64>,
    fide_rating: Option<i32>,
) -> Result<Player> {
    let sql = format!(
        "INSERT INTO players (tournament_id, num, name, category, icu_id, fide_rating) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING {COLUMNS}"
    );

    conn.query_row(
        &sql,
        params![tournament_id, num, name, category.as_str(), icu_id, fide_rating],
        parse_player_row,
    )
    .context("Failed to insert new player")
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Player>> {
    let sql = format!("SELECT {COLUMNS} FROM players WHERE id = ?1");

    conn.query_row(&sql, params![id], parse_player_row)
        .optional()
        .context("Failed to query player by id")
}

pub fn list_by_tournament(conn: &Connection, tournament_id: i64) -> Result<Vec<Player>> {
    let sql = format!("SELECT {COLUMNS} FROM players WHERE tournament_id = ?1 ORDER BY num");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![tournament_id], parse_player_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// The same person's player row in their chronologically preceding rated
/// tournament, i.e. the row their old rating is inherited from. Strictly
/// smaller rorder keeps the back-reference invariant.
pub fn previous_rated_appearance(
    conn: &Connection,
    icu_id: i64,
    before_rorder: i64,
) -> Result<Option<Player>> {
    let sql = format!(
        "SELECT p.{} FROM players p \
         JOIN tournaments t ON t.id = p.tournament_id \
         WHERE p.icu_id = ?1 AND t.stage = 'rated' AND t.rorder < ?2 \
         ORDER BY t.rorder DESC LIMIT 1",
        COLUMNS.replace(", ", ", p.")
    );

    conn.query_row(&sql, params![icu_id, before_rorder], parse_player_row)
        .optional()
        .context("Failed to query previous rated appearance")
}

/// Latest rated appearance at or before the given rorder cut-off, used as
/// the first-priority rating source when publishing a list.
pub fn latest_rated_appearance(
    conn: &Connection,
    icu_id: i64,
    max_rorder: i64,
) -> Result<Option<Player>> {
    let sql = format!(
        "SELECT p.{} FROM players p \
         JOIN tournaments t ON t.id = p.tournament_id \
         WHERE p.icu_id = ?1 AND t.stage = 'rated' AND t.rorder <= ?2 \
         ORDER BY t.rorder DESC LIMIT 1",
        COLUMNS.replace(", ", ", p.")
    );

    conn.query_row(&sql, params![icu_id, max_rorder], parse_player_row)
        .optional()
        .context("Failed to query latest rated appearance")
}

pub fn set_rating_inputs(
    conn: &Connection,
    id: i64,
    old_rating: Option<f64>,
    old_games: i32,
    old_full: bool,
    last_player_id: Option<i64>,
) -> Result<()> {
    conn.execute(
        "UPDATE players SET old_rating = ?1, old_games = ?2, old_full = ?3, \
         last_player_id = ?4 WHERE id = ?5",
        params![old_rating, old_games, old_full, last_player_id, id],
    )
    .context("Failed to update player rating inputs")
    .map(|_| ())
}

pub fn save_rating_outcome(conn: &Connection, outcome: &PlayerRatingOutcome) -> Result<()> {
    conn.execute(
        "UPDATE players SET new_rating = ?1, new_games = ?2, new_full = ?3, \
         k_factor = ?4, bonus = ?5, actual_score = ?6, expected_score = ?7, \
         trn_rating = ?8, unrateable = ?9 WHERE id = ?10",
        params![
            outcome.new_rating,
            outcome.new_games,
            outcome.new_full,
            outcome.k_factor,
            outcome.bonus,
            outcome.actual_score,
            outcome.expected_score,
            outcome.trn_rating,
            outcome.unrateable,
            outcome.player_id,
        ],
    )
    .context("Failed to save player rating outcome")
    .map(|_| ())
}

fn parse_player_row(row: &rusqlite::Row) -> rusqlite::Result<Player> {
    let category: String = row.get(4)?;
    Ok(Player {
        id: row.get(0)?,
        tournament_id: row.get(1)?,
        num: row.get(2)?,
        name: row.get(3)?,
        category: PlayerCategory::parse(&category).map_err(|e| conversion_error(4, e))?,
        icu_id: row.get(5)?,
        fide_rating: row.get(6)?,
        old_rating: row.get(7)?,
        old_games: row.get(8)?,
        old_full: row.get(9)?,
        new_rating: row.get(10)?,
        new_games: row.get(11)?,
        new_full: row.get(12)?,
        k_factor: row.get(13)?,
        bonus: row.get(14)?,
        actual_score: row.get(15)?,
        expected_score: row.get(16)?,
        trn_rating: row.get(17)?,
        unrateable: row.get(18)?,
        last_player_id: row.get(19)?,
    })
}
