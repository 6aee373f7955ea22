use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{IcuRating, Publication, RatingList};

pub fn find_or_create_list(conn: &Connection, date: NaiveDate) -> Result<RatingList> {
    if let Some(existing) = find_list_by_date(conn, date)? {
        return Ok(existing);
    }

    conn.query_row(
        "INSERT INTO rating_lists (date) VALUES (?1) RETURNING id, date",
        params![date],
        parse_list_row,
    )
    .context("Failed to insert rating list")
}

pub fn find_list_by_date(conn: &Connection, date: NaiveDate) -> Result<Option<RatingList>> {
    conn.query_row(
        "SELECT id, date FROM rating_lists WHERE date = ?1",
        params![date],
        parse_list_row,
    )
    .optional()
    .context("Failed to query rating list by date")
}

fn parse_list_row(row: &rusqlite::Row) -> rusqlite::Result<RatingList> {
    Ok(RatingList {
        id: row.get(0)?,
        date: row.get(1)?,
    })
}

const RATING_COLUMNS: &str =
    "id, rating_list_id, icu_id, rating, is_full, original_rating, original_full";

pub fn ratings_for_list(conn: &Connection, rating_list_id: i64) -> Result<Vec<IcuRating>> {
    let sql = format!(
        "SELECT {RATING_COLUMNS} FROM icu_ratings WHERE rating_list_id = ?1 ORDER BY icu_id"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![rating_list_id], parse_rating_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// Published ratings for the list dated `date`, for export.
pub fn published_ratings(conn: &Connection, date: NaiveDate) -> Result<Vec<IcuRating>> {
    match find_list_by_date(conn, date)? {
        Some(list) => ratings_for_list(conn, list.id),
        None => Ok(Vec::new()),
    }
}

pub fn insert_rating(
    conn: &Connection,
    rating_list_id: i64,
    icu_id: i64,
    rating: i32,
    full: bool,
    original_rating: i32,
    original_full: bool,
) -> Result<IcuRating> {
    let sql = format!(
        "INSERT INTO icu_ratings \
         (rating_list_id, icu_id, rating, is_full, original_rating, original_full) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING {RATING_COLUMNS}"
    );

    conn.query_row(
        &sql,
        params![rating_list_id, icu_id, rating, full, original_rating, original_full],
        parse_rating_row,
    )
    .context("Failed to insert published rating")
}

/// Revise an already-published row. Originals are only touched inside the
/// grace window; afterwards they stay as first seen.
pub fn update_rating(
    conn: &Connection,
    id: i64,
    rating: i32,
    full: bool,
    revise_originals: bool,
) -> Result<()> {
    let sql = if revise_originals {
        "UPDATE icu_ratings SET rating = ?1, is_full = ?2, \
         original_rating = ?1, original_full = ?2 WHERE id = ?3"
    } else {
        "UPDATE icu_ratings SET rating = ?1, is_full = ?2 WHERE id = ?3"
    };

    conn.execute(sql, params![rating, full, id])
        .context("Failed to update published rating")
        .map(|_| ())
}

pub fn delete_rating(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM icu_ratings WHERE id = ?1", params![id])
        .context("Failed to delete published rating")
        .map(|_| ())
}

fn parse_rating_row(row: &rusqlite::Row) -> rusqlite::Result<IcuRating> {
    Ok(IcuRating {
        id: row.get(0)?,
        rating_list_id: row.get(1)?,
        icu_id: row.get(2)?,
        rating: row.get(3)?,
        full: row.get(4)?,
        original_rating: row.get(5)?,
        original_full: row.get(6)?,
    })
}

pub fn insert_publication(
    conn: &Connection,
    rating_list_id: i64,
    report: &str,
    total: i32,
    creates: i32,
    remains: i32,
    updates: i32,
    deletes: i32,
) -> Result<Publication> {
    conn.query_row(
        "INSERT INTO publications \
         (rating_list_id, report, total, creates, remains, updates, deletes) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
         RETURNING id, rating_list_id, report, total, creates, remains, updates, deletes, created_at",
        params![rating_list_id, report, total, creates, remains, updates, deletes],
        parse_publication_row,
    )
    .context("Failed to insert publication")
}

pub fn publications_for_list(conn: &Connection, rating_list_id: i64) -> Result<Vec<Publication>> {
    let mut stmt = conn.prepare(
        "SELECT id, rating_list_id, report, total, creates, remains, updates, deletes, created_at \
         FROM publications WHERE rating_list_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![rating_list_id], parse_publication_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

fn parse_publication_row(row: &rusqlite::Row) -> rusqlite::Result<Publication> {
    Ok(Publication {
        id: row.get(0)?,
        rating_list_id: row.get(1)?,
        report: row.get(2)?,
        total: row.get(3)?,
        creates: row.get(4)?,
        remains: row.get(5)?,
        updates: row.get(6)?,
        deletes: row.get(7)?,
        created_at: row.get(8)?,
    })
}
