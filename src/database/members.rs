//! Read-only external feeds: the member directory, season subscriptions and
//! the pre-list-system legacy ratings. The service queries these by id but
//! does not own their contents; the insert helpers exist for seeding.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{conversion_error, IcuPlayer, LegacyRating, Subscription};
use crate::domain::SubscriptionCategory;

pub fn insert_icu_player(conn: &Connection, id: i64, name: &str) -> Result<IcuPlayer> {
    conn.query_row(
        "INSERT INTO icu_players (id, name) VALUES (?1, ?2) RETURNING id, name",
        params![id, name],
        |row| {
            Ok(IcuPlayer {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    )
    .context("Failed to insert ICU player")
}

pub fn find_icu_player(conn: &Connection, id: i64) -> Result<Option<IcuPlayer>> {
    conn.query_row(
        "SELECT id, name FROM icu_players WHERE id = ?1",
        params![id],
        |row| {
            Ok(IcuPlayer {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    )
    .optional()
    .context("Failed to query ICU player")
}

pub fn insert_subscription(
    conn: &Connection,
    icu_id: i64,
    season: i32,
    category: SubscriptionCategory,
    pay_date: Option<NaiveDate>,
) -> Result<Subscription> {
    conn.query_row(
        "INSERT INTO subscriptions (icu_id, season, category, pay_date) \
         VALUES (?1, ?2, ?3, ?4) RETURNING id, icu_id, season, category, pay_date",
        params![icu_id, season, category.as_str(), pay_date],
        parse_subscription_row,
    )
    .context("Failed to insert subscription")
}

/// Members eligible for a list: lifetime subscribers, plus annual
/// subscribers for the season who paid on or before the cut-off date.
pub fn eligible_icu_ids(
    conn: &Connection,
    season: i32,
    pay_cutoff: NaiveDate,
) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT icu_id FROM subscriptions \
         WHERE category = 'lifetime' \
            OR (season = ?1 AND pay_date IS NOT NULL AND pay_date <= ?2) \
         ORDER BY icu_id",
    )?;
    let rows = stmt
        .query_map(params![season, pay_cutoff], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;

    Ok(rows)
}

pub fn insert_legacy_rating(
    conn: &Connection,
    icu_id: i64,
    rating: i32,
    games: i32,
    full: bool,
) -> Result<LegacyRating> {
    conn.query_row(
        "INSERT INTO legacy_ratings (icu_id, rating, games, is_full) \
         VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT (icu_id) DO UPDATE SET \
         rating = excluded.rating, games = excluded.games, is_full = excluded.is_full \
         RETURNING icu_id, rating, games, is_full",
        params![icu_id, rating, games, full],
        parse_legacy_row,
    )
    .context("Failed to insert legacy rating")
}

pub fn legacy_rating_for(conn: &Connection, icu_id: i64) -> Result<Option<LegacyRating>> {
    conn.query_row(
        "SELECT icu_id, rating, games, is_full FROM legacy_ratings WHERE icu_id = ?1",
        params![icu_id],
        parse_legacy_row,
    )
    .optional()
    .context("Failed to query legacy rating")
}

fn parse_subscription_row(row: &rusqlite::Row) -> rusqlite::Result<Subscription> {
    let category: String = row.get(3)?;
    Ok(Subscription {
        id: row.get(0)?,
        icu_id: row.get(1)?,
        season: row.get(2)?,
        category: SubscriptionCategory::parse(&category).map_err(|e| conversion_error(3, e))?,
        pay_date: row.get(4)?,
    })
}

fn parse_legacy_row(row: &rusqlite::Row) -> rusqlite::Result<LegacyRating> {
    Ok(LegacyRating {
        icu_id: row.get(0)?,
        rating: row.get(1)?,
        games: row.get(2)?,
        full: row.get(3)?,
    })
}
