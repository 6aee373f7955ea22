use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::{Colour, Outcome, PlayerCategory, RunStatus, Stage, SubscriptionCategory};

#[derive(Debug, Clone)]
pub struct Tournament {
    pub id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub finish_date: NaiveDate,
    pub stage: Stage,
    pub rorder: Option<i64>,
    pub last_tournament_id: Option<i64>,
    pub next_tournament_id: Option<i64>,
    pub last_signature: Option<String>,
    pub curr_signature: Option<String>,
    pub reratings: i32,
    pub first_rated: Option<NaiveDateTime>,
    pub last_rated: Option<NaiveDateTime>,
    pub locked: bool,
    pub created_at: Option<NaiveDateTime>,
}

impl Tournament {
    /// A rated tournament whose data changed since its last successful
    /// rating must be re-rated before anything after it in rorder.
    pub fn dirty(&self) -> bool {
        self.stage == Stage::Rated && self.last_signature != self.curr_signature
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: i64,
    pub tournament_id: i64,
    pub num: i32,
    pub name: String,
    pub category: PlayerCategory,
    pub icu_id: Option<i64>,
    pub fide_rating: Option<i32>,
    pub old_rating: Option<f64>,
    pub old_games: i32,
    pub old_full: bool,
    pub new_rating: Option<f64>,
    pub new_games: Option<i32>,
    pub new_full: Option<bool>,
    pub k_factor: Option<f64>,
    pub bonus: Option<f64>,
    pub actual_score: Option<f64>,
    pub expected_score: Option<f64>,
    pub trn_rating: Option<f64>,
    pub unrateable: bool,
    pub last_player_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct GameResult {
    pub id: i64,
    pub player_id: i64,
    pub round: i32,
    pub opponent_id: Option<i64>,
    pub score: Outcome,
    pub colour: Option<Colour>,
    pub rateable: bool,
    pub expected_score: Option<f64>,
    pub rating_change: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct RatingList {
    pub id: i64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct Publication {
    pub id: i64,
    pub rating_list_id: i64,
    pub report: String,
    pub total: i32,
    pub creates: i32,
    pub remains: i32,
    pub updates: i32,
    pub deletes: i32,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcuRating {
    pub id: i64,
    pub rating_list_id: i64,
    pub icu_id: i64,
    pub rating: i32,
    pub full: bool,
    pub original_rating: i32,
    pub original_full: bool,
}

#[derive(Debug, Clone)]
pub struct RatingRun {
    pub id: i64,
    pub start_tournament_id: i64,
    pub last_tournament_id: i64,
    pub start_rorder: i64,
    pub last_rorder: i64,
    pub status: RunStatus,
    pub report: String,
    pub claimed_at: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct IcuPlayer {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: i64,
    pub icu_id: i64,
    pub season: i32,
    pub category: SubscriptionCategory,
    pub pay_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct LegacyRating {
    pub icu_id: i64,
    pub rating: i32,
    pub games: i32,
    pub full: bool,
}

/// Map a stored string that fails to parse into a closed enum onto a
/// rusqlite conversion error, so bad rows surface instead of panicking.
pub(crate) fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        message.into(),
    )
}
