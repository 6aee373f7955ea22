use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::models::{Colour, Outcome, PlayerCategory};

/// Immutable view of one tournament handed to the rating engine and the
/// signature computation. Cross-references are integer ids and pairing
/// numbers only; there are no live object links back into the database
/// layer, so the engine cannot mutate shared state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentSnapshot {
    pub id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub finish_date: NaiveDate,
    pub rorder: Option<i64>,
    /// Players sorted by pairing number.
    pub players: Vec<PlayerSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: i64,
    pub num: i32,
    pub name: String,
    pub category: PlayerCategory,
    pub icu_id: Option<i64>,
    pub fide_rating: Option<i32>,
    /// Rating inherited from this person's preceding rated appearance,
    /// or from the legacy list, or absent for a first appearance.
    pub old_rating: Option<f64>,
    pub old_games: i32,
    pub old_full: bool,
    /// Results sorted by round.
    pub results: Vec<ResultSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSnapshot {
    pub id: i64,
    pub round: i32,
    pub score: Outcome,
    pub colour: Option<Colour>,
    pub opponent_id: Option<i64>,
    pub opponent_num: Option<i32>,
    pub rateable: bool,
}

impl TournamentSnapshot {
    pub fn player_by_num(&self, num: i32) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|p| p.num == num)
    }
}

impl PlayerSnapshot {
    /// Results that count for rating: flagged rateable and against a real
    /// opponent (byes and walkovers carry no opponent).
    pub fn rateable_results(&self) -> impl Iterator<Item = &ResultSnapshot> {
        self.results
            .iter()
            .filter(|r| r.rateable && r.opponent_num.is_some())
    }
}
