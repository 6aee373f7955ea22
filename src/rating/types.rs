use serde::{Deserialize, Serialize};

/// Everything the engine decides about one player in one tournament.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRatingOutcome {
    pub player_id: i64,
    /// Absent only for an unrateable player with no prior rating to carry.
    pub new_rating: Option<f64>,
    pub new_games: i32,
    pub new_full: bool,
    /// Set for full-rated members only; None signals the provisional or
    /// unrated update rules applied instead.
    pub k_factor: Option<f64>,
    pub bonus: Option<f64>,
    pub actual_score: Option<f64>,
    pub expected_score: Option<f64>,
    /// Performance rating over this tournament alone; None with zero
    /// rateable games.
    pub trn_rating: Option<f64>,
    pub unrateable: bool,
    pub results: Vec<ResultRatingOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRatingOutcome {
    pub result_id: i64,
    pub expected_score: Option<f64>,
    pub rating_change: Option<f64>,
}
