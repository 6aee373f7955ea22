use anyhow::Result;

use super::types::PlayerRatingOutcome;
use crate::domain::TournamentSnapshot;

/// Boundary to the rating calculation proper. The caller hands over an
/// immutable tournament snapshot with every player's inherited inputs
/// (old_rating, old_games, old_full) already resolved, and gets back one
/// outcome per player.
///
/// Implementations must be deterministic: identical snapshots produce
/// identical outcomes. The signature-based rerate detection is unsound
/// otherwise.
pub trait RatingEngine: Send + Sync {
    fn rate(&self, tournament: &TournamentSnapshot) -> Result<Vec<PlayerRatingOutcome>>;
}
