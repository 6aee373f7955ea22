//! Elo-style rating calculation. Three update rules apply depending on a
//! player's history: K-factor Elo for full ratings, a performance-weighted
//! average for provisional ratings, and an iterated tournament performance
//! estimate for first appearances. Foreign guests keep their FIDE rating
//! fixed and only act as opponents.

use std::collections::HashMap;

use anyhow::Result;

use super::engine::RatingEngine;
use super::types::{PlayerRatingOutcome, ResultRatingOutcome};
use crate::config::settings::RatingSettings;
use crate::domain::{PlayerCategory, PlayerSnapshot, ResultSnapshot, TournamentSnapshot};

const ELO_DIVISOR: f64 = 400.0;
const INITIAL_ESTIMATE: f64 = 1000.0;
const CONVERGENCE_TOLERANCE: f64 = 0.5;

pub struct EloEngine {
    settings: RatingSettings,
}

impl EloEngine {
    pub fn new(settings: RatingSettings) -> Self {
        Self { settings }
    }

    /// The rating a player faces opponents with during this calculation:
    /// FIDE rating for foreign guests, the inherited rating for members,
    /// an iterated performance estimate for everyone without one.
    fn resolve_values(&self, tournament: &TournamentSnapshot) -> HashMap<i32, f64> {
        let mut values = HashMap::new();
        let mut unanchored = Vec::new();

        for player in &tournament.players {
            match self.anchor(player) {
                Some(anchor) => {
                    values.insert(player.num, anchor);
                }
                None => unanchored.push(player),
            }
        }

        for player in &unanchored {
            let seed = self
                .average_opponent_value(player, &values)
                .unwrap_or(INITIAL_ESTIMATE);
            values.insert(player.num, seed);
        }

        for _ in 0..self.settings.performance_iterations {
            let mut next = Vec::with_capacity(unanchored.len());
            let mut max_delta: f64 = 0.0;
            for player in &unanchored {
                let current = values[&player.num];
                let estimate = self.performance(player, &values).unwrap_or(current);
                max_delta = max_delta.max((estimate - current).abs());
                next.push((player.num, estimate));
            }
            for (num, estimate) in next {
                values.insert(num, estimate);
            }
            if max_delta < CONVERGENCE_TOLERANCE {
                break;
            }
        }

        values
    }

    fn anchor(&self, player: &PlayerSnapshot) -> Option<f64> {
        match player.category {
            PlayerCategory::ForeignPlayer => {
                player.fide_rating.map(f64::from).or(player.old_rating)
            }
            _ => player.old_rating,
        }
    }

    fn average_opponent_value(
        &self,
        player: &PlayerSnapshot,
        values: &HashMap<i32, f64>,
    ) -> Option<f64> {
        let opponents: Vec<f64> = player
            .rateable_results()
            .filter_map(|r| r.opponent_num.and_then(|num| values.get(&num)))
            .copied()
            .collect();
        if opponents.is_empty() {
            return None;
        }
        Some(opponents.iter().sum::<f64>() / opponents.len() as f64)
    }

    /// Classic single-shot performance rating: average opponent plus the
    /// spread weighted by net score.
    fn performance(&self, player: &PlayerSnapshot, values: &HashMap<i32, f64>) -> Option<f64> {
        let games = self.rateable_games(player, values);
        if games.is_empty() {
            return None;
        }
        let n = games.len() as f64;
        let avg_opponent = games.iter().map(|(_, v)| v).sum::<f64>() / n;
        let net_score: f64 = games.iter().map(|(r, _)| 2.0 * r.score.score() - 1.0).sum();
        Some(avg_opponent + self.settings.performance_spread * net_score / n)
    }

    fn rateable_games<'a>(
        &self,
        player: &'a PlayerSnapshot,
        values: &HashMap<i32, f64>,
    ) -> Vec<(&'a ResultSnapshot, f64)> {
        player
            .rateable_results()
            .filter_map(|r| {
                r.opponent_num
                    .and_then(|num| values.get(&num))
                    .map(|v| (r, *v))
            })
            .collect()
    }

    fn expected_score(own: f64, opponent: f64) -> f64 {
        1.0 / (1.0 + 10f64.powf((opponent - own) / ELO_DIVISOR))
    }

    fn k_factor(&self, player: &PlayerSnapshot) -> f64 {
        let old_rating = player.old_rating.unwrap_or(INITIAL_ESTIMATE);
        if old_rating >= self.settings.master_rating {
            self.settings.k_master
        } else if player.old_games >= self.settings.experienced_games {
            self.settings.k_experienced
        } else {
            self.settings.k_standard
        }
    }

    fn rate_player(
        &self,
        player: &PlayerSnapshot,
        values: &HashMap<i32, f64>,
    ) -> PlayerRatingOutcome {
        let games = self.rateable_games(player, values);

        if games.is_empty() {
            return self.unrateable_outcome(player);
        }

        match player.category {
            PlayerCategory::ForeignPlayer => self.rate_foreign(player, &games, values),
            _ if player.old_rating.is_some() && player.old_full => {
                self.rate_full(player, &games)
            }
            _ if player.old_rating.is_some() => self.rate_provisional(player, &games),
            _ => self.rate_new(player, &games, values),
        }
    }

    /// A player with no rateable games keeps whatever rating they brought.
    fn unrateable_outcome(&self, player: &PlayerSnapshot) -> PlayerRatingOutcome {
        let carried = self.anchor(player);
        PlayerRatingOutcome {
            player_id: player.id,
            new_rating: carried,
            new_games: player.old_games,
            new_full: player.old_full,
            k_factor: None,
            bonus: None,
            actual_score: None,
            expected_score: None,
            trn_rating: None,
            unrateable: true,
            results: Vec::new(),
        }
    }

    fn rate_foreign(
        &self,
        player: &PlayerSnapshot,
        games: &[(&ResultSnapshot, f64)],
        values: &HashMap<i32, f64>,
    ) -> PlayerRatingOutcome {
        let rating = values[&player.num];
        let (actual, expected) = Self::score_totals(rating, games);

        PlayerRatingOutcome {
            player_id: player.id,
            new_rating: Some(rating),
            new_games: player.old_games + games.len() as i32,
            new_full: true,
            k_factor: None,
            bonus: None,
            actual_score: Some(actual),
            expected_score: Some(expected),
            trn_rating: self.performance(player, values),
            unrateable: false,
            results: games
                .iter()
                .map(|(r, opp)| ResultRatingOutcome {
                    result_id: r.id,
                    expected_score: Some(Self::expected_score(rating, *opp)),
                    rating_change: None,
                })
                .collect(),
        }
    }

    fn rate_full(
        &self,
        player: &PlayerSnapshot,
        games: &[(&ResultSnapshot, f64)],
    ) -> PlayerRatingOutcome {
        let old_rating = player.old_rating.unwrap_or(INITIAL_ESTIMATE);
        let (actual, expected) = Self::score_totals(old_rating, games);
        let k = self.k_factor(player);
        let change = k * (actual - expected);

        let bonus = if k == self.settings.k_standard && change > self.settings.bonus_threshold {
            Some((change - self.settings.bonus_threshold).round())
        } else {
            None
        };

        PlayerRatingOutcome {
            player_id: player.id,
            new_rating: Some(old_rating + change + bonus.unwrap_or(0.0)),
            new_games: player.old_games + games.len() as i32,
            new_full: true,
            k_factor: Some(k),
            bonus,
            actual_score: Some(actual),
            expected_score: Some(expected),
            trn_rating: self.tournament_performance(games),
            unrateable: false,
            results: games
                .iter()
                .map(|(r, opp)| {
                    let e = Self::expected_score(old_rating, *opp);
                    ResultRatingOutcome {
                        result_id: r.id,
                        expected_score: Some(e),
                        rating_change: Some(k * (r.score.score() - e)),
                    }
                })
                .collect(),
        }
    }

    /// Provisional ratings average prior weight with this tournament's
    /// per-game performance values instead of applying a K-factor.
    fn rate_provisional(
        &self,
        player: &PlayerSnapshot,
        games: &[(&ResultSnapshot, f64)],
    ) -> PlayerRatingOutcome {
        let old_rating = player.old_rating.unwrap_or(INITIAL_ESTIMATE);
        let (actual, expected) = Self::score_totals(old_rating, games);
        let n = games.len() as i32;

        let game_values: f64 = games
            .iter()
            .map(|(r, opp)| opp + self.settings.performance_spread * (2.0 * r.score.score() - 1.0))
            .sum();
        let new_games = player.old_games + n;
        let new_rating =
            (old_rating * player.old_games as f64 + game_values) / new_games as f64;

        PlayerRatingOutcome {
            player_id: player.id,
            new_rating: Some(new_rating),
            new_games,
            new_full: new_games >= self.settings.full_rating_games,
            k_factor: None,
            bonus: None,
            actual_score: Some(actual),
            expected_score: Some(expected),
            trn_rating: self.tournament_performance(games),
            unrateable: false,
            results: games
                .iter()
                .map(|(r, opp)| ResultRatingOutcome {
                    result_id: r.id,
                    expected_score: Some(Self::expected_score(old_rating, *opp)),
                    rating_change: None,
                })
                .collect(),
        }
    }

    fn rate_new(
        &self,
        player: &PlayerSnapshot,
        games: &[(&ResultSnapshot, f64)],
        values: &HashMap<i32, f64>,
    ) -> PlayerRatingOutcome {
        let estimate = values[&player.num];
        let (actual, expected) = Self::score_totals(estimate, games);
        let n = games.len() as i32;

        PlayerRatingOutcome {
            player_id: player.id,
            new_rating: Some(estimate),
            new_games: n,
            new_full: n >= self.settings.full_rating_games,
            k_factor: None,
            bonus: None,
            actual_score: Some(actual),
            expected_score: Some(expected),
            trn_rating: self.tournament_performance(games),
            unrateable: false,
            results: games
                .iter()
                .map(|(r, opp)| ResultRatingOutcome {
                    result_id: r.id,
                    expected_score: Some(Self::expected_score(estimate, *opp)),
                    rating_change: None,
                })
                .collect(),
        }
    }

    fn score_totals(own: f64, games: &[(&ResultSnapshot, f64)]) -> (f64, f64) {
        let actual = games.iter().map(|(r, _)| r.score.score()).sum();
        let expected = games
            .iter()
            .map(|(_, opp)| Self::expected_score(own, *opp))
            .sum();
        (actual, expected)
    }

    /// Performance rating over this tournament's games only.
    fn tournament_performance(&self, games: &[(&ResultSnapshot, f64)]) -> Option<f64> {
        if games.is_empty() {
            return None;
        }
        let n = games.len() as f64;
        let avg_opponent = games.iter().map(|(_, v)| v).sum::<f64>() / n;
        let net_score: f64 = games.iter().map(|(r, _)| 2.0 * r.score.score() - 1.0).sum();
        Some(avg_opponent + self.settings.performance_spread * net_score / n)
    }
}

impl RatingEngine for EloEngine {
    fn rate(&self, tournament: &TournamentSnapshot) -> Result<Vec<PlayerRatingOutcome>> {
        let values = self.resolve_values(tournament);
        Ok(tournament
            .players
            .iter()
            .map(|p| self.rate_player(p, &values))
            .collect())
    }
}
