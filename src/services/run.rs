//! Batch rating of a contiguous rorder range. A run is created in the
//! `waiting` state after validation, picked up by the worker, and walks the
//! queue one tournament at a time. Each tournament is rated inside its own
//! transaction: a failure stops the run but keeps everything already rated.

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;

use crate::config::settings::AppConfig;
use crate::database::models::{RatingRun, Tournament};
use crate::database::{players, results, runs, tournaments, DbConn};
use crate::domain::{PlayerCategory, RunStatus, Stage};
use crate::errors::RatingError;
use crate::queue::ordering::{last_for_rating, next_for_rating};
use crate::queue::signature::compute_signature;
use crate::rating::{EloEngine, RatingEngine};

pub struct RatingRunCoordinator {
    engine: EloEngine,
}

impl RatingRunCoordinator {
    pub fn new(config: AppConfig) -> Self {
        Self {
            engine: EloEngine::new(config.rating),
        }
    }

    /// Validate and persist a new `waiting` run. Validation failures never
    /// leave a run behind.
    pub fn create_run(
        &self,
        conn: &mut DbConn,
        start_id: i64,
        last_id: Option<i64>,
    ) -> Result<RatingRun> {
        let tx = conn.transaction()?;

        if runs::any_active(&tx)? {
            return Err(RatingError::validation(
                "another rating run is already waiting or processing",
            )
            .into());
        }

        let start = tournaments::get(&tx, start_id)?;
        let start_rorder = start.rorder.ok_or_else(|| {
            RatingError::validation(format!(
                "tournament {} ({}) is not in the rating queue",
                start.id, start.name
            ))
        })?;

        let next = next_for_rating(&tx)?.ok_or_else(|| {
            RatingError::validation("no tournaments are waiting to be rated")
        })?;
        if next.id != start.id {
            return Err(RatingError::out_of_order(format!(
                "tournament {} ({}) is not next for rating; {} ({}) is",
                start.id, start.name, next.id, next.name
            ))
            .into());
        }

        let last = match last_id {
            Some(id) => tournaments::get(&tx, id)?,
            None => last_for_rating(&tx)?.ok_or_else(|| {
                RatingError::validation("no last tournament for rating could be determined")
            })?,
        };
        let last_rorder = last.rorder.ok_or_else(|| {
            RatingError::validation(format!(
                "tournament {} ({}) is not in the rating queue",
                last.id, last.name
            ))
        })?;
        if last_rorder <= start_rorder {
            return Err(RatingError::validation(format!(
                "rorder of the last tournament ({}) must exceed that of the start ({})",
                last_rorder, start_rorder
            ))
            .into());
        }

        let run = runs::insert_run(&tx, start.id, last.id, start_rorder, last_rorder)?;
        tx.commit()?;

        log::info!(
            "Rating run {} created for rorder {} to {}",
            run.id,
            start_rorder,
            last_rorder
        );
        Ok(run)
    }

    /// Execute a claimed run to completion or first failure.
    pub fn process(&self, conn: &mut DbConn, run_id: i64) -> Result<RatingRun> {
        let run = runs::find_by_id(conn, run_id)?
            .ok_or_else(|| RatingError::validation(format!("rating run {} not found", run_id)))?;

        match run.status {
            RunStatus::Processing => {}
            RunStatus::Waiting => {
                runs::claim(conn, run.id, Utc::now().naive_utc())?;
            }
            other => {
                return Err(RatingError::validation(format!(
                    "rating run {} is '{}', nothing to process",
                    run.id,
                    other.as_str()
                ))
                .into())
            }
        }

        let mut report = Report::new(run.report.clone());
        report.add(&format!(
            "Starting rating run {}: rorder {} to {}",
            run.id, run.start_rorder, run.last_rorder
        ));
        runs::update_report(conn, run.id, report.text())?;

        for expected_rorder in run.start_rorder..=run.last_rorder {
            match self.rate_next(conn, expected_rorder) {
                Ok(tournament) => {
                    report.add(&format!(
                        "Rated tournament {} ({}) at rorder {}",
                        tournament.id, tournament.name, expected_rorder
                    ));
                    runs::update_report(conn, run.id, report.text())?;
                }
                Err(error) => {
                    return self.abort_run(conn, &run, &mut report, error);
                }
            }
        }

        report.add("Finished");
        runs::update_report(conn, run.id, report.text())?;
        runs::set_status(conn, run.id, RunStatus::Finished)?;
        log::info!("Rating run {} finished", run.id);

        Ok(runs::find_by_id(conn, run.id)?.expect("run row just updated"))
    }

    fn abort_run(
        &self,
        conn: &mut DbConn,
        run: &RatingRun,
        report: &mut Report,
        error: anyhow::Error,
    ) -> Result<RatingRun> {
        if error.downcast_ref::<RatingError>().is_some() {
            report.add(&format!("Stopped: {}", error));
        } else {
            runs::insert_failure(conn, &error.to_string(), Some(&format!("{:?}", error)))?;
            report.add(&format!("Stopped on unexpected error: {}", error));
        }
        runs::update_report(conn, run.id, report.text())?;
        runs::set_status(conn, run.id, RunStatus::Error)?;
        log::error!("Rating run {} stopped: {}", run.id, error);

        Ok(runs::find_by_id(conn, run.id)?.expect("run row just updated"))
    }

    /// Rate the tournament expected at this rorder, guarding against the
    /// queue having shifted underneath the run. One transaction per
    /// tournament: a later failure never unwinds this one.
    fn rate_next(&self, conn: &mut DbConn, expected_rorder: i64) -> Result<Tournament> {
        let tx = conn.transaction()?;

        let tournament = tournaments::find_by_rorder(&tx, expected_rorder)?.ok_or_else(|| {
            RatingError::out_of_order(format!(
                "no tournament holds rorder {}",
                expected_rorder
            ))
        })?;
        let next = next_for_rating(&tx)?.ok_or_else(|| {
            RatingError::out_of_order(format!(
                "expected tournament {} ({}) to be next for rating, but nothing is",
                tournament.id, tournament.name
            ))
        })?;
        if next.id != tournament.id {
            return Err(RatingError::out_of_order(format!(
                "expected tournament {} ({}) to be next for rating, found {} ({})",
                tournament.id, tournament.name, next.id, next.name
            ))
            .into());
        }

        self.rate_one(&tx, &tournament)?;
        tx.commit()?;
        Ok(tournament)
    }

    fn rate_one(&self, tx: &Connection, tournament: &Tournament) -> Result<()> {
        let rorder = tournament.rorder.ok_or_else(|| {
            RatingError::validation(format!(
                "tournament {} has no rorder",
                tournament.id
            ))
        })?;

        self.resolve_inputs(tx, tournament, rorder)?;

        let snapshot = tournaments::load_snapshot(tx, tournament.id)?;
        let outcomes = self.engine.rate(&snapshot)?;
        for outcome in &outcomes {
            players::save_rating_outcome(tx, outcome)?;
            for result in &outcome.results {
                results::set_rating_fields(
                    tx,
                    result.result_id,
                    result.expected_score,
                    result.rating_change,
                )?;
            }
        }

        let signature = compute_signature(&snapshot);
        tournaments::mark_rated(
            tx,
            tournament.id,
            &signature,
            tournament.stage == Stage::Rated,
            Utc::now().naive_utc(),
        )?;

        Ok(())
    }

    /// Resolve each player's inherited inputs: their own preceding rated
    /// appearance first, the legacy list second, nothing for a first
    /// appearance. Foreign guests are pinned to their FIDE rating.
    fn resolve_inputs(&self, tx: &Connection, tournament: &Tournament, rorder: i64) -> Result<()> {
        let entrants = players::list_by_tournament(tx, tournament.id)?;
        for player in &entrants {
            let (old_rating, old_games, old_full, last_player_id) = match player.category {
                PlayerCategory::ForeignPlayer => {
                    (player.fide_rating.map(f64::from), 0, true, None)
                }
                PlayerCategory::IcuPlayer => match player.icu_id {
                    Some(icu_id) => {
                        match players::previous_rated_appearance(tx, icu_id, rorder)? {
                            Some(prev) => (
                                prev.new_rating,
                                prev.new_games.unwrap_or(0),
                                prev.new_full.unwrap_or(false),
                                Some(prev.id),
                            ),
                            None => {
                                match crate::database::members::legacy_rating_for(tx, icu_id)? {
                                    Some(legacy) => (
                                        Some(f64::from(legacy.rating)),
                                        legacy.games,
                                        legacy.full,
                                        None,
                                    ),
                                    None => (None, 0, false, None),
                                }
                            }
                        }
                    }
                    None => (None, 0, false, None),
                },
                PlayerCategory::NewPlayer => (None, 0, false, None),
            };
            players::set_rating_inputs(
                tx,
                player.id,
                old_rating,
                old_games,
                old_full,
                last_player_id,
            )?;
        }
        Ok(())
    }
}

/// Timestamped progress log persisted after every step so an administrator
/// can watch a run advance.
struct Report {
    text: String,
}

impl Report {
    fn new(existing: String) -> Self {
        Self { text: existing }
    }

    fn add(&mut self, message: &str) {
        let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(&format!("[{}] {}", stamp, message));
    }

    fn text(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ordering::queue_tournament;
    use crate::testing;

    fn coordinator() -> RatingRunCoordinator {
        RatingRunCoordinator::new(AppConfig::new())
    }

    #[test]
    fn create_run_requires_start_to_be_next() {
        let mut conn = testing::connection();
        let (t1, _t2, t3) = testing::three_queued_tournaments(&mut conn);

        let err = coordinator()
            .create_run(&mut conn, t3.id, None)
            .unwrap_err();
        assert!(err.to_string().contains("not next for rating"));

        // and the valid start works
        let run = coordinator().create_run(&mut conn, t1.id, None).unwrap();
        assert_eq!(run.status, RunStatus::Waiting);
        assert_eq!(run.start_rorder, 1);
        assert_eq!(run.last_rorder, 3);
    }

    #[test]
    fn create_run_rejects_rivals() {
        let mut conn = testing::connection();
        let (t1, _, _) = testing::three_queued_tournaments(&mut conn);

        coordinator().create_run(&mut conn, t1.id, None).unwrap();
        let err = coordinator()
            .create_run(&mut conn, t1.id, None)
            .unwrap_err();
        assert!(err.to_string().contains("already waiting or processing"));
    }

    #[test]
    fn create_run_rejects_inverted_range() {
        let mut conn = testing::connection();
        let (t1, _, _) = testing::three_queued_tournaments(&mut conn);

        let err = coordinator()
            .create_run(&mut conn, t1.id, Some(t1.id))
            .unwrap_err();
        assert!(err.to_string().contains("must exceed"));
    }

    #[test]
    fn process_rates_whole_range() {
        let mut conn = testing::connection();
        let (t1, t2, t3) = testing::three_queued_tournaments(&mut conn);

        let run = coordinator().create_run(&mut conn, t1.id, None).unwrap();
        let done = coordinator().process(&mut conn, run.id).unwrap();
        assert_eq!(done.status, RunStatus::Finished);
        assert!(done.report.contains("Finished"));

        for t in [&t1, &t2, &t3] {
            let rated = tournaments::get(&conn, t.id).unwrap();
            assert_eq!(rated.stage, Stage::Rated);
            assert!(rated.last_signature.is_some());
            assert_eq!(rated.last_signature, rated.curr_signature);
            assert!(rated.first_rated.is_some());
        }

        // player carried a rating from t1 into t2
        let t2_players = players::list_by_tournament(&conn, t2.id).unwrap();
        let carrier = t2_players.iter().find(|p| p.icu_id == Some(101)).unwrap();
        assert!(carrier.old_rating.is_some());
        assert!(carrier.last_player_id.is_some());
        assert!(carrier.new_rating.is_some());
    }

    #[test]
    fn rerating_unchanged_tournament_is_idempotent() {
        let mut conn = testing::connection();
        let (t1, _, _) = testing::three_queued_tournaments(&mut conn);

        let run = coordinator().create_run(&mut conn, t1.id, None).unwrap();
        coordinator().process(&mut conn, run.id).unwrap();

        let before = tournaments::get(&conn, t1.id).unwrap();
        let players_before = players::list_by_tournament(&conn, t1.id).unwrap();

        // force a rerate of everything without changing any data
        for t in tournaments::all_in_queue(&conn).unwrap() {
            tournaments::clear_last_signature(&conn, t.id).unwrap();
        }
        let rerun = coordinator()
            .create_run(&mut conn, t1.id, None)
            .unwrap();
        let done = coordinator().process(&mut conn, rerun.id).unwrap();
        assert_eq!(done.status, RunStatus::Finished);

        let after = tournaments::get(&conn, t1.id).unwrap();
        assert_eq!(before.curr_signature, after.curr_signature);
        assert_eq!(after.reratings, before.reratings + 1);

        let players_after = players::list_by_tournament(&conn, t1.id).unwrap();
        for (a, b) in players_before.iter().zip(players_after.iter()) {
            assert_eq!(a.new_rating, b.new_rating);
            assert_eq!(a.new_games, b.new_games);
            assert_eq!(a.expected_score, b.expected_score);
        }
    }

    #[test]
    fn concurrent_modification_stops_run_and_keeps_progress() {
        let mut conn = testing::connection();
        let (t1, t2, t3) = testing::three_queued_tournaments(&mut conn);

        let run = coordinator().create_run(&mut conn, t1.id, None).unwrap();

        // Between creation and processing, t2 is tampered with so it no
        // longer reads as next when its turn comes.
        tournaments::set_stage(&conn, t2.id, Stage::Rated).unwrap();
        conn.execute(
            "UPDATE tournaments SET last_signature = 'x', curr_signature = 'x' WHERE id = ?1",
            rusqlite::params![t2.id],
        )
        .unwrap();

        let done = coordinator().process(&mut conn, run.id).unwrap();
        assert_eq!(done.status, RunStatus::Error);
        assert!(done.report.contains("to be next for rating"));

        assert_eq!(tournaments::get(&conn, t1.id).unwrap().stage, Stage::Rated);
        let t3_after = tournaments::get(&conn, t3.id).unwrap();
        assert_eq!(t3_after.stage, Stage::Queued);
        let t3_players = players::list_by_tournament(&conn, t3.id).unwrap();
        assert!(t3_players.iter().all(|p| p.new_rating.is_none()));
    }

    #[test]
    fn dirty_earlier_tournament_blocks_later_run() {
        let mut conn = testing::connection();
        let (t1, t2, _) = testing::three_queued_tournaments(&mut conn);

        let run = coordinator().create_run(&mut conn, t1.id, None).unwrap();
        coordinator().process(&mut conn, run.id).unwrap();

        // edit a result in the rated t1: it goes dirty
        let t1_players = players::list_by_tournament(&conn, t1.id).unwrap();
        crate::queue::signature::record_result(
            &mut conn,
            t1_players[0].id,
            1,
            crate::domain::Outcome::Loss,
            Some(crate::domain::Colour::White),
            Some(t1_players[1].id),
            true,
        )
        .unwrap();
        let dirty = tournaments::get(&conn, t1.id).unwrap();
        assert!(dirty.dirty());

        // a run starting after the dirty tournament must be refused
        let err = coordinator()
            .create_run(&mut conn, t2.id, None)
            .unwrap_err();
        let rating_err = err.downcast_ref::<RatingError>().expect("domain error");
        assert!(matches!(rating_err, RatingError::OutOfOrder { .. }));
    }

    #[test]
    fn foreign_players_do_not_join_icu_rating_flow() {
        let mut conn = testing::connection();
        let t = testing::tournament_with_foreign_guest(&mut conn);
        queue_tournament(&mut conn, t.id).unwrap();
        // a second tournament so the range is non-trivial
        let t2 = testing::simple_tournament(&mut conn, "Followup", "2012-02-04", "2012-02-05");
        queue_tournament(&mut conn, t2.id).unwrap();

        let run = coordinator().create_run(&mut conn, t.id, None).unwrap();
        let done = coordinator().process(&mut conn, run.id).unwrap();
        assert_eq!(done.status, RunStatus::Finished);

        let entrants = players::list_by_tournament(&conn, t.id).unwrap();
        let guest = entrants
            .iter()
            .find(|p| p.category == PlayerCategory::ForeignPlayer)
            .unwrap();
        assert_eq!(guest.old_rating, guest.new_rating);
        assert_eq!(guest.k_factor, None);
    }
}
