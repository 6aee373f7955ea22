//! Change detection for rated tournaments. A signature is a deterministic
//! fingerprint of everything the rating calculation depends on: each player
//! and each of their results as a (round, outcome, opponent) triple. The
//! signature captured at rating time (`last_signature`) is compared against
//! the current data (`curr_signature`); a mismatch marks the tournament as
//! needing a rerate without rerating anything automatically.

use anyhow::Result;
use rusqlite::Connection;

use crate::database::{players, results, tournaments, DbConn};
use crate::domain::{Colour, Outcome, Stage, TournamentSnapshot};
use crate::errors::RatingError;

pub fn compute_signature(snapshot: &TournamentSnapshot) -> String {
    let mut parts = Vec::with_capacity(snapshot.players.len());
    for player in &snapshot.players {
        let mut entry = player.id.to_string();
        for result in &player.results {
            entry.push_str(&format!(
                " {}{}{}",
                result.round,
                result.score.as_str(),
                result.opponent_id.unwrap_or(0)
            ));
        }
        parts.push(entry);
    }
    parts.join("|")
}

/// Recompute and store `curr_signature` from the tournament's present data.
pub fn refresh_curr_signature(conn: &Connection, tournament_id: i64) -> Result<String> {
    let snapshot = tournaments::load_snapshot(conn, tournament_id)?;
    let signature = compute_signature(&snapshot);
    tournaments::set_curr_signature(conn, tournament_id, &signature)?;
    Ok(signature)
}

/// Record one game result and keep the opponent's mirrored result in step:
/// same round, opposite outcome and colour, written in the same transaction.
/// On a rated tournament the current signature is refreshed so the
/// tournament reads as dirty until re-rated.
#[allow(clippy::too_many_arguments)]
pub fn record_result(
    conn: &mut DbConn,
    player_id: i64,
    round: i32,
    score: Outcome,
    colour: Option<Colour>,
    opponent_id: Option<i64>,
    rateable: bool,
) -> Result<()> {
    let tx = conn.transaction()?;

    let player = players::find_by_id(&tx, player_id)?
        .ok_or_else(|| RatingError::validation(format!("player {} not found", player_id)))?;
    let tournament = tournaments::get(&tx, player.tournament_id)?;
    if tournament.locked {
        return Err(RatingError::Locked { id: tournament.id }.into());
    }

    if let Some(opponent_id) = opponent_id {
        let opponent = players::find_by_id(&tx, opponent_id)?.ok_or_else(|| {
            RatingError::validation(format!("opponent {} not found", opponent_id))
        })?;
        if opponent.tournament_id != player.tournament_id {
            return Err(RatingError::validation(format!(
                "players {} and {} are not in the same tournament",
                player_id, opponent_id
            ))
            .into());
        }
    }

    results::upsert_result(&tx, player_id, round, opponent_id, score, colour, rateable)?;
    if let Some(opponent_id) = opponent_id {
        results::upsert_result(
            &tx,
            opponent_id,
            round,
            Some(player_id),
            score.opposite(),
            colour.map(|c| c.opposite()),
            rateable,
        )?;
    }

    if tournament.stage == Stage::Rated {
        refresh_curr_signature(&tx, tournament.id)?;
    }

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Tournament;
    use crate::testing;

    fn rate_in_place(conn: &DbConn, tournament_id: i64) -> Tournament {
        let signature = refresh_curr_signature(conn, tournament_id).unwrap();
        conn.execute(
            "UPDATE tournaments SET stage = 'rated', last_signature = ?1 WHERE id = ?2",
            rusqlite::params![signature, tournament_id],
        )
        .unwrap();
        tournaments::get(conn, tournament_id).unwrap()
    }

    #[test]
    fn signature_depends_only_on_the_rating_inputs() {
        let mut conn = testing::connection();
        let t = testing::simple_tournament(&mut conn, "Club Night", "2012-01-03", "2012-01-03");

        let snapshot = tournaments::load_snapshot(&conn, t.id).unwrap();
        let first = compute_signature(&snapshot);
        let again = compute_signature(&snapshot);
        assert_eq!(first, again);
        assert!(!first.is_empty());

        // renaming the tournament does not touch the signature
        conn.execute(
            "UPDATE tournaments SET name = 'Renamed' WHERE id = ?1",
            rusqlite::params![t.id],
        )
        .unwrap();
        let renamed = tournaments::load_snapshot(&conn, t.id).unwrap();
        assert_eq!(compute_signature(&renamed), first);

        // changing a result does
        let entrants = players::list_by_tournament(&conn, t.id).unwrap();
        record_result(
            &mut conn,
            entrants[0].id,
            1,
            Outcome::Win,
            Some(Colour::White),
            Some(entrants[1].id),
            true,
        )
        .unwrap();
        let changed = tournaments::load_snapshot(&conn, t.id).unwrap();
        assert_ne!(compute_signature(&changed), first);
    }

    #[test]
    fn record_result_keeps_the_mirror_in_step() {
        let mut conn = testing::connection();
        let t = testing::simple_tournament(&mut conn, "Club Night", "2012-01-03", "2012-01-03");
        let entrants = players::list_by_tournament(&conn, t.id).unwrap();

        record_result(
            &mut conn,
            entrants[0].id,
            2,
            Outcome::Win,
            Some(Colour::Black),
            Some(entrants[1].id),
            true,
        )
        .unwrap();

        let mirror = crate::database::results::find_for_round(&conn, entrants[1].id, 2)
            .unwrap()
            .unwrap();
        assert_eq!(mirror.score, Outcome::Loss);
        assert_eq!(mirror.colour, Some(Colour::White));
        assert_eq!(mirror.opponent_id, Some(entrants[0].id));
        assert!(mirror.rateable);
    }

    #[test]
    fn editing_a_rated_tournament_marks_it_dirty() {
        let mut conn = testing::connection();
        let t = testing::simple_tournament(&mut conn, "Club Night", "2012-01-03", "2012-01-03");
        let rated = rate_in_place(&conn, t.id);
        assert!(!rated.dirty());

        let entrants = players::list_by_tournament(&conn, t.id).unwrap();
        record_result(
            &mut conn,
            entrants[0].id,
            1,
            Outcome::Loss,
            Some(Colour::White),
            Some(entrants[1].id),
            true,
        )
        .unwrap();

        let edited = tournaments::get(&conn, t.id).unwrap();
        assert!(edited.dirty());

        // restoring the original result restores the clean state
        record_result(
            &mut conn,
            entrants[0].id,
            1,
            Outcome::Draw,
            Some(Colour::White),
            Some(entrants[1].id),
            true,
        )
        .unwrap();
        assert!(!tournaments::get(&conn, t.id).unwrap().dirty());
    }

    #[test]
    fn locked_tournaments_reject_result_changes() {
        let mut conn = testing::connection();
        let t = testing::simple_tournament(&mut conn, "Club Night", "2012-01-03", "2012-01-03");
        tournaments::set_locked(&conn, t.id, true).unwrap();

        let entrants = players::list_by_tournament(&conn, t.id).unwrap();
        let before = results::find_for_round(&conn, entrants[0].id, 1).unwrap().unwrap();

        let err = record_result(
            &mut conn,
            entrants[0].id,
            1,
            Outcome::Win,
            Some(Colour::White),
            Some(entrants[1].id),
            true,
        )
        .unwrap_err();
        let rating_err = err.downcast_ref::<RatingError>().expect("domain error");
        assert!(matches!(rating_err, RatingError::Locked { .. }));

        let after = results::find_for_round(&conn, entrants[0].id, 1).unwrap().unwrap();
        assert_eq!(after.score, before.score);
    }

    #[test]
    fn opponents_must_share_the_tournament() {
        let mut conn = testing::connection();
        let t1 = testing::simple_tournament(&mut conn, "Club Night", "2012-01-03", "2012-01-03");
        let t2 = testing::simple_tournament(&mut conn, "Other Night", "2012-01-10", "2012-01-10");

        let here = players::list_by_tournament(&conn, t1.id).unwrap();
        let there = players::list_by_tournament(&conn, t2.id).unwrap();

        let err = record_result(
            &mut conn,
            here[0].id,
            3,
            Outcome::Win,
            Some(Colour::White),
            Some(there[0].id),
            true,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not in the same tournament"));
    }
}
