//! Shared fixtures for the unit tests: an in-memory database and a handful
//! of seeded tournaments and members.

use chrono::NaiveDate;
use rusqlite::params;

use crate::database::models::Tournament;
use crate::database::{connection, get_connection, members, players, setup, tournaments};
use crate::database::{DbConn, DbPool};
use crate::domain::{Colour, Outcome, PlayerCategory, Stage, SubscriptionCategory};
use crate::queue::ordering::queue_tournament;
use crate::queue::signature::record_result;

pub fn pool_and_connection() -> (DbPool, DbConn) {
    let pool = connection::create_memory_pool().expect("memory pool");
    let mut conn = get_connection(&pool).expect("connection");
    setup::reset_database(&mut conn).expect("schema");
    (pool, conn)
}

pub fn connection() -> DbConn {
    pool_and_connection().1
}

fn date(text: &str) -> NaiveDate {
    text.parse().expect("fixture date")
}

fn ensure_member(conn: &DbConn, icu_id: i64, name: &str) {
    if members::find_icu_player(conn, icu_id).expect("member lookup").is_none() {
        members::insert_icu_player(conn, icu_id, name).expect("member");
    }
}

/// An ICU player with an annual subscription for the given season.
pub fn member(conn: &mut DbConn, icu_id: i64, name: &str, season: i32, pay_date: NaiveDate) {
    ensure_member(conn, icu_id, name);
    members::insert_subscription(
        conn,
        icu_id,
        season,
        SubscriptionCategory::Annual,
        Some(pay_date),
    )
    .expect("subscription");
}

/// A two-player tournament with a single drawn game, left in the ready
/// stage so callers decide whether to queue it.
pub fn simple_tournament(
    conn: &mut DbConn,
    name: &str,
    start: &str,
    finish: &str,
) -> Tournament {
    ensure_member(conn, 7001, "Pat Fixture");
    ensure_member(conn, 7002, "Quinn Fixture");

    let tournament =
        tournaments::insert_tournament(conn, name, date(start), date(finish)).expect("tournament");
    let a = players::insert_player(
        conn,
        tournament.id,
        1,
        "Pat Fixture",
        PlayerCategory::IcuPlayer,
        Some(7001),
        None,
    )
    .expect("player");
    let b = players::insert_player(
        conn,
        tournament.id,
        2,
        "Quinn Fixture",
        PlayerCategory::IcuPlayer,
        Some(7002),
        None,
    )
    .expect("player");
    record_result(
        conn,
        a.id,
        1,
        Outcome::Draw,
        Some(Colour::White),
        Some(b.id),
        true,
    )
    .expect("result");

    tournaments::set_stage(conn, tournament.id, Stage::Ready).expect("stage");
    tournaments::get(conn, tournament.id).expect("reload")
}

/// Three tournaments with ascending dates, all queued: rorder 1 to 3.
/// Member 101 plays in the first two, so a rating carries across them.
pub fn three_queued_tournaments(conn: &mut DbConn) -> (Tournament, Tournament, Tournament) {
    ensure_member(conn, 101, "Alice Fixture");
    ensure_member(conn, 102, "Bob Fixture");
    ensure_member(conn, 103, "Cara Fixture");
    members::insert_legacy_rating(conn, 101, 1500, 30, true).expect("legacy");
    members::insert_legacy_rating(conn, 102, 1400, 30, true).expect("legacy");
    members::insert_legacy_rating(conn, 103, 1600, 30, true).expect("legacy");

    let t1 = seeded_pairing(
        conn,
        "Spring Open",
        "2011-10-01",
        "2011-10-02",
        (101, "Alice Fixture"),
        (102, "Bob Fixture"),
        Outcome::Win,
    );
    let t2 = seeded_pairing(
        conn,
        "Winter Classic",
        "2011-11-05",
        "2011-11-06",
        (101, "Alice Fixture"),
        (103, "Cara Fixture"),
        Outcome::Draw,
    );
    let t3 = seeded_pairing(
        conn,
        "New Year Blitz",
        "2012-01-07",
        "2012-01-08",
        (103, "Cara Fixture"),
        (102, "Bob Fixture"),
        Outcome::Win,
    );

    let t1 = queue_tournament(conn, t1.id).expect("queue");
    let t2 = queue_tournament(conn, t2.id).expect("queue");
    let t3 = queue_tournament(conn, t3.id).expect("queue");
    (t1, t2, t3)
}

fn seeded_pairing(
    conn: &mut DbConn,
    name: &str,
    start: &str,
    finish: &str,
    first: (i64, &str),
    second: (i64, &str),
    first_score: Outcome,
) -> Tournament {
    let tournament =
        tournaments::insert_tournament(conn, name, date(start), date(finish)).expect("tournament");
    let a = players::insert_player(
        conn,
        tournament.id,
        1,
        first.1,
        PlayerCategory::IcuPlayer,
        Some(first.0),
        None,
    )
    .expect("player");
    let b = players::insert_player(
        conn,
        tournament.id,
        2,
        second.1,
        PlayerCategory::IcuPlayer,
        Some(second.0),
        None,
    )
    .expect("player");
    record_result(
        conn,
        a.id,
        1,
        first_score,
        Some(Colour::White),
        Some(b.id),
        true,
    )
    .expect("result");

    tournaments::set_stage(conn, tournament.id, Stage::Ready).expect("stage");
    tournament
}

/// A tournament pairing a rated member against a FIDE-rated foreign guest,
/// ready to queue.
pub fn tournament_with_foreign_guest(conn: &mut DbConn) -> Tournament {
    ensure_member(conn, 101, "Alice Fixture");
    members::insert_legacy_rating(conn, 101, 1500, 30, true).expect("legacy");

    let tournament = tournaments::insert_tournament(
        conn,
        "Open with Guest",
        date("2012-01-14"),
        date("2012-01-15"),
    )
    .expect("tournament");
    let local = players::insert_player(
        conn,
        tournament.id,
        1,
        "Alice Fixture",
        PlayerCategory::IcuPlayer,
        Some(101),
        None,
    )
    .expect("player");
    let guest = players::insert_player(
        conn,
        tournament.id,
        2,
        "Guest Fixture",
        PlayerCategory::ForeignPlayer,
        None,
        Some(2000),
    )
    .expect("player");
    record_result(
        conn,
        local.id,
        1,
        Outcome::Loss,
        Some(Colour::White),
        Some(guest.id),
        true,
    )
    .expect("result");

    tournaments::set_stage(conn, tournament.id, Stage::Ready).expect("stage");
    tournaments::get(conn, tournament.id).expect("reload")
}

/// A tournament already in the rated stage whose single entrant holds the
/// given post-tournament rating. Bypasses the engine; publish tests only
/// need the stored outcome.
pub fn rated_appearance(
    conn: &mut DbConn,
    icu_id: i64,
    new_rating: f64,
    finish: NaiveDate,
) -> i64 {
    let tournament = tournaments::insert_tournament(
        conn,
        &format!("Rated Fixture {}", finish),
        finish.pred_opt().expect("date"),
        finish,
    )
    .expect("tournament");

    let next_rorder: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(rorder), 0) + 1 FROM tournaments",
            [],
            |row| row.get(0),
        )
        .expect("rorder");
    conn.execute(
        "UPDATE tournaments SET stage = 'rated', rorder = ?1, \
         last_signature = 'fixture', curr_signature = 'fixture' WHERE id = ?2",
        params![next_rorder, tournament.id],
    )
    .expect("stage");

    let player = players::insert_player(
        conn,
        tournament.id,
        1,
        "Rated Fixture",
        PlayerCategory::IcuPlayer,
        Some(icu_id),
        None,
    )
    .expect("player");
    conn.execute(
        "UPDATE players SET new_rating = ?1, new_games = 25, new_full = 1 WHERE id = ?2",
        params![new_rating, player.id],
    )
    .expect("outcome");

    tournament.id
}

/// Overwrite the stored outcome in a rated fixture, as a correction would.
pub fn revise_rated_appearance(conn: &mut DbConn, tournament_id: i64, icu_id: i64, rating: f64) {
    conn.execute(
        "UPDATE players SET new_rating = ?1 WHERE tournament_id = ?2 AND icu_id = ?3",
        params![rating, tournament_id, icu_id],
    )
    .expect("revision");
}
