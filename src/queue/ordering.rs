//! The rating queue: a strict total order (`rorder`) over queued and rated
//! tournaments, kept consistent with (finish date, start date, creation
//! order) and mirrored by a doubly-linked chain of id pointers.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;

use crate::database::models::Tournament;
use crate::database::{tournaments, DbConn};
use crate::domain::Stage;
use crate::errors::RatingError;

/// Move a ready tournament into the queue and renumber.
pub fn queue_tournament(conn: &mut DbConn, id: i64) -> Result<Tournament> {
    let tx = conn.transaction()?;
    let tournament = tournaments::get(&tx, id)?;
    if tournament.stage != Stage::Ready {
        return Err(RatingError::validation(format!(
            "tournament {} cannot be queued from stage '{}'",
            id,
            tournament.stage.as_str()
        ))
        .into());
    }

    tournaments::set_stage(&tx, id, Stage::Queued)?;
    sync_order(&tx)?;
    let queued = tournaments::get(&tx, id)?;
    tx.commit()?;
    Ok(queued)
}

/// Return a queued tournament to the ready stage. Its rorder is released,
/// not reused, and the other entries keep their numbers; only the former
/// neighbours are relinked to each other.
pub fn dequeue_tournament(conn: &mut DbConn, id: i64) -> Result<Tournament> {
    let tx = conn.transaction()?;
    let tournament = tournaments::get(&tx, id)?;
    if tournament.stage != Stage::Queued {
        return Err(RatingError::validation(format!(
            "tournament {} cannot be dequeued from stage '{}'",
            id,
            tournament.stage.as_str()
        ))
        .into());
    }

    if let Some(last_id) = tournament.last_tournament_id {
        tournaments::set_next_pointer(&tx, last_id, tournament.next_tournament_id)?;
    }
    if let Some(next_id) = tournament.next_tournament_id {
        tournaments::set_last_pointer(&tx, next_id, tournament.last_tournament_id)?;
    }
    tournaments::set_order_fields(&tx, id, None, None, None)?;
    tournaments::set_stage(&tx, id, Stage::Ready)?;

    let dequeued = tournaments::get(&tx, id)?;
    tx.commit()?;
    Ok(dequeued)
}

/// Change a tournament's dates and, when it sits in the queue, renumber the
/// queue to match the new position.
pub fn change_dates(
    conn: &mut DbConn,
    id: i64,
    start_date: NaiveDate,
    finish_date: NaiveDate,
) -> Result<()> {
    let tx = conn.transaction()?;
    let tournament = tournaments::get(&tx, id)?;
    tournaments::set_dates(&tx, id, start_date, finish_date)?;
    if matches!(tournament.stage, Stage::Queued | Stage::Rated) {
        sync_order(&tx)?;
    }
    tx.commit()?;
    Ok(())
}

/// Recompute rorder 1..N and the pointer chain over all queued/rated
/// tournaments. Rated tournaments from the first moved position onward get
/// their last_signature cleared: their upstream rating inputs may have
/// changed, so they read as dirty until re-rated. Never rates anything.
pub fn sync_order(conn: &Connection) -> Result<()> {
    let ordered = tournaments::all_queued_or_rated(conn)?;

    let mut first_moved = None;
    for (idx, tournament) in ordered.iter().enumerate() {
        if tournament.rorder != Some((idx + 1) as i64) {
            first_moved = Some(idx);
            break;
        }
    }
    let Some(first_moved) = first_moved else {
        return Ok(());
    };

    for tournament in &ordered[first_moved..] {
        if tournament.stage == Stage::Rated {
            tournaments::clear_last_signature(conn, tournament.id)?;
        }
    }

    tournaments::release_rorders(conn)?;
    for (idx, tournament) in ordered.iter().enumerate() {
        let last_id = if idx > 0 { Some(ordered[idx - 1].id) } else { None };
        let next_id = ordered.get(idx + 1).map(|t| t.id);
        tournaments::set_order_fields(
            conn,
            tournament.id,
            Some((idx + 1) as i64),
            last_id,
            next_id,
        )?;
    }

    log::debug!(
        "Rating queue renumbered: {} tournaments, first change at position {}",
        ordered.len(),
        first_moved + 1
    );
    Ok(())
}

/// The tournament the next rating run must start from: the lowest-rorder
/// entry that is still queued, or rated but dirty. Rating anything after it
/// first would feed stale inputs downstream.
pub fn next_for_rating(conn: &Connection) -> Result<Option<Tournament>> {
    let queue = tournaments::all_in_queue(conn)?;
    Ok(queue
        .into_iter()
        .find(|t| t.stage == Stage::Queued || t.dirty()))
}

/// The highest-rorder tournament still needing a rating pass; the default
/// end of a rating run.
pub fn last_for_rating(conn: &Connection) -> Result<Option<Tournament>> {
    let queue = tournaments::all_in_queue(conn)?;
    Ok(queue
        .into_iter()
        .rev()
        .find(|t| t.stage == Stage::Queued || t.dirty()))
}

/// Audit the queue invariants. Returns one message per violation; empty
/// means the queue is consistent.
pub fn check_order(conn: &Connection) -> Result<Vec<String>> {
    let queue = tournaments::all_in_queue(conn)?;
    let mut violations = Vec::new();

    for (idx, tournament) in queue.iter().enumerate() {
        let expected = (idx + 1) as i64;
        if tournament.rorder != Some(expected) {
            violations.push(format!(
                "tournament {} ({}) holds rorder {:?}, expected {}",
                tournament.id, tournament.name, tournament.rorder, expected
            ));
        }

        let expected_last = if idx > 0 { Some(queue[idx - 1].id) } else { None };
        if tournament.last_tournament_id != expected_last {
            violations.push(format!(
                "tournament {} ({}) last-pointer is {:?}, expected {:?}",
                tournament.id, tournament.name, tournament.last_tournament_id, expected_last
            ));
        }

        let expected_next = queue.get(idx + 1).map(|t| t.id);
        if tournament.next_tournament_id != expected_next {
            violations.push(format!(
                "tournament {} ({}) next-pointer is {:?}, expected {:?}",
                tournament.id, tournament.name, tournament.next_tournament_id, expected_next
            ));
        }
    }

    let unnumbered = tournaments::all_queued_or_rated(conn)?
        .into_iter()
        .filter(|t| t.rorder.is_none())
        .collect::<Vec<_>>();
    for tournament in unnumbered {
        violations.push(format!(
            "tournament {} ({}) is {} but holds no rorder",
            tournament.id,
            tournament.name,
            tournament.stage.as_str()
        ));
    }

    Ok(violations)
}
