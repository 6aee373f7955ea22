//! Publication of a rating list: a diff of every eligible member's current
//! rating against the list's existing rows, applied and recorded in one
//! transaction. Re-publishing the same list with the same inputs is a no-op
//! apart from the Publication record itself.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;

use crate::config::settings::AppConfig;
use crate::database::models::Publication;
use crate::database::{lists, members, players, tournaments, DbConn};
use crate::errors::RatingError;

pub struct RatingListPublisher {
    config: AppConfig,
}

/// Where a member's published rating came from.
enum RatingSource {
    Tournament { rating: f64, full: bool },
    Legacy { rating: i32, full: bool },
    None,
}

#[derive(Default)]
struct Tally {
    creates: i32,
    remains: i32,
    updates: i32,
    deletes: i32,
    update_deltas: Vec<i32>,
}

impl RatingListPublisher {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Publish (or re-publish) the list dated `list_date`. `today` fixes the
    /// subscription cut-off and decides whether the grace window is still
    /// open, so a re-run with the same `today` reproduces the same list.
    pub fn publish(
        &self,
        conn: &mut DbConn,
        list_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<Publication> {
        if list_date.day() != 1 {
            return Err(RatingError::validation(format!(
                "rating lists fall on the first of a month, not {}",
                list_date
            ))
            .into());
        }

        let tx = conn.transaction()?;
        let publication = self.publish_in_tx(&tx, list_date, today)?;
        tx.commit()?;

        log::info!(
            "Published list {}: {} ratings ({} new, {} updated, {} unchanged, {} deleted)",
            list_date,
            publication.total,
            publication.creates,
            publication.updates,
            publication.remains,
            publication.deletes
        );
        Ok(publication)
    }

    fn publish_in_tx(
        &self,
        tx: &Connection,
        list_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<Publication> {
        let list = lists::find_or_create_list(tx, list_date)?;

        // Seasons run September to August and are named for the later year.
        let season = if list_date.month() >= 9 {
            list_date.year() + 1
        } else {
            list_date.year()
        };
        let eligible = members::eligible_icu_ids(tx, season, today)?;
        if eligible.is_empty() {
            return Err(RatingError::validation(format!(
                "no subscriptions found for season {}",
                season
            ))
            .into());
        }

        let cutoff = tournaments::max_rorder_before(tx, list_date)?;
        let existing: HashMap<i64, _> = lists::ratings_for_list(tx, list.id)?
            .into_iter()
            .map(|r| (r.icu_id, r))
            .collect();

        // The grace window stays open through the list's own calendar month;
        // inside it corrections also revise the original_* columns.
        let in_grace = today <= list_date
            || (today.year(), today.month()) == (list_date.year(), list_date.month());

        let mut tally = Tally::default();
        let mut seen = Vec::with_capacity(eligible.len());

        for &icu_id in &eligible {
            seen.push(icu_id);
            let source = self.rating_source(tx, icu_id, cutoff)?;
            let published = match source {
                RatingSource::Tournament { rating, full } => {
                    Some((self.floor(rating.round() as i32), full))
                }
                RatingSource::Legacy { rating, full } => Some((self.floor(rating), full)),
                RatingSource::None => None,
            };

            match (published, existing.get(&icu_id)) {
                (Some((rating, full)), None) => {
                    lists::insert_rating(tx, list.id, icu_id, rating, full, rating, full)?;
                    tally.creates += 1;
                }
                (Some((rating, full)), Some(row)) => {
                    if row.rating == rating && row.full == full {
                        tally.remains += 1;
                    } else {
                        lists::update_rating(tx, row.id, rating, full, in_grace)?;
                        tally.updates += 1;
                        tally.update_deltas.push((rating - row.rating).abs());
                    }
                }
                (None, Some(row)) => {
                    lists::delete_rating(tx, row.id)?;
                    tally.deletes += 1;
                }
                (None, None) => {}
            }
        }

        for (icu_id, row) in &existing {
            if !seen.contains(icu_id) {
                lists::delete_rating(tx, row.id)?;
                tally.deletes += 1;
            }
        }

        let total = tally.creates + tally.remains + tally.updates;
        let report = self.report(list_date, today, season, eligible.len(), total, &tally);
        lists::insert_publication(
            tx,
            list.id,
            &report,
            total,
            tally.creates,
            tally.remains,
            tally.updates,
            tally.deletes,
        )
    }

    /// Best available rating for one member: their latest rated tournament
    /// up to the cut-off, falling back to the legacy list, then to nothing.
    fn rating_source(
        &self,
        tx: &Connection,
        icu_id: i64,
        cutoff: Option<i64>,
    ) -> Result<RatingSource> {
        if let Some(cutoff) = cutoff {
            if let Some(appearance) = players::latest_rated_appearance(tx, icu_id, cutoff)? {
                if let Some(rating) = appearance.new_rating {
                    return Ok(RatingSource::Tournament {
                        rating,
                        full: appearance.new_full.unwrap_or(false),
                    });
                }
            }
        }
        if let Some(legacy) = members::legacy_rating_for(tx, icu_id)? {
            return Ok(RatingSource::Legacy {
                rating: legacy.rating,
                full: legacy.full,
            });
        }
        Ok(RatingSource::None)
    }

    fn floor(&self, rating: i32) -> i32 {
        rating.max(self.config.publish.min_rating)
    }

    fn report(
        &self,
        list_date: NaiveDate,
        today: NaiveDate,
        season: i32,
        eligible: usize,
        total: i32,
        tally: &Tally,
    ) -> String {
        let mut lines = vec![
            format!("Rating list {} published on {}", list_date, today),
            format!("Season {}: {} eligible members", season, eligible),
            format!(
                "Ratings: {} total ({} created, {} updated, {} unchanged, {} deleted)",
                total, tally.creates, tally.updates, tally.remains, tally.deletes
            ),
        ];

        if !tally.update_deltas.is_empty() {
            let buckets = self.config.publish.update_buckets;
            let mut counts = [0usize; 4];
            for &delta in &tally.update_deltas {
                let slot = buckets.iter().position(|&b| delta <= b).unwrap_or(3);
                counts[slot] += 1;
            }
            lines.push(format!(
                "Update sizes: {} up to {}, {} up to {}, {} up to {}, {} larger",
                counts[0], buckets[0], counts[1], buckets[1], counts[2], buckets[2], counts[3]
            ));
        }

        lines.join("\n")
    }
}
