//! Background executor for rating runs. Runs are created by the CLI in the
//! `waiting` state; the worker polls for them, claims one at a time with a
//! guarded update, and hands it to the coordinator. A claim that comes back
//! false means another worker won the row, which is not an error.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;

use crate::config::settings::AppConfig;
use crate::database::{get_connection, runs, DbPool};
use crate::domain::RunStatus;
use crate::services::run::RatingRunCoordinator;

pub struct RunWorker {
    config: AppConfig,
    pool: DbPool,
}

impl RunWorker {
    pub fn new(config: AppConfig, pool: DbPool) -> Self {
        Self { config, pool }
    }

    pub async fn run(&self) -> Result<()> {
        let interval = Duration::from_secs(self.config.worker.poll_interval_secs);
        log::info!("Worker started, polling every {:?}", interval);

        loop {
            match self.poll_once() {
                Ok(Some(run_id)) => log::info!("Worker completed rating run {}", run_id),
                Ok(None) => {}
                Err(error) => log::error!("Worker poll failed: {}", error),
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// One polling step: sweep stale claims, then claim and process at most
    /// one waiting run. Returns the processed run's id, if any.
    pub fn poll_once(&self) -> Result<Option<i64>> {
        let mut conn = get_connection(&self.pool)?;

        self.sweep_stale(&conn)?;

        let Some(run) = runs::next_waiting(&conn)? else {
            return Ok(None);
        };
        if !runs::claim(&conn, run.id, Utc::now().naive_utc())? {
            return Ok(None);
        }

        let coordinator = RatingRunCoordinator::new(self.config.clone());
        coordinator.process(&mut conn, run.id)?;
        Ok(Some(run.id))
    }

    /// A processing run whose claim is older than the stale window belongs
    /// to a crashed worker. It is marked as an error rather than restarted;
    /// work it committed per tournament stays valid.
    fn sweep_stale(&self, conn: &crate::database::DbConn) -> Result<()> {
        let cutoff =
            Utc::now().naive_utc() - chrono::Duration::seconds(self.config.worker.stale_after_secs);
        for stale in runs::stale_processing(conn, cutoff)? {
            log::warn!(
                "Rating run {} claimed at {:?} looks abandoned, marking as error",
                stale.id,
                stale.claimed_at
            );
            let report = if stale.report.is_empty() {
                "Abandoned by its worker".to_string()
            } else {
                format!("{}\nAbandoned by its worker", stale.report)
            };
            runs::update_report(conn, stale.id, &report)?;
            runs::set_status(conn, stale.id, RunStatus::Error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tournaments;
    use crate::domain::Stage;
    use crate::testing;

    fn worker(pool: DbPool) -> RunWorker {
        RunWorker::new(AppConfig::new(), pool)
    }

    #[test]
    fn poll_with_empty_queue_does_nothing() {
        let (pool, conn) = testing::pool_and_connection();
        drop(conn); // single-connection pool
        assert_eq!(worker(pool).poll_once().unwrap(), None);
    }

    #[test]
    fn poll_claims_and_processes_a_waiting_run() {
        let (pool, mut conn) = testing::pool_and_connection();
        let (t1, _, _) = testing::three_queued_tournaments(&mut conn);
        let run = RatingRunCoordinator::new(AppConfig::new())
            .create_run(&mut conn, t1.id, None)
            .unwrap();
        drop(conn); // single-connection pool

        let processed = worker(pool.clone()).poll_once().unwrap();
        assert_eq!(processed, Some(run.id));

        let conn = get_connection(&pool).unwrap();
        let done = runs::find_by_id(&conn, run.id).unwrap().unwrap();
        assert_eq!(done.status, RunStatus::Finished);
        assert!(done.claimed_at.is_some());
        assert_eq!(tournaments::get(&conn, t1.id).unwrap().stage, Stage::Rated);
    }

    #[test]
    fn stale_processing_run_is_swept_to_error() {
        let (pool, mut conn) = testing::pool_and_connection();
        let (t1, _, _) = testing::three_queued_tournaments(&mut conn);
        let run = RatingRunCoordinator::new(AppConfig::new())
            .create_run(&mut conn, t1.id, None)
            .unwrap();

        let long_ago = Utc::now().naive_utc() - chrono::Duration::seconds(7200);
        assert!(runs::claim(&conn, run.id, long_ago).unwrap());
        drop(conn);

        // nothing left to process once the stale run is swept
        assert_eq!(worker(pool.clone()).poll_once().unwrap(), None);

        let conn = get_connection(&pool).unwrap();
        let swept = runs::find_by_id(&conn, run.id).unwrap().unwrap();
        assert_eq!(swept.status, RunStatus::Error);
        assert!(swept.report.contains("Abandoned"));
    }
}
