pub mod cli;
pub mod config;
pub mod database;
pub mod domain;
pub mod errors;
pub mod queue;
pub mod rating;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use cli::Cli;

use crate::cli::Command;
use crate::config::settings::AppConfig;
use crate::services::publish::RatingListPublisher;
use crate::services::run::RatingRunCoordinator;
use crate::services::worker::RunWorker;

pub fn interpret() -> Command {
    let cli = Cli::parse();
    cli.command
}

fn database_path() -> String {
    std::env::var("DATABASE_PATH").unwrap_or_else(|_| "icu_ratings.db".to_string())
}

fn open_connection() -> Result<database::DbConn> {
    let pool = database::create_pool(&database_path())?;
    database::get_connection(&pool)
}

pub fn handle_setup() -> Result<()> {
    let mut conn = open_connection()?;
    database::setup::reset_database(&mut conn)
}

pub fn handle_queue(tournament_id: i64) -> Result<()> {
    let mut conn = open_connection()?;
    queue::ordering::queue_tournament(&mut conn, tournament_id)?;
    log::info!("Tournament {} queued for rating", tournament_id);
    Ok(())
}

pub fn handle_dequeue(tournament_id: i64) -> Result<()> {
    let mut conn = open_connection()?;
    queue::ordering::dequeue_tournament(&mut conn, tournament_id)?;
    log::info!("Tournament {} removed from the rating queue", tournament_id);
    Ok(())
}

pub fn handle_check() -> Result<()> {
    let mut conn = open_connection()?;
    let violations = queue::ordering::check_order(&mut conn)?;
    if violations.is_empty() {
        log::info!("Rating queue ordering is consistent");
        Ok(())
    } else {
        for violation in &violations {
            log::error!("{}", violation);
        }
        anyhow::bail!("{} ordering violation(s) found", violations.len())
    }
}

pub fn handle_run(start_id: i64, last_id: Option<i64>) -> Result<()> {
    let config = AppConfig::new();
    let mut conn = open_connection()?;
    let coordinator = RatingRunCoordinator::new(config);
    let run = coordinator.create_run(&mut conn, start_id, last_id)?;
    log::info!("Rating run {} created (waiting for the worker)", run.id);
    Ok(())
}

pub fn handle_worker(once: bool) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let config = AppConfig::new();
        let pool = database::create_pool(&database_path())?;
        let worker = RunWorker::new(config, pool);
        if once {
            worker.poll_once().map(|_| ())
        } else {
            worker.run().await
        }
    })
}

pub fn handle_publish(list_date: NaiveDate, today: Option<NaiveDate>) -> Result<()> {
    let config = AppConfig::new();
    let mut conn = open_connection()?;
    let today = today.unwrap_or_else(|| chrono::Utc::now().date_naive());
    let publisher = RatingListPublisher::new(config);
    let publication = publisher.publish(&mut conn, list_date, today)?;
    log::info!(
        "Published list {}: {} total ({} new, {} updated, {} unchanged, {} deleted)",
        list_date,
        publication.total,
        publication.creates,
        publication.updates,
        publication.remains,
        publication.deletes
    );
    println!("{}", publication.report);
    Ok(())
}

pub fn handle_export(list_date: NaiveDate) -> Result<()> {
    let mut conn = open_connection()?;
    let ratings = database::lists::published_ratings(&mut conn, list_date)?;
    let json = serde_json::to_string_pretty(&ratings)?;
    println!("{}", json);
    Ok(())
}
