use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "chess federation rating service")]
pub struct Cli {
    /// Command
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
#[clap(rename_all = "lower_case")]
pub enum Command {
    /// Reset the database schema (destructive)
    Setup,
    /// Add a ready tournament to the rating queue
    Queue {
        /// Tournament id
        tournament: i64,
    },
    /// Remove a queued tournament from the rating queue
    Dequeue {
        /// Tournament id
        tournament: i64,
    },
    /// Audit the rating queue ordering invariants
    Check,
    /// Create a rating run for a contiguous range of queued tournaments
    Run {
        /// First tournament to rate (must be next for rating)
        #[arg(short, long)]
        start: i64,
        /// Last tournament to rate (defaults to the end of the queue)
        #[arg(short, long)]
        last: Option<i64>,
    },
    /// Poll for pending rating runs and process them
    Worker {
        /// Process at most one pending run, then exit
        #[arg(long, default_value_t = false)]
        once: bool,
    },
    /// Publish a monthly rating list
    Publish {
        /// List date (first of month, YYYY-MM-DD)
        #[arg(short, long)]
        list: NaiveDate,
        /// Publication date override (defaults to today)
        #[arg(short, long)]
        today: Option<NaiveDate>,
    },
    /// Print a published rating list as JSON
    Export {
        /// List date (first of month, YYYY-MM-DD)
        #[arg(short, long)]
        list: NaiveDate,
    },
}
