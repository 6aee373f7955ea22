use anyhow::Result;

use icu_ratings::cli::Command;
use icu_ratings::{
    handle_check, handle_dequeue, handle_export, handle_publish, handle_queue, handle_run,
    handle_setup, handle_worker, interpret,
};

fn main() {
    setup_logging();
    parse_and_execute().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
}

fn setup_logging() {
    sensible_env_logger::init!();
}

fn parse_and_execute() -> Result<()> {
    let command = interpret();
    execute_command(&command)
}

fn execute_command(command: &Command) -> Result<()> {
    match command {
        Command::Setup => handle_setup(),
        Command::Queue { tournament } => handle_queue(*tournament),
        Command::Dequeue { tournament } => handle_dequeue(*tournament),
        Command::Check => handle_check(),
        Command::Run { start, last } => handle_run(*start, *last),
        Command::Worker { once } => handle_worker(*once),
        Command::Publish { list, today } => handle_publish(*list, *today),
        Command::Export { list } => handle_export(*list),
    }
}
