pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "wattwise",
    about = "Wattwise plan recommendation CLI",
    long_about = "Rank energy plans against a usage history, flag contract risks, and inspect engine configuration.",
    after_help = "Examples:\n  wattwise recommend --input request.json --top-n 3\n  wattwise config\n  wattwise demo"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Rank the candidate plans of a JSON recommendation request")]
    Recommend {
        #[arg(long, help = "Path to the JSON request file")]
        input: PathBuf,
        #[arg(long, help = "Number of recommendations to return")]
        top_n: Option<usize>,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Run a built-in deterministic household through the full engine")]
    Demo,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Recommend { input, top_n, json } => {
            commands::recommend::run(&input, top_n, json)
        }
        Command::Config => commands::config::run(),
        Command::Demo => commands::demo::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
