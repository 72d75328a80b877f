//! Top-level CLI parsing and command dispatch.

use clap::{Parser, Subcommand};

pub mod health;
pub mod list;
pub mod run;

#[derive(Parser, Debug)]
#[command(
    name = "prs",
    about = "Computes normalized polygenic risk scores and per-trait summaries from genotypes, a GWAS catalogue, and per-trait models",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bulk PRS pipeline for one subject
    Run(run::RunArgs),
    /// Validate connectivity and schema for every configured table
    Health(health::HealthArgs),
    /// List recognized configuration keys and ancestry codes
    List,
}

/// Top-level exit codes, per §6/§7: `0` success, `1` user/pipeline error, `2` argument parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    PipelineError = 1,
    ArgumentError = 2,
}

/// Parses `args` and dispatches to the selected subcommand. Argument-parse
/// failures are reported as [`ExitCode::ArgumentError`] before any command runs.
pub async fn execute(args: Vec<String>) -> (ExitCode, String) {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => return (ExitCode::ArgumentError, e.to_string()),
    };

    let result = match cli.command {
        Commands::Run(args) => run::execute(args).await,
        Commands::Health(args) => health::execute(args).await,
        Commands::List => list::render(),
    };

    match result {
        Ok(message) => (ExitCode::Success, message),
        Err(e) => (ExitCode::PipelineError, format!("error [{}]: {e}", e.kind())),
    }
}
