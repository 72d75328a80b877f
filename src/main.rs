mod ancestry;
mod annotator;
mod cache;
mod cli;
mod config;
mod entities;
mod error;
mod input;
mod kernel;
mod orchestrator;
mod output;
mod prs;
mod reference_service;
mod repository;
mod validators;

use tracing_subscriber::EnvFilter;

use cli::ExitCode;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let (code, message) = cli::execute(args).await;

    match code {
        ExitCode::Success => {
            print!("{message}");
            std::process::ExitCode::from(ExitCode::Success as u8)
        }
        ExitCode::PipelineError | ExitCode::ArgumentError => {
            eprintln!("{message}");
            std::process::ExitCode::from(code as u8)
        }
    }
}
