//! Proctest CLI - Main Entry Point
//!
//! Runs process conformance fixtures against a backend and reports
//! passed, failed and skipped cases.
//!
//! Exit codes: 0 when no case failed, 1 when at least one case failed,
//! 2 when the session could not be set up.

use clap::{Parser, Subcommand};
use std::process::ExitCode;

mod commands;
mod output;

use commands::{list, run};

/// Proctest CLI - Process Conformance Test Suite
#[derive(Parser)]
#[command(name = "proctest")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the selected test cases
    Run(run::RunArgs),

    /// List fixtures or backend processes
    #[command(subcommand)]
    List(list::ListCommands),

    /// Show version information
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let outcome = match cli.command {
        Commands::Run(args) => run::execute(args, cli.format),
        Commands::List(cmd) => list::execute(cmd, cli.format).map(|_| true),
        Commands::Version => {
            println!("Proctest CLI v{}", proctest_common::VERSION);
            println!("Process conformance test suite");
            Ok(true)
        }
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}
