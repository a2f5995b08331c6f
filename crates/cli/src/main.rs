//! uiprobe CLI - Main Entry Point
//!
//! Runs browser-driven probes of a live chat UI from YAML specs.
//! Exit codes: 0 when every probe passed or is documentation, 1 when a probe
//! failed, 2 when the harness itself could not do its job.

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{check, init, list, run};

/// uiprobe - UI Probe Harness
#[derive(Parser)]
#[command(name = "uiprobe")]
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
    /// Run probes in a browser
    Run(run::RunArgs),

    /// List probes
    List(list::ListArgs),

    /// Validate probe specs without a browser
    Check(check::CheckArgs),

    /// Write a default configuration file
    Init(init::InitArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
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

    let result = match cli.command {
        Commands::Run(args) => run::execute(args, cli.format).await,
        Commands::List(args) => list::execute(args, cli.format).await,
        Commands::Check(args) => check::execute(args, cli.format).await,
        Commands::Init(args) => init::execute(args).await,
        Commands::Version => {
            println!("uiprobe v{}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(2);
        }
    }
}
