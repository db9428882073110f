//! # bootserv CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bootserv_cli::check::{run_check, CheckArgs};
use bootserv_cli::prune::{run_prune, PruneArgs};
use bootserv_cli::rc::{run_keygen, run_make_rc, KeygenArgs, MakeRcArgs};

/// Maintenance and seeding tools for the overlay bootstrap server.
#[derive(Parser, Debug)]
#[command(name = "bootserv", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Delete stored router contacts that no longer validate.
    Prune(PruneArgs),

    /// Decode and verify a router contact file.
    Check(CheckArgs),

    /// Generate an Ed25519 router identity.
    Keygen(KeygenArgs),

    /// Sign a router contact with an existing identity.
    MakeRc(MakeRcArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level.
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Prune(args) => run_prune(&args),
        Commands::Check(args) => run_check(&args),
        Commands::Keygen(args) => run_keygen(&args),
        Commands::MakeRc(args) => run_make_rc(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
