//! RW macros CLI.
//!
//! Provides commands for:
//! - `expand`: Expand `${name}` macros in a documentation playbook

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::ExpandArgs;
use output::Output;

/// Log filter for `--verbose`: macro resolution details from our crates,
/// warnings from everything else.
const VERBOSE_FILTER: &str = "warn,rw=debug,rw_config=debug,rw_macros=debug";

/// RW - Documentation playbook macros.
#[derive(Parser)]
#[command(name = "rw", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand macros in a playbook.
    Expand(ExpandArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = matches!(&cli.command, Commands::Expand(args) if args.verbose);

    // Initialize tracing with appropriate log level
    // --verbose enables DEBUG for our crates, otherwise use RUST_LOG or default to WARN
    let filter = if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Expand(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
