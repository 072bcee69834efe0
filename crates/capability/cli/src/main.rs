//! capcheck - static conformance checking for capability workflows
//!
//! - Validate workflow catalogs against a capability ontology
//! - Emit coercion patches for type mismatches
//! - Summarize an ontology
//! - Explain finding codes
//!
//! Exit codes: 0 when no workflow has an L1-L3 error, 1 when one does,
//! 2 when the ontology, registry, configuration or a catalog is unusable.

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::{explain, ontology, validate};

/// Exit code for unusable inputs
const PRECONDITION_FAILED: u8 = 2;

/// capcheck application
#[derive(Parser)]
#[command(name = "capcheck")]
#[command(about = "Validate capability workflows against an ontology", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Check workflow catalogs
    Validate(validate::ValidateArgs),

    /// Load, validate and summarize an ontology
    Ontology(ontology::OntologyArgs),

    /// Describe a finding code
    Explain {
        /// Code or name, e.g. B203 or TYPE_MISMATCH
        code: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let result = match cli.command {
        Commands::Validate(args) => validate::execute(args, cli.verbose).await,
        Commands::Ontology(args) => ontology::execute(args),
        Commands::Explain { code } => explain::execute(&code),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(PRECONDITION_FAILED)
        }
    }
}
