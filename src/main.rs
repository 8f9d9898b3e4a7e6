//! Network-guided epistasis detection main executable.

pub mod common;
pub mod convert;
pub mod data;
pub mod err;
pub mod io;
pub mod network;
pub mod score;
pub mod search;

use clap::{Parser, Subcommand};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Network-guided epistasis detection",
    long_about = "Detects higher-order epistatic SNP interactions in GWAS cohorts by \
                  network-guided local search"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[allow(clippy::large_enum_variant)]
#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the network-guided epistasis search.
    Search(search::Args),
    /// Convert an instance to the compact binary format.
    Convert(convert::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector and go into sub commands.
    tracing::subscriber::with_default(collector, || {
        match &cli.command {
            Commands::Search(args) => {
                search::run(&cli.common, args)?;
            }
            Commands::Convert(args) => {
                convert::run(&cli.common, args)?;
            }
        }

        Ok::<(), anyhow::Error>(())
    })
}
