//! CLI commands for the tally node.
//!
//! This crate provides the command-line interface:
//! - [`Cli`] - Top-level CLI parser
//! - [`Commands`] - Available subcommands
//! - [`NodeArgs`] - Combined arguments for the node command
//!
//! Configuration is loaded using Figment with the following priority
//! (highest wins):
//!
//! 1. CLI arguments
//! 2. Config file (`<datadir>/config.toml`)
//! 3. Environment variables (`TALLY_` prefix, `__` between sections)
//! 4. Defaults

mod cli;
pub mod commands;
pub mod config;

pub use cli::{Cli, Commands, NodeArgs};
pub use config::NodeConfig;

use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre;
use tally_node_core::{
    constants::TRACE_CAPACITY,
    logging::{self, TraceBuffer},
    version,
};
use tracing::info;

/// Run the tally node with the given CLI arguments.
///
/// This is the main entry point that should be called from the binary. The
/// tokio runtime is built by the command once the thread count is known.
pub fn run() -> eyre::Result<()> {
    // Setup error handling
    color_eyre::install()?;

    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    let trace = Arc::new(TraceBuffer::new(TRACE_CAPACITY));
    logging::init_logging(&cli.logs, trace.clone())?;

    info!("Starting tally {}", version::VERSION);

    // Dispatch command
    match cli.command {
        Commands::Node(args) => commands::node::run(*args, trace)?,
    }

    Ok(())
}
