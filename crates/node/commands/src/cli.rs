//! CLI argument assembly and top-level parser.

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tally_node_core::version::LONG_VERSION;

pub use tally_node_core::args::{
    DataDirArgs, HttpArgs, LogArgs, NetworkArgs, ScoreArgs, StorageArgs,
};

/// tally - wallet ledger node
#[derive(Debug, Parser)]
#[command(author, version, long_version = LONG_VERSION.as_str(), about, long_about = None)]
pub struct Cli {
    /// Logging configuration.
    #[command(flatten)]
    pub logs: LogArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a ledger node.
    Node(Box<NodeArgs>),
}

/// Arguments for the `node` command.
#[derive(Debug, Clone, Default, Args)]
pub struct NodeArgs {
    #[command(flatten)]
    pub datadir: DataDirArgs,

    #[command(flatten)]
    pub network: NetworkArgs,

    #[command(flatten)]
    pub http: HttpArgs,

    #[command(flatten)]
    pub score: ScoreArgs,

    #[command(flatten)]
    pub storage: StorageArgs,
}

/// The subset of [`NodeArgs`] layered over the loaded configuration.
#[derive(Debug, Serialize)]
pub(crate) struct Overrides<'a> {
    network: &'a NetworkArgs,
    http: &'a HttpArgs,
    score: &'a ScoreArgs,
    storage: &'a StorageArgs,
}

impl NodeArgs {
    pub(crate) fn overrides(&self) -> Overrides<'_> {
        Overrides {
            network: &self.network,
            http: &self.http,
            score: &self.score,
            storage: &self.storage,
        }
    }
}
