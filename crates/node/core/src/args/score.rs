//! Score CLI arguments.

use clap::Args;
use serde::{Deserialize, Serialize};

#[derive(Debug, Args, Clone, Default, Serialize, Deserialize)]
#[command(next_help_heading = "Score")]
#[serde(default)]
pub struct ScoreArgs {
    /// Proof-of-work strength of the node's own score and the minimum
    /// accepted from peers.
    #[arg(long, value_name = "N")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<u8>,

    /// Threads searching for score suffixes (0 = CPUs).
    #[arg(long = "farm.threads", value_name = "N")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farm_threads: Option<usize>,

    /// Accept peer scores below the required strength or value.
    #[arg(long = "ignore-score-weakness")]
    #[serde(skip_serializing_if = "super::is_false")]
    pub ignore_weakness: bool,

    /// Minimum value a peer's score must have.
    #[arg(long = "min-score-value", value_name = "N")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<usize>,
}
