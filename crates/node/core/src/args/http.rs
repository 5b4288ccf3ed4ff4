//! HTTP server CLI arguments.

use clap::Args;
use serde::{Deserialize, Serialize};

#[derive(Debug, Args, Clone, Default, Serialize, Deserialize)]
#[command(next_help_heading = "HTTP")]
#[serde(default)]
pub struct HttpArgs {
    /// Runtime worker threads, also the limit on concurrent merges (0 = CPUs).
    #[arg(long, value_name = "N")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,

    /// Per-request budget in seconds.
    #[arg(long, value_name = "SECS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}
