//! Wallet storage CLI arguments.

use clap::Args;
use serde::{Deserialize, Serialize};

#[derive(Debug, Args, Clone, Default, Serialize, Deserialize)]
#[command(next_help_heading = "Storage")]
#[serde(default)]
pub struct StorageArgs {
    /// Keep wallets in memory only.
    #[arg(long)]
    #[serde(skip_serializing_if = "super::is_false")]
    pub memory: bool,
}
