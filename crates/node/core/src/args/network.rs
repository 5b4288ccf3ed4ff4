//! Network identity CLI arguments.

use std::net::IpAddr;

use clap::Args;
use serde::{Deserialize, Serialize};

/// How the node is reached and how it presents itself.
#[derive(Debug, Args, Clone, Default, Serialize, Deserialize)]
#[command(next_help_heading = "Network")]
#[serde(default)]
pub struct NetworkArgs {
    /// Public host name or IP written into the node's score.
    #[arg(long, value_name = "HOST")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// HTTP port, also written into the node's score.
    #[arg(long, value_name = "PORT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Address the HTTP listener binds to.
    #[arg(long, value_name = "ADDR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<IpAddr>,

    /// Node alias, 4 to 16 letters and digits. Defaults to `host:port`.
    #[arg(long, value_name = "ALIAS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Invoice the node's score is issued for (`PREFIX@ID`).
    #[arg(long, value_name = "INVOICE")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<String>,

    /// Never register remotes or propagate wallets.
    #[arg(long)]
    #[serde(skip_serializing_if = "super::is_false")]
    pub standalone: bool,
}
