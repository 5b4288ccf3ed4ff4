//! CLI argument groups for the tally node.
//!
//! These args serve dual purposes:
//! - CLI parsing via clap (`#[derive(Args)]`)
//! - Overrides merged over the loaded configuration via serde. Values not
//!   given on the command line are skipped so they never mask the config file.

mod datadir;
mod http;
mod log;
mod network;
mod score;
mod storage;

pub use datadir::DataDirArgs;
pub use http::HttpArgs;
pub use log::LogArgs;
pub use network::NetworkArgs;
pub use score::ScoreArgs;
pub use storage::StorageArgs;

/// `skip_serializing_if` helper for flags that were not set.
pub(crate) fn is_false(flag: &bool) -> bool {
    !*flag
}
