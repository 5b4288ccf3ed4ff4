//! Tally node infrastructure.
//!
//! - [`args`] - CLI argument groups, also deserializable from config files
//! - [`constants`] - Defaults shared by the node and its commands
//! - [`dirs`] - Data directory layout
//! - [`logging`] - Subscriber setup and the in-memory trace buffer
//! - [`validate`] - Startup configuration checks
//! - [`version`] - Version information

pub mod args;
pub mod constants;
pub mod dirs;
pub mod logging;
pub mod validate;
pub mod version;
