//! Subcommand implementations.

pub mod node;
