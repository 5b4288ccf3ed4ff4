//! Proof-of-work trust scores.
//!
//! A [`Score`] proves that its holder spent bounded computation on behalf of
//! one `(host, port, invoice)` identity. The proof is a chain of suffixes; each
//! suffix is valid when the SHA-256 chain hash ending with it starts with
//! `strength` zero hex digits.
//!
//! - [`difficulty`] - the pure chain step and difficulty predicate
//! - [`search`] - replaceable strategies for finding the next suffix
//! - [`Score`] - the immutable score value and its text encoding
//! - [`Verifier`] - policy checks for scores presented by peers
//! - [`Farm`] - background producer of a node's own score

pub mod difficulty;
mod error;
mod farm;
mod invoice;
mod score;
pub mod search;
mod verify;

pub use error::ScoreError;
pub use farm::{Farm, FarmConfig, FarmStatus};
pub use invoice::Invoice;
pub use score::{Score, ScoreSummary, Tier};
pub use search::{ParallelSearch, RandomSearch, SequentialSearch, SuffixSearch};
pub use verify::{VerifyError, Verifier};

/// Default proof-of-work strength for a node's own score.
pub const DEFAULT_STRENGTH: u8 = 6;

/// Zero nibbles a SHA-256 hex digest can start with.
pub const MAX_STRENGTH: u8 = 64;
