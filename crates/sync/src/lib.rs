//! Wallet synchronization: the push decision, the merge queue and read views.

mod error;
mod handler;
mod journal;

pub use error::PushError;
pub use handler::{
    DEFAULT_JOURNAL_SIZE, PropagationIntent, PushOutcome, SyncConfig, SyncHandler,
};
pub use journal::{JournalEntry, MergeResult};
