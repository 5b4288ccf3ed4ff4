//! Acceptance policy for a pushed ledger against the stored one.

use crate::Ledger;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("pushed ledger has a different {field}")]
    Mismatch { field: &'static str },
    #[error("transaction {txn} differs from the stored one")]
    Conflict { txn: String },
    #[error("pushed ledger is a lower version, transaction {txn} is missing")]
    Stale { txn: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Transactions in the pushed ledger that the stored one lacks.
    pub added: usize,
}

/// Decide whether `pushed` may replace `stored`.
///
/// The pushed ledger must describe the same wallet, agree on every shared
/// transaction and contain every stored one.
pub fn check(stored: &Ledger, pushed: &Ledger) -> Result<MergeOutcome, MergeError> {
    if stored.network != pushed.network {
        return Err(MergeError::Mismatch { field: "network" });
    }
    if stored.id != pushed.id {
        return Err(MergeError::Mismatch { field: "id" });
    }
    if stored.key != pushed.key {
        return Err(MergeError::Mismatch { field: "key" });
    }

    for txn in &stored.txns {
        match pushed.txn(&txn.key()) {
            Some(other) if other != txn => {
                return Err(MergeError::Conflict {
                    txn: txn.key().to_string(),
                });
            }
            Some(_) => {}
            None => {
                return Err(MergeError::Stale {
                    txn: txn.key().to_string(),
                });
            }
        }
    }

    Ok(MergeOutcome {
        added: pushed.txns.len().saturating_sub(stored.txns.len()),
    })
}
