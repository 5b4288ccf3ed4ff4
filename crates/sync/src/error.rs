use tally_wallet::{LedgerError, MergeError, StoreError, WalletId};

/// Why a push was refused before being queued.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("invalid ledger: {0}")]
    Ledger(#[from] LedgerError),
    #[error("ledger id {body} does not match {path}")]
    IdMismatch { path: WalletId, body: WalletId },
    #[error("merge refused: {0}")]
    Merge(#[from] MergeError),
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl PushError {
    /// Whether the pusher is at fault, as opposed to this node.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}
