//! Wallet persistence trait and implementations (memory, file).

mod file;
mod memory;

use auto_impl::auto_impl;
use thiserror::Error;

use crate::{LedgerError, Wallet, WalletId};

pub use file::FileWalletStore;
pub use memory::MemoryWalletStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("stored wallet {id} is corrupt: {source}")]
    Corrupt {
        id: WalletId,
        #[source]
        source: LedgerError,
    },
}

/// Wallet persistence with auto-impl for &, Box, Arc.
#[auto_impl(&, Box, Arc)]
pub trait WalletStore: Send + Sync {
    fn get(&self, id: &WalletId) -> Result<Option<Wallet>, StoreError>;

    /// Insert or replace the wallet under its ledger id.
    fn save(&self, wallet: &Wallet) -> Result<(), StoreError>;

    /// All stored ids, sorted.
    fn ids(&self) -> Result<Vec<WalletId>, StoreError>;

    fn contains(&self, id: &WalletId) -> Result<bool, StoreError> {
        Ok(self.get(id)?.is_some())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.ids()?.len())
    }
}
