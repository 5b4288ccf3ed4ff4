//! Wallet ledgers and their storage.
//!
//! A [`Ledger`] is the exact text a wallet owner publishes. The node keeps it
//! as a [`Wallet`], adding the time it was applied and the peers known to hold
//! a copy. [`merge::check`] decides whether a pushed ledger may replace the
//! stored one, and [`WalletStore`] abstracts where wallets live.

mod id;
pub mod ledger;
pub mod merge;
mod store;
mod wallet;

pub use id::{InvalidWalletId, WalletId};
pub use ledger::{Ledger, LedgerError, Txn, TxnKey};
pub use merge::{MergeError, MergeOutcome};
pub use store::{FileWalletStore, MemoryWalletStore, StoreError, WalletStore};
pub use wallet::{Wallet, WalletView};
