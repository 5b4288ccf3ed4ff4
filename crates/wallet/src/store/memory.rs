use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::{Wallet, WalletId};

use super::{StoreError, WalletStore};

/// In-memory wallet store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryWalletStore {
    wallets: RwLock<BTreeMap<WalletId, Wallet>>,
}

impl MemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WalletStore for MemoryWalletStore {
    fn get(&self, id: &WalletId) -> Result<Option<Wallet>, StoreError> {
        Ok(self.wallets.read().get(id).cloned())
    }

    fn save(&self, wallet: &Wallet) -> Result<(), StoreError> {
        self.wallets.write().insert(wallet.id(), wallet.clone());
        Ok(())
    }

    fn ids(&self) -> Result<Vec<WalletId>, StoreError> {
        Ok(self.wallets.read().keys().copied().collect())
    }

    fn contains(&self, id: &WalletId) -> Result<bool, StoreError> {
        Ok(self.wallets.read().contains_key(id))
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.wallets.read().len())
    }
}
