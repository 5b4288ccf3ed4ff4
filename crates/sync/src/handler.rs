use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tally_net_remotes::RemoteKey;
use tally_tasks::TaskExecutor;
use tally_wallet::{Ledger, StoreError, Wallet, WalletId, WalletStore, merge};
use tokio::sync::{Mutex as AsyncMutex, Notify, Semaphore, mpsc};
use tracing::{debug, info, warn};

use crate::{
    PushError,
    journal::{Journal, JournalEntry, MergeResult},
};

/// Default number of merges kept in the journal.
pub const DEFAULT_JOURNAL_SIZE: usize = 64;

/// An applied wallet that should be pushed on to known remotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationIntent {
    pub id: WalletId,
    pub digest: String,
}

/// Synchronous answer to a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Queued for merging, or already queued with the same digest.
    Accepted { digest: String },
    /// The stored ledger is byte-identical.
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Upper bound on concurrently running merges.
    pub threads: usize,
    pub journal_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            journal_size: DEFAULT_JOURNAL_SIZE,
        }
    }
}

/// Decides on pushed ledgers and applies accepted ones in the background.
///
/// A push is first checked against the stored wallet and answered right
/// away. Accepted pushes are merged by a spawned task holding the wallet's
/// lock, so reads only see the new ledger once that task finishes.
#[derive(Clone)]
pub struct SyncHandler {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn WalletStore>,
    executor: TaskExecutor,
    permits: Arc<Semaphore>,
    locks: DashMap<WalletId, Arc<AsyncMutex<()>>>,
    pending: Mutex<HashMap<WalletId, HashSet<String>>>,
    settled: Notify,
    journal: Journal,
    intents: Option<mpsc::Sender<PropagationIntent>>,
}

impl std::fmt::Debug for SyncHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHandler")
            .field("permits", &self.inner.permits.available_permits())
            .field("pending", &self.inner.pending.lock().len())
            .finish_non_exhaustive()
    }
}

impl SyncHandler {
    /// `intents` receives one message per applied wallet; pass `None` for a
    /// standalone node.
    pub fn new(
        store: Arc<dyn WalletStore>,
        executor: TaskExecutor,
        config: SyncConfig,
        intents: Option<mpsc::Sender<PropagationIntent>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                executor,
                permits: Arc::new(Semaphore::new(config.threads.max(1))),
                locks: DashMap::new(),
                pending: Mutex::new(HashMap::new()),
                settled: Notify::new(),
                journal: Journal::new(config.journal_size),
                intents,
            }),
        }
    }

    /// Handle `PUT /wallet/{id}`. `peer` is the pusher, when it presented a
    /// valid score.
    pub fn push(&self, id: WalletId, body: Bytes, peer: Option<RemoteKey>) -> Result<PushOutcome, PushError> {
        let ledger = Ledger::parse(body)?;
        if ledger.id != id {
            return Err(PushError::IdMismatch {
                path: id,
                body: ledger.id,
            });
        }
        let digest = ledger.digest();

        if let Some(stored) = self.inner.store.get(&id)? {
            if stored.digest() == digest {
                metrics::counter!("tally_pushes_total", "outcome" => "unchanged").increment(1);
                return Ok(PushOutcome::Unchanged);
            }
            if let Err(err) = merge::check(stored.ledger(), &ledger) {
                metrics::counter!("tally_pushes_total", "outcome" => "rejected").increment(1);
                debug!(%id, %err, "push rejected");
                return Err(err.into());
            }
        }

        if !self.inner.pending.lock().entry(id).or_default().insert(digest.clone()) {
            debug!(%id, %digest, "push already queued");
            return Ok(PushOutcome::Accepted { digest });
        }

        metrics::counter!("tally_pushes_total", "outcome" => "accepted").increment(1);
        let inner = Arc::clone(&self.inner);
        self.inner
            .executor
            .spawn(Inner::apply(inner, ledger, peer));

        Ok(PushOutcome::Accepted { digest })
    }

    /// Resolve once no merge is pending for `id`.
    pub async fn settled(&self, id: WalletId) {
        loop {
            let notified = self.inner.settled.notified();
            if !self.is_pending(&id) {
                return;
            }
            notified.await;
        }
    }

    pub fn is_pending(&self, id: &WalletId) -> bool {
        self.inner
            .pending
            .lock()
            .get(id)
            .is_some_and(|digests| !digests.is_empty())
    }

    pub fn wallet(&self, id: &WalletId) -> Result<Option<Wallet>, StoreError> {
        self.inner.store.get(id)
    }

    pub fn ids(&self) -> Result<Vec<WalletId>, StoreError> {
        self.inner.store.ids()
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        self.inner.store.count()
    }

    /// Recent merges, oldest first.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.inner.journal.entries()
    }
}

impl Inner {
    async fn apply(self: Arc<Self>, ledger: Ledger, peer: Option<RemoteKey>) {
        let id = ledger.id;
        let digest = ledger.digest();

        // The semaphore is never closed.
        let Ok(_permit) = Arc::clone(&self.permits).acquire_owned().await else {
            return;
        };
        let lock = Arc::clone(self.locks.entry(id).or_default().value());
        let guard = lock.lock().await;

        let this = Arc::clone(&self);
        let merged = tokio::task::spawn_blocking(move || this.merge(ledger, peer)).await;
        let result = match merged {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => MergeResult::Failed {
                reason: err.to_string(),
            },
            Err(err) => MergeResult::Failed {
                reason: format!("merge task failed: {err}"),
            },
        };

        match &result {
            MergeResult::Applied { added } => {
                info!(%id, %digest, added, "wallet merged");
                metrics::counter!("tally_merges_total", "result" => "applied").increment(1);
                self.announce(id, &digest);
            }
            MergeResult::Unchanged => {
                metrics::counter!("tally_merges_total", "result" => "unchanged").increment(1);
            }
            MergeResult::Failed { reason } => {
                warn!(%id, %digest, %reason, "merge failed");
                metrics::counter!("tally_merges_total", "result" => "failed").increment(1);
            }
        }
        self.journal.record(Utc::now(), id, digest.clone(), result);
        drop(guard);
        drop(lock);
        self.finish(id, &digest);
    }

    /// Re-check against the current state and save.
    fn merge(&self, ledger: Ledger, peer: Option<RemoteKey>) -> Result<MergeResult, PushError> {
        let now = Utc::now();
        let (wallet, added) = match self.store.get(&ledger.id)? {
            None => {
                let added = ledger.txns.len();
                (Wallet::new(ledger, now), added)
            }
            Some(stored) if stored.digest() == ledger.digest() => return Ok(MergeResult::Unchanged),
            Some(stored) => {
                let outcome = merge::check(stored.ledger(), &ledger)?;
                (stored.updated(ledger, now), outcome.added)
            }
        };
        let wallet = match peer {
            Some(peer) => wallet.with_copy(peer.to_string()),
            None => wallet,
        };
        self.store.save(&wallet)?;
        Ok(MergeResult::Applied { added })
    }

    fn announce(&self, id: WalletId, digest: &str) {
        let Some(intents) = &self.intents else {
            return;
        };
        let intent = PropagationIntent {
            id,
            digest: digest.to_string(),
        };
        if let Err(err) = intents.try_send(intent) {
            warn!(%id, %err, "dropping propagation intent");
        }
    }

    /// Clear `digest` from the pending set. The wallet lock goes too once
    /// nothing is queued for `id` and no task holds it.
    fn finish(&self, id: WalletId, digest: &str) {
        let mut pending = self.pending.lock();
        if let Some(digests) = pending.get_mut(&id) {
            digests.remove(digest);
            if digests.is_empty() {
                pending.remove(&id);
            }
        }
        if !pending.contains_key(&id) {
            self.locks.remove_if(&id, |_, lock| Arc::strong_count(lock) == 1);
        }
        drop(pending);
        self.settled.notify_waiters();
    }
}
