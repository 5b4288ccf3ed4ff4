//! Remote node set keyed by `(host, port)`, all operations RwLock-protected.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tally_score::Score;
use tracing::debug;

/// Consecutive failures after which a remote is dropped.
pub const MAX_ERRORS: u32 = 3;

/// Address of a remote node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RemoteKey {
    pub host: String,
    pub port: u16,
}

impl RemoteKey {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The address a score was issued for.
    pub fn of(score: &Score) -> Self {
        Self::new(score.host(), score.port())
    }
}

impl fmt::Display for RemoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// What this node knows about one remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub key: RemoteKey,
    pub score: Score,
    /// Consecutive failed interactions.
    pub errors: u32,
    pub added: DateTime<Utc>,
}

impl Remote {
    pub fn summary(&self) -> RemoteSummary {
        RemoteSummary {
            host: self.key.host.clone(),
            port: self.key.port,
            score: self.score.value(),
            errors: self.errors,
            added: self.added.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Entry of `GET /remotes`.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteSummary {
    pub host: String,
    pub port: u16,
    pub score: usize,
    pub errors: u32,
    pub added: String,
}

/// Result of [`RemoteSet::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddResult {
    New,
    /// Existing entry; its score was replaced.
    Updated,
}

#[derive(Debug, Default)]
pub struct RemoteSet {
    remotes: RwLock<BTreeMap<RemoteKey, Remote>>,
}

impl RemoteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a remote or refresh the score of a known one.
    pub fn add(&self, key: RemoteKey, score: Score, now: DateTime<Utc>) -> AddResult {
        let mut remotes = self.remotes.write();
        if let Some(remote) = remotes.get_mut(&key) {
            remote.score = score;
            return AddResult::Updated;
        }
        debug!(remote = %key, "new remote");
        metrics::counter!("tally_remotes_added_total").increment(1);
        remotes.insert(
            key.clone(),
            Remote {
                key,
                score,
                errors: 0,
                added: now,
            },
        );
        metrics::gauge!("tally_remotes").set(remotes.len() as f64);
        AddResult::New
    }

    pub fn remove(&self, key: &RemoteKey) -> Option<Remote> {
        let mut remotes = self.remotes.write();
        let removed = remotes.remove(key);
        metrics::gauge!("tally_remotes").set(remotes.len() as f64);
        removed
    }

    pub fn get(&self, key: &RemoteKey) -> Option<Remote> {
        self.remotes.read().get(key).cloned()
    }

    pub fn contains(&self, key: &RemoteKey) -> bool {
        self.remotes.read().contains_key(key)
    }

    /// Snapshot ordered by address.
    pub fn all(&self) -> Vec<Remote> {
        self.remotes.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.remotes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.remotes.read().is_empty()
    }

    /// Count a failed interaction. Returns the new error count, or `None`
    /// when the remote is unknown. The remote is dropped once the count
    /// reaches [`MAX_ERRORS`].
    pub fn record_error(&self, key: &RemoteKey) -> Option<u32> {
        let mut remotes = self.remotes.write();
        let remote = remotes.get_mut(key)?;
        remote.errors = remote.errors.saturating_add(1);
        let errors = remote.errors;
        if errors >= MAX_ERRORS {
            remotes.remove(key);
            debug!(remote = %key, errors, "dropping unresponsive remote");
            metrics::counter!("tally_remotes_evicted_total").increment(1);
            metrics::gauge!("tally_remotes").set(remotes.len() as f64);
        }
        Some(errors)
    }

    /// A successful interaction clears the error streak.
    pub fn record_success(&self, key: &RemoteKey) {
        if let Some(remote) = self.remotes.write().get_mut(key) {
            remote.errors = 0;
        }
    }

    /// Drop remotes whose last known score has expired.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut remotes = self.remotes.write();
        let before = remotes.len();
        remotes.retain(|key, remote| {
            let keep = !remote.score.expired(now);
            if !keep {
                debug!(remote = %key, "dropping remote with expired score");
            }
            keep
        });
        metrics::gauge!("tally_remotes").set(remotes.len() as f64);
        before - remotes.len()
    }
}
