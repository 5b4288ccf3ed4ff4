use std::collections::VecDeque;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tally_wallet::WalletId;

/// How a queued merge ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum MergeResult {
    Applied { added: usize },
    /// The same ledger was already stored when the merge ran.
    Unchanged,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub time: String,
    pub id: WalletId,
    pub digest: String,
    #[serde(flatten)]
    pub result: MergeResult,
}

/// Bounded log of the most recent merges.
#[derive(Debug)]
pub(crate) struct Journal {
    entries: Mutex<VecDeque<JournalEntry>>,
    capacity: usize,
}

impl Journal {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub(crate) fn record(&self, now: DateTime<Utc>, id: WalletId, digest: String, result: MergeResult) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(JournalEntry {
            time: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            id,
            digest,
            result,
        });
    }

    /// Oldest first.
    pub(crate) fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_most_recent() {
        let journal = Journal::new(2);
        for n in 0..3u64 {
            journal.record(Utc::now(), WalletId::new(n), format!("d{n}"), MergeResult::Unchanged);
        }
        let ids: Vec<u64> = journal.entries().iter().map(|e| e.id.as_u64()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn serializes_flat() {
        let journal = Journal::new(4);
        journal.record(
            Utc::now(),
            WalletId::new(1),
            "abc".to_string(),
            MergeResult::Failed {
                reason: "stale".to_string(),
            },
        );
        let json = serde_json::to_value(&journal.entries()[0]).unwrap();
        assert_eq!(json["result"], "failed");
        assert_eq!(json["reason"], "stale");
        assert_eq!(json["id"], "0000000000000001");
    }
}
