use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::{Ledger, WalletId};

/// A stored wallet: the ledger plus what this node knows about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    ledger: Ledger,
    mtime: DateTime<Utc>,
    copies: BTreeSet<String>,
}

impl Wallet {
    pub fn new(ledger: Ledger, mtime: DateTime<Utc>) -> Self {
        Self {
            ledger,
            mtime,
            copies: BTreeSet::new(),
        }
    }

    pub(crate) fn from_parts(ledger: Ledger, mtime: DateTime<Utc>, copies: BTreeSet<String>) -> Self {
        Self {
            ledger,
            mtime,
            copies,
        }
    }

    /// Replace the ledger, keeping the known copies.
    pub fn updated(mut self, ledger: Ledger, mtime: DateTime<Utc>) -> Self {
        self.ledger = ledger;
        self.mtime = mtime;
        self
    }

    /// Record a remote node (`host:port`) as holding this wallet.
    pub fn with_copy(mut self, peer: impl Into<String>) -> Self {
        self.copies.insert(peer.into());
        self
    }

    pub fn id(&self) -> WalletId {
        self.ledger.id
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn mtime(&self) -> DateTime<Utc> {
        self.mtime
    }

    pub fn balance(&self) -> i64 {
        self.ledger.balance()
    }

    pub fn key(&self) -> &str {
        &self.ledger.key
    }

    pub fn digest(&self) -> String {
        self.ledger.digest()
    }

    pub fn size(&self) -> usize {
        self.ledger.size()
    }

    pub fn copies(&self) -> usize {
        self.copies.len()
    }

    pub fn copy_holders(&self) -> &BTreeSet<String> {
        &self.copies
    }

    pub fn view(&self) -> WalletView {
        WalletView {
            id: self.id(),
            balance: self.balance(),
            key: self.key().to_string(),
            mtime: self.mtime.to_rfc3339_opts(SecondsFormat::Secs, true),
            digest: self.digest(),
            copies: self.copies(),
            size: self.size(),
            txns: self.ledger.txns.len(),
            body: String::from_utf8_lossy(self.ledger.raw()).into_owned(),
        }
    }

    /// Short plain-text summary used by the `.txt` view.
    pub fn to_text(&self) -> String {
        let mut out = format!(
            "id: {}\nnetwork: {}\nprotocol: {}\nkey: {}\nbalance: {}\ntxns: {}\ndigest: {}\nmtime: {}\ncopies: {}\n",
            self.id(),
            self.ledger.network,
            self.ledger.protocol,
            self.key(),
            self.balance(),
            self.ledger.txns.len(),
            self.digest(),
            self.mtime.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.copies(),
        );
        if !self.ledger.txns.is_empty() {
            out.push('\n');
        }
        for txn in &self.ledger.txns {
            out.push_str(&format!(
                "{:04x} {:>12} {} {}\n",
                txn.id, txn.amount, txn.bnf, txn.details
            ));
        }
        out
    }
}

/// JSON form of `GET /wallet/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct WalletView {
    pub id: WalletId,
    pub balance: i64,
    pub key: String,
    pub mtime: String,
    pub digest: String,
    pub copies: usize,
    pub size: usize,
    pub txns: usize,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::ledger::tests::{ledger, txn};

    fn mtime() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap()
    }

    #[test]
    fn projections() {
        let wallet = Wallet::new(ledger(7, vec![txn(1, 900, 2), txn(2, -100, 3)]), mtime());
        assert_eq!(wallet.id(), WalletId::new(7));
        assert_eq!(wallet.balance(), 800);
        assert_eq!(wallet.copies(), 0);
        assert_eq!(wallet.size(), wallet.ledger().raw().len());

        let view = wallet.view();
        assert_eq!(view.id.to_string(), "0000000000000007");
        assert_eq!(view.mtime, "2026-10-19T08:30:00Z");
        assert_eq!(view.txns, 2);
        assert_eq!(view.digest, wallet.digest());
    }

    #[test]
    fn copies_are_distinct() {
        let wallet = Wallet::new(ledger(7, vec![]), mtime())
            .with_copy("a.example:4096")
            .with_copy("b.example:4096")
            .with_copy("a.example:4096");
        assert_eq!(wallet.copies(), 2);

        let updated = wallet.updated(ledger(7, vec![txn(1, 5, 2)]), mtime());
        assert_eq!(updated.copies(), 2);
        assert_eq!(updated.balance(), 5);
    }

    #[test]
    fn text_summary() {
        let wallet = Wallet::new(ledger(7, vec![txn(1, 900, 2)]), mtime());
        let text = wallet.to_text();
        assert!(text.starts_with("id: 0000000000000007\n"));
        assert!(text.contains("balance: 900\n"));
        assert!(text.contains("0001          900 0000000000000002 payment 1\n"));
    }
}
