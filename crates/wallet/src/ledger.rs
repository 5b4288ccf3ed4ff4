//! Ledger text format.
//!
//! ```text
//! network
//! protocol
//! id
//! key
//!
//! txn_id;time;amount;prefix;bnf;details;signature
//! ...
//! ```

use std::{collections::HashSet, fmt, str::FromStr};

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::WalletId;

const TXN_FIELDS: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger is not valid UTF-8")]
    Utf8,
    #[error("ledger header is missing `{0}`")]
    MissingHeader(&'static str),
    #[error("invalid ledger header `{field}`: `{value}`")]
    Header { field: &'static str, value: String },
    #[error("line {line}: {reason}")]
    Txn { line: usize, reason: String },
    #[error("duplicate transaction {0}")]
    Duplicate(String),
}

/// Identity of a transaction within a ledger: id, beneficiary and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxnKey {
    pub id: u16,
    pub bnf: WalletId,
    pub outgoing: bool,
}

impl fmt::Display for TxnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.outgoing { '-' } else { '+' };
        write!(f, "{dir}{:04x}@{}", self.id, self.bnf)
    }
}

/// One ledger line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Txn {
    pub id: u16,
    pub time: DateTime<Utc>,
    /// Minor units; negative when paying out.
    pub amount: i64,
    pub prefix: String,
    pub bnf: WalletId,
    pub details: String,
    pub signature: String,
}

impl Txn {
    pub fn key(&self) -> TxnKey {
        TxnKey {
            id: self.id,
            bnf: self.bnf,
            outgoing: self.amount < 0,
        }
    }

    fn parse_line(line: &str, number: usize) -> Result<Self, LedgerError> {
        let bad = |reason: String| LedgerError::Txn {
            line: number,
            reason,
        };
        let fields: Vec<&str> = line.split(';').collect();
        let [id, time, amount, prefix, bnf, details, signature] = fields[..] else {
            return Err(bad(format!(
                "expected {TXN_FIELDS} fields, found {}",
                fields.len()
            )));
        };

        if id.len() != 4 {
            return Err(bad(format!("invalid txn id `{id}`")));
        }
        let id = u16::from_str_radix(id, 16).map_err(|_| bad(format!("invalid txn id `{id}`")))?;
        let time = DateTime::parse_from_rfc3339(time)
            .map_err(|_| bad(format!("invalid time `{time}`")))?
            .with_timezone(&Utc);
        let amount: i64 = amount
            .parse()
            .map_err(|_| bad(format!("invalid amount `{amount}`")))?;
        if amount == 0 {
            return Err(bad("zero amount".to_string()));
        }
        if prefix.is_empty() {
            return Err(bad("empty prefix".to_string()));
        }
        let bnf: WalletId = bnf.parse().map_err(|e| bad(format!("{e}")))?;

        Ok(Self {
            id,
            time,
            amount,
            prefix: prefix.to_string(),
            bnf,
            details: details.to_string(),
            signature: signature.to_string(),
        })
    }
}

impl fmt::Display for Txn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x};{};{};{};{};{};{}",
            self.id,
            self.time.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.amount,
            self.prefix,
            self.bnf,
            self.details,
            self.signature
        )
    }
}

/// A parsed wallet ledger together with its exact bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    pub network: String,
    pub protocol: u32,
    pub id: WalletId,
    pub key: String,
    pub txns: Vec<Txn>,
    raw: Bytes,
}

impl Ledger {
    /// Render a ledger from its parts.
    pub fn new(
        network: impl Into<String>,
        protocol: u32,
        id: WalletId,
        key: impl Into<String>,
        txns: Vec<Txn>,
    ) -> Self {
        let network = network.into();
        let key = key.into();
        let mut text = format!("{network}\n{protocol}\n{id}\n{key}\n\n");
        for txn in &txns {
            text.push_str(&txn.to_string());
            text.push('\n');
        }
        Self {
            network,
            protocol,
            id,
            key,
            txns,
            raw: Bytes::from(text),
        }
    }

    pub fn parse(raw: impl Into<Bytes>) -> Result<Self, LedgerError> {
        let raw = raw.into();
        let text = std::str::from_utf8(&raw).map_err(|_| LedgerError::Utf8)?;
        let mut lines = text.lines();

        let mut header = |field: &'static str| lines.next().ok_or(LedgerError::MissingHeader(field));
        let network = header("network")?;
        let protocol = header("protocol")?;
        let id = header("id")?;
        let key = header("key")?;
        let separator = header("separator")?;

        if network.is_empty() || network.contains(char::is_whitespace) {
            return Err(LedgerError::Header {
                field: "network",
                value: network.to_string(),
            });
        }
        let protocol = u32::from_str(protocol).map_err(|_| LedgerError::Header {
            field: "protocol",
            value: protocol.to_string(),
        })?;
        let id: WalletId = id.parse().map_err(|_| LedgerError::Header {
            field: "id",
            value: id.to_string(),
        })?;
        if key.is_empty() {
            return Err(LedgerError::Header {
                field: "key",
                value: String::new(),
            });
        }
        if !separator.is_empty() {
            return Err(LedgerError::Header {
                field: "separator",
                value: separator.to_string(),
            });
        }

        let mut txns = Vec::new();
        let mut seen = HashSet::new();
        let mut balance = 0i64;
        for (offset, line) in lines.enumerate() {
            if line.is_empty() {
                continue;
            }
            let number = offset + 6;
            let txn = Txn::parse_line(line, number)?;
            if !seen.insert(txn.key()) {
                return Err(LedgerError::Duplicate(txn.key().to_string()));
            }
            balance = balance.checked_add(txn.amount).ok_or_else(|| LedgerError::Txn {
                line: number,
                reason: "balance overflow".to_string(),
            })?;
            txns.push(txn);
        }

        Ok(Self {
            network: network.to_string(),
            protocol,
            id,
            key: key.to_string(),
            txns,
            raw,
        })
    }

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn size(&self) -> usize {
        self.raw.len()
    }

    /// Hex SHA-256 of the raw bytes.
    pub fn digest(&self) -> String {
        digest(&self.raw)
    }

    /// Sum of all amounts. Parsed ledgers never overflow; locally built ones saturate.
    pub fn balance(&self) -> i64 {
        self.txns.iter().fold(0i64, |sum, t| sum.saturating_add(t.amount))
    }

    pub fn txn(&self, key: &TxnKey) -> Option<&Txn> {
        self.txns.iter().find(|t| t.key() == *key)
    }
}

/// Hex SHA-256 of arbitrary bytes.
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
