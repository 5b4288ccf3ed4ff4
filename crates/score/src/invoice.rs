use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ScoreError;

const MIN_PREFIX: usize = 8;
const MAX_PREFIX: usize = 32;
const ID_LEN: usize = 16;

/// Payment target embedded in a score: `PREFIX@<16 hex digits>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Invoice {
    prefix: String,
    id: String,
}

impl Invoice {
    /// The invoice used when a node has no wallet to be paid into.
    pub const DEFAULT: &'static str = "NOPREFIX@ffffffffffffffff";

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The 16-hex-digit wallet id part.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Default for Invoice {
    fn default() -> Self {
        Self {
            prefix: "NOPREFIX".to_string(),
            id: "ffffffffffffffff".to_string(),
        }
    }
}

impl FromStr for Invoice {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScoreError::format(format!("invalid invoice `{s}`"));
        let (prefix, id) = s.split_once('@').ok_or_else(invalid)?;

        let prefix_ok = (MIN_PREFIX..=MAX_PREFIX).contains(&prefix.len())
            && prefix.bytes().all(|b| b.is_ascii_alphanumeric());
        let id_ok = id.len() == ID_LEN
            && id
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));

        if !prefix_ok || !id_ok {
            return Err(invalid());
        }

        Ok(Self {
            prefix: prefix.to_string(),
            id: id.to_string(),
        })
    }
}

impl TryFrom<String> for Invoice {
    type Error = ScoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Invoice> for String {
    fn from(invoice: Invoice) -> Self {
        invoice.to_string()
    }
}

impl fmt::Display for Invoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.prefix, self.id)
    }
}
