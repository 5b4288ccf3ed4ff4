//! Startup configuration checks.
//!
//! Any failure here aborts the node before it binds a port.

use tally_score::{Invoice, MAX_STRENGTH};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("alias {0:?} must be 4 to 16 letters or digits")]
    Alias(String),
    #[error("strength {0} must be between 1 and 64")]
    Strength(u8),
    #[error("host {0:?} must be non-empty without whitespace")]
    Host(String),
    #[error("invalid invoice {0:?}")]
    Invoice(String),
}

pub fn validate_alias(alias: &str) -> Result<(), ConfigError> {
    let ok = (4..=16).contains(&alias.len()) && alias.chars().all(|c| c.is_ascii_alphanumeric());
    if ok { Ok(()) } else { Err(ConfigError::Alias(alias.to_string())) }
}

pub fn validate_strength(strength: u8) -> Result<(), ConfigError> {
    if (1..=MAX_STRENGTH).contains(&strength) { Ok(()) } else { Err(ConfigError::Strength(strength)) }
}

pub fn validate_host(host: &str) -> Result<(), ConfigError> {
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(ConfigError::Host(host.to_string()));
    }
    Ok(())
}

pub fn validate_invoice(invoice: &str) -> Result<Invoice, ConfigError> {
    invoice
        .parse()
        .map_err(|_| ConfigError::Invoice(invoice.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_bounds() {
        assert!(validate_alias("node").is_ok());
        assert!(validate_alias("Node0123456789ab").is_ok());
        assert!(validate_alias("abc").is_err());
        assert!(validate_alias("Node0123456789abc").is_err());
        assert!(validate_alias("no-de").is_err());
        assert!(validate_alias("nöde").is_err());
    }

    #[test]
    fn strength_and_host() {
        assert_eq!(validate_strength(0), Err(ConfigError::Strength(0)));
        assert!(validate_strength(1).is_ok());
        assert!(validate_strength(64).is_ok());
        assert_eq!(validate_strength(65), Err(ConfigError::Strength(65)));
        assert_eq!(validate_strength(u8::MAX), Err(ConfigError::Strength(u8::MAX)));
        assert!(validate_host("").is_err());
        assert!(validate_host("a b").is_err());
        assert!(validate_host("example.com").is_ok());
    }

    #[test]
    fn invoice() {
        assert!(validate_invoice(Invoice::DEFAULT).is_ok());
        assert!(validate_invoice("short@1").is_err());
    }
}
