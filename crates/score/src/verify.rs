use chrono::{DateTime, TimeDelta, Utc};

use crate::Score;

/// Default tolerated clock skew for scores from peers.
pub const DEFAULT_MAX_SKEW_SECS: i64 = 60;

/// Why a peer's score was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("score chain does not verify")]
    Invalid,
    #[error("score is expired")]
    Expired,
    #[error("score is {ahead}s in the future")]
    FromFuture { ahead: i64 },
    #[error("score strength {strength} is below the required {required}")]
    Weak { strength: u8, required: u8 },
    #[error("score value {value} is below the required {required}")]
    Insufficient { value: usize, required: usize },
}

impl VerifyError {
    /// Whether the score is well-formed but does not meet this node's policy.
    pub fn is_policy(&self) -> bool {
        matches!(self, Self::Weak { .. } | Self::Insufficient { .. })
    }
}

/// Policy for accepting scores presented by peers.
#[derive(Debug, Clone, Copy)]
pub struct Verifier {
    pub min_strength: u8,
    pub min_value: usize,
    pub ignore_weakness: bool,
    pub max_skew: TimeDelta,
}

impl Verifier {
    pub fn new(min_strength: u8) -> Self {
        Self {
            min_strength,
            min_value: 0,
            ignore_weakness: false,
            max_skew: TimeDelta::seconds(DEFAULT_MAX_SKEW_SECS),
        }
    }

    pub fn with_min_value(mut self, min_value: usize) -> Self {
        self.min_value = min_value;
        self
    }

    pub fn with_ignore_weakness(mut self, ignore: bool) -> Self {
        self.ignore_weakness = ignore;
        self
    }

    pub fn with_max_skew(mut self, max_skew: TimeDelta) -> Self {
        self.max_skew = max_skew;
        self
    }

    /// Cheap checks run first; the chain is only recomputed when they pass.
    pub fn verify(&self, score: &Score, now: DateTime<Utc>) -> Result<(), VerifyError> {
        if !self.ignore_weakness && score.strength() < self.min_strength {
            return Err(VerifyError::Weak {
                strength: score.strength(),
                required: self.min_strength,
            });
        }
        if score.expired(now) {
            return Err(VerifyError::Expired);
        }
        let ahead = -score.age(now);
        if ahead > self.max_skew {
            return Err(VerifyError::FromFuture {
                ahead: ahead.num_seconds(),
            });
        }
        if !score.valid() {
            return Err(VerifyError::Invalid);
        }
        if !self.ignore_weakness && score.value() < self.min_value {
            return Err(VerifyError::Insufficient {
                value: score.value(),
                required: self.min_value,
            });
        }
        Ok(())
    }
}
