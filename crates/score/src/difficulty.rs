//! Chain hashing and the difficulty predicate.
//!
//! `h_0` is the score prefix, `h_i = hex(sha256(h_{i-1} + " " + suffix_i))`.
//! A suffix is valid when its chain hash starts with `strength` zero nibbles.

use sha2::{Digest, Sha256};

/// Compute the next chain hash.
pub fn step(prev: &str, suffix: &str) -> String {
    hex::encode(Stepper::new(prev).digest(suffix))
}

/// Whether a hex hash starts with `strength` zero digits.
pub fn meets(hash: &str, strength: u8) -> bool {
    let n = strength as usize;
    hash.len() >= n && hash.bytes().take(n).all(|b| b == b'0')
}

/// Whether a raw digest starts with `strength` zero nibbles.
pub fn meets_bytes(digest: &[u8], strength: u8) -> bool {
    let nibbles = strength as usize;
    if digest.len() * 2 < nibbles {
        return false;
    }
    let (full, half) = (nibbles / 2, nibbles % 2);
    digest.iter().take(full).all(|b| *b == 0)
        && (half == 0 || digest.get(full).is_some_and(|b| b >> 4 == 0))
}

/// Hasher pre-seeded with `prev + " "`, cloned for every candidate suffix.
#[derive(Clone)]
pub(crate) struct Stepper {
    base: Sha256,
}

impl Stepper {
    pub(crate) fn new(prev: &str) -> Self {
        let mut base = Sha256::new();
        base.update(prev.as_bytes());
        base.update(b" ");
        Self { base }
    }

    pub(crate) fn digest(&self, suffix: &str) -> [u8; 32] {
        let mut hasher = self.base.clone();
        hasher.update(suffix.as_bytes());
        hasher.finalize().into()
    }

    pub(crate) fn accepts(&self, suffix: &str, strength: u8) -> bool {
        meets_bytes(&self.digest(suffix), strength)
    }
}
