use std::{fmt, str::FromStr};

use chrono::{DateTime, SecondsFormat, SubsecRound, TimeDelta, Utc};
use serde::Serialize;

use crate::{
    Invoice, MAX_STRENGTH, ScoreError,
    difficulty::{meets, step},
    search::{SequentialSearch, SuffixSearch},
};

/// Hours after which a score is expired.
pub const SCORE_LIFETIME_HOURS: i64 = 24;

/// Coarse trust tier derived from a score's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    Medium,
    High,
}

impl Tier {
    pub fn of(value: usize) -> Self {
        match value {
            16.. => Self::High,
            4..=15 => Self::Medium,
            _ => Self::Low,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// Immutable proof-of-work score.
///
/// The text form, also used verbatim in the `X-Tally-Score` header, is
/// `"{strength}/{value}: {time} {host} {port} {invoice} {suffix}*"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    time: DateTime<Utc>,
    host: String,
    port: u16,
    invoice: Invoice,
    strength: u8,
    suffixes: Vec<String>,
}

impl Score {
    /// An empty score with value zero.
    pub fn new(
        time: DateTime<Utc>,
        host: impl Into<String>,
        port: u16,
        invoice: &str,
        strength: u8,
    ) -> Result<Self, ScoreError> {
        let invoice = invoice.parse()?;
        Self::from_parts(time, host.into(), port, invoice, strength, Vec::new())
    }

    fn from_parts(
        time: DateTime<Utc>,
        host: String,
        port: u16,
        invoice: Invoice,
        strength: u8,
        suffixes: Vec<String>,
    ) -> Result<Self, ScoreError> {
        if !(1..=MAX_STRENGTH).contains(&strength) {
            return Err(ScoreError::format(format!(
                "strength {strength} is outside 1..={MAX_STRENGTH}"
            )));
        }
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(ScoreError::format(format!("invalid host `{host}`")));
        }
        if let Some(bad) = suffixes.iter().find(|s| !valid_token(s)) {
            return Err(ScoreError::format(format!("invalid suffix `{bad}`")));
        }
        Ok(Self {
            time: time.trunc_subsecs(0),
            host,
            port,
            invoice,
            strength,
            suffixes,
        })
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn invoice(&self) -> &Invoice {
        &self.invoice
    }

    pub fn strength(&self) -> u8 {
        self.strength
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    /// The number of suffixes found for this score.
    pub fn value(&self) -> usize {
        self.suffixes.len()
    }

    pub fn tier(&self) -> Tier {
        Tier::of(self.value())
    }

    /// `h_0` of the chain.
    pub fn prefix(&self) -> String {
        format!(
            "{} {} {} {}",
            self.time.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.host,
            self.port,
            self.invoice
        )
    }

    /// The last chain hash, or the prefix for an empty score.
    pub fn tip(&self) -> String {
        self.suffixes
            .iter()
            .fold(self.prefix(), |prev, suffix| step(&prev, suffix))
    }

    /// Extend the chain by one suffix using the default search.
    pub fn next(&self) -> Self {
        self.next_with(&SequentialSearch::default())
    }

    /// Extend the chain by one suffix found by `search`.
    pub fn next_with(&self, search: &impl SuffixSearch) -> Self {
        let suffix = search.find(&self.tip(), self.strength);
        let mut next = self.clone();
        next.suffixes.push(suffix);
        next
    }

    /// Recompute the whole chain; every suffix must meet the strength.
    pub fn valid(&self) -> bool {
        let mut prev = self.prefix();
        for suffix in &self.suffixes {
            let hash = step(&prev, suffix);
            if !meets(&hash, self.strength) {
                return false;
            }
            prev = hash;
        }
        true
    }

    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.time)
    }

    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        self.age(now) > TimeDelta::hours(SCORE_LIFETIME_HOURS)
    }

    /// The same score cut down to its first `max` suffixes.
    pub fn reduced(&self, max: usize) -> Self {
        let mut reduced = self.clone();
        reduced.suffixes.truncate(max);
        reduced
    }

    pub fn summary(&self, now: DateTime<Utc>) -> ScoreSummary {
        ScoreSummary {
            value: self.value(),
            strength: self.strength,
            tier: self.tier(),
            host: self.host.clone(),
            port: self.port,
            invoice: self.invoice.to_string(),
            time: self.time.to_rfc3339_opts(SecondsFormat::Secs, true),
            age: self.age(now).num_seconds(),
            expired: self.expired(now),
            suffixes: self.suffixes.clone(),
            text: self.to_string(),
        }
    }
}

fn valid_token(token: &str) -> bool {
    !token.is_empty() && !token.contains(|c: char| c.is_whitespace() || c == '/' || c == ':')
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.strength, self.value(), self.prefix())?;
        for suffix in &self.suffixes {
            write!(f, " {suffix}")?;
        }
        Ok(())
    }
}

impl FromStr for Score {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let broken = |what: &str| ScoreError::format(format!("{what} in `{s}`"));

        let (head, body) = s.trim().split_once(": ").ok_or_else(|| broken("no header"))?;
        let (strength, value) = head.split_once('/').ok_or_else(|| broken("no value"))?;
        let strength: u8 = strength.parse().map_err(|_| broken("bad strength"))?;
        let value: usize = value.parse().map_err(|_| broken("bad value"))?;

        let mut parts = body.split_whitespace();
        let mut field = |name: &str| parts.next().ok_or_else(|| broken(&format!("missing {name}")));
        let time = DateTime::parse_from_rfc3339(field("time")?)
            .map_err(|_| broken("bad time"))?
            .with_timezone(&Utc);
        let host = field("host")?.to_string();
        let port: u16 = field("port")?.parse().map_err(|_| broken("bad port"))?;
        let invoice: Invoice = field("invoice")?.parse()?;
        let suffixes: Vec<String> = parts.map(str::to_string).collect();

        if suffixes.len() != value {
            return Err(broken(&format!(
                "declared value {value} but {} suffixes",
                suffixes.len()
            )));
        }

        Self::from_parts(time, host, port, invoice, strength, suffixes)
    }
}

/// JSON view of a score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreSummary {
    pub value: usize,
    pub strength: u8,
    pub tier: Tier,
    pub host: String,
    pub port: u16,
    pub invoice: String,
    pub time: String,
    /// Seconds since `time`.
    pub age: i64,
    pub expired: bool,
    pub suffixes: Vec<String>,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, hour, 0, 0).unwrap()
    }

    fn fresh(strength: u8) -> Score {
        Score::new(at(10), "localhost", 4096, Invoice::DEFAULT, strength).unwrap()
    }

    #[test]
    fn new_score_is_empty() {
        let score = fresh(2);
        assert_eq!(score.value(), 0);
        assert!(score.valid());
        assert_eq!(score.tip(), score.prefix());
        assert_eq!(
            score.prefix(),
            "2026-10-19T10:00:00Z localhost 4096 NOPREFIX@ffffffffffffffff"
        );
    }

    #[test]
    fn rejects_bad_construction() {
        assert!(matches!(
            Score::new(at(10), "localhost", 4096, Invoice::DEFAULT, 0),
            Err(ScoreError::Format(_))
        ));
        assert!(matches!(
            Score::new(at(10), "localhost", 4096, Invoice::DEFAULT, MAX_STRENGTH + 1),
            Err(ScoreError::Format(_))
        ));
        assert!(Score::new(at(10), "localhost", 4096, Invoice::DEFAULT, MAX_STRENGTH).is_ok());
        assert!(matches!(
            Score::new(at(10), "local host", 4096, Invoice::DEFAULT, 2),
            Err(ScoreError::Format(_))
        ));
        assert!(matches!(
            Score::new(at(10), "", 4096, Invoice::DEFAULT, 2),
            Err(ScoreError::Format(_))
        ));
        assert!(matches!(
            Score::new(at(10), "localhost", 4096, "bad", 2),
            Err(ScoreError::Format(_))
        ));
    }

    #[test]
    fn next_increments_value() {
        let mut score = fresh(2);
        for expected in 1..=5 {
            let next = score.next();
            assert_eq!(next.value(), score.value() + 1);
            assert_eq!(next.value(), expected);
            assert!(next.valid());
            score = next;
        }
    }

    #[test]
    fn next_leaves_original_untouched() {
        let score = fresh(2).next();
        let snapshot = score.clone();
        let _ = score.next();
        assert_eq!(score, snapshot);
    }

    #[test]
    fn tampered_suffix_is_invalid() {
        let score = fresh(4).next().next().next();
        let mut tampered = score.clone();
        let last = tampered.suffixes.last_mut().unwrap();
        last.replace_range(..1, "z");
        assert_eq!(tampered.value(), score.value());
        assert!(!tampered.valid());

        let parsed: Score = tampered.to_string().parse().unwrap();
        assert!(!parsed.valid());
    }

    #[test]
    fn changed_identity_invalidates_chain() {
        let score = fresh(3).next().next();
        let moved: Score = score
            .to_string()
            .replace("localhost", "otherhost")
            .parse()
            .unwrap();
        assert!(!moved.valid());
    }

    #[test]
    fn text_form() {
        let score = fresh(1).next();
        let text = score.to_string();
        assert!(text.starts_with(
            "1/1: 2026-10-19T10:00:00Z localhost 4096 NOPREFIX@ffffffffffffffff "
        ));
        assert_eq!(text.parse::<Score>().unwrap(), score);
    }

    #[test]
    fn parse_rejects_value_mismatch() {
        let text = fresh(1).next().to_string().replacen("1/1:", "1/2:", 1);
        assert!(matches!(text.parse::<Score>(), Err(ScoreError::Format(_))));
    }

    #[test]
    fn parse_rejects_broken_structure() {
        for bad in [
            "",
            "garbage",
            "6/0 2026-10-19T10:00:00Z localhost 4096 NOPREFIX@ffffffffffffffff",
            "x/0: 2026-10-19T10:00:00Z localhost 4096 NOPREFIX@ffffffffffffffff",
            "6/0: yesterday localhost 4096 NOPREFIX@ffffffffffffffff",
            "6/0: 2026-10-19T10:00:00Z localhost port NOPREFIX@ffffffffffffffff",
            "6/0: 2026-10-19T10:00:00Z localhost 4096",
            "6/0: 2026-10-19T10:00:00Z localhost 4096 nope",
            "0/0: 2026-10-19T10:00:00Z localhost 4096 NOPREFIX@ffffffffffffffff",
        ] {
            assert!(bad.parse::<Score>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn expiry() {
        let score = fresh(1);
        assert!(!score.expired(at(10) + TimeDelta::hours(24)));
        assert!(score.expired(at(10) + TimeDelta::hours(24) + TimeDelta::seconds(1)));
        assert_eq!(score.age(at(12)), TimeDelta::hours(2));
    }

    #[test]
    fn tiers() {
        assert_eq!(Tier::of(0), Tier::Low);
        assert_eq!(Tier::of(3), Tier::Low);
        assert_eq!(Tier::of(4), Tier::Medium);
        assert_eq!(Tier::of(15), Tier::Medium);
        assert_eq!(Tier::of(16), Tier::High);
        assert_eq!(Tier::of(100), Tier::High);
    }

    #[test]
    fn reduced_keeps_prefix_of_chain() {
        let score = fresh(1).next().next().next();
        let reduced = score.reduced(2);
        assert_eq!(reduced.value(), 2);
        assert_eq!(reduced.suffixes(), &score.suffixes()[..2]);
        assert!(reduced.valid());
        assert_eq!(score.reduced(10), score);
    }

    #[test]
    fn time_drops_subseconds() {
        let time = at(10) + TimeDelta::milliseconds(750);
        let score = Score::new(time, "localhost", 4096, Invoice::DEFAULT, 1).unwrap();
        assert_eq!(score.time(), at(10));
    }

    #[test]
    fn summary_reports_tier_and_expiry() {
        let score = fresh(1).next();
        let summary = score.summary(at(11));
        assert_eq!(summary.value, 1);
        assert_eq!(summary.tier, Tier::Low);
        assert_eq!(summary.age, 3600);
        assert!(!summary.expired);
        assert_eq!(summary.text, score.to_string());
    }

    proptest! {
        #[test]
        fn text_round_trip(
            secs in 0i64..4_000_000_000,
            host in "[a-z][a-z0-9.-]{0,20}",
            port in any::<u16>(),
            prefix in "[A-Za-z0-9]{8,32}",
            id in "[0-9a-f]{16}",
            strength in 1u8..=64,
            suffixes in proptest::collection::vec("[0-9a-zA-Z+=_-]{1,16}", 0..8),
        ) {
            let time = Utc.timestamp_opt(secs, 0).unwrap();
            let invoice = format!("{prefix}@{id}");
            let mut score = Score::new(time, host, port, &invoice, strength).unwrap();
            score.suffixes = suffixes;

            let parsed: Score = score.to_string().parse().unwrap();
            prop_assert_eq!(parsed.value(), score.value());
            prop_assert_eq!(&parsed, &score);
        }
    }
}
