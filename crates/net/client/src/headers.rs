//! Header names shared by the node gate and the client.

/// The sender's score in text form.
pub const SCORE: &str = "x-tally-score";

/// Software version of the sender.
pub const VERSION: &str = "x-tally-version";

/// Protocol number of the sender.
pub const PROTOCOL: &str = "x-tally-protocol";

/// Wire protocol spoken by this release.
pub const PROTOCOL_VERSION: u32 = 2;
