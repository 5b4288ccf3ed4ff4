//! Constants used throughout the tally node.

use std::time::Duration;

// =============================================================================
// Network
// =============================================================================

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 4096;

/// Default public host announced in the node's score.
pub const DEFAULT_HOST: &str = "127.0.0.1";

// =============================================================================
// HTTP
// =============================================================================

/// Default worker threads for HTTP and merges.
pub const DEFAULT_THREADS: usize = 4;

/// Default per-request budget in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 16;

/// Requests in flight before new ones are shed.
pub const MAX_CONCURRENT_REQUESTS: usize = 256;

/// Timeout for requests to remote nodes.
pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Score
// =============================================================================

/// Default proof-of-work strength.
pub const DEFAULT_STRENGTH: u8 = tally_score::DEFAULT_STRENGTH;

/// Default farm search threads.
pub const DEFAULT_FARM_THREADS: usize = 4;

/// Age in hours after which the farm starts a fresh score.
pub const FARM_LIFETIME_HOURS: i64 = 23;

// =============================================================================
// Housekeeping
// =============================================================================

/// Interval between metronome ticks.
pub const METRONOME_INTERVAL: Duration = Duration::from_secs(60);

/// Log events kept for `/trace`.
pub const TRACE_CAPACITY: usize = 256;

/// Propagation intents buffered before new ones are dropped.
pub const PROPAGATION_QUEUE: usize = 1024;

// =============================================================================
// Storage
// =============================================================================

/// Default data directory name.
pub const DEFAULT_DATA_DIR_NAME: &str = "tally";
