use std::{sync::Arc, time::Instant};

use tally_net_remotes::{RemoteKey, RemoteSet};
use tally_node_core::logging::TraceBuffer;
use tally_score::{Farm, Verifier};
use tally_sync::SyncHandler;
use tally_tasks::Metronome;

/// Everything the handlers share, passed as router state.
#[derive(Debug)]
pub struct NodeState {
    /// Name shown in `/` and `/remotes`.
    pub alias: String,
    pub version: String,
    /// The address this node announces in its own score.
    pub address: RemoteKey,
    /// When set, handshakes never register remotes.
    pub standalone: bool,
    pub verifier: Verifier,
    pub farm: Arc<Farm>,
    pub remotes: Arc<RemoteSet>,
    pub sync: SyncHandler,
    pub metronome: Metronome,
    pub trace: Arc<TraceBuffer>,
    pub started: Instant,
}

impl NodeState {
    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}
