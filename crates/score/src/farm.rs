//! Background producer of the node's own score.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use parking_lot::RwLock;
use rayon::ThreadPoolBuildError;
use serde::Serialize;
use tally_tasks::{Shutdown, TaskExecutor};
use tracing::{debug, info};

use crate::{Invoice, ParallelSearch, Score, ScoreError, ScoreSummary};

/// How long the farm idles between checks once `max_value` is reached.
const IDLE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct FarmConfig {
    pub host: String,
    pub port: u16,
    pub invoice: String,
    pub strength: u8,
    /// Search threads, `0` meaning one per CPU.
    pub threads: usize,
    /// Age after which the score is thrown away and farming starts over.
    pub lifetime: TimeDelta,
    /// Stop extending the score once it reaches this value.
    pub max_value: Option<usize>,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4096,
            invoice: Invoice::DEFAULT.to_string(),
            strength: crate::DEFAULT_STRENGTH,
            threads: 0,
            lifetime: TimeDelta::hours(23),
            max_value: None,
        }
    }
}

/// Snapshot of the farm for `/farm`.
#[derive(Debug, Clone, Serialize)]
pub struct FarmStatus {
    pub running: bool,
    pub strength: u8,
    pub threads: usize,
    pub restarts: u64,
    pub lifetime: i64,
    pub best: ScoreSummary,
}

/// Keeps the node's best score and extends it on a blocking thread.
///
/// Readers call [`Farm::best`]; only the farm thread writes.
#[derive(Debug)]
pub struct Farm {
    config: FarmConfig,
    best: RwLock<Score>,
    restarts: AtomicU64,
    running: AtomicBool,
}

impl Farm {
    /// A farm starting from an empty score stamped with the current hour.
    pub fn new(config: FarmConfig) -> Result<Self, ScoreError> {
        let score = fresh_score(&config, Utc::now())?;
        Ok(Self::with_score(config, score))
    }

    /// A farm starting from a given score.
    pub fn with_score(config: FarmConfig, score: Score) -> Self {
        Self {
            config,
            best: RwLock::new(score),
            restarts: AtomicU64::new(0),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &FarmConfig {
        &self.config
    }

    pub fn best(&self) -> Score {
        self.best.read().clone()
    }

    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> FarmStatus {
        FarmStatus {
            running: self.running.load(Ordering::Relaxed),
            strength: self.config.strength,
            threads: self.config.threads,
            restarts: self.restarts(),
            lifetime: self.config.lifetime.num_seconds(),
            best: self.best().summary(Utc::now()),
        }
    }

    /// Spawn the farm thread. It stops when the executor shuts down.
    pub fn start(self: &Arc<Self>, executor: &TaskExecutor) -> Result<(), ThreadPoolBuildError> {
        let search = ParallelSearch::new(self.config.threads)?;
        let farm = Arc::clone(self);
        executor.spawn_critical_blocking("score farm", move |shutdown| farm.run(&search, &shutdown));
        Ok(())
    }

    fn run(&self, search: &ParallelSearch, shutdown: &Shutdown) {
        self.running.store(true, Ordering::Relaxed);
        info!(
            strength = self.config.strength,
            threads = search.threads(),
            "score farm started"
        );

        while !shutdown.is_triggered() {
            if !self.rotate(Utc::now()) && self.saturated() {
                std::thread::sleep(IDLE);
                continue;
            }
            let next = self.best().next_with(search);
            debug!(value = next.value(), "score improved");
            metrics::counter!("tally_farm_suffixes_total").increment(1);
            *self.best.write() = next;
        }

        self.running.store(false, Ordering::Relaxed);
        info!("score farm stopped");
    }

    fn saturated(&self) -> bool {
        self.config
            .max_value
            .is_some_and(|max| self.best.read().value() >= max)
    }

    /// Replace the best score with a fresh one once it outlived the
    /// configured lifetime. Returns whether a restart happened.
    fn rotate(&self, now: DateTime<Utc>) -> bool {
        if self.best.read().age(now) < self.config.lifetime {
            return false;
        }
        match fresh_score(&self.config, now) {
            Ok(score) => {
                *self.best.write() = score;
                let restarts = self.restarts.fetch_add(1, Ordering::Relaxed) + 1;
                info!(restarts, "score farm restarted with a fresh score");
                true
            }
            Err(_) => false,
        }
    }
}

fn fresh_score(config: &FarmConfig, now: DateTime<Utc>) -> Result<Score, ScoreError> {
    let time = now.duration_trunc(TimeDelta::hours(1)).unwrap_or(now);
    Score::new(
        time,
        config.host.clone(),
        config.port,
        &config.invoice,
        config.strength,
    )
}
