//! Periodic background routines.
//!
//! A [`Metronome`] runs a fixed set of named routines at a shared interval and
//! keeps per-routine statistics for diagnostics.

use std::{
    fmt::Write as _,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::TaskExecutor;

type RoutineFn = Box<dyn Fn() + Send + Sync>;

struct Routine {
    name: &'static str,
    run: RoutineFn,
    ticks: AtomicU64,
    panics: AtomicU64,
    last: Mutex<Option<(Instant, Duration)>>,
}

/// Snapshot of one routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineStatus {
    pub name: &'static str,
    pub ticks: u64,
    pub panics: u64,
    /// Duration of the last run.
    pub last_took: Option<Duration>,
    /// Time since the last run started.
    pub last_ago: Option<Duration>,
}

/// A set of routines ticking at one interval.
#[derive(Clone)]
pub struct Metronome {
    interval: Duration,
    routines: Arc<Vec<Routine>>,
    started: Instant,
}

impl std::fmt::Debug for Metronome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metronome")
            .field("interval", &self.interval)
            .field("routines", &self.routines.len())
            .finish()
    }
}

/// Builder collecting routines before the metronome starts.
pub struct MetronomeBuilder {
    interval: Duration,
    routines: Vec<Routine>,
}

impl MetronomeBuilder {
    pub fn routine<F>(mut self, name: &'static str, run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.routines.push(Routine {
            name,
            run: Box::new(run),
            ticks: AtomicU64::new(0),
            panics: AtomicU64::new(0),
            last: Mutex::new(None),
        });
        self
    }

    pub fn build(self) -> Metronome {
        Metronome {
            interval: self.interval,
            routines: Arc::new(self.routines),
            started: Instant::now(),
        }
    }
}

impl Metronome {
    pub fn builder(interval: Duration) -> MetronomeBuilder {
        MetronomeBuilder {
            interval,
            routines: Vec::new(),
        }
    }

    /// Spawn the ticking loop on the executor. It stops on shutdown.
    pub fn start(&self, executor: &TaskExecutor) {
        let metronome = self.clone();
        executor.spawn(async move {
            let mut interval = tokio::time::interval(metronome.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                metronome.tick();
            }
        });
    }

    /// Run every routine once, in registration order.
    pub fn tick(&self) {
        for routine in self.routines.iter() {
            let start = Instant::now();
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (routine.run)()));
            let took = start.elapsed();

            routine.ticks.fetch_add(1, Ordering::Relaxed);
            *routine.last.lock() = Some((start, took));

            if outcome.is_err() {
                routine.panics.fetch_add(1, Ordering::Relaxed);
                warn!(routine = routine.name, "metronome routine panicked");
            } else {
                debug!(routine = routine.name, took_ms = took.as_millis() as u64, "metronome tick");
            }
        }
    }

    pub fn status(&self) -> Vec<RoutineStatus> {
        self.routines
            .iter()
            .map(|routine| {
                let last = *routine.last.lock();
                RoutineStatus {
                    name: routine.name,
                    ticks: routine.ticks.load(Ordering::Relaxed),
                    panics: routine.panics.load(Ordering::Relaxed),
                    last_took: last.map(|(_, took)| took),
                    last_ago: last.map(|(at, _)| at.elapsed()),
                }
            })
            .collect()
    }

    /// Plain-text report, one routine per line.
    pub fn to_text(&self) -> String {
        let mut out = format!(
            "interval: {}ms, uptime: {}s\n",
            self.interval.as_millis(),
            self.started.elapsed().as_secs()
        );
        for status in self.status() {
            let _ = write!(
                out,
                "{}: {} ticks, {} panics",
                status.name, status.ticks, status.panics
            );
            if let (Some(took), Some(ago)) = (status.last_took, status.last_ago) {
                let _ = write!(
                    out,
                    ", last took {}ms, {}s ago",
                    took.as_millis(),
                    ago.as_secs()
                );
            }
            out.push('\n');
        }
        out
    }
}
