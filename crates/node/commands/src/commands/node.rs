//! Node command - Run a ledger node
//!
//! This command starts a node with the specified configuration.
//! It handles:
//!
//! - Loading configuration from defaults, env, config file, and CLI
//! - Building the runtime with the configured worker threads
//! - Starting the score farm, wallet store and merge pipeline
//! - Propagating applied wallets to known remotes
//! - Running the HTTP server until shutdown is requested

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use chrono::Utc;
use eyre::{Result, WrapErr};
use tally_net_client::{Propagator, RemoteClient};
use tally_net_remotes::{RemoteKey, RemoteSet};
use tally_node_core::{
    constants::{MAX_CONCURRENT_REQUESTS, METRONOME_INTERVAL, PROPAGATION_QUEUE, REMOTE_TIMEOUT},
    dirs::DataDirs,
    logging::TraceBuffer,
    version::VERSION,
};
use tally_rpc_server::{HttpServer, HttpServerConfig, NodeState};
use tally_score::Farm;
use tally_sync::{PropagationIntent, SyncConfig, SyncHandler};
use tally_tasks::{Metronome, TaskManager};
use tally_wallet::{FileWalletStore, MemoryWalletStore, WalletStore};
use tokio::{net::TcpListener, sync::mpsc};
use tracing::{debug, error, info, warn};

use crate::{cli::NodeArgs, config::NodeConfig};

/// Run the node command
pub fn run(args: NodeArgs, trace: Arc<TraceBuffer>) -> Result<()> {
    // Initialize data directories
    let dirs = DataDirs::new(&args.datadir)?;
    info!("Data directory: {}", dirs.root.display());

    // Load configuration (defaults < env < config file < CLI)
    let config = NodeConfig::load(Some(&dirs.config_file()), &args.overrides())?;
    config.validate().wrap_err("Invalid configuration")?;
    log_node_config(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.threads())
        .thread_name("tally-worker")
        .enable_all()
        .build()
        .wrap_err("Failed to build tokio runtime")?;

    runtime.block_on(serve(config, dirs, trace))
}

async fn serve(config: NodeConfig, dirs: DataDirs, trace: Arc<TraceBuffer>) -> Result<()> {
    // Create task manager for centralized task lifecycle management
    let mut task_manager = TaskManager::current();
    let executor = task_manager.executor();

    let farm = Arc::new(Farm::new(config.farm_config())?);
    farm.start(&executor).wrap_err("Failed to start score farm")?;
    info!(strength = config.score.strength, "Score farm started");

    let store: Arc<dyn WalletStore> = if config.storage.memory {
        info!("Wallets: in memory");
        Arc::new(MemoryWalletStore::new())
    } else {
        let dir = dirs.wallets_dir();
        info!("Wallets: {}", dir.display());
        Arc::new(
            FileWalletStore::new(dir.clone())
                .wrap_err_with(|| format!("failed to open wallet store: {}", dir.display()))?,
        )
    };

    let remotes = Arc::new(RemoteSet::new());

    let (intents_tx, intents_rx) = if config.network.standalone {
        info!("Standalone: remotes are neither registered nor pushed to");
        (None, None)
    } else {
        let (tx, rx) = mpsc::channel(PROPAGATION_QUEUE);
        (Some(tx), Some(rx))
    };

    let sync = SyncHandler::new(
        store,
        executor.clone(),
        SyncConfig {
            threads: config.threads(),
            ..Default::default()
        },
        intents_tx,
    );

    let propagator = match intents_rx {
        Some(intents) => {
            let client = RemoteClient::new(farm.clone(), VERSION, REMOTE_TIMEOUT)
                .wrap_err("Failed to build remote client")?;
            let propagator = Propagator::new(client, remotes.clone());
            executor.spawn_critical("propagation", propagate(intents, sync.clone(), propagator.clone()));
            Some(propagator)
        }
        None => None,
    };

    let mut metronome = Metronome::builder(METRONOME_INTERVAL)
        .routine("remotes", {
            let remotes = remotes.clone();
            move || {
                let removed = remotes.sweep_expired(Utc::now());
                if removed > 0 {
                    info!(removed, left = remotes.len(), "Dropped remotes with expired scores");
                }
            }
        })
        .routine("farm", {
            let farm = farm.clone();
            move || {
                let best = farm.best();
                info!(
                    value = best.value(),
                    tier = %best.tier(),
                    restarts = farm.restarts(),
                    "Farm status"
                );
            }
        });
    if let Some(propagator) = propagator {
        let verifier = config.verifier();
        let executor = executor.clone();
        let running = Arc::new(AtomicBool::new(false));
        metronome = metronome.routine("refresh", move || {
            if running.swap(true, Ordering::AcqRel) {
                debug!("Remote refresh still running");
                return;
            }
            let propagator = propagator.clone();
            let running = running.clone();
            executor.spawn(async move {
                let report = propagator.refresh(&verifier).await;
                if report.failed > 0 {
                    info!(refreshed = report.refreshed, failed = report.failed, "Refreshed remotes");
                }
                running.store(false, Ordering::Release);
            });
        });
    }
    let metronome = metronome.build();
    metronome.start(&executor);

    let state = Arc::new(NodeState {
        alias: config.alias(),
        version: VERSION.to_string(),
        address: RemoteKey::new(config.network.host.clone(), config.network.port),
        standalone: config.network.standalone,
        verifier: config.verifier(),
        farm,
        remotes,
        sync,
        metronome,
        trace,
        started: Instant::now(),
    });

    let http_config = HttpServerConfig {
        addr: config.bind_addr(),
        timeout: Duration::from_secs(config.http.timeout),
        max_concurrent: MAX_CONCURRENT_REQUESTS,
    };
    let listener = TcpListener::bind(http_config.addr)
        .await
        .wrap_err_with(|| format!("Failed to bind {}", http_config.addr))?;
    let server = HttpServer::new(http_config, state);

    let running = server.clone();
    executor.spawn_critical("http_server", async move {
        if let Err(e) = running.serve(listener).await {
            error!("HTTP server error: {}", e);
        }
    });

    info!("Starting node... (press Ctrl+C to stop)");

    // Wait for shutdown signal or critical task panic
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = &mut task_manager => {
            match result {
                Ok(()) => info!("Task manager shutdown cleanly"),
                Err(panic_err) => error!("Critical task panicked: {}", panic_err),
            }
        }
    }

    if let Err(e) = server.stop() {
        warn!("Failed to stop HTTP server: {}", e);
    }
    task_manager.graceful_shutdown();

    info!("Node shutdown complete");
    Ok(())
}

/// Push every applied wallet once to all known remotes.
async fn propagate(
    mut intents: mpsc::Receiver<PropagationIntent>,
    sync: SyncHandler,
    propagator: Propagator,
) {
    while let Some(intent) = intents.recv().await {
        let wallet = match sync.wallet(&intent.id) {
            Ok(Some(wallet)) => wallet,
            Ok(None) => continue,
            Err(e) => {
                warn!(id = %intent.id, "Failed to load wallet for propagation: {}", e);
                continue;
            }
        };
        if wallet.digest() != intent.digest {
            debug!(id = %intent.id, "Skipping superseded propagation");
            continue;
        }
        let report = propagator
            .propagate(intent.id, wallet.ledger().raw().clone())
            .await;
        debug!(id = %intent.id, ?report, "Propagation done");
    }
}

/// Log the node configuration for debugging
fn log_node_config(config: &NodeConfig) {
    info!("Network configuration:");
    info!("  Alias: {}", config.alias());
    info!("  Public address: {}:{}", config.network.host, config.network.port);
    info!("  Listen address: {}", config.bind_addr());
    info!("  Invoice: {}", config.network.invoice);
    info!("  Standalone: {}", config.network.standalone);

    info!("HTTP configuration:");
    info!("  Threads: {}", config.threads());
    info!("  Timeout: {}s", config.http.timeout);

    info!("Score configuration:");
    info!("  Strength: {}", config.score.strength);
    info!("  Farm threads: {}", config.farm_config().threads);
    if config.score.ignore_weakness {
        warn!("  Accepting weak peer scores");
    }
    if config.score.min_value > 0 {
        info!("  Minimum peer value: {}", config.score.min_value);
    }
}
