//! HTTP server for tally nodes.
//!
//! Serves the wallet views and pushes, guarded by the score gate. Every
//! response, including errors and timeouts, carries this node's score.
//!
//! # Usage
//!
//! ```ignore
//! use tally_rpc_server::{HttpServer, HttpServerConfig};
//!
//! let server = HttpServer::new(HttpServerConfig::default(), state);
//! server.start().await?;
//! ```

mod error;
mod gate;
mod routes;
mod state;

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    error_handling::HandleErrorLayer,
    middleware,
    routing::get,
};
use tokio::{net::TcpListener, sync::watch};
use tower::{ServiceBuilder, limit::ConcurrencyLimitLayer, load_shed::LoadShedLayer, timeout::TimeoutLayer};
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer, trace::TraceLayer};
use tracing::{info, warn};

pub use error::ApiError;
pub use gate::Peer;
pub use state::NodeState;

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Address to bind to.
    pub addr: SocketAddr,
    /// Budget for a single request.
    pub timeout: Duration,
    /// Requests in flight before new ones are shed.
    pub max_concurrent: usize,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], tally_node_core::constants::DEFAULT_PORT)),
            timeout: Duration::from_secs(tally_node_core::constants::DEFAULT_TIMEOUT_SECS),
            max_concurrent: tally_node_core::constants::MAX_CONCURRENT_REQUESTS,
        }
    }
}

/// Build the full router with all middleware.
pub fn router(state: Arc<NodeState>, config: &HttpServerConfig) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/robots.txt", get(routes::robots))
        .route("/version", get(routes::version))
        .route("/remotes", get(routes::remotes))
        .route("/farm", get(routes::farm))
        .route("/metronome", get(routes::metronome))
        .route("/score", get(routes::score))
        .route("/trace", get(routes::trace))
        .route("/wallets", get(routes::wallets))
        .route("/wallet/{id}", get(routes::wallet).put(routes::push))
        .route("/wallet/{id}/{field}", get(routes::wallet_field))
        .fallback(routes::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), gate::gate))
        .with_state(state.clone())
        // `HandleErrorLayer` must wrap the fallible layers to make the service infallible.
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(gate::map_middleware_error))
                .layer(LoadShedLayer::new())
                .layer(ConcurrencyLimitLayer::new(config.max_concurrent.max(1)))
                .layer(TimeoutLayer::new(config.timeout)),
        )
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(gate::buffer))
        .layer(middleware::from_fn_with_state(state, gate::stamp))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// HTTP server for tally nodes.
pub struct HttpServer {
    config: HttpServerConfig,
    state: Arc<NodeState>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    running: AtomicBool,
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, state: Arc<NodeState>) -> Arc<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Arc::new(Self {
            config,
            state,
            shutdown_tx,
            shutdown_rx,
            running: AtomicBool::new(false),
        })
    }

    pub fn router(&self) -> Router {
        router(self.state.clone(), &self.config)
    }

    /// Bind the configured address and serve until stopped.
    pub async fn start(&self) -> eyre::Result<()> {
        let listener = TcpListener::bind(self.config.addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until stopped.
    pub async fn serve(&self, listener: TcpListener) -> eyre::Result<()> {
        info!(addr = %listener.local_addr()?, alias = %self.state.alias, "Starting HTTP server");
        self.running.store(true, Ordering::SeqCst);

        let mut shutdown_rx = self.shutdown_rx.clone();
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await;

        self.running.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => {
                info!("HTTP server stopped");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "HTTP server error");
                Err(e.into())
            }
        }
    }

    pub fn stop(&self) -> eyre::Result<()> {
        info!("Stopping HTTP server");
        self.shutdown_tx.send(true)?;
        Ok(())
    }

    pub fn address(&self) -> SocketAddr {
        self.config.addr
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
