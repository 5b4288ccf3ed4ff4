//! HTTP client for remote tally nodes.
//!
//! Every outgoing request carries this node's score so the remote can
//! register us as a peer in return.

pub mod headers;

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::Utc;
use futures::future::join_all;
use reqwest::{Method, RequestBuilder, StatusCode};
use tally_net_remotes::{RemoteKey, RemoteSet};
use tally_score::{Farm, Score, ScoreError, Verifier, VerifyError};
use tally_wallet::WalletId;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request to {remote} failed: {source}")]
    Http {
        remote: RemoteKey,
        #[source]
        source: reqwest::Error,
    },
    #[error("{remote} answered {status}")]
    Status { remote: RemoteKey, status: StatusCode },
    #[error("{remote} sent no score")]
    NoScore { remote: RemoteKey },
    #[error("{remote} sent a malformed score: {source}")]
    BadScore {
        remote: RemoteKey,
        #[source]
        source: ScoreError,
    },
    #[error("{remote} sent a refused score: {source}")]
    Refused {
        remote: RemoteKey,
        #[source]
        source: VerifyError,
    },
    #[error("{remote} sent a score issued for {found}")]
    Identity { remote: RemoteKey, found: RemoteKey },
}

/// How a remote answered a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStatus {
    Accepted,
    /// The remote already had this exact ledger.
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    farm: Arc<Farm>,
    version: String,
}

impl RemoteClient {
    pub fn new(farm: Arc<Farm>, version: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            farm,
            version: version.into(),
        })
    }

    fn request(&self, method: Method, remote: &RemoteKey, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("http://{remote}{path}"))
            .header(headers::SCORE, self.farm.best().to_string())
            .header(headers::VERSION, &self.version)
            .header(headers::PROTOCOL, headers::PROTOCOL_VERSION.to_string())
    }

    /// `PUT /wallet/{id}` with the raw ledger.
    pub async fn push(&self, remote: &RemoteKey, id: WalletId, raw: Bytes) -> Result<PushStatus, ClientError> {
        let response = self
            .request(Method::PUT, remote, &format!("/wallet/{id}"))
            .body(raw)
            .send()
            .await
            .map_err(|source| ClientError::Http {
                remote: remote.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(PushStatus::Accepted),
            StatusCode::NOT_MODIFIED => Ok(PushStatus::Unchanged),
            status => Err(ClientError::Status {
                remote: remote.clone(),
                status,
            }),
        }
    }

    /// Fetch the remote's current score from its response headers.
    pub async fn score(&self, remote: &RemoteKey) -> Result<Score, ClientError> {
        let response = self
            .request(Method::GET, remote, "/version")
            .send()
            .await
            .map_err(|source| ClientError::Http {
                remote: remote.clone(),
                source,
            })?;
        let header = response
            .headers()
            .get(headers::SCORE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ClientError::NoScore {
                remote: remote.clone(),
            })?;
        header.parse().map_err(|source| ClientError::BadScore {
            remote: remote.clone(),
            source,
        })
    }
}

/// Outcome of pushing one ledger to every known remote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationReport {
    pub accepted: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Outcome of re-reading the score of every known remote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub refreshed: usize,
    pub failed: usize,
}

/// Pushes accepted ledgers once to every remote currently known, and keeps
/// the remote set honest: failures count towards eviction, successes reset it.
#[derive(Debug, Clone)]
pub struct Propagator {
    client: RemoteClient,
    remotes: Arc<RemoteSet>,
}

impl Propagator {
    pub fn new(client: RemoteClient, remotes: Arc<RemoteSet>) -> Self {
        Self { client, remotes }
    }

    pub async fn propagate(&self, id: WalletId, raw: Bytes) -> PropagationReport {
        let targets = self.remotes.all();
        let pushes = targets.iter().map(|remote| {
            let raw = raw.clone();
            async move { (remote, self.client.push(&remote.key, id, raw).await) }
        });

        let mut report = PropagationReport::default();
        for (remote, result) in join_all(pushes).await {
            match result {
                Ok(PushStatus::Accepted) => {
                    report.accepted += 1;
                    self.remotes.record_success(&remote.key);
                }
                Ok(PushStatus::Unchanged) => {
                    report.unchanged += 1;
                    self.remotes.record_success(&remote.key);
                }
                Err(err) => {
                    report.failed += 1;
                    let errors = self.remotes.record_error(&remote.key);
                    warn!(%id, remote = %remote.key, ?errors, %err, "propagation failed");
                }
            }
        }

        metrics::counter!("tally_propagations_total").increment(1);
        metrics::counter!("tally_propagation_failures_total").increment(report.failed as u64);
        debug!(%id, ?report, "propagated wallet");
        report
    }

    /// Pull every remote's current score. Verified scores replace the known
    /// ones; anything else counts as a failure.
    pub async fn refresh(&self, verifier: &Verifier) -> RefreshReport {
        let targets = self.remotes.all();
        let reads = targets.iter().map(|remote| async move {
            let result = self.client.score(&remote.key).await.and_then(|score| {
                let found = RemoteKey::of(&score);
                if found != remote.key {
                    return Err(ClientError::Identity {
                        remote: remote.key.clone(),
                        found,
                    });
                }
                verifier
                    .verify(&score, Utc::now())
                    .map_err(|source| ClientError::Refused {
                        remote: remote.key.clone(),
                        source,
                    })?;
                Ok(score)
            });
            (remote, result)
        });

        let mut report = RefreshReport::default();
        for (remote, result) in join_all(reads).await {
            match result {
                Ok(score) => {
                    report.refreshed += 1;
                    self.remotes.add(remote.key.clone(), score, Utc::now());
                    self.remotes.record_success(&remote.key);
                }
                Err(err) => {
                    report.failed += 1;
                    let errors = self.remotes.record_error(&remote.key);
                    warn!(remote = %remote.key, ?errors, %err, "score refresh failed");
                }
            }
        }
        debug!(?report, "refreshed remotes");
        report
    }
}
