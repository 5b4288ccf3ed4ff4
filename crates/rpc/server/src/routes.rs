//! Route handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;
use tally_net_client::headers::PROTOCOL_VERSION;
use tally_net_remotes::RemoteSummary;
use tally_score::FarmStatus;
use tally_sync::{JournalEntry, MergeResult, PushOutcome};
use tally_wallet::{Wallet, WalletId};

use crate::{ApiError, NodeState, gate::Peer};

type AppState = State<Arc<NodeState>>;

const ROBOTS: &str = "User-agent: *\nDisallow: /\n";

pub(crate) async fn index(State(state): AppState) -> Result<Json<serde_json::Value>, ApiError> {
    let score = state.farm.best();
    Ok(Json(json!({
        "alias": state.alias,
        "version": state.version,
        "protocol": PROTOCOL_VERSION,
        "score": score.value(),
        "tier": score.tier(),
        "wallets": state.sync.count()?,
        "remotes": state.remotes.len(),
        "uptime": state.uptime_secs(),
    })))
}

pub(crate) async fn robots() -> &'static str {
    ROBOTS
}

pub(crate) async fn version(State(state): AppState) -> String {
    state.version.clone()
}

#[derive(Debug, Serialize)]
struct RemotesView {
    version: String,
    alias: String,
    score: usize,
    all: Vec<RemoteSummary>,
}

pub(crate) async fn remotes(State(state): AppState) -> impl IntoResponse {
    Json(RemotesView {
        version: state.version.clone(),
        alias: state.alias.clone(),
        score: state.farm.best().value(),
        all: state.remotes.all().iter().map(|remote| remote.summary()).collect(),
    })
}

#[derive(Debug, Serialize)]
struct FarmView {
    #[serde(flatten)]
    farm: FarmStatus,
    merges: Vec<JournalEntry>,
}

pub(crate) async fn farm(State(state): AppState) -> impl IntoResponse {
    Json(FarmView {
        farm: state.farm.status(),
        merges: state.sync.journal(),
    })
}

pub(crate) async fn metronome(State(state): AppState) -> String {
    state.metronome.to_text()
}

pub(crate) async fn score(State(state): AppState) -> impl IntoResponse {
    Json(state.farm.best().summary(Utc::now()))
}

pub(crate) async fn trace(State(state): AppState) -> String {
    let mut out = String::new();
    for line in state.trace.lines() {
        out.push_str(&line);
        out.push('\n');
    }
    let merges = state.sync.journal();
    if !merges.is_empty() {
        out.push_str("\nmerges:\n");
        for entry in merges {
            let result = match &entry.result {
                MergeResult::Applied { added } => format!("applied +{added}"),
                MergeResult::Unchanged => "unchanged".to_string(),
                MergeResult::Failed { reason } => format!("failed: {reason}"),
            };
            out.push_str(&format!("{} {} {} {}\n", entry.time, entry.id, entry.digest, result));
        }
    }
    out
}

pub(crate) async fn wallets(State(state): AppState) -> Result<String, ApiError> {
    let mut out = String::new();
    for id in state.sync.ids()? {
        out.push_str(&id.to_string());
        out.push('\n');
    }
    Ok(out)
}

/// Representations of `GET /wallet/{id}[.ext]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Text,
    Binary,
}

fn split_format(segment: &str) -> (&str, Format) {
    if let Some(stem) = segment.strip_suffix(".txt") {
        (stem, Format::Text)
    } else if let Some(stem) = segment.strip_suffix(".bin") {
        (stem, Format::Binary)
    } else if let Some(stem) = segment.strip_suffix(".json") {
        (stem, Format::Json)
    } else {
        (segment, Format::Json)
    }
}

fn load(state: &NodeState, id: WalletId) -> Result<Wallet, ApiError> {
    state
        .sync
        .wallet(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("wallet {id}")))
}

pub(crate) async fn wallet(State(state): AppState, Path(segment): Path<String>) -> Result<Response, ApiError> {
    let (stem, format) = split_format(&segment);
    let id: WalletId = stem.parse()?;
    let wallet = load(&state, id)?;
    Ok(match format {
        Format::Json => Json(wallet.view()).into_response(),
        Format::Text => wallet.to_text().into_response(),
        Format::Binary => (
            [(CONTENT_TYPE, "application/octet-stream")],
            wallet.ledger().raw().clone(),
        )
            .into_response(),
    })
}

pub(crate) async fn wallet_field(
    State(state): AppState,
    Path((id, field)): Path<(String, String)>,
) -> Result<String, ApiError> {
    let id: WalletId = id.parse()?;
    let wallet = load(&state, id)?;
    let value = match field.as_str() {
        "balance" => wallet.balance().to_string(),
        "key" => wallet.key().to_string(),
        "mtime" => wallet.mtime().to_rfc3339_opts(SecondsFormat::Secs, true),
        "digest" => wallet.digest(),
        "copies" => wallet.copies().to_string(),
        "size" => wallet.size().to_string(),
        "txns" => wallet.ledger().txns.len().to_string(),
        _ => return Err(ApiError::NotFound(format!("field {field}"))),
    };
    Ok(value)
}

pub(crate) async fn push(
    State(state): AppState,
    Path(id): Path<String>,
    Extension(Peer(peer)): Extension<Peer>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let id: WalletId = id.parse()?;
    match state.sync.push(id, body, peer)? {
        PushOutcome::Accepted { digest } => Ok(Json(json!({
            "id": id,
            "digest": digest,
            "status": "accepted",
        }))
        .into_response()),
        PushOutcome::Unchanged => Ok(StatusCode::NOT_MODIFIED.into_response()),
    }
}

pub(crate) async fn not_found() -> ApiError {
    ApiError::NotFound("page".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_extensions() {
        assert_eq!(split_format("00000000000000ab"), ("00000000000000ab", Format::Json));
        assert_eq!(split_format("00000000000000ab.txt"), ("00000000000000ab", Format::Text));
        assert_eq!(split_format("00000000000000ab.bin"), ("00000000000000ab", Format::Binary));
        assert_eq!(split_format("00000000000000ab.json"), ("00000000000000ab", Format::Json));
        assert_eq!(split_format("00000000000000ab.xml").1, Format::Json);
    }
}
