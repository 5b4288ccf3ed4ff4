//! Per-request score check and the headers stamped on every response.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONNECTION, CONTENT_LENGTH},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::json;
use tally_net_client::headers;
use tally_net_remotes::{AddResult, RemoteKey};
use tally_score::Score;
use tower::BoxError;
use tracing::{debug, info, warn};

use crate::{ApiError, NodeState};

/// The remote that sent a request with a valid score, if any.
#[derive(Debug, Clone, Default)]
pub struct Peer(pub Option<RemoteKey>);

/// Verify the caller's score, if it sent one, and register it as a remote.
pub(crate) async fn gate(
    State(state): State<Arc<NodeState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = match req.headers().get(headers::SCORE) {
        Some(value) => handshake(&state, value).inspect_err(|err| {
            metrics::counter!("tally_gate_rejections_total", "code" => err.code()).increment(1);
        })?,
        None => None,
    };
    req.extensions_mut().insert(Peer(peer));
    Ok(next.run(req).await)
}

fn handshake(state: &NodeState, value: &HeaderValue) -> Result<Option<RemoteKey>, ApiError> {
    let text = value
        .to_str()
        .map_err(|_| ApiError::ScoreFormat(tally_score::ScoreError::Format("non-ascii header".into())))?;
    let score: Score = text.parse()?;
    state.verifier.verify(&score, Utc::now())?;

    let key = RemoteKey::of(&score);
    if key == state.address {
        return Ok(None);
    }
    if !state.standalone {
        let now = Utc::now();
        match state.remotes.add(key.clone(), score, now) {
            AddResult::New => info!(remote = %key, "registered remote"),
            AddResult::Updated => debug!(remote = %key, "refreshed remote score"),
        }
    }
    Ok(Some(key))
}

/// Outermost layer: identity and caching headers on every response.
pub(crate) async fn stamp(State(state): State<Arc<NodeState>>, req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    apply_headers(&state, response.headers_mut());
    response
}

fn apply_headers(state: &NodeState, map: &mut HeaderMap) {
    match HeaderValue::from_str(&state.farm.best().to_string()) {
        Ok(score) => {
            map.insert(headers::SCORE, score);
        }
        Err(err) => warn!(%err, "own score is not a valid header"),
    }
    if let Ok(version) = HeaderValue::from_str(&state.version) {
        map.insert(headers::VERSION, version);
    }
    map.insert(headers::PROTOCOL, HeaderValue::from(headers::PROTOCOL_VERSION));
    map.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    map.insert(CONNECTION, HeaderValue::from_static("close"));
    map.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
}

/// Collect the (possibly compressed) body so `Content-Length` is exact.
pub(crate) async fn buffer(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    if matches!(response.status(), StatusCode::NOT_MODIFIED | StatusCode::NO_CONTENT) {
        return response;
    }
    let (mut parts, body) = response.into_parts();
    match body.collect().await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(err) => ApiError::Internal(format!("response body: {err}")).into_response(),
    }
}

/// Turns errors from the fallible tower layers into responses.
pub(crate) async fn map_middleware_error(err: BoxError) -> Response {
    if err.is::<tower::timeout::error::Elapsed>() {
        metrics::counter!("tally_timeouts_total").increment(1);
        (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({
                "error": { "code": "TIMEOUT", "message": "request timed out" }
            })),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": { "code": "OVERLOADED", "message": err.to_string() }
            })),
        )
            .into_response()
    }
}
