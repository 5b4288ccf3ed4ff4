use std::{sync::Arc, time::{Duration, Instant}};

use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode, header},
};
use chrono::{TimeDelta, Utc};
use http_body_util::BodyExt;
use tally_net_client::headers;
use tally_net_remotes::{RemoteKey, RemoteSet};
use tally_node_core::logging::TraceBuffer;
use tally_rpc_server::{HttpServer, HttpServerConfig, NodeState, router};
use tally_score::{Farm, FarmConfig, Invoice, Score, Verifier, difficulty};
use tally_sync::{SyncConfig, SyncHandler};
use tally_tasks::{Metronome, TaskManager};
use tally_wallet::{MemoryWalletStore, WalletId};
use tower::ServiceExt;

const ID: &str = "0000000000000001";
const T1: &str = "0001;2026-10-19T12:00:00Z;100;NOPREFIX;00000000000000ff;first;sig";
const T2: &str = "0002;2026-10-19T12:05:00Z;-40;NOPREFIX;00000000000000ff;second;sig";

struct Node {
    state: Arc<NodeState>,
    app: Router,
    _manager: TaskManager,
}

fn node(standalone: bool) -> Node {
    node_with(standalone, &HttpServerConfig::default())
}

fn node_with(standalone: bool, config: &HttpServerConfig) -> Node {
    let manager = TaskManager::current();
    let farm = Farm::new(FarmConfig {
        host: "localhost".to_string(),
        strength: 2,
        ..Default::default()
    })
    .unwrap();
    let sync = SyncHandler::new(
        Arc::new(MemoryWalletStore::new()),
        manager.executor(),
        SyncConfig::default(),
        None,
    );
    let state = Arc::new(NodeState {
        alias: "testnode".to_string(),
        version: "0.1.0".to_string(),
        address: RemoteKey::new("localhost", 4096),
        standalone,
        verifier: Verifier::new(3),
        farm: Arc::new(farm),
        remotes: Arc::new(RemoteSet::new()),
        sync,
        metronome: Metronome::builder(Duration::from_secs(60)).build(),
        trace: Arc::new(TraceBuffer::new(16)),
        started: Instant::now(),
    });
    let app = router(state.clone(), config);
    Node {
        state,
        app,
        _manager: manager,
    }
}

fn ledger(id: &str, txns: &[&str]) -> String {
    let mut text = format!("test\n2\n{id}\nAAAAB3NzaC1yc2E\n\n");
    for txn in txns {
        text.push_str(txn);
        text.push('\n');
    }
    text
}

fn peer_score(strength: u8) -> Score {
    Score::new(Utc::now(), "peer.example", 5000, Invoice::DEFAULT, strength).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let map = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, map, body)
}

async fn get(app: &Router, path: &str) -> (StatusCode, HeaderMap, Bytes) {
    send(app, Request::get(path).body(Body::empty()).unwrap()).await
}

async fn put(app: &Router, id: &str, body: String, score: Option<&Score>) -> (StatusCode, Bytes) {
    let mut req = Request::put(format!("/wallet/{id}"));
    if let Some(score) = score {
        req = req.header(headers::SCORE, score.to_string());
    }
    let (status, _, body) = send(app, req.body(Body::from(body)).unwrap()).await;
    (status, body)
}

/// A push whose body never finishes arriving.
fn stalled_push() -> Request<Body> {
    let body = futures::stream::pending::<Result<Bytes, std::io::Error>>();
    Request::put(format!("/wallet/{ID}")).body(Body::from_stream(body)).unwrap()
}

fn json(body: &Bytes) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

fn text(body: &Bytes) -> String {
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn push_then_same_push_is_not_modified() {
    let node = node(true);
    let body = ledger(ID, &[T1]);

    let (status, response) = put(&node.app, ID, body.clone(), None).await;
    assert_eq!(status, StatusCode::OK);
    let response = json(&response);
    assert_eq!(response["status"], "accepted");
    assert_eq!(response["id"], ID);

    node.state.sync.settled(WalletId::new(1)).await;
    let (status, _) = put(&node.app, ID, body, None).await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);
}

#[tokio::test(flavor = "multi_thread")]
async fn pushed_digest_becomes_visible() {
    let node = node(true);
    let body = ledger(ID, &[T1, T2]);
    let (status, response) = put(&node.app, ID, body, None).await;
    assert_eq!(status, StatusCode::OK);
    let digest = json(&response)["digest"].as_str().unwrap().to_string();

    let mut seen = None;
    for _ in 0..200 {
        let (status, _, body) = get(&node.app, &format!("/wallet/{ID}/digest")).await;
        if status == StatusCode::OK {
            seen = Some(text(&body));
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(seen.as_deref(), Some(digest.as_str()));

    let (_, _, balance) = get(&node.app, &format!("/wallet/{ID}/balance")).await;
    assert_eq!(text(&balance), "60");
    let (_, _, txns) = get(&node.app, &format!("/wallet/{ID}/txns")).await;
    assert_eq!(text(&txns), "2");
}

#[tokio::test(flavor = "multi_thread")]
async fn wallet_views() {
    let node = node(true);
    let body = ledger(ID, &[T1]);
    put(&node.app, ID, body.clone(), None).await;
    node.state.sync.settled(WalletId::new(1)).await;

    let (status, _, view) = get(&node.app, &format!("/wallet/{ID}")).await;
    assert_eq!(status, StatusCode::OK);
    let view = json(&view);
    assert_eq!(view["id"], ID);
    assert_eq!(view["balance"], 100);
    assert_eq!(view["key"], "AAAAB3NzaC1yc2E");
    assert_eq!(view["copies"], 0);
    assert_eq!(view["body"], body.as_str());

    let (_, _, same) = get(&node.app, &format!("/wallet/{ID}.json")).await;
    assert_eq!(json(&same)["digest"], view["digest"]);

    let (status, _, raw) = get(&node.app, &format!("/wallet/{ID}.bin")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text(&raw), body);

    let (_, _, summary) = get(&node.app, &format!("/wallet/{ID}.txt")).await;
    assert!(text(&summary).contains("balance: 100"));

    let (status, _, _) = get(&node.app, &format!("/wallet/{ID}/nothing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, _, ids) = get(&node.app, "/wallets").await;
    assert_eq!(text(&ids), format!("{ID}\n"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_and_malformed_wallets() {
    let node = node(true);
    let (status, _, body) = get(&node.app, "/wallet/00000000000000aa").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["error"]["code"], "NOT_FOUND");

    let (status, _, body) = get(&node.app, "/wallet/xyz/balance").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"]["code"], "FORMAT_ERROR");
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_pushes() {
    let node = node(true);
    put(&node.app, ID, ledger(ID, &[T1, T2]), None).await;
    node.state.sync.settled(WalletId::new(1)).await;

    let (status, body) = put(&node.app, ID, ledger(ID, &[T1]), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "stale");
    assert_eq!(json(&body)["error"]["code"], "MERGE_CONFLICT");

    let changed = T1.replace("first", "rewritten");
    let (status, _) = put(&node.app, ID, ledger(ID, &[changed.as_str(), T2]), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "conflict");

    let (status, body) = put(&node.app, "0000000000000002", ledger(ID, &[T1]), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "id mismatch");
    assert_eq!(json(&body)["error"]["code"], "ID_MISMATCH");

    let (status, body) = put(&node.app, ID, "garbage".to_string(), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"]["code"], "INVALID_LEDGER");
}

#[tokio::test(flavor = "multi_thread")]
async fn overflowing_balance_is_rejected() {
    let node = node(true);
    let big = "0001;2026-10-19T12:00:00Z;9223372036854775807;NOPREFIX;00000000000000ff;a;sig";
    let bigger = "0002;2026-10-19T12:00:00Z;9223372036854775807;NOPREFIX;00000000000000ff;b;sig";
    let (status, body) = put(&node.app, ID, ledger(ID, &[big, bigger]), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"]["code"], "INVALID_LEDGER");

    node.state.sync.settled(WalletId::new(1)).await;
    let (status, _, _) = get(&node.app, &format!("/wallet/{ID}/balance")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = get(&node.app, "/").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread")]
async fn alias_is_reported() {
    let node = node(true);
    let (_, _, index) = get(&node.app, "/").await;
    let index = json(&index);
    assert_eq!(index["alias"], "testnode");
    assert_eq!(index["protocol"], headers::PROTOCOL_VERSION);
    assert_eq!(index["wallets"], 0);

    let (_, _, remotes) = get(&node.app, "/remotes").await;
    let remotes = json(&remotes);
    assert_eq!(remotes["alias"], "testnode");
    assert_eq!(remotes["version"], "0.1.0");
    assert_eq!(remotes["all"].as_array().unwrap().len(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn handshake_registers_one_remote() {
    let node = node(false);
    let score = peer_score(3);
    for _ in 0..2 {
        let req = Request::get("/version")
            .header(headers::SCORE, score.to_string())
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(&node.app, req).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(node.state.remotes.len(), 1);

    let (_, _, remotes) = get(&node.app, "/remotes").await;
    let all = json(&remotes)["all"].clone();
    assert_eq!(all[0]["host"], "peer.example");
    assert_eq!(all[0]["port"], 5000);
}

#[tokio::test(flavor = "multi_thread")]
async fn standalone_and_self_handshakes_add_nothing() {
    let node = node(true);
    let req = Request::get("/")
        .header(headers::SCORE, peer_score(3).to_string())
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&node.app, req).await.0, StatusCode::OK);
    assert!(node.state.remotes.is_empty());

    let node = self::node(false);
    let own = Score::new(Utc::now(), "localhost", 4096, Invoice::DEFAULT, 3).unwrap();
    let req = Request::get("/")
        .header(headers::SCORE, own.to_string())
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&node.app, req).await.0, StatusCode::OK);
    assert!(node.state.remotes.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn pushing_peer_is_counted_as_copy() {
    let node = node(false);
    let score = peer_score(3);
    let (status, _) = put(&node.app, ID, ledger(ID, &[T1]), Some(&score)).await;
    assert_eq!(status, StatusCode::OK);
    node.state.sync.settled(WalletId::new(1)).await;

    let (_, _, copies) = get(&node.app, &format!("/wallet/{ID}/copies")).await;
    assert_eq!(text(&copies), "1");
}

#[tokio::test(flavor = "multi_thread")]
async fn weak_score_is_forbidden() {
    let node = node(false);
    let req = Request::get("/")
        .header(headers::SCORE, peer_score(1).to_string())
        .body(Body::empty())
        .unwrap();
    let (status, map, body) = send(&node.app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json(&body)["error"]["code"], "INSUFFICIENT_SCORE");
    assert!(map.contains_key(headers::SCORE));
    assert!(node.state.remotes.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn tampered_or_broken_score_is_bad_request() {
    let node = node(false);
    let score = peer_score(3).next();
    let prefix = score.prefix();
    let forged = (0..)
        .map(|n| format!("t{n}"))
        .find(|token| !difficulty::meets(&difficulty::step(&prefix, token), 3))
        .unwrap();
    let honest = score.to_string();
    let (head, _) = honest.rsplit_once(' ').unwrap();
    let tampered = format!("{head} {forged}");

    for value in [tampered, "not a score".to_string()] {
        let req = Request::get("/").header(headers::SCORE, value).body(Body::empty()).unwrap();
        let (status, _, _) = send(&node.app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let old = Score::new(Utc::now() - TimeDelta::hours(25), "peer.example", 5000, Invoice::DEFAULT, 3).unwrap();
    let req = Request::get("/").header(headers::SCORE, old.to_string()).body(Body::empty()).unwrap();
    let (status, _, body) = send(&node.app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"]["code"], "INVALID_SCORE");
    assert!(node.state.remotes.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn headers_on_not_found() {
    let node = node(true);
    let (status, map, _) = get(&node.app, "/no/such/page").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let score: Score = map[headers::SCORE].to_str().unwrap().parse().unwrap();
    assert_eq!(score.host(), "localhost");
    assert_eq!(map[headers::VERSION], "0.1.0");
    assert_eq!(map[headers::PROTOCOL], headers::PROTOCOL_VERSION.to_string().as_str());
    assert_eq!(map[header::CACHE_CONTROL], "no-cache");
    assert_eq!(map[header::CONNECTION], "close");
    assert_eq!(map[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_request_times_out() {
    let node = node_with(
        true,
        &HttpServerConfig {
            timeout: Duration::from_millis(50),
            ..Default::default()
        },
    );
    let (status, map, body) = send(&node.app, stalled_push()).await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(json(&body)["error"]["code"], "TIMEOUT");

    let score: Score = map[headers::SCORE].to_str().unwrap().parse().unwrap();
    assert_eq!(score.host(), "localhost");
    assert_eq!(map[headers::VERSION], "0.1.0");
    assert!(!node.state.sync.is_pending(&WalletId::new(1)));
}

#[tokio::test(flavor = "multi_thread")]
async fn excess_requests_are_shed() {
    let node = node_with(
        true,
        &HttpServerConfig {
            timeout: Duration::from_secs(10),
            max_concurrent: 1,
            ..Default::default()
        },
    );
    let held = tokio::spawn(node.app.clone().oneshot(stalled_push()));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (status, body) = put(&node.app, ID, ledger(ID, &[T1]), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json(&body)["error"]["code"], "OVERLOADED");
    held.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn gzip_length_matches_body() {
    let node = node(true);
    let req = Request::get("/farm")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let (status, map, body) = send(&node.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(map[header::CONTENT_ENCODING], "gzip");
    let length: usize = map[header::CONTENT_LENGTH].to_str().unwrap().parse().unwrap();
    assert_eq!(length, body.len());
    // gzip magic
    assert_eq!(body.get(..2), Some(&[0x1f, 0x8b][..]));
}

#[tokio::test(flavor = "multi_thread")]
async fn status_pages() {
    let node = node(true);
    for path in ["/robots.txt", "/metronome", "/trace", "/version"] {
        let (status, _, _) = get(&node.app, path).await;
        assert_eq!(status, StatusCode::OK, "{path}");
    }

    let (_, _, farm) = get(&node.app, "/farm").await;
    let farm = json(&farm);
    assert_eq!(farm["strength"], 2);
    assert!(farm["merges"].as_array().unwrap().is_empty());

    let (_, _, score) = get(&node.app, "/score").await;
    let score = json(&score);
    assert_eq!(score["host"], "localhost");
    assert_eq!(score["tier"], "low");
}

#[tokio::test(flavor = "multi_thread")]
async fn serves_on_a_real_listener() {
    let node = node(true);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(
        HttpServerConfig {
            addr,
            ..Default::default()
        },
        node.state.clone(),
    );
    let running = server.clone();
    let handle = tokio::spawn(async move { running.serve(listener).await });

    let response = reqwest::get(format!("http://{addr}/version")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.headers().contains_key(headers::SCORE));
    assert_eq!(response.text().await.unwrap(), "0.1.0");

    server.stop().unwrap();
    handle.await.unwrap().unwrap();
    assert!(!server.is_running());
}
