mod common;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use pretty_assertions::assert_eq;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use cliprelay::relay::Relay;
use cliprelay::sync::{Reconciler, SyncConfig};
use cliprelay::transport::{Channel, MemoryChannel, Request, RequestKind};

use common::{eventually, recv, stays_silent, MockClipboard};

const QUIET: Duration = Duration::from_millis(150);

struct Harness {
    relay_end: MemoryChannel,
    clipboard: Arc<MockClipboard>,
    peer: JoinHandle<cliprelay::Result<()>>,
}

/// Start a reconciler against a fake relay and consume its priming GET
async fn start(initial: &str, configure: impl FnOnce(&MockClipboard)) -> Harness {
    let (relay_end, peer_end) = MemoryChannel::pair();
    let clipboard = Arc::new(MockClipboard::new(initial));
    configure(&clipboard);

    let reconciler = Reconciler::new(
        Arc::new(peer_end),
        clipboard.clone(),
        SyncConfig::new("default", 20),
    );
    let peer = tokio::spawn(reconciler.run());

    let priming = Request::decode(&recv(&relay_end).await).unwrap();
    assert!(matches!(priming.kind, RequestKind::Get));
    assert_eq!(priming.name, "default");
    assert_eq!(priming.data, None);

    Harness {
        relay_end,
        clipboard,
        peer,
    }
}

async fn next_post(channel: &MemoryChannel) -> String {
    let request = Request::decode(&recv(channel).await).unwrap();
    assert!(matches!(request.kind, RequestKind::Post));
    assert_eq!(request.name, "default");
    request.data.unwrap_or_default()
}

#[tokio::test]
async fn test_seed_value_is_not_posted() {
    let h = start("already here", |_| {}).await;

    assert!(stays_silent(&h.relay_end, QUIET).await);
}

#[tokio::test]
async fn test_local_change_is_posted_once() {
    let h = start("", |_| {}).await;

    h.clipboard.copy("copied text").await;

    assert_eq!(next_post(&h.relay_end).await, "copied text");
    assert!(stays_silent(&h.relay_end, QUIET).await);
}

#[tokio::test]
async fn test_priming_reply_is_applied() {
    let h = start("", |_| {}).await;

    h.relay_end.send(Bytes::from("from the relay")).await.unwrap();

    let clipboard = h.clipboard.clone();
    assert!(eventually(|| {
        let clipboard = clipboard.clone();
        async move { clipboard.value().await == "from the relay" }
    })
    .await);
}

#[tokio::test]
async fn test_applied_value_is_not_echoed() {
    let h = start("local", |_| {}).await;

    h.relay_end.send(Bytes::from("remote")).await.unwrap();

    let clipboard = h.clipboard.clone();
    assert!(eventually(|| {
        let clipboard = clipboard.clone();
        async move { clipboard.value().await == "remote" }
    })
    .await);

    // Several poll ticks pass without anything going back to the relay
    assert!(stays_silent(&h.relay_end, QUIET).await);
    assert_eq!(h.clipboard.writes(), 1);
}

#[tokio::test]
async fn test_remote_value_matching_cache_skips_write() {
    let h = start("same", |_| {}).await;

    h.relay_end.send(Bytes::from("same")).await.unwrap();
    sleep(QUIET).await;

    assert_eq!(h.clipboard.writes(), 0);
    assert!(stays_silent(&h.relay_end, QUIET).await);
}

#[tokio::test]
async fn test_invalid_utf8_is_applied_lossily() {
    let h = start("", |_| {}).await;

    h.relay_end
        .send(Bytes::from_static(b"caf\xff"))
        .await
        .unwrap();

    let clipboard = h.clipboard.clone();
    assert!(eventually(|| {
        let clipboard = clipboard.clone();
        async move { clipboard.value().await == "caf\u{FFFD}" }
    })
    .await);
}

#[tokio::test]
async fn test_read_failures_skip_ticks_until_recovery() {
    let h = start("held back", |clipboard| clipboard.set_fail_reads(true)).await;

    assert!(stays_silent(&h.relay_end, QUIET).await);

    // The seed read failed, so the cache is empty and the value now counts as new
    h.clipboard.set_fail_reads(false);
    assert_eq!(next_post(&h.relay_end).await, "held back");
}

#[tokio::test]
async fn test_write_failure_does_not_stop_syncing() {
    let h = start("", |clipboard| clipboard.set_fail_writes(true)).await;

    h.relay_end.send(Bytes::from("lost")).await.unwrap();
    sleep(QUIET).await;
    assert_eq!(h.clipboard.value().await, "");
    assert!(!h.peer.is_finished());

    h.clipboard.set_fail_writes(false);
    h.clipboard.copy("still alive").await;
    assert_eq!(next_post(&h.relay_end).await, "still alive");

    h.relay_end.send(Bytes::from("delivered")).await.unwrap();
    let clipboard = h.clipboard.clone();
    assert!(eventually(|| {
        let clipboard = clipboard.clone();
        async move { clipboard.value().await == "delivered" }
    })
    .await);
}

#[tokio::test]
async fn test_oversized_local_value_is_not_posted() {
    let (relay_end, peer_end) = MemoryChannel::pair();
    let clipboard = Arc::new(MockClipboard::new(""));

    let mut config = SyncConfig::new("default", 20);
    config.max_payload = 1024;
    let peer = tokio::spawn(Reconciler::new(Arc::new(peer_end), clipboard.clone(), config).run());
    recv(&relay_end).await;

    // Under the limit as text, but every quote doubles once escaped
    clipboard.copy(&"\"".repeat(600)).await;
    assert!(stays_silent(&relay_end, QUIET).await);

    clipboard.copy("small").await;
    let request = Request::decode(&recv(&relay_end).await).unwrap();
    assert_eq!(request.data.as_deref(), Some("small"));

    peer.abort();
}

#[tokio::test]
async fn test_relay_close_ends_run_cleanly() {
    let h = start("", |_| {}).await;

    h.relay_end.close().await.unwrap();

    let result = timeout(Duration::from_secs(2), h.peer)
        .await
        .expect("reconciler did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_escaped_value_over_relay_limit_keeps_peer_connected() {
    let relay = Arc::new(Relay::with_max_payload(1024));
    let (relay_end, peer_end) = MemoryChannel::pair();
    let relay_task = Arc::clone(&relay);
    let connection =
        tokio::spawn(async move { relay_task.serve_connection(Arc::new(relay_end)).await });

    let clipboard = Arc::new(MockClipboard::new(""));
    let mut config = SyncConfig::new("default", 20);
    config.max_payload = 1024;
    let peer = tokio::spawn(Reconciler::new(Arc::new(peer_end), clipboard.clone(), config).run());

    let hub = relay.hub();
    assert!(eventually(|| async move { hub.len().await == 1 }).await);

    clipboard.copy(&"\"".repeat(1000)).await;
    sleep(QUIET).await;

    assert!(!connection.is_finished());
    assert!(!peer.is_finished());
    assert_eq!(relay.hub().len().await, 1);
    assert!(relay.registry().get_value("default").await.is_none());

    clipboard.copy("fits").await;
    let registry = relay.registry();
    assert!(eventually(|| async move {
        registry.get_value("default").await == Some(Bytes::from("fits"))
    })
    .await);

    peer.abort();
}
