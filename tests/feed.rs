//! Integration tests for the observer feed.
//! Spins up the feed server on a random port and drives it with a real
//! WebSocket client (plus a bare TCP client for the shared-port health check).

use futures_util::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use taskhub::{
    config::HubConfig,
    feed,
    feed::event::EventBroadcaster,
    registry::{TaskPatch, TaskRegistry},
    AppContext,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Find a free local port by binding to port 0.
fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Build a minimal AppContext on a random feed port for testing.
fn make_test_ctx(port: u16) -> Arc<AppContext> {
    let config = Arc::new(HubConfig::new(
        Some(port),
        None,
        None,
        Some("error".to_string()),
        None,
    ));
    let broadcaster = Arc::new(EventBroadcaster::new());
    let registry = Arc::new(TaskRegistry::new(broadcaster.clone()));
    Arc::new(AppContext {
        config,
        registry,
        broadcaster,
        started_at: std::time::Instant::now(),
    })
}

async fn start_feed(ctx: Arc<AppContext>) {
    let ctx_clone = ctx.clone();
    tokio::spawn(async move {
        let _ = feed::run(ctx_clone).await;
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(100)).await;
}

async fn recv_json(ws: &mut Ws) -> Value {
    loop {
        match tokio::time::timeout(Duration::from_secs(5), ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return serde_json::from_str(&text).unwrap(),
            Ok(Some(Ok(_))) => continue,
            other => panic!("expected a text frame, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn init_snapshot_contains_preexisting_tasks() {
    let port = find_free_port();
    let ctx = make_test_ctx(port);
    ctx.registry.upsert(
        "t1",
        TaskPatch {
            name: Some("Build".into()),
            ..Default::default()
        },
    );
    start_feed(ctx).await;

    let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}"))
        .await
        .unwrap();
    let init = recv_json(&mut ws).await;

    assert_eq!(init["type"], "init");
    let tasks = init["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], "t1");
    assert_eq!(tasks[0]["name"], "Build");
    assert_eq!(tasks[0]["status"], "running");
    assert!(tasks[0]["startTime"].is_number());
}

#[tokio::test]
async fn live_events_follow_init_in_mutation_order() {
    let port = find_free_port();
    let ctx = make_test_ctx(port);
    start_feed(ctx.clone()).await;

    let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}"))
        .await
        .unwrap();
    let init = recv_json(&mut ws).await;
    assert_eq!(init["type"], "init");
    assert_eq!(init["tasks"].as_array().unwrap().len(), 0);

    // The init frame is sent after this connection subscribed, so every
    // mutation from here on must arrive as a live event.
    ctx.registry.upsert("t1", TaskPatch::default());
    ctx.registry.append_log("t1", "halfway", "info").unwrap();
    ctx.registry.complete("t1", Some("ok".into())).unwrap();
    ctx.registry.clear_finished();

    let ev = recv_json(&mut ws).await;
    assert_eq!(ev["type"], "task-update");
    assert_eq!(ev["task"]["id"], "t1");
    assert_eq!(ev["task"]["status"], "running");

    let ev = recv_json(&mut ws).await;
    assert_eq!(ev["type"], "task-log");
    assert_eq!(ev["taskId"], "t1");
    assert_eq!(ev["log"]["message"], "halfway");
    assert_eq!(ev["log"]["level"], "info");

    let ev = recv_json(&mut ws).await;
    assert_eq!(ev["type"], "task-update");
    assert_eq!(ev["task"]["status"], "complete");
    assert_eq!(ev["task"]["summary"], "ok");
    assert!(ev["task"]["endTime"].is_number());

    let ev = recv_json(&mut ws).await;
    assert_eq!(ev["type"], "tasks-cleared");
    assert_eq!(ev["ids"], serde_json::json!(["t1"]));
}

#[tokio::test]
async fn one_observer_disconnecting_does_not_affect_another() {
    let port = find_free_port();
    let ctx = make_test_ctx(port);
    start_feed(ctx.clone()).await;

    let (mut first, _) = connect_async(format!("ws://127.0.0.1:{port}"))
        .await
        .unwrap();
    let (mut second, _) = connect_async(format!("ws://127.0.0.1:{port}"))
        .await
        .unwrap();
    assert_eq!(recv_json(&mut first).await["type"], "init");
    assert_eq!(recv_json(&mut second).await["type"], "init");

    ctx.registry.upsert("t1", TaskPatch::default());
    assert_eq!(recv_json(&mut first).await["type"], "task-update");
    assert_eq!(recv_json(&mut second).await["type"], "task-update");

    // Drop the first observer without a close handshake; the hub must keep
    // serving the second one.
    drop(first);
    ctx.registry.upsert("t2", TaskPatch::default());
    let ev = recv_json(&mut second).await;
    assert_eq!(ev["type"], "task-update");
    assert_eq!(ev["task"]["id"], "t2");
}

#[tokio::test]
async fn feed_port_answers_plain_http_health() {
    let port = find_free_port();
    let ctx = make_test_ctx(port);
    ctx.registry.upsert("t1", TaskPatch::default());
    start_feed(ctx).await;

    let mut stream = TcpStream::connect(format!("127.0.0.1:{port}"))
        .await
        .unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    let response = String::from_utf8_lossy(&buf);

    let first_line = response.lines().next().unwrap_or("");
    assert!(
        first_line.contains("200"),
        "expected HTTP 200, got: {first_line}"
    );

    let body_start = response
        .find("\r\n\r\n")
        .map(|i| i + 4)
        .expect("no body in response");
    let json: Value = serde_json::from_str(&response[body_start..]).expect("body is not valid JSON");

    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"].as_str().unwrap(), env!("CARGO_PKG_VERSION"));
    assert!(json["uptime"].is_number());
    assert_eq!(json["tasks"], 1);
    assert_eq!(json["observers"], 0);
}
