//! Dev-mode WebSocket bridge: upgrade handling, 404 for plain requests,
//! fallback demo message, and restart semantics.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;

use standalone_adapter::websocket::{BridgeConfig, DevBridge, FallbackHandler};

mod common;

fn test_config() -> BridgeConfig {
    BridgeConfig {
        port: 0,
        watch_paths: Vec::new(),
        dev_server_url: None,
        ..BridgeConfig::default()
    }
}

#[tokio::test]
async fn test_plain_request_gets_404() {
    let bridge = DevBridge::new(Arc::new(FallbackHandler));
    let addr = bridge.start(&test_config()).await.unwrap();

    let response = reqwest::get(format!("http://{addr}/anything")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    bridge.stop();
}

#[tokio::test]
async fn test_upgrade_and_fallback_demo_message() {
    let bridge = DevBridge::new(Arc::new(FallbackHandler));
    let addr = bridge.start(&test_config()).await.unwrap();

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    // Registration happens server-side after the handshake flushes.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(bridge.registry().len(), 1);

    // The fallback sends one demonstration message after a fixed delay.
    let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("demo message within the delay")
        .expect("stream open")
        .expect("frame ok");
    match message {
        Message::Text(text) => assert!(text.contains("Sending from server")),
        other => panic!("unexpected frame: {other:?}"),
    }

    drop(socket);
    bridge.stop();
}

#[tokio::test]
async fn test_restart_replaces_instance() {
    let bridge = Arc::new(DevBridge::new(Arc::new(FallbackHandler)));
    let first = bridge.start(&test_config()).await.unwrap();
    assert_eq!(bridge.addr(), Some(first));

    let second = bridge.restart(&test_config()).await.unwrap();
    assert_eq!(bridge.addr(), Some(second));
    assert_ne!(first, second);

    // The first listener winds down; new connections land on the second.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{second}/ws"))
        .await
        .unwrap();
    drop(socket);

    bridge.stop();
    assert_eq!(bridge.addr(), None);
}

#[tokio::test]
async fn test_stop_without_instance_is_noop() {
    let bridge = DevBridge::new(Arc::new(FallbackHandler));
    bridge.stop();
    assert_eq!(bridge.addr(), None);
}

#[tokio::test]
async fn test_config_change_stops_bridge() {
    let dir = tempfile::tempdir().unwrap();
    let watched = common::write_file(dir.path(), "vite.config.ts", b"export default {};\n");

    let bridge = Arc::new(DevBridge::new(Arc::new(FallbackHandler)));
    let config = BridgeConfig {
        port: 0,
        watch_paths: vec![watched.clone()],
        dev_server_url: None,
        ..BridgeConfig::default()
    };
    bridge.start(&config).await.unwrap();
    let _watcher = bridge.watch(&config).unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    std::fs::write(&watched, b"export default { changed: true };\n").unwrap();

    // The watcher fires on its own thread; poll until the bridge is gone.
    for _ in 0..50 {
        if bridge.addr().is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("bridge still running after config change");
}
