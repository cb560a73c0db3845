use futures::StreamExt;
use futures::channel::mpsc;
use oprelay::prelude::*;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

fn services() -> (Arc<OperationStore>, RelayBridge) {
    let mut config = Config::default();
    config.relay.block_ms = 50;
    let kv: Arc<dyn KvBackend> = Arc::new(LocalBackend::new());
    let log: Arc<dyn LogBackend> = Arc::new(LocalLog::new());
    let queue = Arc::new(NotificationQueue::new(
        log,
        kv.clone(),
        Duration::from_millis(config.relay.block_ms),
    ));
    let store = Arc::new(OperationStore::new(kv, queue));
    let bridge = RelayBridge::new(store.clone(), config.relay);
    (store, bridge)
}

async fn next_result(incoming: &mut mpsc::Receiver<Frame>) -> Value {
    let frame = tokio::time::timeout(WAIT, incoming.next())
        .await
        .expect("frame should arrive")
        .expect("session should be open");
    let Frame::Text(text) = frame else {
        panic!("expected a text frame, got {frame:?}");
    };
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["type"], "operation_result");
    value["data"].clone()
}

#[tokio::test]
async fn live_session_receives_one_frame_per_update_in_order() {
    let (store, bridge) = services();
    let shutdown = Cancellation::new();

    let id = store.create("alice").await.unwrap();
    let foreign = store.create("bob").await.unwrap();

    let session = bridge.open(Some("alice")).await.unwrap();
    let mut state = session.subscribe();
    let (writer, mut incoming) = mpsc::channel(16);
    let (outgoing, reader) = mpsc::unbounded::<std::result::Result<Frame, String>>();
    let handle = tokio::spawn(session.run(writer, reader, shutdown.clone()));

    let composite = format!("alice:{id}");
    store
        .update(&composite, OperationStatus::Pending, "")
        .await
        .unwrap();
    store
        .update(&format!("bob:{foreign}"), OperationStatus::Completed, "")
        .await
        .unwrap();
    store
        .update(&composite, OperationStatus::Completed, "")
        .await
        .unwrap();

    let first = next_result(&mut incoming).await;
    assert_eq!(first["key"], id.as_str());
    assert_eq!(first["message"], "Pending");
    let second = next_result(&mut incoming).await;
    assert_eq!(second["key"], id.as_str());
    assert_eq!(second["message"], "Completed");

    let extra = tokio::time::timeout(Duration::from_millis(200), incoming.next()).await;
    assert!(extra.is_err(), "no further frames expected");

    drop(outgoing);
    let summary = tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(summary.delivered, 2);
    assert_eq!(summary.reason, CloseReason::ClientClosed);
    assert_eq!(*state.borrow_and_update(), SessionState::Closed);
}

#[tokio::test]
async fn store_lifecycle_end_to_end() {
    let (store, _) = services();

    let id = store.create("alice").await.unwrap();
    let pending = store.get("alice", &id).await.unwrap();
    assert_eq!(pending.message, "Pending");
    assert!(!pending.read);

    store
        .update(&format!("alice:{id}"), OperationStatus::Completed, "")
        .await
        .unwrap();
    assert_eq!(store.unread("alice").await.unwrap().len(), 1);

    store.mark_read("alice", &id).await.unwrap();
    let done = store.get("alice", &id).await.unwrap();
    assert_eq!(done.message, "Completed");
    assert!(done.read);
    assert!(store.unread("alice").await.unwrap().is_empty());

    let listed = store.list("alice").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(store.get("bob", &id).await.unwrap_err().is_unauthorized());
}

#[tokio::test]
async fn server_stops_on_shutdown_signal() {
    let mut config = Config::default();
    config.api.host = "127.0.0.1".into();
    config.api.port = 0;

    let server = Server::new(config).unwrap();
    let shutdown = server.shutdown_signal();
    let running = tokio::spawn(server.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();
    tokio::time::timeout(WAIT, running)
        .await
        .expect("server should stop")
        .unwrap()
        .unwrap();
}
