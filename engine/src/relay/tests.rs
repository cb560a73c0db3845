use super::{CloseReason, Frame, RelayBridge, SessionState, SessionSummary};
use common::Cancellation;
use common::model::OperationStatus;
use common::model::config::RelayConfig;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use queue::{LocalLog, LogBackend, NotificationQueue};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use storage::LocalBackend;
use tokio::task::JoinHandle;
use tracker::OperationStore;

const WAIT: Duration = Duration::from_secs(2);

fn relay(config: RelayConfig) -> (Arc<OperationStore>, RelayBridge) {
    relay_on(Arc::new(LocalLog::new()), config)
}

fn relay_on(log: Arc<LocalLog>, config: RelayConfig) -> (Arc<OperationStore>, RelayBridge) {
    let kv = Arc::new(LocalBackend::new());
    let queue = Arc::new(NotificationQueue::new(
        log,
        kv.clone(),
        Duration::from_millis(config.block_ms),
    ));
    let store = Arc::new(OperationStore::new(kv, queue));
    (store.clone(), RelayBridge::new(store, config))
}

fn fast_config() -> RelayConfig {
    RelayConfig {
        block_ms: 50,
        heartbeat_secs: None,
        retry_backoff_ms: 10,
    }
}

struct Client {
    outgoing: mpsc::UnboundedSender<Result<Frame, String>>,
    incoming: mpsc::Receiver<Frame>,
    session: JoinHandle<SessionSummary>,
}

impl Client {
    async fn connect(bridge: &RelayBridge, owner: &str, shutdown: &Cancellation) -> Self {
        let session = bridge.open(Some(owner)).await.expect("session should open");
        let (writer, incoming) = mpsc::channel(16);
        let (outgoing, reader) = mpsc::unbounded();
        let session = tokio::spawn(session.run(writer, reader, shutdown.clone()));
        Self {
            outgoing,
            incoming,
            session,
        }
    }

    async fn next_frame(&mut self) -> Frame {
        tokio::time::timeout(WAIT, self.incoming.next())
            .await
            .expect("frame should arrive")
            .expect("session should still be writing")
    }

    async fn next_result(&mut self) -> Value {
        match self.next_frame().await {
            Frame::Text(text) => {
                let value: Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value["type"], "operation_result");
                value["data"].clone()
            }
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    async fn assert_quiet(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(150), self.incoming.next()).await;
        assert!(next.is_err(), "unexpected frame: {next:?}");
    }

    fn send(&self, frame: Frame) {
        self.outgoing.unbounded_send(Ok(frame)).unwrap();
    }

    async fn finish(self) -> SessionSummary {
        drop(self.outgoing);
        tokio::time::timeout(WAIT, self.session)
            .await
            .expect("session should end")
            .unwrap()
    }
}

#[tokio::test]
async fn test_open_requires_owner() {
    let (_, bridge) = relay(fast_config());
    assert!(bridge.open(None).await.unwrap_err().is_missing_identifier());
    assert!(bridge.open(Some("  ")).await.unwrap_err().is_missing_identifier());
}

#[tokio::test]
async fn test_open_rejects_owner_ids_that_reach_other_keys() {
    let log = Arc::new(LocalLog::new());
    let (_, bridge) = relay_on(log.clone(), fast_config());
    for owner in ["u1:unread:zzz", "u*", "u[1]"] {
        let err = bridge.open(Some(owner)).await.unwrap_err();
        assert!(err.is_missing_identifier(), "{owner} should be rejected");
    }
    assert!(log.streams("notifications:*").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_closed_session_releases_its_group() {
    let log = Arc::new(LocalLog::new());
    let (store, bridge) = relay_on(log.clone(), fast_config());
    let shutdown = Cancellation::new();

    let mut client = Client::connect(&bridge, "u1", &shutdown).await;
    let other = Client::connect(&bridge, "u1", &shutdown).await;
    assert_eq!(log.group_count("notifications:u1").await, 2);

    store.create("u1").await.unwrap();
    client.next_result().await;
    client.finish().await;
    assert_eq!(log.group_count("notifications:u1").await, 1);

    shutdown.cancel();
    tokio::time::timeout(WAIT, other.session)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(log.group_count("notifications:u1").await, 0);
}

#[tokio::test]
async fn test_sessions_get_distinct_groups() {
    let (_, bridge) = relay(fast_config());
    let a = bridge.open(Some("u1")).await.unwrap();
    let b = bridge.open(Some("u1")).await.unwrap();
    assert_ne!(a.group(), b.group());
    assert!(a.group().starts_with("group_u1_"));
    assert_eq!(a.owner_id(), "u1");
    assert_eq!(*a.subscribe().borrow(), SessionState::Connecting);
}

#[tokio::test]
async fn test_session_relays_each_update_once_in_order() {
    let (store, bridge) = relay(fast_config());
    let shutdown = Cancellation::new();
    let id = store.create("u1").await.unwrap();

    let mut client = Client::connect(&bridge, "u1", &shutdown).await;
    client.assert_quiet().await;

    let second = store.create("u1").await.unwrap();
    store
        .update(&format!("u1:{id}"), OperationStatus::Completed, "")
        .await
        .unwrap();
    store
        .update(&format!("u1:{second}"), OperationStatus::Failed, "boom")
        .await
        .unwrap();

    let created = client.next_result().await;
    assert_eq!(created["key"], second.as_str());
    assert_eq!(created["message"], "Pending");

    let completed = client.next_result().await;
    assert_eq!(completed["key"], id.as_str());
    assert_eq!(completed["message"], "Completed");
    assert_eq!(completed["read"], false);

    let failed = client.next_result().await;
    assert_eq!(failed["key"], second.as_str());
    assert_eq!(failed["message"], "Failed");

    client.assert_quiet().await;
    let summary = client.finish().await;
    assert_eq!(summary.delivered, 3);
    assert_eq!(summary.reason, CloseReason::ClientClosed);
}

#[tokio::test]
async fn test_read_operation_marks_read() {
    let (store, bridge) = relay(fast_config());
    let shutdown = Cancellation::new();
    let id = store.create("u1").await.unwrap();
    let mut client = Client::connect(&bridge, "u1", &shutdown).await;

    client.send(Frame::Text(
        json!({"type": "read_operation", "data": {"operation_id": id}}).to_string(),
    ));

    let echoed = client.next_result().await;
    assert_eq!(echoed["key"], id.as_str());
    assert_eq!(echoed["read"], true);
    assert!(store.get("u1", &id).await.unwrap().read);

    let summary = client.finish().await;
    assert_eq!(summary.control_messages, 1);
}

#[tokio::test]
async fn test_bad_control_messages_are_skipped() {
    let (store, bridge) = relay(fast_config());
    let shutdown = Cancellation::new();
    let mut client = Client::connect(&bridge, "u1", &shutdown).await;

    client.send(Frame::Text("not json".into()));
    client.send(Frame::Text(json!({"type": "subscribe", "data": {}}).to_string()));
    client.send(Frame::Text(
        json!({"type": "read_operation", "data": {"operation_id": "missing"}}).to_string(),
    ));
    client.send(Frame::Binary(vec![0xff, 0xfe]));

    let id = store.create("u1").await.unwrap();
    assert_eq!(client.next_result().await["key"], id.as_str());

    let summary = client.finish().await;
    assert_eq!(summary.control_messages, 0);
    assert_eq!(summary.delivered, 1);
}

#[tokio::test]
async fn test_ping_is_answered_by_egress() {
    let (_, bridge) = relay(fast_config());
    let shutdown = Cancellation::new();
    let mut client = Client::connect(&bridge, "u1", &shutdown).await;

    client.send(Frame::Ping(b"hi".to_vec()));
    assert_eq!(client.next_frame().await, Frame::Pong(b"hi".to_vec()));
    client.finish().await;
}

#[tokio::test]
async fn test_shutdown_closes_session() {
    let (_, bridge) = relay(fast_config());
    let shutdown = Cancellation::new();
    let session = bridge.open(Some("u1")).await.unwrap();
    let mut state = session.subscribe();

    let (writer, mut incoming) = mpsc::channel(16);
    let (_outgoing, reader) = mpsc::unbounded::<Result<Frame, String>>();
    let handle = tokio::spawn(session.run(writer, reader, shutdown.clone()));

    tokio::time::timeout(WAIT, state.wait_for(|s| *s == SessionState::Active))
        .await
        .unwrap()
        .unwrap();
    shutdown.cancel();

    let summary = tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(summary.reason, CloseReason::Shutdown);
    assert_eq!(*state.borrow(), SessionState::Closed);
    assert_eq!(incoming.next().await, Some(Frame::Close));
}

#[tokio::test]
async fn test_write_failure_ends_session() {
    let (store, bridge) = relay(fast_config());
    let shutdown = Cancellation::new();
    let mut client = Client::connect(&bridge, "u1", &shutdown).await;
    client.incoming.close();

    store.create("u1").await.unwrap();
    let summary = tokio::time::timeout(WAIT, client.session)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.reason, CloseReason::WriteFailed);
    assert_eq!(summary.delivered, 0);
}

#[tokio::test]
async fn test_read_error_ends_session() {
    let (_, bridge) = relay(fast_config());
    let shutdown = Cancellation::new();
    let client = Client::connect(&bridge, "u1", &shutdown).await;
    client
        .outgoing
        .unbounded_send(Err("connection reset".into()))
        .unwrap();

    let summary = tokio::time::timeout(WAIT, client.session)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.reason, CloseReason::ReadFailed);
}

#[tokio::test]
async fn test_heartbeat_pings_idle_client() {
    let mut config = fast_config();
    config.heartbeat_secs = Some(1);
    let (_, bridge) = relay(config);
    let shutdown = Cancellation::new();
    let mut client = Client::connect(&bridge, "u1", &shutdown).await;

    assert_eq!(client.next_frame().await, Frame::Ping(Vec::new()));
    client.finish().await;
}

#[tokio::test]
async fn test_client_close_frame_ends_session() {
    let (_, bridge) = relay(fast_config());
    let shutdown = Cancellation::new();
    let (writer, _incoming) = mpsc::channel::<Frame>(16);
    let (mut outgoing, reader) = mpsc::unbounded::<Result<Frame, String>>();
    let session = bridge.open(Some("u1")).await.unwrap();
    let handle = tokio::spawn(session.run(writer, reader, shutdown));

    outgoing.send(Ok(Frame::Close)).await.unwrap();
    let summary = tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(summary.reason, CloseReason::ClientClosed);
}
