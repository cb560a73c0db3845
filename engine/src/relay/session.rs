use super::Frame;
use common::Cancellation;
use common::keys;
use common::model::config::RelayConfig;
use common::model::{EventType, Message, Operation};
use errors::{Error, Result};
use futures::{Sink, SinkExt, Stream, StreamExt};
use log::{debug, error, info, warn};
use queue::{LogEntry, NotificationQueue, StartPosition};
use std::fmt::Display;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracker::OperationStore;
use uuid::Uuid;

/// Pong replies waiting for egress. Pings beyond this are answered late or dropped.
const CONTROL_BUFFER: usize = 8;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

/// What ended a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientClosed,
    ReadFailed,
    WriteFailed,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub owner_id: String,
    pub group: String,
    /// `operation_result` frames written to the client.
    pub delivered: u64,
    /// Control messages applied to the store.
    pub control_messages: u64,
    pub reason: CloseReason,
}

/// Opens relay sessions for live connections.
pub struct RelayBridge {
    store: Arc<OperationStore>,
    config: RelayConfig,
}

impl RelayBridge {
    pub fn new(store: Arc<OperationStore>, config: RelayConfig) -> Self {
        Self { store, config }
    }

    /// Binds a connection to `owner_id` and creates its consumer group.
    ///
    /// Every session gets a fresh group positioned at the end of the log, so
    /// it only sees changes made while it is connected.
    pub async fn open(&self, owner_id: Option<&str>) -> Result<Session> {
        let owner_id = owner_id
            .and_then(keys::owner_id)
            .ok_or_else(Error::missing_identifier)?;

        let group = format!("group_{owner_id}_{}", Uuid::new_v4());
        let consumer = format!("consumer_{owner_id}");
        let (state, _) = watch::channel(SessionState::Connecting);

        self.store
            .queue()
            .create_group(owner_id, &group, StartPosition::Latest)
            .await?;

        Ok(Session {
            owner_id: owner_id.to_string(),
            group,
            consumer,
            store: self.store.clone(),
            config: self.config.clone(),
            state,
        })
    }
}

pub struct Session {
    owner_id: String,
    group: String,
    consumer: String,
    store: Arc<OperationStore>,
    config: RelayConfig,
    state: watch::Sender<SessionState>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("owner_id", &self.owner_id)
            .field("group", &self.group)
            .field("consumer", &self.consumer)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Drives the session until the client leaves, a write fails, or
    /// `shutdown` fires. `writer` is only ever touched from this future.
    pub async fn run<W, R, E>(self, mut writer: W, reader: R, shutdown: Cancellation) -> SessionSummary
    where
        W: Sink<Frame> + Unpin + Send,
        W::Error: Display,
        R: Stream<Item = std::result::Result<Frame, E>> + Unpin + Send + 'static,
        E: Display + Send + 'static,
    {
        let cancel = shutdown.child();
        let reason = Arc::new(OnceLock::new());
        self.state.send_replace(SessionState::Active);
        info!("Session {} active for user {}", self.group, self.owner_id);

        let (entry_tx, entry_rx) = mpsc::channel::<LogEntry>(1);
        let (control_tx, control_rx) = mpsc::channel::<Frame>(CONTROL_BUFFER);

        let inbound = tokio::spawn(inbound_pump(
            reader,
            self.owner_id.clone(),
            self.store.clone(),
            control_tx,
            cancel.clone(),
            reason.clone(),
        ));
        let pump = tokio::spawn(queue_pump(
            self.store.queue().clone(),
            self.owner_id.clone(),
            self.group.clone(),
            self.consumer.clone(),
            entry_tx,
            cancel.clone(),
            Duration::from_millis(self.config.retry_backoff_ms),
        ));

        let delivered = self
            .egress(&mut writer, entry_rx, control_rx, &cancel, &reason)
            .await;

        cancel.cancel();
        self.state.send_replace(SessionState::Closing);

        let control_messages = match inbound.await {
            Ok(handled) => handled,
            Err(e) => {
                error!("Inbound pump of {} panicked: {e}", self.group);
                0
            }
        };
        if let Err(e) = pump.await {
            error!("Queue pump of {} panicked: {e}", self.group);
        }
        if let Err(e) = self
            .store
            .queue()
            .destroy_group(&self.owner_id, &self.group)
            .await
        {
            warn!("Failed to release consumer group {}: {e}", self.group);
        }

        let reason = reason.get().copied().unwrap_or(CloseReason::Shutdown);
        if reason != CloseReason::WriteFailed {
            let close = async {
                let _ = writer.send(Frame::Close).await;
                let _ = writer.close().await;
            };
            if tokio::time::timeout(CLOSE_TIMEOUT, close).await.is_err() {
                debug!("Close handshake of {} timed out", self.group);
            }
        }

        self.state.send_replace(SessionState::Closed);
        info!(
            "Session {} closed ({:?}), delivered {} notifications",
            self.group, reason, delivered
        );

        SessionSummary {
            owner_id: self.owner_id,
            group: self.group,
            delivered,
            control_messages,
            reason,
        }
    }

    /// The single writer. Returns the number of notifications delivered.
    async fn egress<W>(
        &self,
        writer: &mut W,
        mut entries: mpsc::Receiver<LogEntry>,
        mut control: mpsc::Receiver<Frame>,
        cancel: &Cancellation,
        reason: &OnceLock<CloseReason>,
    ) -> u64
    where
        W: Sink<Frame> + Unpin + Send,
        W::Error: Display,
    {
        let mut heartbeat = self.config.heartbeat_secs.filter(|s| *s > 0).map(|secs| {
            let period = Duration::from_secs(secs);
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        let mut delivered = 0;

        loop {
            let (frame, entry_id) = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(frame) = control.recv() => (frame, None),
                entry = entries.recv() => match entry {
                    Some(entry) => match render(&entry) {
                        Ok(text) => (Frame::Text(text), Some(entry.id)),
                        Err(e) => {
                            warn!("Dropping undeliverable entry {} of {}: {e}", entry.id, self.owner_id);
                            self.ack(&entry.id).await;
                            continue;
                        }
                    },
                    None => break,
                },
                _ = next_tick(&mut heartbeat) => (Frame::Ping(Vec::new()), None),
            };

            let written = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                written = writer.send(frame) => written,
            };
            if let Err(e) = written {
                warn!("Write to session {} failed: {e}", self.group);
                let _ = reason.set(CloseReason::WriteFailed);
                break;
            }

            if let Some(id) = entry_id {
                delivered += 1;
                self.ack(&id).await;
            }
        }
        delivered
    }

    async fn ack(&self, entry_id: &str) {
        if let Err(e) = self
            .store
            .queue()
            .ack(&self.owner_id, &self.group, entry_id)
            .await
        {
            warn!("Failed to ack {entry_id} for {}: {e}", self.group);
        }
    }
}

/// Serializes a log entry as an `operation_result` message.
fn render(entry: &LogEntry) -> Result<String> {
    let op: Operation = serde_json::from_slice(&entry.payload).map_err(Error::decode)?;
    Message::operation_result(&op.result())?.encode()
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn inbound_pump<R, E>(
    mut reader: R,
    owner_id: String,
    store: Arc<OperationStore>,
    control: mpsc::Sender<Frame>,
    cancel: Cancellation,
    reason: Arc<OnceLock<CloseReason>>,
) -> u64
where
    R: Stream<Item = std::result::Result<Frame, E>> + Unpin,
    E: Display,
{
    let mut handled = 0;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = reader.next() => next,
        };
        match next {
            None | Some(Ok(Frame::Close)) => {
                debug!("Client of {owner_id} closed the connection");
                let _ = reason.set(CloseReason::ClientClosed);
                break;
            }
            Some(Err(e)) => {
                warn!("Read from client of {owner_id} failed: {e}");
                let _ = reason.set(CloseReason::ReadFailed);
                break;
            }
            Some(Ok(Frame::Ping(payload))) => {
                if control.try_send(Frame::Pong(payload)).is_err() {
                    debug!("Pong backlog full for {owner_id}, dropping reply");
                }
            }
            Some(Ok(Frame::Pong(_))) => {}
            Some(Ok(Frame::Text(text))) => {
                if apply_control(&store, &owner_id, &text).await {
                    handled += 1;
                }
            }
            Some(Ok(Frame::Binary(data))) => match String::from_utf8(data) {
                Ok(text) => {
                    if apply_control(&store, &owner_id, &text).await {
                        handled += 1;
                    }
                }
                Err(_) => warn!("Ignoring non UTF-8 binary frame from {owner_id}"),
            },
        }
    }
    cancel.cancel();
    handled
}

/// Applies one `{type, data}` control message. Bad input is logged and skipped.
async fn apply_control(store: &OperationStore, owner_id: &str, text: &str) -> bool {
    let msg = match Message::decode(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Ignoring undecodable control message from {owner_id}: {e}");
            return false;
        }
    };

    match msg.event_type() {
        Some(EventType::ReadOperation) => {
            let read = match msg.read_operation() {
                Ok(read) => read,
                Err(e) => {
                    warn!("Ignoring malformed read_operation from {owner_id}: {e}");
                    return false;
                }
            };
            match store.mark_read(owner_id, &read.operation_id).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        "Failed to mark {} read for {owner_id}: {e}",
                        read.operation_id
                    );
                    false
                }
            }
        }
        _ => {
            warn!("Ignoring control message of type {} from {owner_id}", msg.kind);
            false
        }
    }
}

async fn queue_pump(
    queue: Arc<NotificationQueue>,
    owner_id: String,
    group: String,
    consumer: String,
    entries: mpsc::Sender<LogEntry>,
    cancel: Cancellation,
    backoff: Duration,
) {
    loop {
        match queue.read_next(&owner_id, &group, &consumer, &cancel).await {
            Ok(entry) => {
                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    sent = entries.send(entry) => sent,
                };
                if sent.is_err() {
                    break;
                }
            }
            Err(e) if e.is_cancelled() => break,
            Err(e) => {
                warn!("Reading notifications of {owner_id} failed: {e}");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }
    }
    debug!("Queue pump of {group} stopped");
}
