//! Live push of freshly extracted records to the backend's event socket.
//!
//! The connection lifecycle is a small state machine kept apart from the
//! socket I/O so it can be exercised without a network.

use crate::models::PropertyRecord;
use futures::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Fire-and-forget publication of extracted records
pub trait EventSink: Send + Sync {
    fn publish(&self, record: &PropertyRecord);
}

/// Sink used when no event endpoint is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn publish(&self, _record: &PropertyRecord) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connect,
    Opened,
    Failed,
    Closed,
}

/// What the driver has to do after a state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Dial,
    ScheduleReconnect(Duration),
    Stay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
        }
    }
}

impl ConnectionState {
    /// `Disconnected -> Connecting -> Open -> Disconnected`.
    ///
    /// An error on an open connection only gets logged; the close that
    /// follows it is what schedules the reconnect.
    pub fn on_event(
        self,
        event: ConnectionEvent,
        policy: &ReconnectPolicy,
    ) -> (ConnectionState, Transition) {
        use ConnectionEvent::*;
        use ConnectionState::*;

        match (self, event) {
            (Disconnected, Connect) => (Connecting, Transition::Dial),
            (Connecting, Opened) => (Open, Transition::Stay),
            (Connecting, Failed) | (Connecting, Closed) | (Open, Closed) => {
                (Disconnected, Transition::ScheduleReconnect(policy.delay))
            }
            (state, _) => (state, Transition::Stay),
        }
    }
}

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Event sink backed by a self-healing websocket connection.
///
/// `publish` only queues while the connection is open; anything published
/// in another state is dropped.
pub struct WsEventSink {
    state: Arc<Mutex<ConnectionState>>,
    outbox: mpsc::UnboundedSender<String>,
}

impl WsEventSink {
    /// Starts the connection driver on the current runtime
    pub fn connect(url: String, policy: ReconnectPolicy) -> (Self, JoinHandle<()>) {
        let state = Arc::new(Mutex::new(ConnectionState::Disconnected));
        let (outbox, pending) = mpsc::unbounded_channel();
        let driver = tokio::spawn(drive(url, policy, Arc::clone(&state), pending));
        (Self { state, outbox }, driver)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for WsEventSink {
    fn publish(&self, record: &PropertyRecord) {
        if self.state() != ConnectionState::Open {
            debug!("Event stream not open, dropping event for {}", record.href);
            return;
        }
        match serde_json::to_string(record) {
            Ok(payload) => {
                let _ = self.outbox.send(payload);
            }
            Err(e) => warn!("Could not serialize event for {}: {}", record.href, e),
        }
    }
}

fn apply(
    state: &Mutex<ConnectionState>,
    event: ConnectionEvent,
    policy: &ReconnectPolicy,
) -> Transition {
    let mut current = state.lock().unwrap_or_else(PoisonError::into_inner);
    let (next, transition) = current.on_event(event, policy);
    *current = next;
    transition
}

async fn drive(
    url: String,
    policy: ReconnectPolicy,
    state: Arc<Mutex<ConnectionState>>,
    mut pending: mpsc::UnboundedReceiver<String>,
) {
    let mut event = ConnectionEvent::Connect;

    loop {
        event = match apply(&state, event, &policy) {
            Transition::Dial => match connect_async(url.as_str()).await {
                Ok((socket, _)) => {
                    // Anything queued before this connection belongs to a dead one.
                    while pending.try_recv().is_ok() {}
                    apply(&state, ConnectionEvent::Opened, &policy);
                    info!("Event stream connected to {}", url);
                    match pump(socket, &mut pending, &state, &policy).await {
                        Some(event) => event,
                        None => break,
                    }
                }
                Err(e) => {
                    warn!("Event stream connection to {} failed: {}", url, e);
                    ConnectionEvent::Failed
                }
            },
            Transition::ScheduleReconnect(delay) => {
                info!("Event stream closed, reconnecting in {:?}", delay);
                tokio::time::sleep(delay).await;
                ConnectionEvent::Connect
            }
            Transition::Stay => break,
        };
    }

    debug!("Event stream driver stopped");
}

/// Forwards queued events until the socket closes. `None` once every sink
/// handle has been dropped.
async fn pump(
    socket: Socket,
    pending: &mut mpsc::UnboundedReceiver<String>,
    state: &Mutex<ConnectionState>,
    policy: &ReconnectPolicy,
) -> Option<ConnectionEvent> {
    let (mut writer, mut reader) = socket.split();

    loop {
        tokio::select! {
            outgoing = pending.recv() => match outgoing {
                Some(payload) => {
                    if let Err(e) = writer.send(Message::Text(payload)).await {
                        warn!("Event stream error: {}", e);
                        apply(state, ConnectionEvent::Failed, policy);
                        return Some(ConnectionEvent::Closed);
                    }
                }
                None => {
                    let _ = writer.close().await;
                    return None;
                }
            },
            incoming = reader.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => return Some(ConnectionEvent::Closed),
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Event stream error: {}", e);
                    apply(state, ConnectionEvent::Failed, policy);
                    return Some(ConnectionEvent::Closed);
                }
            },
        }
    }
}
