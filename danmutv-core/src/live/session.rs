//! One live-chat session: connect, authenticate, then a receive loop and a
//! heartbeat loop under a shared cancellation scope.

use std::sync::Arc;
use std::time::Duration;

use bytes::Buf;
use parking_lot::Mutex;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::event::{classify, LiveEvent};
use super::frame::{self, encode_frame, FrameHeader, HEADER_SIZE};
use super::gateway::{GatewayError, GatewayResolver};
use super::normalize::normalize;
use super::transport::{Connector, TransportError, TransportRx, TransportTx};
use super::unpack::unpack;

/// Fixed heartbeat body the gateway expects.
const HEARTBEAT_BODY: &[u8] = b"[object Object]";
/// Danmaku protocol version requested during auth.
const AUTH_PROTOVER: u32 = 3;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("gateway resolve failed: {0}")]
    Resolve(#[from] GatewayError),

    #[error("connect failed: {0}")]
    Connect(TransportError),

    #[error("transport closed by remote")]
    TransportClosed,

    #[error("transport failed: {0}")]
    Transport(TransportError),

    #[error("session already connected")]
    AlreadyConnected,

    #[error("session already closed")]
    AlreadyClosed,
}

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Authenticating,
    Active,
    Closing,
    Closed,
    Failed,
}

/// What a session delivers to its subscriber: events while healthy, then at
/// most one terminal failure.
#[derive(Debug)]
pub enum SessionNotice {
    Event(LiveEvent),
    Failed(SessionError),
}

/// Per-session knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Account id placed in the auth frame; 0 uses the resolver's.
    pub uid: u64,
    /// Device fingerprint placed in the auth frame.
    pub buvid: String,
    pub heartbeat_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            uid: 0,
            buvid: String::new(),
            heartbeat_interval: Duration::from_secs(10),
        }
    }
}

type HostSelector = Arc<dyn Fn(usize) -> usize + Send + Sync>;

/// A connection to one room's chat gateway.
///
/// Single-use: `connect` may be called once; after `close` (or a terminal
/// failure) the session is spent and a fresh one must be built to reconnect,
/// which also forces a fresh gateway resolution.
pub struct LiveSession {
    room_id: u64,
    config: SessionConfig,
    resolver: Arc<dyn GatewayResolver>,
    connector: Arc<dyn Connector>,
    select_host: HostSelector,
    notices: mpsc::UnboundedSender<SessionNotice>,
    state: Arc<Mutex<SessionState>>,
    cancel: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl LiveSession {
    pub fn new(
        room_id: u64,
        config: SessionConfig,
        resolver: Arc<dyn GatewayResolver>,
        connector: Arc<dyn Connector>,
        notices: mpsc::UnboundedSender<SessionNotice>,
    ) -> Self {
        Self {
            room_id,
            config,
            resolver,
            connector,
            select_host: Arc::new(|candidates| {
                use rand::Rng;
                rand::thread_rng().gen_range(0..candidates)
            }),
            notices,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            cancel: CancellationToken::new(),
            supervisor: Mutex::new(None),
        }
    }

    /// Override the host-selection strategy (deterministic in tests).
    #[must_use]
    pub fn with_host_selector(
        mut self,
        select: impl Fn(usize) -> usize + Send + Sync + 'static,
    ) -> Self {
        self.select_host = Arc::new(select);
        self
    }

    #[must_use]
    pub fn room_id(&self) -> u64 {
        self.room_id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Resolve the gateway, open the transport, authenticate, and start the
    /// receive and heartbeat loops.
    ///
    /// Resolution and connect failures are returned directly and leave the
    /// session `Failed`; later transport failures arrive on the notice
    /// channel as a single terminal [`SessionNotice::Failed`].
    pub async fn connect(&self) -> Result<(), SessionError> {
        {
            let mut state = self.state.lock();
            match *state {
                SessionState::Idle => *state = SessionState::Connecting,
                SessionState::Closing | SessionState::Closed | SessionState::Failed => {
                    return Err(SessionError::AlreadyClosed)
                }
                _ => return Err(SessionError::AlreadyConnected),
            }
        }

        let gateway = match self.resolver.resolve(self.room_id).await {
            Ok(info) => info,
            Err(e) => {
                self.fail();
                return Err(SessionError::Resolve(e));
            }
        };
        if gateway.hosts.is_empty() {
            self.fail();
            return Err(SessionError::Resolve(GatewayError::NoHosts(self.room_id)));
        }

        let index = (self.select_host)(gateway.hosts.len()).min(gateway.hosts.len() - 1);
        let url = format!("wss://{}/sub", gateway.hosts[index].host);
        debug!(room_id = self.room_id, url = %url, "opening chat transport");

        let (mut tx, rx) = match self.connector.connect(&url).await {
            Ok(pair) => pair,
            Err(e) => {
                self.fail();
                return Err(SessionError::Connect(e));
            }
        };

        self.set_state(SessionState::Authenticating);
        let uid = if self.config.uid != 0 {
            self.config.uid
        } else {
            gateway.uid
        };
        let auth_body = json!({
            "uid": uid,
            "roomid": self.room_id,
            "protover": AUTH_PROTOVER,
            "buvid": self.config.buvid,
            "platform": "web",
            "type": 2,
            "key": gateway.token,
        });
        if let Err(e) = tx
            .send(encode_frame(frame::op::AUTH, auth_body.to_string().as_bytes()))
            .await
        {
            self.fail();
            return Err(SessionError::Connect(e));
        }

        // Close() racing an in-flight connect is fatal to the attempt.
        if self.cancel.is_cancelled() {
            tx.close().await;
            self.fail();
            return Err(SessionError::AlreadyClosed);
        }

        // The gateway either acks or closes the socket; don't wait to find
        // out before starting the loops.
        self.set_state(SessionState::Active);
        info!(room_id = self.room_id, "live session active");

        let receive = tokio::spawn(receive_loop(
            self.room_id,
            rx,
            self.notices.clone(),
            self.cancel.child_token(),
        ));
        let heartbeat = tokio::spawn(heartbeat_loop(
            tx,
            self.config.heartbeat_interval,
            self.cancel.child_token(),
        ));

        let supervisor = tokio::spawn(supervise(
            self.room_id,
            receive,
            heartbeat,
            self.cancel.clone(),
            self.state.clone(),
            self.notices.clone(),
        ));
        *self.supervisor.lock() = Some(supervisor);

        Ok(())
    }

    /// Cancel both loops and release the transport. Idempotent.
    pub async fn close(&self) {
        {
            let mut state = self.state.lock();
            match *state {
                SessionState::Closed | SessionState::Failed => return,
                _ => *state = SessionState::Closing,
            }
        }
        self.cancel.cancel();

        let supervisor = { self.supervisor.lock().take() };
        if let Some(handle) = supervisor {
            let _ = handle.await;
        }

        let mut state = self.state.lock();
        if *state == SessionState::Closing {
            *state = SessionState::Closed;
        }
    }

    fn set_state(&self, next: SessionState) {
        *self.state.lock() = next;
    }

    fn fail(&self) {
        *self.state.lock() = SessionState::Failed;
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        // Loops hold child tokens; a dropped session must not leak them.
        self.cancel.cancel();
    }
}

/// Waits out both loops, tears the transport down exactly once, and settles
/// the terminal state.
async fn supervise(
    room_id: u64,
    receive: JoinHandle<Result<(), SessionError>>,
    heartbeat: JoinHandle<Box<dyn TransportTx>>,
    cancel: CancellationToken,
    state: Arc<Mutex<SessionState>>,
    notices: mpsc::UnboundedSender<SessionNotice>,
) {
    let outcome = receive.await;
    // Whether the receive loop ended by cancellation or by failure, the
    // heartbeat loop ends with it.
    let closing = cancel.is_cancelled();
    cancel.cancel();

    if let Ok(mut tx) = heartbeat.await {
        tx.close().await;
    }

    match outcome {
        Ok(Ok(())) => {
            settle(&state, SessionState::Closed);
            info!(room_id, "live session closed");
        }
        Ok(Err(err)) if closing => {
            // Remote teardown racing our own close is not a failure.
            settle(&state, SessionState::Closed);
            debug!(room_id, error = %err, "transport ended during close");
        }
        Ok(Err(err)) => {
            warn!(room_id, error = %err, "live session failed");
            settle(&state, SessionState::Failed);
            let _ = notices.send(SessionNotice::Failed(err));
        }
        Err(join_err) => {
            warn!(room_id, error = %join_err, "receive loop panicked");
            settle(&state, SessionState::Failed);
            let _ = notices.send(SessionNotice::Failed(SessionError::Transport(
                TransportError::Io(join_err.to_string()),
            )));
        }
    }
}

fn settle(state: &Mutex<SessionState>, terminal: SessionState) {
    let mut state = state.lock();
    if !matches!(*state, SessionState::Closed | SessionState::Failed) {
        *state = terminal;
    }
}

/// Reads complete messages until cancelled or the transport fails.
async fn receive_loop(
    room_id: u64,
    mut rx: Box<dyn TransportRx>,
    notices: mpsc::UnboundedSender<SessionNotice>,
    cancel: CancellationToken,
) -> Result<(), SessionError> {
    loop {
        let message = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            message = rx.next_message() => message,
        };
        match message {
            Ok(Some(data)) => handle_message(room_id, &data, &notices),
            Ok(None) => return Err(SessionError::TransportClosed),
            Err(e) => return Err(SessionError::Transport(e)),
        }
    }
}

/// Decode one inbound message and emit whatever events it carries. All
/// per-message problems are dropped here; nothing in this path may end the
/// session.
fn handle_message(room_id: u64, data: &[u8], notices: &mpsc::UnboundedSender<SessionNotice>) {
    let header = match FrameHeader::decode(data) {
        Ok(header) => header,
        Err(e) => {
            warn!(room_id, error = %e, "dropping malformed frame");
            return;
        }
    };

    let body = &data[HEADER_SIZE..];
    match unpack(&header, body) {
        Ok(sub_frames) => {
            for sub in sub_frames {
                dispatch_sub_frame(room_id, sub.operation, &sub.payload, notices);
            }
        }
        Err(e) => warn!(room_id, error = %e, "dropping undecodable frame"),
    }
}

fn dispatch_sub_frame(
    room_id: u64,
    operation: u32,
    payload: &[u8],
    notices: &mpsc::UnboundedSender<SessionNotice>,
) {
    match operation {
        frame::op::POPULARITY => {
            if payload.len() == 4 {
                let count = (&payload[..]).get_u32();
                emit(notices, LiveEvent::ViewerCount { room_id, count });
            } else {
                debug!(room_id, len = payload.len(), "odd popularity payload, ignoring");
            }
        }
        frame::op::COMMAND => {
            if payload.is_empty() {
                warn!(room_id, "zero-length command payload, dropping");
                return;
            }
            let Ok(text) = std::str::from_utf8(payload) else {
                debug!(room_id, "non-utf8 command payload, dropping");
                return;
            };
            match serde_json::from_str::<Value>(&normalize(text)) {
                Ok(body) => {
                    if let Some(event) = classify(room_id, body) {
                        emit(notices, event);
                    }
                }
                Err(e) => debug!(room_id, error = %e, "unparseable command payload, dropping"),
            }
        }
        frame::op::AUTH_ACK => debug!(room_id, "auth acknowledged"),
        other => debug!(room_id, operation = other, "ignoring frame operation"),
    }
}

fn emit(notices: &mpsc::UnboundedSender<SessionNotice>, event: LiveEvent) {
    // A departed subscriber is not the session's problem.
    let _ = notices.send(SessionNotice::Event(event));
}

/// Sends a heartbeat frame, then waits out the interval, until cancelled.
/// Owns the write half so frames from this loop and teardown never
/// interleave; returns it for the supervisor to close.
async fn heartbeat_loop(
    mut tx: Box<dyn TransportTx>,
    interval: Duration,
    cancel: CancellationToken,
) -> Box<dyn TransportTx> {
    loop {
        if let Err(e) = tx.send(encode_frame(frame::op::HEARTBEAT, HEARTBEAT_BODY)).await {
            // The receive loop observes the same failure and tears down.
            warn!(error = %e, "heartbeat send failed");
            break;
        }
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }
    tx
}
