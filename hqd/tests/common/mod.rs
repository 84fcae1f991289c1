//! Shared test support: a recording fake transport engine and event helpers.
#![allow(dead_code)]

use bytes::Bytes;
use hqd::{ServerConfig, ServerDriver};
use hqd_transport::{
    ConnectionEvent, ConnectionId, ListenerEvent, ListenerId, Result, SessionId, ShutdownMode,
    StreamEvent, StreamId, StreamLimits, TlsCredentials, Transport, TransportError,
    TransportEvent,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// One buffer handed to `stream_send`.
#[derive(Debug, Clone)]
pub struct SendRecord {
    pub stream: StreamId,
    pub data: Bytes,
    pub fin: bool,
}

/// Which operations the fake should reject.
#[derive(Debug, Default, Clone)]
pub struct FailFlags {
    pub session_open: bool,
    pub stream_limits: bool,
    pub retry: bool,
    pub listener_open: bool,
    pub listener_start: bool,
    pub send: bool,
    pub resumption: bool,
}

#[derive(Default)]
struct State {
    sends: Vec<SendRecord>,
    shutdowns: Vec<(StreamId, ShutdownMode)>,
    closed_connections: Vec<ConnectionId>,
    accepted: Vec<ConnectionId>,
    tickets: Vec<ConnectionId>,
    limits: Option<StreamLimits>,
    retry_enabled: Option<bool>,
    started_addr: Option<SocketAddr>,
    op_log: Vec<&'static str>,
}

/// Transport engine double that records every operation.
pub struct FakeTransport {
    fail: FailFlags,
    state: Mutex<State>,
    next_id: AtomicU64,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Self::with_flags(FailFlags::default())
    }

    pub fn with_flags(fail: FailFlags) -> Arc<Self> {
        Arc::new(Self {
            fail,
            state: Mutex::new(State::default()),
            next_id: AtomicU64::new(1),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn sends(&self) -> Vec<SendRecord> {
        self.state().sends.clone()
    }

    pub fn shutdowns(&self) -> Vec<(StreamId, ShutdownMode)> {
        self.state().shutdowns.clone()
    }

    pub fn closed_connections(&self) -> Vec<ConnectionId> {
        self.state().closed_connections.clone()
    }

    pub fn accepted(&self) -> Vec<ConnectionId> {
        self.state().accepted.clone()
    }

    pub fn tickets(&self) -> Vec<ConnectionId> {
        self.state().tickets.clone()
    }

    pub fn limits(&self) -> Option<StreamLimits> {
        self.state().limits
    }

    pub fn retry_enabled(&self) -> Option<bool> {
        self.state().retry_enabled
    }

    pub fn started_addr(&self) -> Option<SocketAddr> {
        self.state().started_addr
    }

    pub fn op_log(&self) -> Vec<&'static str> {
        self.state().op_log.clone()
    }

    /// Bytes of every non-canceled send for one stream, concatenated.
    pub fn sent_bytes(&self, stream: StreamId) -> Vec<u8> {
        let mut out = Vec::new();
        for rec in self.state().sends.iter().filter(|r| r.stream == stream) {
            out.extend_from_slice(&rec.data);
        }
        out
    }
}

impl Transport for FakeTransport {
    fn session_open(&self, _alpn: &[Bytes]) -> Result<SessionId> {
        if self.fail.session_open {
            return Err(TransportError::Rejected("session_open"));
        }
        self.state().op_log.push("session_open");
        Ok(SessionId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn session_set_stream_limits(&self, _session: SessionId, limits: StreamLimits) -> Result<()> {
        if self.fail.stream_limits {
            return Err(TransportError::Rejected("stream_limits"));
        }
        self.state().limits = Some(limits);
        Ok(())
    }

    fn session_enable_retry(&self, _session: SessionId, enabled: bool) -> Result<()> {
        if self.fail.retry {
            return Err(TransportError::Rejected("retry"));
        }
        self.state().retry_enabled = Some(enabled);
        Ok(())
    }

    fn session_shutdown(&self, _session: SessionId) {
        self.state().op_log.push("session_shutdown");
    }

    fn session_close(&self, _session: SessionId) {
        self.state().op_log.push("session_close");
    }

    fn listener_open(&self, _session: SessionId) -> Result<ListenerId> {
        if self.fail.listener_open {
            return Err(TransportError::Rejected("listener_open"));
        }
        self.state().op_log.push("listener_open");
        Ok(ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn listener_start(&self, _listener: ListenerId, addr: SocketAddr) -> Result<()> {
        if self.fail.listener_start {
            return Err(TransportError::AddressUnavailable(addr));
        }
        self.state().started_addr = Some(addr);
        Ok(())
    }

    fn listener_close(&self, _listener: ListenerId) {
        self.state().op_log.push("listener_close");
    }

    fn connection_accept(&self, connection: ConnectionId, _creds: &TlsCredentials) -> Result<()> {
        self.state().accepted.push(connection);
        Ok(())
    }

    fn connection_send_resumption_ticket(&self, connection: ConnectionId) -> Result<()> {
        if self.fail.resumption {
            return Err(TransportError::ConnectionClosed);
        }
        self.state().tickets.push(connection);
        Ok(())
    }

    fn connection_close(&self, connection: ConnectionId) {
        self.state().closed_connections.push(connection);
    }

    fn stream_send(
        &self,
        _connection: ConnectionId,
        stream: StreamId,
        data: Bytes,
        fin: bool,
    ) -> Result<()> {
        if self.fail.send {
            return Err(TransportError::StreamClosed);
        }
        self.state().sends.push(SendRecord { stream, data, fin });
        Ok(())
    }

    fn stream_shutdown(&self, _connection: ConnectionId, stream: StreamId, mode: ShutdownMode) {
        self.state().shutdowns.push((stream, mode));
    }
}

/// A driver over a fake transport serving files out of a temp directory.
pub struct Harness {
    pub transport: Arc<FakeTransport>,
    pub driver: ServerDriver,
    pub root: TempDir,
}

pub fn harness() -> Harness {
    harness_with(FailFlags::default(), |_| {})
}

pub fn harness_with(fail: FailFlags, tweak: impl FnOnce(&mut ServerConfig)) -> Harness {
    let root = TempDir::new().unwrap();
    let mut config = ServerConfig {
        file_root: root.path().to_path_buf(),
        ..ServerConfig::default()
    };
    tweak(&mut config);
    let transport = FakeTransport::with_flags(fail);
    let driver = ServerDriver::new(transport.clone() as Arc<dyn Transport>, config)
        .expect("driver setup");
    Harness {
        transport,
        driver,
        root,
    }
}

pub const CONN: ConnectionId = ConnectionId(7);
pub const STREAM: StreamId = StreamId(4);

impl Harness {
    pub fn write_file(&self, name: &str, contents: &[u8]) {
        std::fs::write(self.root.path().join(name), contents).unwrap();
    }

    pub fn connect(&mut self) {
        self.driver.handle_event(TransportEvent::Listener(
            ListenerEvent::NewConnection { connection: CONN },
        ));
    }

    pub fn open_stream(&mut self, stream: StreamId, unidirectional: bool) {
        self.driver.handle_event(TransportEvent::Connection {
            connection: CONN,
            event: ConnectionEvent::PeerStreamStarted {
                stream,
                unidirectional,
            },
        });
    }

    pub fn stream_event(&mut self, stream: StreamId, event: StreamEvent) {
        self.driver.handle_event(TransportEvent::Stream {
            connection: CONN,
            stream,
            event,
        });
    }

    pub fn receive(&mut self, stream: StreamId, data: &[u8], fin: bool) {
        self.stream_event(
            stream,
            StreamEvent::Receive {
                buffers: vec![Bytes::copy_from_slice(data)],
                fin,
            },
        );
    }

    /// Acknowledge sends one at a time until the request stops producing
    /// new ones (response complete or aborted).
    pub fn pump_sends(&mut self, stream: StreamId) {
        let mut acked = 0;
        loop {
            let outstanding = self.transport.sends().len();
            if acked == outstanding {
                break;
            }
            for _ in acked..outstanding {
                self.stream_event(stream, StreamEvent::SendComplete { canceled: false });
                acked += 1;
            }
        }
    }
}
