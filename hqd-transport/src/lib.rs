//! hqd-transport: Transport Engine Contract for the hqd Server
//!
//! This crate defines the interface between the QUIC transport engine and the
//! hqd server core. The engine itself (handshake, encryption, loss recovery,
//! stream multiplexing) is a black box behind this boundary; the server only
//! consumes its events and invokes its operations.
//!
//! # Event Model
//!
//! Every engine occurrence is expressed as a sum-typed event matched in one
//! place per component, rather than a callback-plus-context pointer:
//!
//! - [`ListenerEvent`]: new connection accepted, listener stopped
//! - [`ConnectionEvent`]: handshake complete, peer stream started, shutdown done
//! - [`StreamEvent`]: data received, send completed, peer shutdown, stream done
//!
//! The engine guarantees serialized delivery per object: no two events for the
//! same stream run concurrently, and no two connection-level events for the
//! same connection run concurrently. Cross-connection and cross-stream
//! concurrency is expected.
//!
//! # Zero-Copy Data Transfer
//!
//! All payload data uses `bytes::Bytes` (reference-counted, zero-copy
//! buffers). A buffer handed to [`Transport::stream_send`] is owned by the
//! engine until the matching [`StreamEvent::SendComplete`] arrives.
//!
//! # Cross-Thread Delivery
//!
//! Engine worker threads hand events to the server's dispatch thread through
//! the bounded [`EventQueue`] built on crossbeam channels.

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Unique identifier for an established QUIC connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Unique identifier for a stream within a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u64);

/// Unique identifier for a negotiated session (ALPN set + limits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

/// Unique identifier for a bound listening endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Events delivered to a listening endpoint.
#[derive(Debug, Clone)]
pub enum ListenerEvent {
    /// The engine accepted a new connection on this listener.
    ///
    /// The receiver must either accept the connection (attaching TLS
    /// credentials) or leave it for the engine to discard.
    NewConnection { connection: ConnectionId },

    /// The listener finished stopping.
    StopComplete,
}

/// Connection-level events.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Handshake completed; the connection is ready for streams.
    Connected,

    /// The peer opened a new stream on this connection.
    PeerStreamStarted {
        stream: StreamId,
        /// True for a peer-initiated unidirectional stream.
        unidirectional: bool,
    },

    /// Both directions of the connection are fully shut down. This is the
    /// engine releasing its implicit reference to the connection object; no
    /// further events follow for this connection.
    ShutdownComplete,
}

/// Stream-level events.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Ordered data received from the peer.
    Receive {
        /// One or more zero-copy payload buffers.
        buffers: Vec<Bytes>,
        /// True if this delivery carries the peer's FIN.
        fin: bool,
    },

    /// A previously issued `stream_send` finished; the buffer is released
    /// back to the sender.
    SendComplete {
        /// True if the send was canceled (e.g. by an abort) rather than
        /// delivered.
        canceled: bool,
    },

    /// The peer gracefully closed its send direction.
    PeerSendShutdown,

    /// The peer abruptly terminated its send direction.
    PeerSendAborted { error_code: u64 },

    /// Both directions are fully shut down. This is the final event for the
    /// stream; the receiver may free all per-stream state.
    ShutdownComplete,
}

/// Envelope routing an event to the object it belongs to.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Listener(ListenerEvent),
    Connection {
        connection: ConnectionId,
        event: ConnectionEvent,
    },
    Stream {
        connection: ConnectionId,
        stream: StreamId,
        event: StreamEvent,
    },
}

/// How to shut down a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Close the send direction normally after all queued data.
    Graceful,
    /// Reset the stream immediately, carrying an application error code the
    /// peer observes on the reset.
    Abort(u64),
}

/// Per-connection stream concurrency limits, set on the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamLimits {
    /// Maximum concurrent peer-initiated bidirectional streams.
    pub peer_bidi_streams: u16,
    /// Maximum concurrent peer-initiated unidirectional streams.
    pub peer_uni_streams: u16,
}

/// TLS credential material attached to each accepted connection.
///
/// Threaded explicitly through construction rather than held as a process
/// global; paths are validated by the bootstrap path, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsCredentials {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Acknowledgment returned by an event sink to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    /// The event was consumed.
    Handled,
    /// The sink does not handle this event type.
    NotSupported,
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Failures reported by transport operations.
///
/// Each setup operation fails distinctly so the bootstrap path can implement
/// its termination policy per step.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("unknown {kind} handle")]
    UnknownHandle { kind: &'static str },

    #[error("operation rejected by transport engine: {0}")]
    Rejected(&'static str),

    #[error("address unavailable: {0}")]
    AddressUnavailable(SocketAddr),

    #[error("connection is closed")]
    ConnectionClosed,

    #[error("stream is closed")]
    StreamClosed,
}

/// Operations the server core invokes on the transport engine.
///
/// Implementations must be safe to call from any thread; the engine applies
/// its own internal synchronization. All operations are non-blocking.
pub trait Transport: Send + Sync {
    /// Register a session negotiating the given ALPN identifiers.
    fn session_open(&self, alpn: &[Bytes]) -> Result<SessionId>;

    /// Set per-connection stream concurrency limits on a session.
    fn session_set_stream_limits(&self, session: SessionId, limits: StreamLimits) -> Result<()>;

    /// Enable or disable the address-validation retry feature.
    fn session_enable_retry(&self, session: SessionId, enabled: bool) -> Result<()>;

    /// Stop accepting new connections and streams on the session.
    fn session_shutdown(&self, session: SessionId);

    /// Release the session handle.
    fn session_close(&self, session: SessionId);

    /// Allocate a listener under a session.
    fn listener_open(&self, session: SessionId) -> Result<ListenerId>;

    /// Bind the listener and begin accepting connections.
    fn listener_start(&self, listener: ListenerId, addr: SocketAddr) -> Result<()>;

    /// Stop and release the listener handle.
    fn listener_close(&self, listener: ListenerId);

    /// Accept a newly offered connection, attaching TLS credentials.
    fn connection_accept(&self, connection: ConnectionId, creds: &TlsCredentials) -> Result<()>;

    /// Offer the peer a session-resumption artifact for faster reconnection.
    /// Best effort; failure is not fatal to the connection.
    fn connection_send_resumption_ticket(&self, connection: ConnectionId) -> Result<()>;

    /// Release the connection handle. Called exactly once per connection,
    /// after the engine delivered `ConnectionEvent::ShutdownComplete`.
    fn connection_close(&self, connection: ConnectionId);

    /// Queue one buffer for sending on a stream. `fin` marks the end of the
    /// send direction. The buffer belongs to the engine until the matching
    /// `StreamEvent::SendComplete`.
    fn stream_send(
        &self,
        connection: ConnectionId,
        stream: StreamId,
        data: Bytes,
        fin: bool,
    ) -> Result<()>;

    /// Shut down a stream, gracefully or with an abort code. The engine
    /// delivers a final `StreamEvent::ShutdownComplete` regardless.
    fn stream_shutdown(&self, connection: ConnectionId, stream: StreamId, mode: ShutdownMode);
}

/// Create a bounded event queue pairing engine workers with the dispatch
/// thread.
pub fn event_queue(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (EventSender { tx }, EventReceiver { rx })
}

/// Sending half of the event queue, cloned into each engine worker.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<TransportEvent>,
}

impl EventSender {
    /// Deliver an event, blocking the worker if the queue is full. Queue
    /// pressure here is what turns into QUIC flow control upstream.
    pub fn send(&self, event: TransportEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Deliver an event without blocking. Returns the event back if the
    /// queue is full or disconnected.
    pub fn try_send(&self, event: TransportEvent) -> std::result::Result<(), TransportEvent> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(ev) | TrySendError::Disconnected(ev) => ev,
        })
    }
}

/// Receiving half of the event queue, owned by the dispatch thread.
pub struct EventReceiver {
    rx: Receiver<TransportEvent>,
}

impl EventReceiver {
    /// Wait for the next event. Returns `None` once all senders are gone and
    /// the queue is drained.
    pub fn recv(&self) -> Option<TransportEvent> {
        self.rx.recv().ok()
    }

    /// Poll for an event without blocking.
    pub fn try_recv(&self) -> std::result::Result<Option<TransportEvent>, ()> {
        match self.rx.try_recv() {
            Ok(ev) => Ok(Some(ev)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(()),
        }
    }
}
