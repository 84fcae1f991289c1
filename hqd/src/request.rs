//! Per-stream request state machine.
//!
//! One [`Request`] owns one logical stream: it parses the inbound request
//! line, drives resource read into a [`SendChunk`], and hands chunks to the
//! transport one at a time. At most one send is ever in flight; the next
//! refill starts only after the transport confirms the previous send. The
//! object is destroyed only on the stream's `ShutdownComplete`, so the send
//! buffer can never be freed under an outstanding send.
//!
//! The accepted grammar is a single line, `GET <path>\r\n`, optionally
//! carrying an `HTTP/1.1` version token for clients that speak
//! HTTP/1.1-over-QUIC; those get a fixed `200 OK` header prefixed to the
//! body. A missing resource completes the stream with an empty body rather
//! than a distinct not-found signal; the wire grammar has no status line to
//! carry one.

use crate::chunk::SendChunk;
use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::AbortReason;
use crate::source::FileSource;
use hqd_transport::{ShutdownMode, StreamEvent, StreamId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Header prefixed to responses when the request line carries `HTTP/1.1`.
const HTTP11_RESPONSE_HEADER: &[u8] = b"HTTP/1.1 200 OK\r\n\r\n";

/// Lifecycle states of a request stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Bidirectional stream waiting for the request line.
    AwaitingRequestLine,
    /// Response in progress, more chunks to come.
    Sending,
    /// Final chunk handed to the transport.
    Completing,
    /// Send side closed normally; waiting for the stream to wind down.
    ShuttingDown,
    /// Abort issued; ignoring everything but `ShutdownComplete`.
    Aborting,
    /// Unidirectional stream; inbound data is discarded.
    Draining,
}

/// What the dispatcher should do with the request after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Keep,
    /// The stream is fully shut down; free the request.
    Destroy,
}

pub struct Request {
    connection: Connection,
    stream: StreamId,
    state: RequestState,
    chunk: SendChunk,
    source: Option<FileSource>,
    needs_header: bool,
    config: Arc<ServerConfig>,
}

impl Request {
    pub fn new(
        connection: Connection,
        stream: StreamId,
        unidirectional: bool,
        config: Arc<ServerConfig>,
    ) -> Self {
        let state = if unidirectional {
            RequestState::Draining
        } else {
            RequestState::AwaitingRequestLine
        };
        Self {
            connection,
            stream,
            state,
            chunk: SendChunk::new(config.chunk_capacity),
            source: None,
            needs_header: false,
            config,
        }
    }

    pub fn stream(&self) -> StreamId {
        self.stream
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Handle one stream-level event. The transport serializes these per
    /// stream.
    pub fn handle_event(&mut self, event: StreamEvent) -> Disposition {
        match event {
            StreamEvent::Receive { buffers, fin } => {
                self.on_receive(&buffers, fin);
                Disposition::Keep
            }
            StreamEvent::SendComplete { canceled } => {
                self.on_send_complete(canceled);
                Disposition::Keep
            }
            StreamEvent::PeerSendShutdown => {
                // A FIN after a complete request line is the normal client
                // pattern; before one, the peer gave up on the request.
                if self.state == RequestState::AwaitingRequestLine {
                    self.abort(AbortReason::PeerAbort);
                }
                Disposition::Keep
            }
            StreamEvent::PeerSendAborted { error_code } => {
                if !matches!(
                    self.state,
                    RequestState::Aborting | RequestState::ShuttingDown
                ) {
                    debug!(stream = ?self.stream, error_code, "peer aborted its send side");
                    self.abort(AbortReason::PeerAbort);
                }
                Disposition::Keep
            }
            StreamEvent::ShutdownComplete => {
                debug!(stream = ?self.stream, "stream shutdown complete");
                self.source = None;
                Disposition::Destroy
            }
        }
    }

    fn on_receive(&mut self, buffers: &[bytes::Bytes], fin: bool) {
        match self.state {
            RequestState::Draining => {
                // Interop probes send arbitrary data on a unidirectional
                // stream; drain it without responding.
                let total: usize = buffers.iter().map(|b| b.len()).sum();
                debug!(stream = ?self.stream, bytes = total, "discarding unidirectional data");
            }
            RequestState::Aborting => {}
            RequestState::AwaitingRequestLine => {
                for buf in buffers {
                    if !self.chunk.has_room(buf.len()) {
                        self.abort(AbortReason::RecvNoRoom);
                        return;
                    }
                    self.chunk.write(buf);
                }
                self.process();
                if fin && self.state == RequestState::AwaitingRequestLine {
                    self.abort(AbortReason::PeerAbort);
                }
            }
            RequestState::Sending | RequestState::Completing | RequestState::ShuttingDown => {
                self.abort(AbortReason::ExtraRecv);
            }
        }
    }

    /// Look for a complete request line in the accumulated bytes and, once
    /// present, validate it and start the response.
    fn process(&mut self) {
        let parsed = match parse_request_line(self.chunk.as_slice(), self.config.max_request_line)
        {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return,
            Err(reason) => {
                self.abort(reason);
                return;
            }
        };

        debug!(
            stream = ?self.stream,
            path = %String::from_utf8_lossy(&parsed.path),
            http11 = parsed.http11,
            "request line parsed"
        );
        self.needs_header = parsed.http11;

        // Open failure collapses into "valid empty resource": the grammar
        // has no status line, so the stream just completes with zero bytes.
        self.source = std::str::from_utf8(&parsed.path)
            .ok()
            .and_then(|path| FileSource::open(&self.config.file_root, path).ok());
        if self.source.is_none() {
            debug!(stream = ?self.stream, "resource unavailable, sending empty body");
        }

        self.chunk.reset();
        self.state = RequestState::Sending;
        self.send_data();
    }

    /// Refill the chunk from the resource and hand it to the transport.
    fn send_data(&mut self) {
        if self.chunk.is_in_flight() {
            return;
        }
        if self.needs_header {
            self.chunk.write(HTTP11_RESPONSE_HEADER);
            self.needs_header = false;
        }
        let exhausted = match self.source.as_mut() {
            Some(src) => match self.chunk.fill_from(src) {
                Ok(_) => !self.chunk.is_full(),
                Err(e) => {
                    warn!(stream = ?self.stream, error = %e, "resource read failed");
                    self.abort(AbortReason::SendFailed);
                    return;
                }
            },
            None => true,
        };

        let data = self.chunk.take(exhausted);
        let len = data.len();
        if let Err(e) =
            self.connection
                .transport()
                .stream_send(self.connection.id(), self.stream, data, exhausted)
        {
            warn!(stream = ?self.stream, error = %e, "stream send failed");
            self.abort(AbortReason::SendFailed);
            return;
        }
        debug!(stream = ?self.stream, bytes = len, fin = exhausted, "chunk queued");

        if exhausted {
            // All bytes are handed off; the resource is no longer needed.
            self.source = None;
            self.state = RequestState::Completing;
        }
    }

    fn on_send_complete(&mut self, canceled: bool) {
        if self.chunk.is_in_flight() {
            self.chunk.complete();
        }
        match self.state {
            RequestState::Aborting => {}
            _ if canceled => self.abort(AbortReason::SendFailed),
            RequestState::Sending => self.send_data(),
            RequestState::Completing => {
                debug!(stream = ?self.stream, "response complete");
                self.connection.transport().stream_shutdown(
                    self.connection.id(),
                    self.stream,
                    ShutdownMode::Graceful,
                );
                self.state = RequestState::ShuttingDown;
            }
            _ => {}
        }
    }

    /// One-way transition: issue a reason-coded reset and drive toward
    /// `ShutdownComplete`.
    fn abort(&mut self, reason: AbortReason) {
        warn!(stream = ?self.stream, ?reason, code = reason.code(), "aborting request stream");
        self.state = RequestState::Aborting;
        self.source = None;
        self.connection.transport().stream_shutdown(
            self.connection.id(),
            self.stream,
            ShutdownMode::Abort(reason.code()),
        );
    }
}

struct ParsedRequest {
    path: Vec<u8>,
    http11: bool,
}

/// Parse the accumulated bytes for a `GET <path>[ HTTP/1.1]` line.
///
/// Returns `Ok(None)` while the line is still incomplete and within bounds.
fn parse_request_line(
    data: &[u8],
    max_request_line: usize,
) -> std::result::Result<Option<ParsedRequest>, AbortReason> {
    let Some(nl) = data.iter().position(|&b| b == b'\n') else {
        if data.len() > max_request_line {
            return Err(AbortReason::GetTooBig);
        }
        return Ok(None);
    };
    // Anything past the line terminator belongs to no request.
    if nl + 1 != data.len() {
        return Err(AbortReason::ExtraRecv);
    }

    let mut line = &data[..nl];
    if line.last() == Some(&b'\r') {
        line = &line[..line.len() - 1];
    }
    if line.len() > max_request_line {
        return Err(AbortReason::GetTooBig);
    }

    // Method match is case-sensitive by design.
    let Some(rest) = line.strip_prefix(b"GET ") else {
        return Err(AbortReason::NotGet);
    };
    let (path, trailer) = match rest.iter().position(|&b| b == b' ') {
        Some(sp) => (&rest[..sp], &rest[sp + 1..]),
        None => (rest, &[][..]),
    };
    if path.is_empty() {
        return Err(AbortReason::NotGet);
    }
    if path.windows(2).any(|w| w == b"..") {
        return Err(AbortReason::FoundDots);
    }

    Ok(Some(ParsedRequest {
        path: path.to_vec(),
        http11: trailer == b"HTTP/1.1",
    }))
}
