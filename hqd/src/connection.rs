//! Per-connection state and lifetime.
//!
//! A [`Connection`] is a cheaply cloneable handle over an atomically
//! ref-counted inner object. The dispatcher's map entry stands in for the
//! transport's implicit reference and is released on
//! `ConnectionEvent::ShutdownComplete`; every [`Request`] holds its own
//! clone, so the underlying connection handle is closed exactly once, when
//! the last holder drops.

use crate::config::ServerConfig;
use crate::request::Request;
use hqd_transport::{ConnectionEvent, ConnectionId, Transport};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a connection-level event, applied by the dispatcher.
pub enum ConnectionAction {
    /// Nothing for the dispatcher to do.
    None,
    /// The peer opened a stream; register the new request.
    NewRequest(Request),
    /// The transport released its hold; drop the dispatcher's reference.
    Release,
}

struct Inner {
    transport: Arc<dyn Transport>,
    id: ConnectionId,
}

impl Drop for Inner {
    fn drop(&mut self) {
        debug!(connection = ?self.id, "closing connection handle");
        self.transport.connection_close(self.id);
    }
}

/// Shared-ownership handle to one transport connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    pub fn new(transport: Arc<dyn Transport>, id: ConnectionId) -> Self {
        info!(connection = ?id, "connection attached");
        Self {
            inner: Arc::new(Inner { transport, id }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// Number of live references, including this one.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Handle one connection-level event. The transport serializes these per
    /// connection.
    pub fn handle_event(
        &self,
        event: ConnectionEvent,
        config: &Arc<ServerConfig>,
    ) -> ConnectionAction {
        match event {
            ConnectionEvent::Connected => {
                // Best effort; a peer that cannot resume simply reconnects
                // the slow way.
                if let Err(e) = self
                    .inner
                    .transport
                    .connection_send_resumption_ticket(self.inner.id)
                {
                    warn!(connection = ?self.inner.id, error = %e, "resumption ticket not sent");
                }
                ConnectionAction::None
            }
            ConnectionEvent::PeerStreamStarted {
                stream,
                unidirectional,
            } => {
                debug!(
                    connection = ?self.inner.id,
                    stream = ?stream,
                    unidirectional,
                    "peer stream started"
                );
                ConnectionAction::NewRequest(Request::new(
                    self.clone(),
                    stream,
                    unidirectional,
                    Arc::clone(config),
                ))
            }
            ConnectionEvent::ShutdownComplete => {
                info!(connection = ?self.inner.id, "connection shutdown complete");
                ConnectionAction::Release
            }
        }
    }
}
