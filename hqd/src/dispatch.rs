//! Event routing.
//!
//! The transport addresses events by opaque handles; this router is the
//! explicit registry mapping those handles back to the server's objects and
//! matching each sum-typed event in one place per component. It runs on a
//! single dispatch thread, which preserves the one-event-at-a-time-per-object
//! guarantee; the only cross-thread shared mutable state in the core is the
//! connection reference count.

use crate::config::ServerConfig;
use crate::connection::{Connection, ConnectionAction};
use crate::error::SetupError;
use crate::request::{Disposition, Request};
use crate::session::ServerSession;
use hqd_transport::{
    ConnectionId, EventReceiver, EventStatus, StreamId, Transport, TransportEvent,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ServerDriver {
    config: Arc<ServerConfig>,
    session: ServerSession,
    connections: HashMap<ConnectionId, Connection>,
    requests: HashMap<(ConnectionId, StreamId), Request>,
}

impl std::fmt::Debug for ServerDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerDriver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ServerDriver {
    /// Configure the session, bind the listener, and stand ready to route
    /// events. Any setup failure is fatal to startup.
    pub fn new(transport: Arc<dyn Transport>, config: ServerConfig) -> Result<Self, SetupError> {
        let session = ServerSession::new(transport, &config)?;
        Ok(Self {
            config: Arc::new(config),
            session,
            connections: HashMap::new(),
            requests: HashMap::new(),
        })
    }

    /// Drain the event queue until every sender is gone.
    pub fn run(&mut self, events: EventReceiver) {
        while let Some(event) = events.recv() {
            self.handle_event(event);
        }
    }

    /// Route one transport event to the object it addresses.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Listener(event) => {
                let (status, connection) = self.session.handle_listener_event(event);
                if status == EventStatus::NotSupported {
                    debug!("unsupported listener event");
                }
                if let Some(connection) = connection {
                    self.connections.insert(connection.id(), connection);
                }
            }
            TransportEvent::Connection { connection, event } => {
                let Some(conn) = self.connections.get(&connection) else {
                    warn!(connection = ?connection, "event for unknown connection");
                    return;
                };
                match conn.handle_event(event, &self.config) {
                    ConnectionAction::None => {}
                    ConnectionAction::NewRequest(request) => {
                        self.requests
                            .insert((connection, request.stream()), request);
                    }
                    ConnectionAction::Release => {
                        // Well-behaved peers tear streams down first; any
                        // request still registered here is stale.
                        self.requests.retain(|(conn_id, stream), _| {
                            if *conn_id == connection {
                                warn!(stream = ?stream, "request outlived its connection");
                                false
                            } else {
                                true
                            }
                        });
                        self.connections.remove(&connection);
                    }
                }
            }
            TransportEvent::Stream {
                connection,
                stream,
                event,
            } => {
                let Some(request) = self.requests.get_mut(&(connection, stream)) else {
                    debug!(stream = ?stream, "event for unknown stream");
                    return;
                };
                if request.handle_event(event) == Disposition::Destroy {
                    self.requests.remove(&(connection, stream));
                }
            }
        }
    }

    /// Number of connections currently attached.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of requests currently in flight.
    pub fn request_count(&self) -> usize {
        self.requests.len()
    }
}
