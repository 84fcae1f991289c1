//! Listening endpoint.
//!
//! The listener spawns a [`Connection`] for every connection the transport
//! offers, attaching the process-wide TLS credentials to the accept. It does
//! not own the connections it spawns; their lifetime is governed by the
//! transport's shutdown events and the reference counting in
//! [`crate::connection`].

use crate::connection::Connection;
use crate::error::SetupError;
use hqd_transport::{
    EventStatus, ListenerEvent, ListenerId, SessionId, TlsCredentials, Transport,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Listener {
    transport: Arc<dyn Transport>,
    id: ListenerId,
    credentials: TlsCredentials,
}

impl Listener {
    /// Open and start a listening endpoint bound to `addr`. Open and start
    /// failures are reported distinctly; a listener that opened but failed
    /// to start is closed before returning.
    pub fn start(
        transport: Arc<dyn Transport>,
        session: SessionId,
        addr: SocketAddr,
        credentials: TlsCredentials,
    ) -> Result<Self, SetupError> {
        let id = transport
            .listener_open(session)
            .map_err(SetupError::ListenerOpen)?;
        if let Err(e) = transport.listener_start(id, addr) {
            transport.listener_close(id);
            return Err(SetupError::ListenerStart(e));
        }
        info!(listener = ?id, %addr, "listening");
        Ok(Self {
            transport,
            id,
            credentials,
        })
    }

    /// Handle one listener-level event, returning the acknowledgment for the
    /// transport and any newly attached connection.
    pub fn handle_event(&self, event: ListenerEvent) -> (EventStatus, Option<Connection>) {
        match event {
            ListenerEvent::NewConnection { connection } => {
                if let Err(e) = self
                    .transport
                    .connection_accept(connection, &self.credentials)
                {
                    // The transport tears the rejected connection down on
                    // its own; nothing to track here.
                    warn!(connection = ?connection, error = %e, "accept failed");
                    return (EventStatus::Handled, None);
                }
                let conn = Connection::new(Arc::clone(&self.transport), connection);
                (EventStatus::Handled, Some(conn))
            }
            _ => (EventStatus::NotSupported, None),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.transport.listener_close(self.id);
    }
}
