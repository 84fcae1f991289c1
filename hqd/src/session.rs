//! Negotiated session scope: ALPN set, per-connection stream limits, and the
//! one listener they apply to.
//!
//! Construction is a sequence of distinguishable setup steps; any failure is
//! fatal and reported as its own [`SetupError`] variant so the bootstrap
//! path can terminate accordingly. Teardown destroys the listener first,
//! then shuts the session down, so no new connections or streams slip in
//! during shutdown.

use crate::config::{ServerConfig, PEER_UNI_STREAMS};
use crate::error::SetupError;
use crate::listener::Listener;
use bytes::Bytes;
use hqd_transport::{EventStatus, ListenerEvent, SessionId, StreamLimits, Transport};
use std::sync::Arc;
use tracing::info;

pub struct ServerSession {
    transport: Arc<dyn Transport>,
    session: SessionId,
    /// `Some` until drop; the listener must close before the session does.
    listener: Option<Listener>,
}

impl ServerSession {
    pub fn new(transport: Arc<dyn Transport>, config: &ServerConfig) -> Result<Self, SetupError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(SetupError::Config(errors));
        }
        // Validation guarantees a parseable address.
        let addr = config
            .socket_addr()
            .ok_or_else(|| SetupError::Config(vec!["unparseable listen address".to_string()]))?;

        let alpn = [Bytes::copy_from_slice(config.alpn.as_bytes())];
        let session = transport
            .session_open(&alpn)
            .map_err(SetupError::SessionOpen)?;

        let limits = StreamLimits {
            peer_bidi_streams: config.peer_bidi_streams,
            peer_uni_streams: PEER_UNI_STREAMS,
        };
        if let Err(e) = transport.session_set_stream_limits(session, limits) {
            transport.session_close(session);
            return Err(SetupError::StreamLimits(e));
        }
        if config.enable_retry {
            if let Err(e) = transport.session_enable_retry(session, true) {
                transport.session_close(session);
                return Err(SetupError::RetryToggle(e));
            }
        }

        let listener = match Listener::start(
            Arc::clone(&transport),
            session,
            addr,
            config.credentials(),
        ) {
            Ok(listener) => listener,
            Err(e) => {
                transport.session_close(session);
                return Err(e);
            }
        };

        info!(
            alpn = %config.alpn,
            peer_bidi_streams = config.peer_bidi_streams,
            retry = config.enable_retry,
            "session configured"
        );
        Ok(Self {
            transport,
            session,
            listener: Some(listener),
        })
    }

    /// Route a listener-level event to the owned listener.
    pub fn handle_listener_event(
        &self,
        event: ListenerEvent,
    ) -> (EventStatus, Option<crate::connection::Connection>) {
        match &self.listener {
            Some(listener) => listener.handle_event(event),
            // Only reachable mid-teardown; nothing accepts anymore.
            None => (EventStatus::NotSupported, None),
        }
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        // Listener first: stop accepting before the session winds down.
        self.listener = None;
        self.transport.session_shutdown(self.session);
        self.transport.session_close(self.session);
    }
}
