//! # hqd: HTTP/0.9 over QUIC File Server Core
//!
//! A minimal request/response server multiplexed over a stream-oriented
//! transport: each connection carries many independent request streams, each
//! stream carries one `GET /path` line and receives the raw resource bytes
//! back, chunked and flow-controlled, with no headers and no status line.
//! This is the `hq-interop` protocol used by the QUIC interop test suite.
//!
//! ## Architecture
//!
//! Events flow top-down from the transport engine (behind the
//! [`hqd_transport::Transport`] contract); ownership and teardown flow
//! bottom-up through explicit destruction and reference release:
//!
//! - [`session::ServerSession`] — ALPN set and per-connection stream limits,
//!   owns the one [`listener::Listener`]
//! - [`connection::Connection`] — ref-counted handle per accepted connection
//! - [`request::Request`] — one per peer-opened stream, the protocol state
//!   machine
//! - [`chunk::SendChunk`] — fixed-capacity buffer batching each outbound
//!   burst
//! - [`dispatch::ServerDriver`] — routes transport events to the objects
//!   they address
//!
//! The execution model is purely event-driven: no component blocks the
//! dispatch thread except the bounded, local resource read while refilling a
//! send chunk.

pub mod chunk;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod listener;
pub mod request;
pub mod session;
pub mod source;

pub use chunk::SendChunk;
pub use config::ServerConfig;
pub use connection::Connection;
pub use dispatch::ServerDriver;
pub use error::{AbortReason, SetupError};
pub use request::{Request, RequestState};
pub use session::ServerSession;
