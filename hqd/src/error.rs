//! Error taxonomy for the server core.
//!
//! Two distinct domains:
//! - [`AbortReason`]: per-stream protocol errors, terminal for the one
//!   request that raises them and visible to the peer as a reset code.
//! - [`SetupError`]: bootstrap failures, one variant per setup step so the
//!   (out-of-scope) bootstrap path can terminate distinctly per step.

use hqd_transport::TransportError;
use thiserror::Error;

/// Result type for server setup operations.
pub type Result<T> = std::result::Result<T, SetupError>;

/// Application error code carried on a stream reset, terminal for the
/// request that raises it.
///
/// Code 0 is reserved for "no error" on graceful shutdown and never appears
/// on an abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum AbortReason {
    /// First token of the request line was not `GET`.
    NotGet = 1,

    /// Requested path contains the `..` sequence.
    FoundDots = 2,

    /// Request line exceeded the bounded parse buffer.
    GetTooBig = 3,

    /// The transport reported a send failure.
    SendFailed = 4,

    /// Received data could not fit the remaining buffer capacity.
    RecvNoRoom = 5,

    /// Peer closed its send side before completing a valid request line.
    PeerAbort = 6,

    /// Data received after the response had already begun.
    ExtraRecv = 7,
}

impl AbortReason {
    /// The numeric code sent to the peer on the stream reset.
    pub fn code(self) -> u64 {
        self as u64
    }
}

/// Fatal configuration/bootstrap failures, unrecoverable by the core.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Configuration rejected by validation.
    #[error("invalid configuration: {}", .0.join("; "))]
    Config(Vec<String>),

    /// Session registration (ALPN negotiation) failed.
    #[error("session open failed")]
    SessionOpen(#[source] TransportError),

    /// Applying per-connection stream limits failed.
    #[error("setting session stream limits failed")]
    StreamLimits(#[source] TransportError),

    /// Enabling the retry feature failed.
    #[error("enabling retry failed")]
    RetryToggle(#[source] TransportError),

    /// Allocating the listener failed.
    #[error("listener open failed")]
    ListenerOpen(#[source] TransportError),

    /// Binding/starting the listener failed.
    #[error("listener start failed")]
    ListenerStart(#[source] TransportError),
}
