//! Server configuration.
//!
//! Defaults match the interop conventions this server exists for: port 4433,
//! retry off, `hq-interop` ALPN, 100 concurrent requests per connection, and
//! 64 KiB send chunks.

use hqd_transport::TlsCredentials;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Per-connection unidirectional stream allowance, reserved for
/// interoperability probing.
pub const PEER_UNI_STREAMS: u16 = 1;

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub host: String,

    /// UDP port to listen on.
    pub port: u16,

    /// ALPN identifier negotiated with peers.
    pub alpn: String,

    /// Enable the address-validation retry feature.
    pub enable_retry: bool,

    /// Root directory for resource lookup.
    pub file_root: PathBuf,

    /// Maximum concurrent peer-initiated bidirectional streams per
    /// connection; bounds in-flight requests per connection.
    pub peer_bidi_streams: u16,

    /// Per-send buffer capacity in bytes.
    pub chunk_capacity: usize,

    /// Maximum accepted request-line length in bytes.
    pub max_request_line: usize,

    /// TLS certificate chain file.
    pub cert_path: PathBuf,

    /// TLS private key file.
    pub key_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4433,
            alpn: "hq-interop".to_string(),
            enable_retry: false,
            file_root: PathBuf::from("./www"),
            peer_bidi_streams: 100,
            chunk_capacity: 64 * 1024,
            max_request_line: 1024,
            cert_path: PathBuf::from("./cert.pem"),
            key_path: PathBuf::from("./key.pem"),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &std::path::Path) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Validate the configuration, returning all problems found.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.host.parse::<IpAddr>().is_err() {
            errors.push(format!("host is not a valid IP address: {}", self.host));
        }
        if self.port == 0 {
            errors.push("port must be non-zero".to_string());
        }
        if self.alpn.is_empty() {
            errors.push("alpn must not be empty".to_string());
        }
        if self.peer_bidi_streams == 0 {
            errors.push("peer_bidi_streams must be at least 1".to_string());
        }
        if self.chunk_capacity == 0 {
            errors.push("chunk_capacity must be non-zero".to_string());
        }
        if self.max_request_line == 0 || self.max_request_line >= self.chunk_capacity {
            errors.push(format!(
                "max_request_line must be between 1 and chunk_capacity ({})",
                self.chunk_capacity
            ));
        }
        if !self.file_root.is_dir() {
            errors.push(format!(
                "file serving root is not a directory: {}",
                self.file_root.display()
            ));
        }

        errors
    }

    /// The socket address to bind, once `validate` has passed.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        let ip: IpAddr = self.host.parse().ok()?;
        Some(SocketAddr::new(ip, self.port))
    }

    /// Credential material attached to each accepted connection.
    pub fn credentials(&self) -> TlsCredentials {
        TlsCredentials {
            cert_path: self.cert_path.clone(),
            key_path: self.key_path.clone(),
        }
    }
}
