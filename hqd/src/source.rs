//! Resource-read collaborator over the local filesystem.
//!
//! Synchronous by design: reads are bounded, local calls on the dispatch
//! path (the one blocking exception allowed by the concurrency model). The
//! `..` traversal guard is enforced by the request parser before a path
//! reaches this module.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

/// An open resource streaming its bytes to one request.
#[derive(Debug)]
pub struct FileSource {
    file: File,
}

impl FileSource {
    /// Open the resource named by a request path, relative to the configured
    /// root. Fails distinctly (via `ErrorKind::NotFound` and friends) when
    /// the resource does not exist.
    pub fn open(root: &Path, request_path: &str) -> io::Result<FileSource> {
        let relative = request_path.trim_start_matches('/');
        let full = root.join(relative);
        debug!(path = %full.display(), "opening resource");
        let file = File::open(full)?;
        Ok(FileSource { file })
    }

    /// Read the next chunk of bytes. Returns 0 on exhaustion.
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Read for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}
