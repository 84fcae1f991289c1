//! Fixed-capacity send buffer.
//!
//! A [`SendChunk`] batches small writes into one transport send. It is either
//! empty/filling (mutable) or in flight (handed to the transport, frozen
//! until the matching send-complete). Capacity is fixed at construction to
//! bound per-request memory; only the logical length is ever handed to the
//! transport, never the full capacity.

use bytes::{Bytes, BytesMut};
use std::io::{ErrorKind, Read};

/// Fixed-capacity byte accumulator for one request's outbound bursts.
pub struct SendChunk {
    buf: BytesMut,
    capacity: usize,
    in_flight: bool,
    final_send: bool,
}

impl SendChunk {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
            in_flight: false,
            final_send: false,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    /// Whether `len` more bytes fit. Callers must check this before
    /// [`write`](Self::write); a chunk in flight has no room.
    pub fn has_room(&self, len: usize) -> bool {
        !self.in_flight && self.buf.len() + len < self.capacity
    }

    /// Append bytes. Writing past capacity or into an in-flight chunk is a
    /// programming error.
    pub fn write(&mut self, data: &[u8]) {
        debug_assert!(!self.in_flight, "write into in-flight chunk");
        debug_assert!(self.buf.len() + data.len() <= self.capacity);
        self.buf.extend_from_slice(data);
    }

    /// The accumulated bytes, for request-line parsing.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Zero the logical length for reuse. Stale bytes beyond the new length
    /// are never observed by the transport.
    pub fn reset(&mut self) {
        debug_assert!(!self.in_flight, "reset of in-flight chunk");
        self.buf.clear();
    }

    /// Refill from a byte source, reading until the chunk is full or the
    /// source is exhausted. Returns the number of bytes added.
    pub fn fill_from<R: Read>(&mut self, src: &mut R) -> std::io::Result<usize> {
        debug_assert!(!self.in_flight, "refill of in-flight chunk");
        let mut total = 0;
        while self.buf.len() < self.capacity {
            let start = self.buf.len();
            let want = self.capacity - start;
            self.buf.resize(start + want, 0);
            match src.read(&mut self.buf[start..start + want]) {
                Ok(0) => {
                    self.buf.truncate(start);
                    break;
                }
                Ok(n) => {
                    self.buf.truncate(start + n);
                    total += n;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {
                    self.buf.truncate(start);
                }
                Err(e) => {
                    self.buf.truncate(start);
                    return Err(e);
                }
            }
        }
        Ok(total)
    }

    /// Hand the filled prefix to the transport as one send, marking the chunk
    /// in flight. `fin` records whether this send ends the response.
    pub fn take(&mut self, fin: bool) -> Bytes {
        debug_assert!(!self.in_flight, "take of in-flight chunk");
        self.in_flight = true;
        self.final_send = fin;
        self.buf.split().freeze()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Whether the in-flight (or just-completed) send was marked final.
    pub fn is_final(&self) -> bool {
        self.final_send
    }

    /// The transport confirmed the send; the chunk becomes empty and
    /// reusable.
    pub fn complete(&mut self) {
        debug_assert!(self.in_flight, "completion without in-flight send");
        self.in_flight = false;
        self.buf.clear();
        self.buf.reserve(self.capacity);
    }
}
