//! Byte buffering.
//!
//! Three write modes: fully-buffered, line-buffered and unbuffered (the
//! `sync` mode). Reads go through a
//! [`ReadBuffer`] that is refilled one chunk at a time and supports
//! arbitrary push-back; writes accumulate in a [`WriteBuffer`] until the
//! mode says to flush. [`ByteLayer`] drives both against a retry layer.

mod layer;

pub use layer::ByteLayer;

/// Default buffer size (POSIX BUFSIZ).
pub const BUFSIZ: usize = 8192;

/// Write buffering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufMode {
    /// Fully buffered: flush when buffer is full.
    Full,
    /// Line buffered: flush on newline or buffer full.
    Line,
    /// Unbuffered: every write reaches the transport before returning.
    None,
}

/// Read-side buffer.
///
/// Invariants:
/// - `pos <= filled <= data.len()`
/// - bytes in `data[pos..filled]` are exactly what the next read returns
#[derive(Debug)]
pub struct ReadBuffer {
    data: Vec<u8>,
    pos: usize,
    filled: usize,
    chunk: usize,
}

impl ReadBuffer {
    /// Create a buffer that reads `chunk` bytes per refill.
    pub fn new(chunk: usize) -> Self {
        let chunk = chunk.max(1);
        Self {
            data: vec![0u8; chunk],
            pos: 0,
            filled: 0,
            chunk,
        }
    }

    /// Bytes read from the transport but not yet consumed.
    pub fn available(&self) -> &[u8] {
        &self.data[self.pos..self.filled]
    }

    pub fn len(&self) -> usize {
        self.filled - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == self.filled
    }

    /// Marks `n` buffered bytes consumed (clamped to what is available).
    pub fn consume(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.filled);
        if self.pos == self.filled {
            self.pos = 0;
            self.filled = 0;
        }
    }

    /// Removes and returns up to `n` buffered bytes.
    pub fn take(&mut self, n: usize) -> Vec<u8> {
        let n = n.min(self.len());
        let out = self.data[self.pos..self.pos + n].to_vec();
        self.consume(n);
        out
    }

    /// Space for the next transport read, after compacting.
    pub fn spare(&mut self) -> &mut [u8] {
        if self.pos > 0 {
            self.data.copy_within(self.pos..self.filled, 0);
            self.filled -= self.pos;
            self.pos = 0;
        }
        let need = self.filled + self.chunk;
        if self.data.len() < need {
            self.data.resize(need, 0);
        }
        &mut self.data[self.filled..self.filled + self.chunk]
    }

    /// Records `n` bytes written into the slice returned by [`Self::spare`].
    pub fn commit(&mut self, n: usize) {
        self.filled = (self.filled + n).min(self.data.len());
    }

    /// Pushes `bytes` back in front of the buffered data.
    ///
    /// Unlike C `ungetc` there is no one-byte limit: the buffer grows.
    pub fn unread(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if self.pos >= bytes.len() {
            self.pos -= bytes.len();
            self.data[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
            return;
        }
        let mut joined = Vec::with_capacity(bytes.len() + self.len() + self.chunk);
        joined.extend_from_slice(bytes);
        joined.extend_from_slice(self.available());
        self.filled = joined.len();
        self.pos = 0;
        joined.resize(joined.len().max(self.chunk), 0);
        self.data = joined;
    }

    /// Drops buffered bytes, returning how many there were.
    pub fn discard(&mut self) -> usize {
        let n = self.len();
        self.pos = 0;
        self.filled = 0;
        n
    }
}

/// Write-side buffer.
///
/// Holds bytes accepted from callers but not yet accepted by the
/// transport; `offset` marks the prefix a partial flush already wrote.
#[derive(Debug)]
pub struct WriteBuffer {
    data: Vec<u8>,
    offset: usize,
    capacity: usize,
}

impl WriteBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: Vec::with_capacity(capacity),
            offset: 0,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends caller bytes. The buffer may exceed its capacity until the
    /// next flush.
    pub fn push(&mut self, bytes: &[u8]) {
        if self.offset > 0 && self.offset == self.data.len() {
            self.data.clear();
            self.offset = 0;
        }
        self.data.extend_from_slice(bytes);
    }

    /// Bytes still owed to the transport.
    pub fn pending(&self) -> &[u8] {
        &self.data[self.offset..]
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset == self.data.len()
    }

    /// Records that the transport accepted `n` pending bytes.
    pub fn advance(&mut self, n: usize) {
        self.offset = (self.offset + n).min(self.data.len());
        if self.offset == self.data.len() {
            self.data.clear();
            self.offset = 0;
        }
    }

    /// True when `mode` requires the pending bytes to reach the transport now.
    pub fn needs_flush(&self, mode: BufMode) -> bool {
        if self.is_empty() {
            return false;
        }
        match mode {
            BufMode::None => true,
            BufMode::Full => self.len() >= self.capacity,
            BufMode::Line => self.len() >= self.capacity || self.pending().contains(&b'\n'),
        }
    }

    /// Drops pending bytes, returning how many there were.
    pub fn discard(&mut self) -> usize {
        let n = self.len();
        self.data.clear();
        self.offset = 0;
        n
    }
}
