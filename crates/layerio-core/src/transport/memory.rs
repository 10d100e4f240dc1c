//! Seekable in-memory file transport.
//!
//! Contents live behind a shared handle so several transports (and tests)
//! can observe exactly which bytes reached the transport, independent of any
//! buffering above it.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{Access, FileKind, Io, Transport, TransportStat, Whence, resolve_seek};
use crate::error::{Result, StreamError};

/// Shared view of a [`MemoryFile`]'s contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryHandle {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemoryHandle {
    /// Snapshot of the bytes currently stored.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the stored bytes.
    pub fn set_contents(&self, data: &[u8]) {
        let mut bytes = self.bytes.lock();
        bytes.clear();
        bytes.extend_from_slice(data);
    }
}

/// In-memory file with its own position over shared contents.
#[derive(Debug)]
pub struct MemoryFile {
    handle: MemoryHandle,
    pos: u64,
    access: Access,
    append: bool,
    nonblocking: bool,
    closed: bool,
}

impl MemoryFile {
    /// Empty file with the given access.
    #[must_use]
    pub fn new(access: Access) -> Self {
        Self::with_contents(b"", access)
    }

    /// File pre-filled with `data`, positioned at offset 0.
    #[must_use]
    pub fn with_contents(data: &[u8], access: Access) -> Self {
        Self {
            handle: MemoryHandle {
                bytes: Arc::new(Mutex::new(data.to_vec())),
            },
            pos: 0,
            access,
            append: false,
            nonblocking: false,
            closed: false,
        }
    }

    /// A second transport over the same contents with its own position.
    #[must_use]
    pub fn sibling(&self, access: Access) -> Self {
        Self {
            handle: self.handle.clone(),
            pos: 0,
            access,
            append: false,
            nonblocking: false,
            closed: false,
        }
    }

    /// Makes every write land at the end of the contents.
    #[must_use]
    pub fn appending(mut self) -> Self {
        self.append = true;
        self
    }

    /// Handle for inspecting the contents.
    #[must_use]
    pub fn handle(&self) -> MemoryHandle {
        self.handle.clone()
    }

    /// Current transport position (not the position of any stream above).
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    #[must_use]
    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(StreamError::CLOSED)
        } else {
            Ok(())
        }
    }

    fn check_read(&self) -> Result<()> {
        self.check_open()?;
        if self.access.read {
            Ok(())
        } else {
            Err(StreamError::NOT_READABLE)
        }
    }

    fn check_write(&self) -> Result<()> {
        self.check_open()?;
        if self.access.write {
            Ok(())
        } else {
            Err(StreamError::NOT_WRITABLE)
        }
    }
}

fn offset_to_index(offset: u64) -> Result<usize> {
    usize::try_from(offset)
        .map_err(|_| StreamError::InvalidArgument(format!("offset {offset} out of range")))
}

fn copy_out(bytes: &[u8], offset: usize, buf: &mut [u8]) -> Io<usize> {
    if offset >= bytes.len() {
        return Io::Eof;
    }
    let n = buf.len().min(bytes.len() - offset);
    buf[..n].copy_from_slice(&bytes[offset..offset + n]);
    Io::Ready(n)
}

fn copy_in(bytes: &mut Vec<u8>, offset: usize, data: &[u8]) {
    let end = offset + data.len();
    if bytes.len() < end {
        // A gap left by seeking past the end reads back as zeros.
        bytes.resize(end, 0);
    }
    bytes[offset..end].copy_from_slice(data);
}

impl Transport for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<Io<usize>> {
        self.check_read()?;
        if buf.is_empty() {
            return Ok(Io::Ready(0));
        }
        let offset = offset_to_index(self.pos)?;
        let io = copy_out(&self.handle.bytes.lock(), offset, buf);
        if let Io::Ready(n) = io {
            self.pos += n as u64;
        }
        Ok(io)
    }

    fn write(&mut self, data: &[u8]) -> Result<Io<usize>> {
        self.check_write()?;
        let mut bytes = self.handle.bytes.lock();
        if self.append {
            self.pos = bytes.len() as u64;
        }
        let offset = offset_to_index(self.pos)?;
        copy_in(&mut bytes, offset, data);
        self.pos += data.len() as u64;
        Ok(Io::Ready(data.len()))
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        self.check_open()?;
        let len = self.handle.len() as u64;
        self.pos = resolve_seek(self.pos, len, offset, whence)?;
        Ok(self.pos)
    }

    fn close(&mut self) -> Result<Io<()>> {
        self.check_open()?;
        self.closed = true;
        Ok(Io::Ready(()))
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<()> {
        self.check_open()?;
        self.nonblocking = nonblocking;
        Ok(())
    }

    fn is_readable(&self) -> bool {
        self.access.read
    }

    fn is_writable(&self) -> bool {
        self.access.write
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn stat(&self) -> Result<TransportStat> {
        self.check_open()?;
        Ok(TransportStat {
            kind: FileKind::Memory,
            size: self.handle.len() as u64,
            mode: 0o600,
            block_size: crate::buffer::BUFSIZ as u32,
        })
    }

    fn pread(&mut self, buf: &mut [u8], offset: u64) -> Result<Io<usize>> {
        self.check_read()?;
        let offset = offset_to_index(offset)?;
        Ok(copy_out(&self.handle.bytes.lock(), offset, buf))
    }

    fn pwrite(&mut self, data: &[u8], offset: u64) -> Result<Io<usize>> {
        self.check_write()?;
        let offset = offset_to_index(offset)?;
        copy_in(&mut self.handle.bytes.lock(), offset, data);
        Ok(Io::Ready(data.len()))
    }
}
