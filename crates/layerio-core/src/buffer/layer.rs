//! Byte buffer layer: read buffer, write buffer, and the transfers between
//! them and the retry layer.

use crate::error::{Result, StreamError};
use crate::errno;
use crate::log::{self, LogLevel};
use crate::metrics::{IoMetrics, METRICS};
use crate::retry::{Policy, RetryLayer};
use crate::transport::{Access, Io, Transport};

use super::{BufMode, ReadBuffer, WriteBuffer};

/// Per-direction byte buffers for one pipeline.
#[derive(Debug)]
pub struct ByteLayer {
    read: Option<ReadBuffer>,
    write: Option<WriteBuffer>,
}

impl ByteLayer {
    /// Buffers for the directions in `access`, each of `size` bytes.
    pub fn new(access: Access, size: usize) -> Self {
        Self {
            read: access.read.then(|| ReadBuffer::new(size)),
            write: access.write.then(|| WriteBuffer::new(size)),
        }
    }

    pub fn read_buffer(&self) -> Option<&ReadBuffer> {
        self.read.as_ref()
    }

    pub fn write_buffer(&self) -> Option<&WriteBuffer> {
        self.write.as_ref()
    }

    /// Buffered, unconsumed read bytes.
    pub fn buffered(&self) -> &[u8] {
        match &self.read {
            Some(buf) => buf.available(),
            None => &[],
        }
    }

    pub fn is_read_empty(&self) -> bool {
        self.read.as_ref().is_none_or(ReadBuffer::is_empty)
    }

    pub fn is_write_empty(&self) -> bool {
        self.write.as_ref().is_none_or(WriteBuffer::is_empty)
    }

    fn reader(&mut self) -> Result<&mut ReadBuffer> {
        self.read
            .as_mut()
            .ok_or(StreamError::NOT_READABLE)
    }

    fn writer(&mut self) -> Result<&mut WriteBuffer> {
        self.write
            .as_mut()
            .ok_or(StreamError::NOT_WRITABLE)
    }

    /// Reads one chunk from the transport into the read buffer.
    pub fn fill<T: Transport + ?Sized>(
        &mut self,
        io: &mut RetryLayer<'_, T>,
        policy: Policy,
    ) -> Result<Io<usize>> {
        let buf = self.reader()?;
        let result = io.read(buf.spare(), policy)?;
        match result {
            Io::Ready(0) => Ok(Io::Eof),
            Io::Ready(n) => {
                buf.commit(n);
                IoMetrics::inc(&METRICS.fills);
                let fd = io.transport().fd();
                log::event(LogLevel::Trace, "buffer.fill", |e| e.with_fd(fd).with_bytes(n));
                Ok(Io::Ready(n))
            }
            other => Ok(other),
        }
    }

    /// Marks `n` buffered read bytes consumed.
    pub fn consume(&mut self, n: usize) {
        if let Some(buf) = self.read.as_mut() {
            buf.consume(n);
        }
    }

    /// Returns up to `n` bytes, filling once when the buffer is empty.
    pub fn read_some<T: Transport + ?Sized>(
        &mut self,
        io: &mut RetryLayer<'_, T>,
        n: usize,
        policy: Policy,
    ) -> Result<Io<Vec<u8>>> {
        if self.is_read_empty() {
            match self.fill(io, policy)? {
                Io::Ready(_) => {}
                Io::WouldBlock => return Ok(Io::WouldBlock),
                Io::Eof => return Ok(Io::Eof),
            }
        }
        Ok(Io::Ready(self.reader()?.take(n)))
    }

    /// Pushes bytes back in front of the read buffer.
    pub fn unread(&mut self, bytes: &[u8]) -> Result<()> {
        self.reader()?.unread(bytes);
        Ok(())
    }

    /// Drops buffered read bytes, returning how many there were.
    pub fn discard_read(&mut self) -> usize {
        self.read.as_mut().map_or(0, ReadBuffer::discard)
    }

    /// Drops pending write bytes, returning how many there were.
    pub fn discard_write(&mut self) -> usize {
        self.write.as_mut().map_or(0, WriteBuffer::discard)
    }

    /// Buffers `data` and flushes when `mode` requires it.
    ///
    /// The data is always accepted; a WouldBlock result means the buffer
    /// still holds pending bytes.
    pub fn write<T: Transport + ?Sized>(
        &mut self,
        io: &mut RetryLayer<'_, T>,
        data: &[u8],
        mode: BufMode,
        policy: Policy,
    ) -> Result<Io<()>> {
        let buf = self.writer()?;
        buf.push(data);
        if buf.needs_flush(mode) {
            self.flush(io, policy)
        } else {
            Ok(Io::Ready(()))
        }
    }

    /// Writes pending bytes until the buffer is empty.
    ///
    /// Partial transport writes loop. On WouldBlock the unwritten suffix
    /// stays buffered, so no byte is ever lost or duplicated.
    pub fn flush<T: Transport + ?Sized>(
        &mut self,
        io: &mut RetryLayer<'_, T>,
        policy: Policy,
    ) -> Result<Io<()>> {
        let Some(buf) = self.write.as_mut() else {
            return Ok(Io::Ready(()));
        };
        if buf.is_empty() {
            return Ok(Io::Ready(()));
        }
        let mut written = 0;
        while !buf.is_empty() {
            match io.write(buf.pending(), policy)? {
                Io::Ready(0) | Io::Eof => {
                    return Err(StreamError::Os {
                        op: "write",
                        errno: errno::EPIPE,
                    });
                }
                Io::Ready(n) => {
                    buf.advance(n);
                    written += n;
                }
                Io::WouldBlock => return Ok(Io::WouldBlock),
            }
        }
        IoMetrics::inc(&METRICS.flushes);
        let fd = io.transport().fd();
        log::event(LogLevel::Trace, "buffer.flush", |e| e.with_fd(fd).with_bytes(written));
        Ok(Io::Ready(()))
    }
}
