//! Transport contract.
//!
//! The minimal capability surface every delegate (socket, pipe, file,
//! child-process handle, memory buffer) must provide. Everything above this
//! module is generic over [`Transport`] and never over a concrete type.
//!
//! A transport reports "cannot make progress now" as [`Io::WouldBlock`] and
//! true end of data as [`Io::Eof`]; both are distinguishable from data and
//! from real errors, and adapters must never fold one into another.

pub mod memory;
pub mod pipe;

use std::time::Duration;

use serde::Serialize;

use crate::error::{Result, StreamError};

pub use memory::{MemoryFile, MemoryHandle};
pub use pipe::{MemorySocket, PipeReader, PipeWriter, memory_pipe, memory_socketpair};

/// Origin for [`Transport::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Absolute offset.
    Set,
    /// Relative to the current position.
    Cur,
    /// Relative to the end of data.
    End,
}

/// Readiness a caller can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Interest {
    Readable,
    Writable,
}

/// One side of a duplex channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    /// The readiness interest matching this direction.
    #[must_use]
    pub const fn interest(self) -> Interest {
        match self {
            Self::Read => Interest::Readable,
            Self::Write => Interest::Writable,
        }
    }
}

/// Which directions a transport or pipeline serves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Access {
    pub read: bool,
    pub write: bool,
}

impl Access {
    pub const READ: Self = Self {
        read: true,
        write: false,
    };
    pub const WRITE: Self = Self {
        read: false,
        write: true,
    };
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
    };

    /// True when neither direction is available.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        !self.read && !self.write
    }
}

/// Kind of object behind a transport, as reported by `stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Regular,
    Directory,
    Fifo,
    Socket,
    CharDevice,
    BlockDevice,
    Symlink,
    Memory,
    Unknown,
}

/// Metadata reported by [`Transport::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransportStat {
    pub kind: FileKind,
    pub size: u64,
    pub mode: u32,
    pub block_size: u32,
}

/// Outcome of a transport or layer operation that may not complete now.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Io<T> {
    /// The operation completed with a value.
    Ready(T),
    /// The operation cannot complete without blocking.
    WouldBlock,
    /// No more data will ever be produced.
    Eof,
}

impl<T> Io<T> {
    /// Maps the ready value, passing the sentinels through.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Io<U> {
        match self {
            Self::Ready(v) => Io::Ready(f(v)),
            Self::WouldBlock => Io::WouldBlock,
            Self::Eof => Io::Eof,
        }
    }

    /// Raises the sentinels as [`StreamError::WouldBlock`] and
    /// [`StreamError::EndOfStream`].
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Ready(v) => Ok(v),
            Self::WouldBlock => Err(StreamError::WouldBlock),
            Self::Eof => Err(StreamError::EndOfStream),
        }
    }

    /// Returns the ready value, if any.
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    #[must_use]
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::WouldBlock)
    }

    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }
}

/// Raw byte transport.
///
/// Every operation after [`Transport::close`] must fail with
/// [`StreamError::Closed`].
pub trait Transport {
    /// Reads at most `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> Result<Io<usize>>;

    /// Writes a prefix of `data`, returning how much was accepted.
    fn write(&mut self, data: &[u8]) -> Result<Io<usize>>;

    /// Repositions the transport, returning the new absolute offset.
    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let _ = (offset, whence);
        Err(StreamError::NotSeekable)
    }

    /// Releases the underlying resource.
    fn close(&mut self) -> Result<Io<()>>;

    /// Switches the transport's own blocking behaviour.
    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<()>;

    fn is_readable(&self) -> bool;

    fn is_writable(&self) -> bool;

    fn is_closed(&self) -> bool;

    /// OS descriptor, when there is one.
    fn fd(&self) -> Option<i32> {
        None
    }

    fn stat(&self) -> Result<TransportStat>;

    /// Blocks until `interest` is ready or `timeout` elapses.
    ///
    /// Returns `false` on timeout. Transports that are always ready keep the
    /// default.
    fn wait(&mut self, interest: Interest, timeout: Option<Duration>) -> Result<bool> {
        let _ = (interest, timeout);
        Ok(true)
    }

    /// Reads at an absolute offset without moving the transport position.
    fn pread(&mut self, buf: &mut [u8], offset: u64) -> Result<Io<usize>> {
        let _ = (buf, offset);
        Err(StreamError::NotSeekable)
    }

    /// Writes at an absolute offset without moving the transport position.
    fn pwrite(&mut self, data: &[u8], offset: u64) -> Result<Io<usize>> {
        let _ = (data, offset);
        Err(StreamError::NotSeekable)
    }

    /// Shuts down one direction. Returns `false` when unsupported.
    fn shutdown(&mut self, direction: Direction) -> Result<bool> {
        let _ = direction;
        Ok(false)
    }

    fn is_terminal(&self) -> bool {
        false
    }

    /// Capabilities as an [`Access`] pair.
    fn access(&self) -> Access {
        Access {
            read: self.is_readable(),
            write: self.is_writable(),
        }
    }
}

/// Type-erased transport used by the default façade.
pub type BoxedTransport = Box<dyn Transport + Send>;

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<Io<usize>> {
        (**self).read(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<Io<usize>> {
        (**self).write(data)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        (**self).seek(offset, whence)
    }

    fn close(&mut self) -> Result<Io<()>> {
        (**self).close()
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<()> {
        (**self).set_nonblocking(nonblocking)
    }

    fn is_readable(&self) -> bool {
        (**self).is_readable()
    }

    fn is_writable(&self) -> bool {
        (**self).is_writable()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }

    fn fd(&self) -> Option<i32> {
        (**self).fd()
    }

    fn stat(&self) -> Result<TransportStat> {
        (**self).stat()
    }

    fn wait(&mut self, interest: Interest, timeout: Option<Duration>) -> Result<bool> {
        (**self).wait(interest, timeout)
    }

    fn pread(&mut self, buf: &mut [u8], offset: u64) -> Result<Io<usize>> {
        (**self).pread(buf, offset)
    }

    fn pwrite(&mut self, data: &[u8], offset: u64) -> Result<Io<usize>> {
        (**self).pwrite(data, offset)
    }

    fn shutdown(&mut self, direction: Direction) -> Result<bool> {
        (**self).shutdown(direction)
    }

    fn is_terminal(&self) -> bool {
        (**self).is_terminal()
    }
}

/// Resolves a seek request against a current position and a length.
pub(crate) fn resolve_seek(pos: u64, len: u64, offset: i64, whence: Whence) -> Result<u64> {
    let base = match whence {
        Whence::Set => 0i128,
        Whence::Cur => i128::from(pos),
        Whence::End => i128::from(len),
    };
    let target = base + i128::from(offset);
    u64::try_from(target)
        .map_err(|_| StreamError::InvalidArgument(format!("seek to negative offset {target}")))
}
