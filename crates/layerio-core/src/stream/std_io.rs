//! `std::io` trait implementations, so a [`Stream`] plugs into
//! `io::copy`, `BufReader`-style consumers, and friends.

use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};

use crate::error::StreamError;
use crate::retry::Policy;
use crate::transport::{Io, Transport, Whence};

use super::Stream;

impl<T: Transport> Read for Stream<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.duplex.reader()?.read_some(buf.len(), Policy::Block)? {
            Io::Ready(chunk) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            Io::Eof => Ok(0),
            Io::WouldBlock => Err(StreamError::WouldBlock.into()),
        }
    }
}

impl<T: Transport> BufRead for Stream<T> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(self.duplex.reader()?.fill_buf()?)
    }

    fn consume(&mut self, amt: usize) {
        if let Ok(reader) = self.duplex.reader() {
            reader.consume(amt);
        }
    }
}

impl<T: Transport> Write for Stream<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(Stream::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(Stream::flush(self)?)
    }
}

impl<T: Transport> Seek for Stream<T> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            SeekFrom::Start(n) => {
                let n = i64::try_from(n).map_err(|_| {
                    StreamError::InvalidArgument(format!("offset {n} out of range"))
                })?;
                (n, Whence::Set)
            }
            SeekFrom::Current(n) => (n, Whence::Cur),
            SeekFrom::End(n) => (n, Whence::End),
        };
        Ok(Stream::seek(self, offset, whence)?)
    }
}
