use crate::error::{Result, StreamError};
use crate::retry::Policy;
use crate::transport::{Io, Transport};

use super::Stream;

impl<T: Transport> Stream<T> {
    /// Buffers `data`; returns its length. Flushes as the buffering mode
    /// requires.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.duplex
            .writer()?
            .write(data, Policy::Block)?
            .into_result()?;
        Ok(data.len())
    }

    /// Writes every part in order; returns the total length.
    pub fn write_all_parts(&mut self, parts: &[&[u8]]) -> Result<usize> {
        let mut total = 0;
        for part in parts {
            total += self.write(part)?;
        }
        Ok(total)
    }

    /// Writes the parts followed by the configured output separator.
    pub fn print(&mut self, parts: &[&[u8]]) -> Result<()> {
        self.write_all_parts(parts)?;
        if let Some(sep) = self.config.output_separator.clone() {
            self.write(&sep)?;
        }
        Ok(())
    }

    /// Writes each item followed by a newline unless it already ends in
    /// one. With no items a lone newline is written.
    pub fn puts(&mut self, items: &[&[u8]]) -> Result<()> {
        let newline = self.duplex.writer()?.mode().read_encoding().newline();
        if items.is_empty() {
            self.write(&newline)?;
            return Ok(());
        }
        for item in items {
            self.write(item)?;
            if !item.ends_with(&newline) {
                self.write(&newline)?;
            }
        }
        Ok(())
    }

    /// Writes one character in the caller encoding.
    pub fn putc(&mut self, ch: char) -> Result<()> {
        let enc = self.duplex.writer()?.mode().read_encoding();
        let mut buf = Vec::with_capacity(enc.max_char_len());
        if !enc.encode(ch, &mut buf) {
            return Err(StreamError::EncodingMismatch(format!(
                "{ch:?} has no representation in {enc}"
            )));
        }
        self.write(&buf)?;
        Ok(())
    }

    /// Flushes, then writes straight to the transport without waiting.
    ///
    /// `Io::WouldBlock` when the transport cannot take a byte now; pending
    /// buffered bytes are kept and none of `data` is accepted in that case.
    pub fn write_nonblock(&mut self, data: &[u8]) -> Result<Io<usize>> {
        self.duplex.writer()?.write_direct(data, Policy::NonBlock)
    }

    /// Unbuffered write; refused while buffered writes are pending.
    pub fn syswrite(&mut self, data: &[u8]) -> Result<usize> {
        self.duplex.writer()?.syswrite(data)
    }

    /// Writes at `offset` without moving the stream position.
    pub fn pwrite(&mut self, data: &[u8], offset: u64) -> Result<usize> {
        self.duplex.writer()?.pwrite(data, offset)
    }

    /// Pushes buffered writes to the transport. A read-only stream has
    /// nothing to flush.
    pub fn flush(&mut self) -> Result<()> {
        if self.duplex.is_closed() {
            return Err(StreamError::CLOSED);
        }
        if !self.duplex.has_write_side() {
            return Ok(());
        }
        self.duplex.writer()?.flush(Policy::Block)?.into_result()
    }
}
