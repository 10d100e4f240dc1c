use crate::chars::LineOptions;
use crate::error::{Result, StreamError};
use crate::retry::Policy;
use crate::transport::{Io, Transport};

use super::iter::{Bytes, Chars, Lines};
use super::Stream;

impl<T: Transport> Stream<T> {
    /// Reads `n` bytes, or everything when `n` is `None`.
    ///
    /// With a length this is a byte read returning fewer bytes at end of
    /// stream and `None` once nothing is left (`Some(empty)` for a zero
    /// length). Without one, the rest of the stream is returned converted
    /// to the internal encoding, empty at end of stream.
    pub fn read(&mut self, n: Option<usize>) -> Result<Option<Vec<u8>>> {
        let reader = self.duplex.reader()?;
        match n {
            Some(n) => reader.read_exact_or_eof(n),
            None => reader.read_to_end().map(Some),
        }
    }

    /// Fills `buf` as far as the stream allows; returns the byte count
    /// (0 at end of stream).
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        let reader = self.duplex.reader()?;
        let mut filled = 0;
        while filled < buf.len() {
            match reader.read_some(buf.len() - filled, Policy::Block)? {
                Io::Ready(chunk) => {
                    buf[filled..filled + chunk.len()].copy_from_slice(&chunk);
                    filled += chunk.len();
                }
                Io::Eof => break,
                Io::WouldBlock => return Err(StreamError::WouldBlock),
            }
        }
        Ok(filled)
    }

    /// Returns whatever is available, blocking only while nothing is.
    pub fn read_partial(&mut self, n: usize) -> Result<Vec<u8>> {
        if n == 0 {
            self.duplex.reader()?;
            return Ok(Vec::new());
        }
        self.duplex.reader()?.read_some(n, Policy::Block)?.into_result()
    }

    /// Like [`Self::read_partial`] but never waits: `Io::WouldBlock` when
    /// nothing is available now.
    pub fn read_nonblock(&mut self, n: usize) -> Result<Io<Vec<u8>>> {
        if n == 0 {
            self.duplex.reader()?;
            return Ok(Io::Ready(Vec::new()));
        }
        self.duplex.reader()?.read_some(n, Policy::NonBlock)
    }

    /// Unbuffered read straight from the transport.
    pub fn sysread(&mut self, n: usize) -> Result<Vec<u8>> {
        self.duplex.reader()?.sysread(n)?.into_result()
    }

    /// Reads `n` bytes at `offset` without moving the stream position.
    pub fn pread(&mut self, n: usize, offset: u64) -> Result<Vec<u8>> {
        self.duplex.reader()?.pread(n, offset)?.into_result()
    }

    /// Next character in the caller encoding; `None` at end of stream.
    pub fn getc(&mut self) -> Result<Option<Vec<u8>>> {
        self.duplex.reader()?.read_char()
    }

    pub fn readchar(&mut self) -> Result<Vec<u8>> {
        self.getc()?.ok_or(StreamError::EndOfStream)
    }

    /// Next raw byte; `None` at end of stream.
    pub fn getbyte(&mut self) -> Result<Option<u8>> {
        let byte = self.duplex.reader()?.read_exact_or_eof(1)?;
        Ok(byte.and_then(|b| b.first().copied()))
    }

    pub fn readbyte(&mut self) -> Result<u8> {
        self.getbyte()?.ok_or(StreamError::EndOfStream)
    }

    /// Pushes characters back so the next read returns them first.
    pub fn ungetc(&mut self, data: &[u8]) -> Result<()> {
        self.duplex.reader()?.unread_chars(data)
    }

    pub fn ungetbyte(&mut self, byte: u8) -> Result<()> {
        self.duplex.reader()?.unread_bytes(&[byte])
    }

    /// Reads one line; `None` at end of stream. Each line read bumps
    /// [`Self::lineno`].
    pub fn gets(&mut self, opts: &LineOptions) -> Result<Option<Vec<u8>>> {
        let separator = opts
            .separator
            .as_ref()
            .unwrap_or(&self.config.input_separator);
        let line = self
            .duplex
            .reader()?
            .read_line(separator, opts.limit, opts.chomp)?;
        if line.is_some() && opts.limit != Some(0) {
            self.lineno += 1;
        }
        Ok(line)
    }

    /// [`Self::gets`] with the configured separator.
    pub fn gets_default(&mut self) -> Result<Option<Vec<u8>>> {
        self.gets(&LineOptions::default())
    }

    pub fn readline(&mut self, opts: &LineOptions) -> Result<Vec<u8>> {
        self.gets(opts)?.ok_or(StreamError::EndOfStream)
    }

    /// Every remaining line.
    pub fn readlines(&mut self, opts: &LineOptions) -> Result<Vec<Vec<u8>>> {
        self.lines(opts.clone()).collect()
    }

    pub fn lines(&mut self, opts: LineOptions) -> Lines<'_, T> {
        Lines::new(self, opts)
    }

    pub fn chars(&mut self) -> Chars<'_, T> {
        Chars::new(self)
    }

    pub fn bytes(&mut self) -> Bytes<'_, T> {
        Bytes::new(self)
    }

    /// True at end of stream. Blocks until that is known.
    pub fn eof(&mut self) -> Result<bool> {
        self.duplex.reader()?.at_eof()
    }
}
