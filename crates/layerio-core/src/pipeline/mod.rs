//! Pipeline: one transport plus its retry, byte, and character layers.
//!
//! A pipeline serves one direction or both (a "shared" pipeline). Every
//! layer reads the pipeline's [`ModeState`]; only the pipeline's own
//! mutation methods ([`Pipeline::set_nonblocking`],
//! [`Pipeline::set_encoding`], [`Pipeline::set_buf_mode`],
//! [`Pipeline::close`]) change it.

mod cursor;
mod mode;

use std::time::Duration;

use crate::buffer::{BufMode, ByteLayer};
use crate::chars::{self, CharLayer, Delimiter, Separator, Source};
use crate::config::StreamConfig;
use crate::encoding::{self, Encoding};
use crate::error::{Result, StreamError};
use crate::log::{self, LogLevel};
use crate::metrics::{IoMetrics, METRICS};
use crate::retry::{Policy, RetryLayer};
use crate::transport::{Access, Direction, Interest, Io, Transport, TransportStat, Whence};

pub(crate) use cursor::ReadCursor;
pub use mode::ModeState;

/// A transport with its layers, bound to an [`Access`].
pub struct Pipeline<T: Transport> {
    transport: T,
    mode: ModeState,
    bytes: ByteLayer,
    chars: CharLayer,
}

impl<T: Transport> Pipeline<T> {
    /// Builds a pipeline over `transport`.
    ///
    /// The transport is released before the error is returned when it is
    /// closed or lacks a direction `access` asks for.
    pub fn new(mut transport: T, access: Access, config: &StreamConfig) -> Result<Self> {
        if let Err(err) = validate(&transport, access) {
            if !transport.is_closed() {
                let _ = transport.close();
            }
            return Err(err);
        }
        let mode = ModeState::new(access, config, transport.is_terminal());
        let fd = transport.fd();
        log::event(LogLevel::Debug, "pipeline.open", |e| {
            e.with_fd(fd).with_details(serde_json::json!({
                "read": access.read,
                "write": access.write,
                "external": mode.external().name(),
            }))
        });
        Ok(Self {
            transport,
            mode,
            bytes: ByteLayer::new(access, config.buffer_size),
            chars: CharLayer::new(),
        })
    }

    pub fn access(&self) -> Access {
        self.mode.access()
    }

    pub fn mode(&self) -> &ModeState {
        &self.mode
    }

    pub fn bytes(&self) -> &ByteLayer {
        &self.bytes
    }

    pub fn chars(&self) -> &CharLayer {
        &self.chars
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Retry view over the transport.
    pub fn retry(&mut self) -> RetryLayer<'_, T> {
        RetryLayer::new(&mut self.transport, &self.mode)
    }

    pub fn is_closed(&self) -> bool {
        self.mode.is_closed()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.mode.is_closed() || self.transport.is_closed() {
            return Err(StreamError::CLOSED);
        }
        Ok(())
    }

    fn ensure_readable(&self) -> Result<()> {
        self.ensure_open()?;
        if !self.mode.access().read {
            return Err(StreamError::NOT_READABLE);
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        self.ensure_open()?;
        if !self.mode.access().write {
            return Err(StreamError::NOT_WRITABLE);
        }
        Ok(())
    }

    fn cursor(&mut self, policy: Policy) -> ReadCursor<'_, T> {
        ReadCursor {
            conv: self.mode.read_transcoder(),
            io: RetryLayer::new(&mut self.transport, &self.mode),
            bytes: &mut self.bytes,
            chars: &mut self.chars,
            policy,
        }
    }

    fn byte_cursor(&mut self, policy: Policy) -> ReadCursor<'_, T> {
        let mut cursor = self.cursor(policy);
        cursor.conv = None;
        cursor
    }

    /// Flushes pending writes of a shared pipeline before reading.
    fn prepare_read(&mut self) -> Result<()> {
        self.ensure_readable()?;
        if self.mode.access().write && !self.bytes.is_write_empty() {
            self.flush_writes(Policy::Block)?.into_result()?;
        }
        Ok(())
    }

    /// Hands unread bytes of a shared, seekable pipeline back to the
    /// transport before writing.
    fn prepare_write(&mut self) -> Result<()> {
        self.ensure_writable()?;
        if !self.mode.access().read || self.bytes.is_read_empty() {
            return Ok(());
        }
        let unread = self.bytes.buffered().len() as i64;
        match self.transport.seek(-unread, Whence::Cur) {
            Ok(_) => {
                self.bytes.discard_read();
                self.chars.discard();
                Ok(())
            }
            Err(StreamError::NotSeekable) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn conflict_if_chars_pending(&self, what: &'static str) -> Result<()> {
        if self.chars.has_pending() {
            return Err(StreamError::BufferingConflict(what));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Mode mutation
    // -----------------------------------------------------------------------

    pub fn set_nonblocking(&mut self, nonblocking: bool) -> Result<()> {
        self.ensure_open()?;
        self.transport.set_nonblocking(nonblocking)?;
        self.mode.set_nonblocking(nonblocking);
        Ok(())
    }

    /// Changes the encodings. Refused while converted characters are
    /// waiting to be read.
    pub fn set_encoding(&mut self, external: Encoding, internal: Option<Encoding>) -> Result<()> {
        self.ensure_open()?;
        self.conflict_if_chars_pending("encoding change with pending converted characters")?;
        if self.chars.has_write_carry() {
            self.write_carry_tail()?;
        }
        self.mode.set_encoding(external, internal);
        log::event(LogLevel::Debug, "pipeline.set_encoding", |e| {
            e.with_fd(self.transport.fd()).with_details(serde_json::json!({
                "external": external.name(),
                "internal": internal.map(Encoding::name),
            }))
        });
        Ok(())
    }

    pub fn set_buf_mode(&mut self, mode: BufMode) -> Result<()> {
        self.ensure_open()?;
        self.mode.set_buf_mode(mode);
        if mode == BufMode::None {
            self.flush_writes(Policy::Block)?.into_result()?;
        }
        Ok(())
    }

    /// Flushes, then releases the transport. Idempotent.
    ///
    /// The transport is released even when the flush fails; the first error
    /// is reported.
    pub fn close(&mut self) -> Result<()> {
        if self.mode.is_closed() {
            return Ok(());
        }
        let flushed = if self.mode.access().write && !self.transport.is_closed() {
            self.write_carry_tail()
                .and_then(|()| self.flush_writes(Policy::Block)?.into_result())
        } else {
            Ok(())
        };
        let fd = self.transport.fd();
        self.bytes.discard_read();
        self.bytes.discard_write();
        self.chars.discard();
        self.mode.mark_closed();
        let released = if self.transport.is_closed() {
            Ok(())
        } else {
            self.retry().close(Policy::Block).and_then(Io::into_result)
        };
        let result = flushed.and(released);
        match &result {
            Ok(()) => log::event(LogLevel::Debug, "pipeline.close", |e| e.with_fd(fd)),
            Err(err) => {
                let code = err.errno();
                log::event(LogLevel::Warn, "pipeline.close_failed", |e| {
                    e.with_fd(fd)
                        .with_errno(code)
                        .with_details(serde_json::json!({ "error": err.to_string() }))
                });
            }
        }
        result
    }

    /// Half-closes one direction of the transport. Returns `false` when the
    /// transport cannot shut down a single direction.
    pub fn shutdown(&mut self, direction: Direction) -> Result<bool> {
        self.ensure_open()?;
        if direction == Direction::Write {
            self.write_carry_tail()?;
            self.flush_writes(Policy::Block)?.into_result()?;
        }
        let done = self.transport.shutdown(direction)?;
        if done && direction == Direction::Read {
            self.bytes.discard_read();
            self.chars.discard();
        }
        Ok(done)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Returns up to `n` bytes: buffered bytes when there are any, else the
    /// result of one transport read. Byte granularity.
    pub fn read_some(&mut self, n: usize, policy: Policy) -> Result<Io<Vec<u8>>> {
        self.prepare_read()?;
        self.conflict_if_chars_pending("byte oriented read for character buffered IO")?;
        let mut io = RetryLayer::new(&mut self.transport, &self.mode);
        self.bytes.read_some(&mut io, n, policy)
    }

    /// Reads exactly `n` bytes, or fewer at end of stream (`None` when
    /// nothing was left).
    pub fn read_exact_or_eof(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
        let mut out = Vec::with_capacity(n.min(1 << 16));
        while out.len() < n {
            match self.read_some(n - out.len(), Policy::Block)? {
                Io::Ready(chunk) => out.extend_from_slice(&chunk),
                Io::Eof => break,
                Io::WouldBlock => return Err(StreamError::WouldBlock),
            }
        }
        if out.is_empty() && n > 0 {
            return Ok(None);
        }
        Ok(Some(out))
    }

    /// Reads everything up to end of stream, converted to the internal
    /// encoding when one is set.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>> {
        self.prepare_read()?;
        let mut cursor = self.cursor(Policy::Block);
        let mut out = Vec::new();
        loop {
            match cursor.fill_buf()? {
                Io::Ready(chunk) => {
                    let n = chunk.len();
                    out.extend_from_slice(chunk);
                    cursor.consume(n);
                }
                Io::Eof => return Ok(out),
                Io::WouldBlock => return Err(StreamError::WouldBlock),
            }
        }
    }

    /// Reads one line; `None` at end of stream.
    pub fn read_line(
        &mut self,
        separator: &Separator,
        limit: Option<usize>,
        chomp: bool,
    ) -> Result<Option<Vec<u8>>> {
        self.prepare_read()?;
        let enc = self.mode.read_encoding();
        let delim = Delimiter::resolve(separator, enc)?;
        let mut cursor = self.cursor(Policy::Block);
        let mut line = chars::read_line(&mut cursor, &delim, limit, enc)?;
        if chomp {
            if let Some(line) = line.as_mut() {
                chars::chomp(line, &delim, enc);
            }
        }
        Ok(line)
    }

    /// Reads one character in the read encoding; `None` at end of stream.
    pub fn read_char(&mut self) -> Result<Option<Vec<u8>>> {
        self.prepare_read()?;
        let enc = self.mode.read_encoding();
        let mut cursor = self.cursor(Policy::Block);
        chars::read_char(&mut cursor, enc)
    }

    /// Pushes characters back: into the decode queue when converting, else
    /// into the byte buffer.
    pub fn unread_chars(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_readable()?;
        if self.mode.read_transcoder().is_some() {
            self.chars.unread(data);
            Ok(())
        } else {
            self.bytes.unread(data)
        }
    }

    /// Pushes raw bytes back in front of the byte buffer.
    pub fn unread_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_readable()?;
        self.conflict_if_chars_pending("byte oriented push-back for character buffered IO")?;
        self.bytes.unread(data)
    }

    /// Reads without touching the buffers. Refused while bytes are buffered.
    pub fn sysread(&mut self, n: usize) -> Result<Io<Vec<u8>>> {
        self.ensure_readable()?;
        if !self.bytes.is_read_empty() || self.chars.has_pending() {
            return Err(StreamError::BufferingConflict("sysread for buffered IO"));
        }
        let mut buf = vec![0u8; n];
        let io = self.retry().read(&mut buf, Policy::Block)?;
        Ok(match io {
            Io::Ready(0) if n > 0 => Io::Eof,
            other => other.map(|got| {
                buf.truncate(got);
                buf
            }),
        })
    }

    /// Positional read; the buffers and the transport position are untouched.
    pub fn pread(&mut self, n: usize, offset: u64) -> Result<Io<Vec<u8>>> {
        self.ensure_readable()?;
        let mut buf = vec![0u8; n];
        let io = self.retry().pread(&mut buf, offset, Policy::Block)?;
        Ok(match io {
            Io::Ready(0) if n > 0 => Io::Eof,
            other => other.map(|got| {
                buf.truncate(got);
                buf
            }),
        })
    }

    /// True when no byte will ever be read again. Blocks to find out.
    pub fn at_eof(&mut self) -> Result<bool> {
        self.prepare_read()?;
        if !self.bytes.is_read_empty() || !self.chars.pending().is_empty() {
            return Ok(false);
        }
        let mut cursor = self.cursor(Policy::Block);
        Ok(cursor.fill_buf()?.is_eof())
    }

    /// Buffered bytes, filling once when the buffer is empty (empty at end
    /// of stream). Byte granularity.
    pub fn fill_buf(&mut self) -> Result<&[u8]> {
        self.prepare_read()?;
        self.conflict_if_chars_pending("byte oriented read for character buffered IO")?;
        if self.bytes.is_read_empty() {
            let mut io = RetryLayer::new(&mut self.transport, &self.mode);
            if self.bytes.fill(&mut io, Policy::Block)?.is_would_block() {
                return Err(StreamError::WouldBlock);
            }
        }
        Ok(self.bytes.buffered())
    }

    /// Marks `n` bytes returned by [`Self::fill_buf`] consumed.
    pub fn consume(&mut self, n: usize) {
        self.bytes.consume(n);
    }

    /// Bytes (or converted characters) readable without touching the transport.
    pub fn buffered_len(&self) -> usize {
        self.bytes.buffered().len() + self.chars.pending().len()
    }

    /// Consumes a byte-order mark at the front of the stream, if present.
    ///
    /// When there is none every inspected byte stays readable.
    pub fn take_bom(&mut self) -> Result<Option<Encoding>> {
        self.prepare_read()?;
        self.conflict_if_chars_pending("BOM detection for character buffered IO")?;
        let mut cursor = self.byte_cursor(Policy::Block);
        let head = chars::peek_while(&mut cursor, encoding::bom_may_extend)?;
        let Some((enc, len)) = encoding::detect_bom(&head) else {
            return Ok(None);
        };
        self.bytes.consume(len);
        Ok(Some(enc))
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Buffers `data`, converting from the internal encoding when one is set,
    /// and flushes as the buffering mode requires.
    pub fn write(&mut self, data: &[u8], policy: Policy) -> Result<Io<()>> {
        self.prepare_write()?;
        let buf_mode = self.mode.buf_mode();
        let converted;
        let data = match self.mode.write_transcoder() {
            Some(conv) => {
                converted = self.chars.encode(&conv, data);
                converted.as_slice()
            }
            None => data,
        };
        let mut io = RetryLayer::new(&mut self.transport, &self.mode);
        self.bytes.write(&mut io, data, buf_mode, policy)
    }

    fn write_carry_tail(&mut self) -> Result<()> {
        let Some(conv) = self.mode.write_transcoder() else {
            return Ok(());
        };
        let tail = self.chars.finish_write(&conv);
        if tail.is_empty() {
            return Ok(());
        }
        let mut io = RetryLayer::new(&mut self.transport, &self.mode);
        self.bytes
            .write(&mut io, &tail, BufMode::Full, Policy::Block)?
            .into_result()
    }

    fn flush_writes(&mut self, policy: Policy) -> Result<Io<()>> {
        let mut io = RetryLayer::new(&mut self.transport, &self.mode);
        self.bytes.flush(&mut io, policy)
    }

    /// Writes every pending byte to the transport.
    pub fn flush(&mut self, policy: Policy) -> Result<Io<()>> {
        self.ensure_open()?;
        self.flush_writes(policy)
    }

    /// Flushes (non-blocking), then writes directly to the transport.
    ///
    /// WouldBlock from the flush is returned before any of `data` is
    /// accepted, leaving the buffer as it was.
    pub fn write_direct(&mut self, data: &[u8], policy: Policy) -> Result<Io<usize>> {
        self.prepare_write()?;
        match self.flush_writes(policy)? {
            Io::Ready(()) => {}
            Io::WouldBlock => return Ok(Io::WouldBlock),
            Io::Eof => return Ok(Io::Eof),
        }
        self.retry().write(data, policy)
    }

    /// Writes without touching the buffers. Refused while writes are pending.
    pub fn syswrite(&mut self, data: &[u8]) -> Result<usize> {
        self.ensure_writable()?;
        if !self.bytes.is_write_empty() {
            return Err(StreamError::BufferingConflict("syswrite for buffered IO"));
        }
        self.retry().write(data, Policy::Block)?.into_result()
    }

    /// Positional write after flushing pending writes.
    pub fn pwrite(&mut self, data: &[u8], offset: u64) -> Result<usize> {
        self.ensure_writable()?;
        self.flush_writes(Policy::Block)?.into_result()?;
        self.retry().pwrite(data, offset, Policy::Block)?.into_result()
    }

    // -----------------------------------------------------------------------
    // Positioning
    // -----------------------------------------------------------------------

    /// Buffered seek: flushes writes, drops read-ahead, then repositions.
    ///
    /// A relative seek is refused while converted characters are pending,
    /// since their external length is no longer known.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        self.ensure_open()?;
        if whence == Whence::Cur {
            self.conflict_if_chars_pending("relative seek for character buffered IO")?;
        }
        self.flush_writes(Policy::Block)?.into_result()?;
        let ahead = self.bytes.buffered().len() as i64;
        let offset = if whence == Whence::Cur {
            offset - ahead
        } else {
            offset
        };
        let pos = self.transport.seek(offset, whence)?;
        self.bytes.discard_read();
        self.chars.discard();
        IoMetrics::inc(&METRICS.seeks);
        log::event(LogLevel::Debug, "pipeline.seek", |e| {
            e.with_fd(self.transport.fd())
                .with_details(serde_json::json!({ "pos": pos }))
        });
        Ok(pos)
    }

    /// Logical position: transport offset minus read-ahead. Refused while
    /// converted characters are pending.
    pub fn tell(&mut self) -> Result<u64> {
        self.ensure_open()?;
        self.conflict_if_chars_pending("pos for character buffered IO")?;
        self.flush_writes(Policy::Block)?.into_result()?;
        let pos = self.transport.seek(0, Whence::Cur)?;
        Ok(pos.saturating_sub(self.bytes.buffered().len() as u64))
    }

    /// Unbuffered seek. Refused while either buffer holds bytes.
    pub fn sysseek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        self.ensure_open()?;
        if !self.bytes.is_read_empty() || self.chars.has_pending() {
            return Err(StreamError::BufferingConflict("sysseek for buffered IO"));
        }
        if !self.bytes.is_write_empty() {
            return Err(StreamError::BufferingConflict("sysseek for buffered IO"));
        }
        let pos = self.transport.seek(offset, whence)?;
        IoMetrics::inc(&METRICS.seeks);
        Ok(pos)
    }

    // -----------------------------------------------------------------------
    // Readiness and introspection
    // -----------------------------------------------------------------------

    /// Waits for `interest`; buffered read data counts as readable.
    pub fn wait(&mut self, interest: Interest, timeout: Option<Duration>) -> Result<bool> {
        self.ensure_open()?;
        if interest == Interest::Readable && self.buffered_len() > 0 {
            return Ok(true);
        }
        self.retry().wait(interest, timeout)
    }

    pub fn fd(&self) -> Result<Option<i32>> {
        self.ensure_open()?;
        Ok(self.transport.fd())
    }

    pub fn stat(&mut self) -> Result<TransportStat> {
        self.ensure_open()?;
        self.flush_writes(Policy::Block)?.into_result()?;
        self.transport.stat()
    }

    pub fn is_terminal(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.transport.is_terminal())
    }
}

impl<T: Transport> Drop for Pipeline<T> {
    fn drop(&mut self) {
        if !self.mode.is_closed() {
            let _ = self.close();
        }
    }
}

fn validate<T: Transport>(transport: &T, access: Access) -> Result<()> {
    if transport.is_closed() {
        return Err(StreamError::CLOSED);
    }
    if access.is_empty() {
        return Err(StreamError::InvalidArgument(
            "pipeline needs a read or write direction".into(),
        ));
    }
    if access.read && !transport.is_readable() {
        return Err(StreamError::NOT_READABLE);
    }
    if access.write && !transport.is_writable() {
        return Err(StreamError::NOT_WRITABLE);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryFile, memory_pipe};

    fn file(data: &[u8], access: Access) -> (Pipeline<MemoryFile>, crate::transport::MemoryHandle) {
        let f = MemoryFile::with_contents(data, access);
        let handle = f.handle();
        let p = Pipeline::new(f, access, &StreamConfig::default().with_buffer_size(4)).unwrap();
        (p, handle)
    }

    #[test]
    fn validation_rejects_missing_direction() {
        let f = MemoryFile::new(Access::READ);
        let err = Pipeline::new(f, Access::WRITE, &StreamConfig::default()).err().unwrap();
        assert!(matches!(err, StreamError::Closed(_)));
        let f = MemoryFile::new(Access::READ);
        assert!(Pipeline::new(f, Access::default(), &StreamConfig::default()).is_err());
    }

    #[test]
    fn lines_cross_buffer_refills() {
        let (mut p, _) = file(b"alpha\nbeta\n", Access::READ);
        let sep = Separator::default();
        assert_eq!(p.read_line(&sep, None, false).unwrap().unwrap(), b"alpha\n");
        assert_eq!(p.read_line(&sep, None, true).unwrap().unwrap(), b"beta");
        assert_eq!(p.read_line(&sep, None, false).unwrap(), None);
    }

    #[test]
    fn shared_pipeline_flushes_before_read() {
        let (mut p, handle) = file(b"", Access::READ_WRITE);
        p.write(b"xyz", Policy::Block).unwrap().into_result().unwrap();
        assert!(handle.is_empty());
        p.seek(0, Whence::Set).unwrap();
        assert_eq!(handle.contents(), b"xyz");
        assert_eq!(p.read_to_end().unwrap(), b"xyz");
    }

    #[test]
    fn shared_pipeline_rewinds_read_ahead_before_write() {
        let (mut p, handle) = file(b"abcdefgh", Access::READ_WRITE);
        assert_eq!(p.read_exact_or_eof(2).unwrap().unwrap(), b"ab");
        p.write(b"XY", Policy::Block).unwrap().into_result().unwrap();
        p.flush(Policy::Block).unwrap().into_result().unwrap();
        assert_eq!(handle.contents(), b"abXYefgh");
    }

    #[test]
    fn tell_accounts_for_read_ahead() {
        let (mut p, _) = file(b"0123456789", Access::READ);
        p.read_exact_or_eof(3).unwrap();
        assert_eq!(p.tell().unwrap(), 3);
        assert_eq!(p.seek(2, Whence::Cur).unwrap(), 5);
        assert_eq!(p.read_exact_or_eof(2).unwrap().unwrap(), b"56");
    }

    #[test]
    fn sys_ops_conflict_with_buffers() {
        let (mut p, _) = file(b"0123456789", Access::READ_WRITE);
        p.read_exact_or_eof(1).unwrap();
        assert!(matches!(p.sysread(1), Err(StreamError::BufferingConflict(_))));
        assert!(matches!(p.sysseek(0, Whence::Set), Err(StreamError::BufferingConflict(_))));
        p.seek(0, Whence::Set).unwrap();
        assert_eq!(p.sysread(3).unwrap(), Io::Ready(b"012".to_vec()));
        p.write(b"z", Policy::Block).unwrap().into_result().unwrap();
        assert!(matches!(p.syswrite(b"q"), Err(StreamError::BufferingConflict(_))));
    }

    #[test]
    fn transcoding_reads_and_writes() {
        let config = StreamConfig::default().with_encoding(Encoding::Latin1, Some(Encoding::Utf8));
        let f = MemoryFile::with_contents(&[b'c', b'a', b'f', 0xE9, b'\n'], Access::READ_WRITE);
        let handle = f.handle();
        let mut p = Pipeline::new(f, Access::READ_WRITE, &config).unwrap();
        let line = p.read_line(&Separator::default(), None, false).unwrap().unwrap();
        assert_eq!(line, "café\n".as_bytes());
        p.write("ü".as_bytes(), Policy::Block).unwrap().into_result().unwrap();
        p.close().unwrap();
        assert_eq!(handle.contents(), [b'c', b'a', b'f', 0xE9, b'\n', 0xFC]);
    }

    #[test]
    fn position_conflicts_with_pending_chars() {
        let config = StreamConfig::default().with_encoding(Encoding::Latin1, Some(Encoding::Utf8));
        let f = MemoryFile::with_contents(b"ab\ncd\n", Access::READ);
        let mut p = Pipeline::new(f, Access::READ, &config).unwrap();
        let sep = Separator::default();
        assert_eq!(p.read_line(&sep, None, false).unwrap().unwrap(), b"ab\n");
        assert!(matches!(p.tell(), Err(StreamError::BufferingConflict(_))));
        assert!(matches!(p.seek(0, Whence::Cur), Err(StreamError::BufferingConflict(_))));
        assert_eq!(p.seek(3, Whence::Set).unwrap(), 3);
        assert_eq!(p.tell().unwrap(), 3);
        assert_eq!(p.read_line(&sep, None, false).unwrap().unwrap(), b"cd\n");
    }

    #[test]
    fn byte_read_conflicts_with_pending_chars() {
        let config = StreamConfig::default().with_encoding(Encoding::Latin1, Some(Encoding::Utf8));
        let f = MemoryFile::with_contents(b"abc", Access::READ);
        let mut p = Pipeline::new(f, Access::READ, &config).unwrap();
        assert_eq!(p.read_char().unwrap().unwrap(), b"a");
        assert!(matches!(
            p.read_some(1, Policy::Block),
            Err(StreamError::BufferingConflict(_))
        ));
    }

    #[test]
    fn bom_is_consumed_or_left_readable() {
        let (mut p, _) = file(&[0xEF, 0xBB, 0xBF, b'h', b'i'], Access::READ);
        assert_eq!(p.take_bom().unwrap(), Some(Encoding::Utf8));
        assert_eq!(p.read_to_end().unwrap(), b"hi");

        let (mut p, _) = file(&[0xEF, b'x'], Access::READ);
        assert_eq!(p.take_bom().unwrap(), None);
        assert_eq!(p.read_to_end().unwrap(), [0xEF, b'x']);
    }

    #[test]
    fn close_is_idempotent_and_flushes() {
        let (mut p, handle) = file(b"", Access::WRITE);
        p.write(b"bye", Policy::Block).unwrap().into_result().unwrap();
        p.close().unwrap();
        assert_eq!(handle.contents(), b"bye");
        p.close().unwrap();
        assert!(matches!(p.write(b"x", Policy::Block), Err(StreamError::Closed(_))));
    }

    #[test]
    fn drop_flushes() {
        let (mut p, handle) = file(b"", Access::WRITE);
        p.write(b"later", Policy::Block).unwrap().into_result().unwrap();
        drop(p);
        assert_eq!(handle.contents(), b"later");
    }

    #[test]
    fn wait_counts_buffered_data() {
        let (r, mut w) = memory_pipe(16);
        let mut p = Pipeline::new(r, Access::READ, &StreamConfig::default()).unwrap();
        assert_eq!(w.write(b"a\nb").unwrap(), Io::Ready(3));
        assert_eq!(p.read_line(&Separator::default(), None, false).unwrap().unwrap(), b"a\n");
        assert!(p.wait(Interest::Readable, Some(Duration::ZERO)).unwrap());
    }
}
