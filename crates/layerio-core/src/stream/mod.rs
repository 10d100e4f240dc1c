//! Stream façade.
//!
//! [`Stream`] is what consumers hold: a duplex of pipelines plus the line
//! counter, the child pid (for process streams), binmode, and the config
//! the pipelines were built from. Reads, writes, and iteration live in the
//! `read`, `write`, and `iter` submodules; `std_io` bridges to
//! `std::io::{Read, Write, Seek, BufRead}`.

mod iter;
mod read;
mod std_io;
mod write;

use std::time::Duration;

pub use iter::{Bytes, Chars, Lines};

use crate::buffer::BufMode;
use crate::config::StreamConfig;
use crate::duplex::{Duplex, DuplexState};
use crate::encoding::{Encoding, EncodingSpec};
use crate::error::{Result, StreamError};
use crate::log::{self, LogLevel};
use crate::metrics::{IoMetrics, METRICS};
use crate::pipeline::Pipeline;
use crate::transport::{Access, BoxedTransport, Interest, Transport, TransportStat, Whence};

/// Buffered, encoding-aware stream over one or two transports.
pub struct Stream<T: Transport = BoxedTransport> {
    duplex: Duplex<T>,
    config: StreamConfig,
    lineno: u64,
    pid: Option<u32>,
    binmode: bool,
}

impl Stream<BoxedTransport> {
    /// Opens a stream over any transport, erasing its type.
    pub fn boxed(transport: impl Transport + Send + 'static, config: StreamConfig) -> Result<Self> {
        Self::open(Box::new(transport), config)
    }

    /// Opens a two-transport stream, erasing both types.
    pub fn boxed_split(
        read: impl Transport + Send + 'static,
        write: impl Transport + Send + 'static,
        config: StreamConfig,
    ) -> Result<Self> {
        Self::split(Box::new(read), Box::new(write), config)
    }
}

impl<T: Transport> Stream<T> {
    /// Opens a stream over one transport.
    ///
    /// A readable and writable transport yields a shared duplex; otherwise
    /// the stream is one-directional. The transport is released if it fails
    /// validation.
    pub fn open(transport: T, config: StreamConfig) -> Result<Self> {
        let access = transport.access();
        Self::open_with(transport, access, config)
    }

    /// Opens a stream using only the directions in `access`.
    pub fn open_with(transport: T, access: Access, config: StreamConfig) -> Result<Self> {
        let pipeline = Pipeline::new(transport, access, &config)?;
        Ok(Self::from_duplex(Duplex::shared(pipeline), config))
    }

    /// Opens a stream reading from `read` and writing to `write`.
    ///
    /// When the write transport is rejected the already-built read pipeline
    /// is released too.
    pub fn split(read: T, write: T, config: StreamConfig) -> Result<Self> {
        let duplex = build_split(read, write, &config)?;
        Ok(Self::from_duplex(duplex, config))
    }

    fn from_duplex(duplex: Duplex<T>, config: StreamConfig) -> Self {
        let binmode = config.binmode;
        Self {
            duplex,
            config,
            lineno: 0,
            pid: None,
            binmode,
        }
    }

    /// Records the id of the child process behind this stream.
    #[must_use]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn duplex(&self) -> &Duplex<T> {
        &self.duplex
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Flushes and releases every transport. A second close is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.duplex.close()
    }

    pub fn close_read(&mut self) -> Result<()> {
        self.duplex.close_read()
    }

    pub fn close_write(&mut self) -> Result<()> {
        self.duplex.close_write()
    }

    pub fn is_closed(&self) -> bool {
        self.duplex.is_closed()
    }

    pub fn state(&self) -> DuplexState {
        self.duplex.state()
    }

    /// Rebinds the stream to a new transport.
    ///
    /// The replacement pipeline is built first; if that fails the stream is
    /// untouched and the new transport released. Otherwise the old pipelines
    /// are closed (always released) and the line counter reset.
    pub fn reopen(&mut self, transport: T) -> Result<()> {
        let access = transport.access();
        let pipeline = Pipeline::new(transport, access, &self.config)?;
        self.swap_duplex(Duplex::shared(pipeline));
        Ok(())
    }

    /// [`Self::reopen`] with separate read and write transports.
    pub fn reopen_split(&mut self, read: T, write: T) -> Result<()> {
        let duplex = build_split(read, write, &self.config)?;
        self.swap_duplex(duplex);
        Ok(())
    }

    fn swap_duplex(&mut self, duplex: Duplex<T>) {
        let mut old = std::mem::replace(&mut self.duplex, duplex);
        if let Err(err) = old.close() {
            let code = err.errno();
            log::event(LogLevel::Warn, "stream.reopen_close_failed", |e| {
                e.with_errno(code)
                    .with_details(serde_json::json!({ "error": err.to_string() }))
            });
        }
        self.lineno = 0;
        self.pid = None;
        self.binmode = self.config.binmode;
        IoMetrics::inc(&METRICS.reopens);
        let fd = self.duplex.primary().ok().and_then(|p| p.transport().fd());
        log::event(LogLevel::Info, "stream.reopen", |e| e.with_fd(fd));
    }

    // -----------------------------------------------------------------------
    // Positioning
    // -----------------------------------------------------------------------

    /// Buffered seek. Pending writes are flushed and read-ahead dropped.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        self.positioned()?.seek(offset, whence)
    }

    /// Seeks to the start; resets the line counter of a readable stream.
    pub fn rewind(&mut self) -> Result<()> {
        self.seek(0, Whence::Set)?;
        if self.duplex.has_read_side() {
            self.lineno = 0;
        }
        Ok(())
    }

    /// Logical position, accounting for buffered data.
    pub fn pos(&mut self) -> Result<u64> {
        self.positioned()?.tell()
    }

    pub fn set_pos(&mut self, pos: u64) -> Result<u64> {
        let offset = i64::try_from(pos)
            .map_err(|_| StreamError::InvalidArgument(format!("position {pos} out of range")))?;
        self.seek(offset, Whence::Set)
    }

    /// Unbuffered seek; refused while data is buffered.
    pub fn sysseek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        self.positioned()?.sysseek(offset, whence)
    }

    fn positioned(&mut self) -> Result<&mut Pipeline<T>> {
        self.duplex.primary_mut()
    }

    // -----------------------------------------------------------------------
    // Encoding and modes
    // -----------------------------------------------------------------------

    /// Sets the external and internal encodings on every live pipeline.
    pub fn set_encoding(&mut self, external: Encoding, internal: Option<Encoding>) -> Result<()> {
        if self.duplex.is_closed() {
            return Err(StreamError::CLOSED);
        }
        for pipeline in self.duplex.pipelines_mut() {
            pipeline.set_encoding(external, internal)?;
        }
        Ok(())
    }

    /// Applies an `"[BOM|]external[:internal]"` string.
    ///
    /// With the `BOM|` prefix a readable stream consumes a byte-order mark
    /// and, when one is found, uses its encoding as the external encoding.
    pub fn set_encoding_spec(&mut self, spec: &str) -> Result<()> {
        self.apply_encoding_spec(spec.parse()?)
    }

    /// [`Self::set_encoding_spec`] for an already parsed string.
    pub fn apply_encoding_spec(&mut self, spec: EncodingSpec) -> Result<()> {
        let mut external = spec.external;
        if spec.bom && self.duplex.has_read_side() {
            if let Some(found) = self.duplex.reader()?.take_bom()? {
                external = found;
            }
        }
        self.set_encoding(external, spec.internal)
    }

    /// Detects and consumes a byte-order mark, adopting its encoding.
    ///
    /// Only allowed in binmode while the encoding is still ASCII-8BIT with
    /// no internal encoding. Returns `None` (leaving every inspected byte
    /// readable) when there is no mark.
    pub fn set_encoding_by_bom(&mut self) -> Result<Option<Encoding>> {
        if !self.binmode {
            return Err(StreamError::InvalidArgument(
                "ASCII incompatible encoding needs binmode".into(),
            ));
        }
        let reader = self.duplex.reader()?;
        let mode = reader.mode();
        if mode.external() != Encoding::Binary || mode.internal().is_some() {
            return Err(StreamError::InvalidArgument(format!(
                "encoding is set to {} already",
                mode.internal().unwrap_or(mode.external())
            )));
        }
        let Some(found) = reader.take_bom()? else {
            return Ok(None);
        };
        self.set_encoding(found, None)?;
        Ok(Some(found))
    }

    pub fn external_encoding(&self) -> Result<Encoding> {
        Ok(self.duplex.primary()?.mode().external())
    }

    pub fn internal_encoding(&self) -> Result<Option<Encoding>> {
        Ok(self.duplex.primary()?.mode().internal())
    }

    /// Switches to binary mode: ASCII-8BIT, no conversion.
    pub fn binmode(&mut self) -> Result<()> {
        self.set_encoding(Encoding::Binary, None)?;
        self.binmode = true;
        Ok(())
    }

    pub fn is_binmode(&self) -> bool {
        self.binmode
    }

    pub fn set_nonblocking(&mut self, nonblocking: bool) -> Result<()> {
        if self.duplex.is_closed() {
            return Err(StreamError::CLOSED);
        }
        for pipeline in self.duplex.pipelines_mut() {
            pipeline.set_nonblocking(nonblocking)?;
        }
        Ok(())
    }

    pub fn is_nonblocking(&self) -> Result<bool> {
        Ok(self.duplex.primary()?.mode().is_nonblocking())
    }

    /// True when every write reaches the transport before returning.
    pub fn sync(&mut self) -> Result<bool> {
        Ok(self.duplex.writer()?.mode().buf_mode() == BufMode::None)
    }

    /// Turns write-through on, or back to the configured buffering.
    pub fn set_sync(&mut self, sync: bool) -> Result<()> {
        let writer = self.duplex.writer()?;
        let mode = if sync {
            BufMode::None
        } else {
            let terminal = writer.is_terminal()?;
            match self.config.effective_buf_mode(terminal) {
                BufMode::None => BufMode::Full,
                mode => mode,
            }
        };
        writer.set_buf_mode(mode)
    }

    // -----------------------------------------------------------------------
    // Readiness and introspection
    // -----------------------------------------------------------------------

    /// Waits until `interest` is ready. `None` on timeout.
    pub fn wait(&mut self, interest: Interest, timeout: Option<Duration>) -> Result<Option<Interest>> {
        let pipeline = match interest {
            Interest::Readable => self.duplex.reader()?,
            Interest::Writable => self.duplex.writer()?,
        };
        Ok(pipeline.wait(interest, timeout)?.then_some(interest))
    }

    /// True when a read would not block; buffered data counts.
    pub fn wait_readable(&mut self, timeout: Option<Duration>) -> Result<bool> {
        Ok(self.wait(Interest::Readable, timeout)?.is_some())
    }

    pub fn wait_writable(&mut self, timeout: Option<Duration>) -> Result<bool> {
        Ok(self.wait(Interest::Writable, timeout)?.is_some())
    }

    /// Descriptor of the read side (or the write side when write-only).
    pub fn fileno(&self) -> Result<Option<i32>> {
        self.duplex.primary()?.fd()
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn stat(&mut self) -> Result<TransportStat> {
        self.duplex.primary_mut()?.stat()
    }

    pub fn is_tty(&self) -> Result<bool> {
        self.duplex.primary()?.is_terminal()
    }

    pub fn lineno(&self) -> u64 {
        self.lineno
    }

    pub fn set_lineno(&mut self, lineno: u64) {
        self.lineno = lineno;
    }
}

fn build_split<T: Transport>(read: T, write: T, config: &StreamConfig) -> Result<Duplex<T>> {
    let read = match Pipeline::new(read, Access::READ, config) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            let mut write = write;
            if !write.is_closed() {
                let _ = write.close();
            }
            return Err(err);
        }
    };
    let write = Pipeline::new(write, Access::WRITE, config)?;
    Duplex::split(Some(read), Some(write))
}
