//! Blocking-retry layer.
//!
//! Converts [`Io::WouldBlock`] from a transport into either a readiness wait
//! followed by a retry ([`Policy::Block`]) or a verbatim sentinel for the
//! caller ([`Policy::NonBlock`]). Under `Block` a readiness false negative
//! never surfaces as a partial result: the layer keeps waiting and retrying
//! until data, end of stream, a real error, or the configured timeout.

use std::time::Duration;

use crate::error::{Result, StreamError};
use crate::log::{self, LogLevel};
use crate::metrics::{IoMetrics, METRICS};
use crate::pipeline::ModeState;
use crate::transport::{Interest, Io, Transport};

/// Whether a caller is prepared to be suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Wait for readiness and retry.
    Block,
    /// Hand WouldBlock back to the caller.
    NonBlock,
}

/// Retry view over a pipeline's transport.
///
/// Built on demand by the pipeline; it borrows the transport and reads (never
/// owns) the pipeline's mode state.
pub struct RetryLayer<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    timeout: Option<Duration>,
}

impl<'a, T: Transport + ?Sized> RetryLayer<'a, T> {
    pub fn new(transport: &'a mut T, mode: &ModeState) -> Self {
        Self {
            transport,
            timeout: mode.timeout(),
        }
    }

    /// The transport below this layer.
    pub fn transport(&mut self) -> &mut T {
        self.transport
    }

    pub fn read(&mut self, buf: &mut [u8], policy: Policy) -> Result<Io<usize>> {
        let io = self.retry(Interest::Readable, policy, |t| t.read(buf))?;
        if let Io::Ready(n) = io {
            IoMetrics::add(&METRICS.bytes_read, n);
        }
        Ok(io)
    }

    pub fn write(&mut self, data: &[u8], policy: Policy) -> Result<Io<usize>> {
        let io = self.retry(Interest::Writable, policy, |t| t.write(data))?;
        if let Io::Ready(n) = io {
            IoMetrics::add(&METRICS.bytes_written, n);
        }
        Ok(io)
    }

    pub fn pread(&mut self, buf: &mut [u8], offset: u64, policy: Policy) -> Result<Io<usize>> {
        self.retry(Interest::Readable, policy, |t| t.pread(buf, offset))
    }

    pub fn pwrite(&mut self, data: &[u8], offset: u64, policy: Policy) -> Result<Io<usize>> {
        self.retry(Interest::Writable, policy, |t| t.pwrite(data, offset))
    }

    /// Closes the transport, waiting out a WouldBlock under `Block`.
    pub fn close(&mut self, policy: Policy) -> Result<Io<()>> {
        self.retry(Interest::Writable, policy, |t| t.close())
    }

    /// Waits for readiness with an explicit timeout (`None` waits forever).
    pub fn wait(&mut self, interest: Interest, timeout: Option<Duration>) -> Result<bool> {
        self.transport.wait(interest, timeout)
    }

    fn retry<R>(
        &mut self,
        interest: Interest,
        policy: Policy,
        mut op: impl FnMut(&mut T) -> Result<Io<R>>,
    ) -> Result<Io<R>> {
        loop {
            match op(self.transport)? {
                Io::WouldBlock => match policy {
                    Policy::NonBlock => {
                        IoMetrics::inc(&METRICS.would_block_returns);
                        return Ok(Io::WouldBlock);
                    }
                    Policy::Block => {
                        IoMetrics::inc(&METRICS.would_block_waits);
                        let fd = self.transport.fd();
                        log::event(LogLevel::Trace, "retry.wait", |e| {
                            e.with_fd(fd).with_details(serde_json::json!({ "interest": interest }))
                        });
                        if !self.transport.wait(interest, self.timeout)? {
                            return Err(StreamError::TimedOut);
                        }
                    }
                },
                other => return Ok(other),
            }
        }
    }
}
