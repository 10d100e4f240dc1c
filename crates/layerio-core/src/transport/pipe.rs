//! Bounded in-memory pipes and socket pairs.
//!
//! Transports here never block inside `read`/`write`: an empty pipe reports
//! [`Io::WouldBlock`] while the writer is alive and [`Io::Eof`] afterwards,
//! and a full pipe reports [`Io::WouldBlock`] to the writer. Blocking
//! behaviour comes from the retry layer calling [`Transport::wait`], which
//! parks on a condition variable and so works across threads.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::{Direction, FileKind, Interest, Io, Transport, TransportStat};
use crate::errno;
use crate::error::{Result, StreamError};

#[derive(Debug)]
struct PipeState {
    buf: VecDeque<u8>,
    capacity: usize,
    reader_open: bool,
    writer_open: bool,
}

impl PipeState {
    fn readable_now(&self) -> bool {
        !self.buf.is_empty() || !self.writer_open
    }

    fn writable_now(&self) -> bool {
        self.buf.len() < self.capacity || !self.reader_open
    }
}

#[derive(Debug)]
struct PipeShared {
    state: Mutex<PipeState>,
    cond: Condvar,
}

impl PipeShared {
    fn wait_until(
        &self,
        timeout: Option<Duration>,
        ready: impl Fn(&PipeState) -> bool,
    ) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state: MutexGuard<'_, PipeState> = self.state.lock();
        while !ready(&*state) {
            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(&mut state, deadline).timed_out() {
                        return ready(&*state);
                    }
                }
                None => self.cond.wait(&mut state),
            }
        }
        true
    }
}

/// Creates a pipe holding at most `capacity` bytes in flight.
#[must_use]
pub fn memory_pipe(capacity: usize) -> (PipeReader, PipeWriter) {
    let shared = Arc::new(PipeShared {
        state: Mutex::new(PipeState {
            buf: VecDeque::new(),
            capacity: capacity.max(1),
            reader_open: true,
            writer_open: true,
        }),
        cond: Condvar::new(),
    });
    (
        PipeReader {
            shared: Arc::clone(&shared),
            closed: false,
            nonblocking: false,
        },
        PipeWriter {
            shared,
            closed: false,
            nonblocking: false,
        },
    )
}

/// Read end of a [`memory_pipe`].
#[derive(Debug)]
pub struct PipeReader {
    shared: Arc<PipeShared>,
    closed: bool,
    nonblocking: bool,
}

/// Write end of a [`memory_pipe`].
#[derive(Debug)]
pub struct PipeWriter {
    shared: Arc<PipeShared>,
    closed: bool,
    nonblocking: bool,
}

impl PipeReader {
    /// Bytes written but not yet read.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.state.lock().buf.len()
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.shared.state.lock().reader_open = false;
            self.shared.cond.notify_all();
        }
    }
}

impl PipeWriter {
    /// Bytes written but not yet read.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.state.lock().buf.len()
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.shared.state.lock().writer_open = false;
            self.shared.cond.notify_all();
        }
    }
}

fn pipe_stat(queued: usize, capacity: usize) -> TransportStat {
    TransportStat {
        kind: FileKind::Fifo,
        size: queued as u64,
        mode: 0o600,
        block_size: capacity as u32,
    }
}

impl Transport for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<Io<usize>> {
        if self.closed {
            return Err(StreamError::CLOSED);
        }
        let mut state = self.shared.state.lock();
        if state.buf.is_empty() {
            return Ok(if state.writer_open {
                Io::WouldBlock
            } else {
                Io::Eof
            });
        }
        let n = buf.len().min(state.buf.len());
        for (dst, src) in buf.iter_mut().zip(state.buf.drain(..n)) {
            *dst = src;
        }
        drop(state);
        self.shared.cond.notify_all();
        Ok(Io::Ready(n))
    }

    fn write(&mut self, _data: &[u8]) -> Result<Io<usize>> {
        Err(StreamError::NOT_WRITABLE)
    }

    fn close(&mut self) -> Result<Io<()>> {
        if self.closed {
            return Err(StreamError::CLOSED);
        }
        self.release();
        Ok(Io::Ready(()))
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<()> {
        self.nonblocking = nonblocking;
        Ok(())
    }

    fn is_readable(&self) -> bool {
        true
    }

    fn is_writable(&self) -> bool {
        false
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn stat(&self) -> Result<TransportStat> {
        let state = self.shared.state.lock();
        Ok(pipe_stat(state.buf.len(), state.capacity))
    }

    fn wait(&mut self, interest: Interest, timeout: Option<Duration>) -> Result<bool> {
        if self.closed {
            return Err(StreamError::CLOSED);
        }
        match interest {
            Interest::Readable => Ok(self.shared.wait_until(timeout, PipeState::readable_now)),
            Interest::Writable => Ok(false),
        }
    }
}

impl Transport for PipeWriter {
    fn read(&mut self, _buf: &mut [u8]) -> Result<Io<usize>> {
        Err(StreamError::NOT_READABLE)
    }

    fn write(&mut self, data: &[u8]) -> Result<Io<usize>> {
        if self.closed {
            return Err(StreamError::CLOSED);
        }
        let mut state = self.shared.state.lock();
        if !state.reader_open {
            return Err(StreamError::Os {
                op: "write",
                errno: errno::EPIPE,
            });
        }
        let space = state.capacity - state.buf.len();
        if space == 0 && !data.is_empty() {
            return Ok(Io::WouldBlock);
        }
        let n = space.min(data.len());
        state.buf.extend(&data[..n]);
        drop(state);
        self.shared.cond.notify_all();
        Ok(Io::Ready(n))
    }

    fn close(&mut self) -> Result<Io<()>> {
        if self.closed {
            return Err(StreamError::CLOSED);
        }
        self.release();
        Ok(Io::Ready(()))
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<()> {
        self.nonblocking = nonblocking;
        Ok(())
    }

    fn is_readable(&self) -> bool {
        false
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn stat(&self) -> Result<TransportStat> {
        let state = self.shared.state.lock();
        Ok(pipe_stat(state.buf.len(), state.capacity))
    }

    fn wait(&mut self, interest: Interest, timeout: Option<Duration>) -> Result<bool> {
        if self.closed {
            return Err(StreamError::CLOSED);
        }
        match interest {
            Interest::Writable => Ok(self.shared.wait_until(timeout, PipeState::writable_now)),
            Interest::Readable => Ok(false),
        }
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.release();
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.release();
    }
}

/// One end of a [`memory_socketpair`]: a readable and writable transport
/// supporting half-close through [`Transport::shutdown`].
#[derive(Debug)]
pub struct MemorySocket {
    rx: PipeReader,
    tx: PipeWriter,
    closed: bool,
}

/// Two connected sockets; bytes written to one are read from the other.
#[must_use]
pub fn memory_socketpair(capacity: usize) -> (MemorySocket, MemorySocket) {
    let (a_rx, b_tx) = memory_pipe(capacity);
    let (b_rx, a_tx) = memory_pipe(capacity);
    (
        MemorySocket {
            rx: a_rx,
            tx: a_tx,
            closed: false,
        },
        MemorySocket {
            rx: b_rx,
            tx: b_tx,
            closed: false,
        },
    )
}

impl MemorySocket {
    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(StreamError::CLOSED)
        } else {
            Ok(())
        }
    }
}

impl Transport for MemorySocket {
    fn read(&mut self, buf: &mut [u8]) -> Result<Io<usize>> {
        self.check_open()?;
        if self.rx.closed {
            return Ok(Io::Eof);
        }
        self.rx.read(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<Io<usize>> {
        self.check_open()?;
        if self.tx.closed {
            return Err(StreamError::Os {
                op: "write",
                errno: errno::EPIPE,
            });
        }
        self.tx.write(data)
    }

    fn close(&mut self) -> Result<Io<()>> {
        self.check_open()?;
        self.closed = true;
        self.rx.release();
        self.tx.release();
        Ok(Io::Ready(()))
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<()> {
        self.check_open()?;
        self.rx.set_nonblocking(nonblocking)?;
        self.tx.set_nonblocking(nonblocking)
    }

    fn is_readable(&self) -> bool {
        true
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn stat(&self) -> Result<TransportStat> {
        self.check_open()?;
        let mut stat = self.rx.stat()?;
        stat.kind = FileKind::Socket;
        Ok(stat)
    }

    fn wait(&mut self, interest: Interest, timeout: Option<Duration>) -> Result<bool> {
        self.check_open()?;
        match interest {
            Interest::Readable if self.rx.closed => Ok(true),
            Interest::Readable => self.rx.wait(interest, timeout),
            Interest::Writable if self.tx.closed => Ok(true),
            Interest::Writable => self.tx.wait(interest, timeout),
        }
    }

    fn shutdown(&mut self, direction: Direction) -> Result<bool> {
        self.check_open()?;
        match direction {
            Direction::Read => self.rx.release(),
            Direction::Write => self.tx.release(),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn empty_pipe_would_block_until_writer_closes() {
        let (mut r, mut w) = memory_pipe(8);
        let mut buf = [0u8; 4];
        assert_eq!(r.read(&mut buf).unwrap(), Io::WouldBlock);
        assert_eq!(w.write(b"ab").unwrap(), Io::Ready(2));
        assert_eq!(r.read(&mut buf).unwrap(), Io::Ready(2));
        w.close().unwrap().ready().unwrap();
        assert_eq!(r.read(&mut buf).unwrap(), Io::Eof);
    }

    #[test]
    fn full_pipe_accepts_partial_then_blocks() {
        let (_r, mut w) = memory_pipe(4);
        assert_eq!(w.write(b"abcdef").unwrap(), Io::Ready(4));
        assert_eq!(w.write(b"ef").unwrap(), Io::WouldBlock);
    }

    #[test]
    fn write_after_reader_gone_is_epipe() {
        let (r, mut w) = memory_pipe(4);
        drop(r);
        assert!(matches!(
            w.write(b"a"),
            Err(StreamError::Os { errno: errno::EPIPE, .. })
        ));
    }

    #[test]
    fn wait_times_out_on_idle_pipe() {
        let (mut r, _w) = memory_pipe(4);
        let ready = r
            .wait(Interest::Readable, Some(Duration::from_millis(10)))
            .unwrap();
        assert!(!ready);
    }

    #[test]
    fn wait_wakes_on_cross_thread_write() {
        let (mut r, mut w) = memory_pipe(4);
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            let _ = w.write(b"x").unwrap();
        });
        assert!(r.wait(Interest::Readable, None).unwrap());
        t.join().unwrap();
    }

    #[test]
    fn socket_half_close_delivers_eof_to_peer() {
        let (mut a, mut b) = memory_socketpair(16);
        let _ = a.write(b"hi").unwrap();
        assert!(a.shutdown(Direction::Write).unwrap());
        let mut buf = [0u8; 4];
        assert_eq!(b.read(&mut buf).unwrap(), Io::Ready(2));
        assert_eq!(b.read(&mut buf).unwrap(), Io::Eof);
        // The other direction still works.
        assert_eq!(b.write(b"ok").unwrap(), Io::Ready(2));
        assert_eq!(a.read(&mut buf).unwrap(), Io::Ready(2));
    }
}
