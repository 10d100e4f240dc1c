//! Duplex composition.
//!
//! A stream reads and writes either through one shared pipeline (a socket,
//! a file opened for update) or through two independent pipelines (a child
//! process's stdout and stdin). [`Duplex`] routes each direction to the
//! right pipeline and tracks which directions have been closed.

use serde::Serialize;

use crate::error::{Result, StreamError};
use crate::pipeline::Pipeline;
use crate::transport::{Direction, Transport};

/// Lifecycle of a duplex stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplexState {
    Open,
    ReadClosed,
    WriteClosed,
    Closed,
}

/// How the two directions map onto pipelines.
pub enum Pipes<T: Transport> {
    /// One pipeline serving every direction its access allows.
    Shared(Pipeline<T>),
    /// Independent pipelines; a missing side is a direction the stream
    /// never had or has closed.
    Split {
        read: Option<Pipeline<T>>,
        write: Option<Pipeline<T>>,
    },
}

/// Pipelines plus direction state.
pub struct Duplex<T: Transport> {
    pipes: Pipes<T>,
    state: DuplexState,
}

impl<T: Transport> Duplex<T> {
    #[must_use]
    pub fn shared(pipeline: Pipeline<T>) -> Self {
        Self {
            pipes: Pipes::Shared(pipeline),
            state: DuplexState::Open,
        }
    }

    pub fn split(read: Option<Pipeline<T>>, write: Option<Pipeline<T>>) -> Result<Self> {
        if read.is_none() && write.is_none() {
            return Err(StreamError::InvalidArgument(
                "duplex needs at least one pipeline".into(),
            ));
        }
        Ok(Self {
            pipes: Pipes::Split { read, write },
            state: DuplexState::Open,
        })
    }

    pub fn state(&self) -> DuplexState {
        self.state
    }

    pub fn pipes(&self) -> &Pipes<T> {
        &self.pipes
    }

    pub fn is_closed(&self) -> bool {
        self.state == DuplexState::Closed
    }

    /// True when the stream can still read.
    pub fn has_read_side(&self) -> bool {
        if matches!(self.state, DuplexState::ReadClosed | DuplexState::Closed) {
            return false;
        }
        match &self.pipes {
            Pipes::Shared(p) => p.access().read,
            Pipes::Split { read, .. } => read.is_some(),
        }
    }

    /// True when the stream can still write.
    pub fn has_write_side(&self) -> bool {
        if matches!(self.state, DuplexState::WriteClosed | DuplexState::Closed) {
            return false;
        }
        match &self.pipes {
            Pipes::Shared(p) => p.access().write,
            Pipes::Split { write, .. } => write.is_some(),
        }
    }

    /// True when both directions exist (whether or not one was closed since).
    pub fn is_duplex(&self) -> bool {
        match &self.pipes {
            Pipes::Shared(p) => p.access().read && p.access().write,
            Pipes::Split { read, write } => {
                (read.is_some() || self.state == DuplexState::ReadClosed)
                    && (write.is_some() || self.state == DuplexState::WriteClosed)
            }
        }
    }

    fn side_error(&self, direction: Direction) -> StreamError {
        match (self.state, direction) {
            (DuplexState::Closed, _) => StreamError::CLOSED,
            (_, Direction::Read) => StreamError::NOT_READABLE,
            (_, Direction::Write) => StreamError::NOT_WRITABLE,
        }
    }

    /// The pipeline serving reads.
    pub fn reader(&mut self) -> Result<&mut Pipeline<T>> {
        if !self.has_read_side() {
            return Err(self.side_error(Direction::Read));
        }
        match &mut self.pipes {
            Pipes::Shared(p) => Ok(p),
            Pipes::Split { read, .. } => read.as_mut().ok_or(StreamError::NOT_READABLE),
        }
    }

    /// The pipeline serving writes.
    pub fn writer(&mut self) -> Result<&mut Pipeline<T>> {
        if !self.has_write_side() {
            return Err(self.side_error(Direction::Write));
        }
        match &mut self.pipes {
            Pipes::Shared(p) => Ok(p),
            Pipes::Split { write, .. } => write.as_mut().ok_or(StreamError::NOT_WRITABLE),
        }
    }

    /// Read pipeline if there is one, else the write pipeline.
    pub fn primary(&self) -> Result<&Pipeline<T>> {
        if self.is_closed() {
            return Err(StreamError::CLOSED);
        }
        match &self.pipes {
            Pipes::Shared(p) => Ok(p),
            Pipes::Split { read, write } => read
                .as_ref()
                .or(write.as_ref())
                .ok_or(StreamError::CLOSED),
        }
    }

    /// Mutable variant of [`Self::primary`].
    pub fn primary_mut(&mut self) -> Result<&mut Pipeline<T>> {
        if self.is_closed() {
            return Err(StreamError::CLOSED);
        }
        match &mut self.pipes {
            Pipes::Shared(p) => Ok(p),
            Pipes::Split { read, write } => read
                .as_mut()
                .or(write.as_mut())
                .ok_or(StreamError::CLOSED),
        }
    }

    /// Every live pipeline, write side first.
    pub fn pipelines_mut(&mut self) -> Vec<&mut Pipeline<T>> {
        if self.is_closed() {
            return Vec::new();
        }
        match &mut self.pipes {
            Pipes::Shared(p) => vec![p],
            Pipes::Split { read, write } => write.iter_mut().chain(read.iter_mut()).collect(),
        }
    }

    /// Closes the read direction.
    ///
    /// A read-only stream is closed entirely; a write-only stream refuses, and
    /// so does a shared transport without a one-way shutdown.
    pub fn close_read(&mut self) -> Result<()> {
        self.close_direction(Direction::Read)
    }

    /// Closes the write direction after flushing it.
    ///
    /// A write-only stream is closed entirely; a read-only stream refuses.
    pub fn close_write(&mut self) -> Result<()> {
        self.close_direction(Direction::Write)
    }

    fn close_direction(&mut self, direction: Direction) -> Result<()> {
        let (closed_state, this_present, other_present, refusal) = match direction {
            Direction::Read => (
                DuplexState::ReadClosed,
                self.has_read_side(),
                self.has_write_side(),
                "closing non-duplex IO for reading",
            ),
            Direction::Write => (
                DuplexState::WriteClosed,
                self.has_write_side(),
                self.has_read_side(),
                "closing non-duplex IO for writing",
            ),
        };
        match self.state {
            DuplexState::Closed => return Err(StreamError::CLOSED),
            state if state == closed_state => return Ok(()),
            _ => {}
        }
        if !this_present {
            return Err(StreamError::Closed(refusal));
        }
        if !other_present {
            return self.close();
        }
        let result = match &mut self.pipes {
            Pipes::Shared(p) => {
                // No one-way shutdown: the stream is not duplex.
                if !p.shutdown(direction)? {
                    return Err(StreamError::Closed(refusal));
                }
                Ok(())
            }
            Pipes::Split { read, write } => {
                let side = match direction {
                    Direction::Read => read.take(),
                    Direction::Write => write.take(),
                };
                side.map_or(Ok(()), |mut pipeline| pipeline.close())
            }
        };
        self.state = closed_state;
        result
    }

    /// Flushes and releases every pipeline. A second call is a no-op.
    ///
    /// Every transport is released even when a flush or an earlier release
    /// fails; the first error is returned.
    pub fn close(&mut self) -> Result<()> {
        if self.state == DuplexState::Closed {
            return Ok(());
        }
        self.state = DuplexState::Closed;
        let mut first = Ok(());
        match &mut self.pipes {
            Pipes::Shared(p) => first = p.close(),
            Pipes::Split { read, write } => {
                for side in [write.take(), read.take()].into_iter().flatten() {
                    let mut pipeline = side;
                    let result = pipeline.close();
                    if first.is_ok() {
                        first = result;
                    }
                }
            }
        }
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use crate::retry::Policy;
    use crate::transport::{
        Access, BoxedTransport, Io, MemoryFile, memory_pipe, memory_socketpair,
    };

    fn boxed(t: impl Transport + Send + 'static) -> BoxedTransport {
        Box::new(t)
    }

    fn pipeline(t: BoxedTransport, access: Access) -> Pipeline<BoxedTransport> {
        Pipeline::new(t, access, &StreamConfig::default()).unwrap()
    }

    #[test]
    fn shared_close_read_keeps_writes() {
        let (a, mut b) = memory_socketpair(64);
        let mut duplex = Duplex::shared(pipeline(boxed(a), Access::READ_WRITE));
        duplex.close_read().unwrap();
        assert_eq!(duplex.state(), DuplexState::ReadClosed);
        assert!(matches!(duplex.reader(), Err(StreamError::Closed(_))));
        let w = duplex.writer().unwrap();
        w.write(b"hi", Policy::Block).unwrap().into_result().unwrap();
        w.flush(Policy::Block).unwrap().into_result().unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(b.read(&mut buf).unwrap(), Io::Ready(2));
        duplex.close_read().unwrap();
    }

    #[test]
    fn close_read_then_write_closes_everything() {
        let (a, _b) = memory_socketpair(64);
        let mut duplex = Duplex::shared(pipeline(boxed(a), Access::READ_WRITE));
        duplex.close_read().unwrap();
        duplex.close_write().unwrap();
        assert_eq!(duplex.state(), DuplexState::Closed);
    }

    #[test]
    fn write_only_refuses_close_read() {
        let mut duplex = Duplex::shared(pipeline(boxed(MemoryFile::new(Access::WRITE)), Access::WRITE));
        match duplex.close_read() {
            Err(StreamError::Closed(msg)) => assert_eq!(msg, "closing non-duplex IO for reading"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(duplex.state(), DuplexState::Open);
    }

    #[test]
    fn shared_file_refuses_half_close() {
        let file = MemoryFile::with_contents(b"abc", Access::READ_WRITE);
        let mut duplex = Duplex::shared(pipeline(boxed(file), Access::READ_WRITE));
        match duplex.close_read() {
            Err(StreamError::Closed(msg)) => assert_eq!(msg, "closing non-duplex IO for reading"),
            other => panic!("unexpected {other:?}"),
        }
        match duplex.close_write() {
            Err(StreamError::Closed(msg)) => assert_eq!(msg, "closing non-duplex IO for writing"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(duplex.state(), DuplexState::Open);
        assert!(duplex.reader().is_ok());
        assert!(duplex.writer().is_ok());
        duplex.close().unwrap();
    }

    #[test]
    fn read_only_close_read_closes_all() {
        let mut duplex = Duplex::shared(pipeline(boxed(MemoryFile::new(Access::READ)), Access::READ));
        duplex.close_read().unwrap();
        assert!(duplex.is_closed());
    }

    #[test]
    fn split_close_write_flushes_and_releases() {
        let (child_stdout_r, _child_stdout_w) = memory_pipe(64);
        let (mut child_stdin_r, child_stdin_w) = memory_pipe(64);
        let mut duplex = Duplex::split(
            Some(pipeline(boxed(child_stdout_r), Access::READ)),
            Some(pipeline(boxed(child_stdin_w), Access::WRITE)),
        )
        .unwrap();
        duplex
            .writer()
            .unwrap()
            .write(b"input", Policy::Block)
            .unwrap()
            .into_result()
            .unwrap();
        duplex.close_write().unwrap();
        assert_eq!(duplex.state(), DuplexState::WriteClosed);
        assert!(duplex.is_duplex());
        let mut buf = [0u8; 8];
        assert_eq!(child_stdin_r.read(&mut buf).unwrap(), Io::Ready(5));
        assert_eq!(child_stdin_r.read(&mut buf).unwrap(), Io::Eof);
        assert!(duplex.reader().is_ok());
    }

    #[test]
    fn close_twice_then_everything_fails() {
        let (a, _b) = memory_socketpair(64);
        let mut duplex = Duplex::shared(pipeline(boxed(a), Access::READ_WRITE));
        duplex.close().unwrap();
        duplex.close().unwrap();
        assert!(matches!(duplex.reader(), Err(StreamError::Closed("closed stream"))));
        assert!(matches!(duplex.close_read(), Err(StreamError::Closed(_))));
        assert!(duplex.primary().is_err());
    }

    #[test]
    fn split_needs_a_side() {
        assert!(Duplex::<BoxedTransport>::split(None, None).is_err());
    }
}
