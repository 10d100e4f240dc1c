//! Child-process streams.
//!
//! The child's stdout feeds the read pipeline and its stdin is fed by the
//! write pipeline, so `close_write` delivers EOF to the child while its
//! remaining output stays readable. Dropping a [`ProcessStream`] closes the
//! stream and waits for the child, like `pclose`.

use std::ffi::OsStr;
use std::os::fd::IntoRawFd;
use std::process::{Child, Command, ExitStatus, Stdio};

use layerio_core::errno;
use layerio_core::log::{LogEntry, LogLevel};
use layerio_core::{Access, Result, Stream, StreamConfig, StreamError};

use crate::fd::FdTransport;

/// A running child and the duplex stream connected to it.
pub struct ProcessStream {
    stream: Stream<FdTransport>,
    child: Child,
    reaped: bool,
}

impl ProcessStream {
    pub fn stream(&mut self) -> &mut Stream<FdTransport> {
        &mut self.stream
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Closes the stream, then reaps the child.
    pub fn wait(mut self) -> Result<ExitStatus> {
        self.reap()
    }

    fn reap(&mut self) -> Result<ExitStatus> {
        self.reaped = true;
        let closed = self.stream.close();
        let status = self
            .child
            .wait()
            .map_err(|e| StreamError::from_errno("waitpid", e.raw_os_error().unwrap_or(errno::EIO)))?;
        closed?;
        Ok(status)
    }
}

impl Drop for ProcessStream {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        if let Err(err) = self.reap() {
            LogEntry::new(LogLevel::Warn, "process.reap_failed")
                .with_details(serde_json::json!({
                    "pid": self.child.id(),
                    "error": err.to_string(),
                }))
                .emit();
        }
    }
}

/// Spawns `program` with `args`, connected through pipes.
pub fn popen<I, S>(program: impl AsRef<OsStr>, args: I, config: StreamConfig) -> Result<ProcessStream>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program = program.as_ref();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|e| StreamError::from_errno("spawn", e.raw_os_error().unwrap_or(errno::EIO)))?;
    let pid = child.id();
    let (Some(stdout), Some(stdin)) = (child.stdout.take(), child.stdin.take()) else {
        let _ = child.wait();
        return Err(StreamError::InvalidArgument("child pipes unavailable".into()));
    };
    let read = FdTransport::owned(stdout.into_raw_fd(), Access::READ);
    let write = FdTransport::owned(stdin.into_raw_fd(), Access::WRITE);
    // A rejected transport is released, so the child sees EOF and exits.
    let stream = match Stream::split(read, write, config) {
        Ok(stream) => stream.with_pid(pid),
        Err(err) => {
            let _ = child.wait();
            return Err(err);
        }
    };
    LogEntry::new(LogLevel::Debug, "process.spawn")
        .with_details(serde_json::json!({
            "program": program.to_string_lossy(),
            "pid": pid,
        }))
        .emit();
    Ok(ProcessStream {
        stream,
        child,
        reaped: false,
    })
}
