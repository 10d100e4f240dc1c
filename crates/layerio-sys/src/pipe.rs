//! OS pipes and socket pairs.

use layerio_core::{Access, Result, StreamError};

use crate::fd::FdTransport;
use crate::syscall;

/// A unidirectional OS pipe: `(read_end, write_end)`.
pub fn pipe() -> Result<(FdTransport, FdTransport)> {
    let (r, w) = syscall::sys_pipe().map_err(|e| StreamError::from_errno("pipe", e))?;
    Ok((
        FdTransport::owned(r, Access::READ),
        FdTransport::owned(w, Access::WRITE),
    ))
}

/// A connected pair of Unix stream sockets, each readable and writable.
pub fn socketpair() -> Result<(FdTransport, FdTransport)> {
    let (a, b) = syscall::sys_socketpair().map_err(|e| StreamError::from_errno("socketpair", e))?;
    Ok((
        FdTransport::owned(a, Access::READ_WRITE),
        FdTransport::owned(b, Access::READ_WRITE),
    ))
}
