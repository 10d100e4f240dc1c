//! Stream error taxonomy.
//!
//! Transport and buffer errors travel unchanged up to the façade. Only the
//! bounded-read helpers translate [`StreamError::EndOfStream`] into `None`.

use std::io;

use thiserror::Error;

use crate::errno;

/// Every failure a transport, layer or the façade can report.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Operation after close, or on the closed/missing direction of a stream.
    #[error("{0}")]
    Closed(&'static str),
    /// True end of data.
    #[error("end of file reached")]
    EndOfStream,
    /// The transport does not support positioning.
    #[error("illegal seek")]
    NotSeekable,
    /// A non-blocking operation could not complete now.
    #[error("operation would block")]
    WouldBlock,
    /// A blocking readiness wait ran past the configured timeout.
    #[error("readiness wait timed out")]
    TimedOut,
    /// Bad separator, limit, encoding name, offset or mode string.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Separator or data cannot be expressed in the stream's encoding.
    #[error("encoding mismatch: {0}")]
    EncodingMismatch(String),
    /// Mixing byte-oriented or unbuffered access with pending buffered data.
    #[error("{0}")]
    BufferingConflict(&'static str),
    /// An OS-level transport failure.
    #[error("{op} failed: {} ({errno})", errno_label(.errno))]
    Os { op: &'static str, errno: i32 },
}

fn errno_label(code: &i32) -> &'static str {
    errno::errno_name(*code)
}

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, StreamError>;

impl StreamError {
    pub const CLOSED: Self = Self::Closed("closed stream");
    pub const NOT_READABLE: Self = Self::Closed("not opened for reading");
    pub const NOT_WRITABLE: Self = Self::Closed("not opened for writing");

    /// Translates a raw errno reported by `op` into the taxonomy.
    #[must_use]
    pub fn from_errno(op: &'static str, code: i32) -> Self {
        match code {
            errno::EAGAIN => Self::WouldBlock,
            errno::ESPIPE => Self::NotSeekable,
            errno::EBADF => Self::CLOSED,
            errno::EINVAL => Self::InvalidArgument(format!("{op}: invalid argument")),
            errno::ETIMEDOUT => Self::TimedOut,
            _ => Self::Os { op, errno: code },
        }
    }

    /// POSIX errno equivalent of this error.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::Closed(_) => errno::EBADF,
            Self::EndOfStream => 0,
            Self::NotSeekable => errno::ESPIPE,
            Self::WouldBlock => errno::EAGAIN,
            Self::TimedOut => errno::ETIMEDOUT,
            Self::InvalidArgument(_) => errno::EINVAL,
            Self::EncodingMismatch(_) => errno::EILSEQ,
            Self::BufferingConflict(_) => errno::EINVAL,
            Self::Os { errno, .. } => *errno,
        }
    }

    /// True for [`StreamError::EndOfStream`].
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        let kind = match &err {
            StreamError::Closed(_) => io::ErrorKind::BrokenPipe,
            StreamError::EndOfStream => io::ErrorKind::UnexpectedEof,
            StreamError::NotSeekable => io::ErrorKind::Unsupported,
            StreamError::WouldBlock => io::ErrorKind::WouldBlock,
            StreamError::TimedOut => io::ErrorKind::TimedOut,
            StreamError::InvalidArgument(_) | StreamError::BufferingConflict(_) => {
                io::ErrorKind::InvalidInput
            }
            StreamError::EncodingMismatch(_) => io::ErrorKind::InvalidData,
            StreamError::Os { errno, .. } => return io::Error::from_raw_os_error(*errno),
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_translation_covers_taxonomy() {
        assert!(matches!(
            StreamError::from_errno("read", errno::EAGAIN),
            StreamError::WouldBlock
        ));
        assert!(matches!(
            StreamError::from_errno("lseek", errno::ESPIPE),
            StreamError::NotSeekable
        ));
        assert!(matches!(
            StreamError::from_errno("write", errno::EBADF),
            StreamError::Closed(_)
        ));
        assert!(matches!(
            StreamError::from_errno("write", errno::EPIPE),
            StreamError::Os { errno: errno::EPIPE, .. }
        ));
    }

    #[test]
    fn errno_of_variants() {
        assert_eq!(StreamError::WouldBlock.errno(), errno::EAGAIN);
        assert_eq!(StreamError::NotSeekable.errno(), errno::ESPIPE);
        assert_eq!(StreamError::CLOSED.errno(), errno::EBADF);
    }

    #[test]
    fn converts_into_io_error() {
        let err: io::Error = StreamError::WouldBlock.into();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        let err: io::Error = StreamError::Os { op: "read", errno: errno::EIO }.into();
        assert_eq!(err.raw_os_error(), Some(errno::EIO));
    }

    #[test]
    fn display_messages() {
        assert_eq!(StreamError::NOT_READABLE.to_string(), "not opened for reading");
        assert_eq!(
            StreamError::Os { op: "read", errno: errno::EIO }.to_string(),
            "read failed: EIO (5)"
        );
    }
}
