//! Transport over one owned OS file descriptor.

use std::ffi::CString;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::Duration;

use layerio_core::errno;
use layerio_core::log::{LogEntry, LogLevel};
use layerio_core::transport::FileKind;
use layerio_core::{
    Access, Direction, Interest, Io, Result, Stream, StreamConfig, StreamError, Transport,
    TransportStat, Whence,
};

use crate::mode::{OpenFlags, parse_mode};
use crate::syscall;

/// An owned descriptor. Released exactly once, by [`Transport::close`] or
/// on drop.
#[derive(Debug)]
pub struct FdTransport {
    fd: RawFd,
    access: Access,
    nonblocking: bool,
}

impl FdTransport {
    /// Takes ownership of `fd`, reading its access mode and blocking flag
    /// from the descriptor.
    ///
    /// # Safety
    ///
    /// `fd` must be an open descriptor that nothing else will close.
    pub unsafe fn from_raw_fd(fd: RawFd) -> Result<Self> {
        let flags = syscall::sys_get_flags(fd).map_err(|e| StreamError::from_errno("fcntl", e))?;
        let access = match flags & libc::O_ACCMODE {
            libc::O_RDONLY => Access::READ,
            libc::O_WRONLY => Access::WRITE,
            _ => Access::READ_WRITE,
        };
        Ok(Self {
            fd,
            access,
            nonblocking: flags & libc::O_NONBLOCK != 0,
        })
    }

    /// Wraps a freshly created descriptor whose access is already known.
    pub(crate) fn owned(fd: RawFd, access: Access) -> Self {
        Self {
            fd,
            access,
            nonblocking: false,
        }
    }

    /// Opens `path` with an fopen-style mode string.
    pub fn open(path: impl AsRef<Path>, mode: &str) -> Result<Self> {
        let flags = parse_mode(mode)?;
        Self::open_with(path.as_ref(), &flags)
    }

    fn open_with(path: &Path, flags: &OpenFlags) -> Result<Self> {
        let cpath = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
            StreamError::InvalidArgument(format!("path {} contains NUL", path.display()))
        })?;
        let fd = syscall::sys_open(&cpath, flags.oflags())
            .map_err(|e| StreamError::from_errno("open", e))?;
        Ok(Self::owned(fd, flags.access()))
    }

    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking
    }

    fn live_fd(&self) -> Result<RawFd> {
        if self.fd < 0 {
            return Err(StreamError::CLOSED);
        }
        Ok(self.fd)
    }

    fn release(&mut self) -> Result<()> {
        let fd = std::mem::replace(&mut self.fd, -1);
        syscall::sys_close(fd).map_err(|e| StreamError::from_errno("close", e))
    }
}

/// Opens `path` as a stream. A `b` in `mode` selects binmode, and an
/// encoding suffix is applied before the stream is returned.
pub fn open(path: impl AsRef<Path>, mode: &str, config: StreamConfig) -> Result<Stream<FdTransport>> {
    let flags = parse_mode(mode)?;
    let transport = FdTransport::open_with(path.as_ref(), &flags)?;
    let config = StreamConfig {
        binmode: config.binmode || flags.binary,
        ..config
    };
    let mut stream = Stream::open_with(transport, flags.access(), config)?;
    if let Some(spec) = flags.encoding {
        stream.apply_encoding_spec(spec)?;
    }
    Ok(stream)
}

fn io_result(op: &'static str, ret: std::result::Result<usize, i32>) -> Result<Io<usize>> {
    match ret {
        Ok(n) => Ok(Io::Ready(n)),
        Err(errno::EAGAIN) => Ok(Io::WouldBlock),
        Err(e) => Err(StreamError::from_errno(op, e)),
    }
}

fn whence_raw(whence: Whence) -> i32 {
    match whence {
        Whence::Set => libc::SEEK_SET,
        Whence::Cur => libc::SEEK_CUR,
        Whence::End => libc::SEEK_END,
    }
}

fn file_kind(mode: u32) -> FileKind {
    match mode & libc::S_IFMT {
        libc::S_IFREG => FileKind::Regular,
        libc::S_IFDIR => FileKind::Directory,
        libc::S_IFIFO => FileKind::Fifo,
        libc::S_IFSOCK => FileKind::Socket,
        libc::S_IFCHR => FileKind::CharDevice,
        libc::S_IFBLK => FileKind::BlockDevice,
        libc::S_IFLNK => FileKind::Symlink,
        _ => FileKind::Unknown,
    }
}

impl Transport for FdTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<Io<usize>> {
        let fd = self.live_fd()?;
        if !self.access.read {
            return Err(StreamError::NOT_READABLE);
        }
        match io_result("read", syscall::sys_read(fd, buf))? {
            Io::Ready(0) if !buf.is_empty() => Ok(Io::Eof),
            other => Ok(other),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<Io<usize>> {
        let fd = self.live_fd()?;
        if !self.access.write {
            return Err(StreamError::NOT_WRITABLE);
        }
        io_result("write", syscall::sys_write(fd, data))
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let fd = self.live_fd()?;
        syscall::sys_lseek(fd, offset, whence_raw(whence))
            .map_err(|e| StreamError::from_errno("lseek", e))
    }

    fn close(&mut self) -> Result<Io<()>> {
        self.live_fd()?;
        self.release()?;
        Ok(Io::Ready(()))
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<()> {
        let fd = self.live_fd()?;
        let flags = syscall::sys_get_flags(fd).map_err(|e| StreamError::from_errno("fcntl", e))?;
        let flags = if nonblocking {
            flags | libc::O_NONBLOCK
        } else {
            flags & !libc::O_NONBLOCK
        };
        syscall::sys_set_flags(fd, flags).map_err(|e| StreamError::from_errno("fcntl", e))?;
        self.nonblocking = nonblocking;
        Ok(())
    }

    fn is_readable(&self) -> bool {
        self.access.read
    }

    fn is_writable(&self) -> bool {
        self.access.write
    }

    fn is_closed(&self) -> bool {
        self.fd < 0
    }

    fn fd(&self) -> Option<i32> {
        (self.fd >= 0).then_some(self.fd)
    }

    fn stat(&self) -> Result<TransportStat> {
        let fd = self.live_fd()?;
        let st = syscall::sys_fstat(fd).map_err(|e| StreamError::from_errno("fstat", e))?;
        Ok(TransportStat {
            kind: file_kind(st.st_mode),
            size: st.st_size.max(0) as u64,
            mode: st.st_mode & 0o7777,
            block_size: st.st_blksize.max(0) as u32,
        })
    }

    fn wait(&mut self, interest: Interest, timeout: Option<Duration>) -> Result<bool> {
        let fd = self.live_fd()?;
        let events = match interest {
            Interest::Readable => libc::POLLIN,
            Interest::Writable => libc::POLLOUT,
        };
        let revents = syscall::sys_poll(fd, events, timeout)
            .map_err(|e| StreamError::from_errno("poll", e))?;
        if revents & libc::POLLNVAL != 0 {
            return Err(StreamError::CLOSED);
        }
        // Hangup and error count as ready: the retried call reports them.
        Ok(revents != 0)
    }

    fn pread(&mut self, buf: &mut [u8], offset: u64) -> Result<Io<usize>> {
        let fd = self.live_fd()?;
        if !self.access.read {
            return Err(StreamError::NOT_READABLE);
        }
        io_result("pread", syscall::sys_pread(fd, buf, offset))
    }

    fn pwrite(&mut self, data: &[u8], offset: u64) -> Result<Io<usize>> {
        let fd = self.live_fd()?;
        if !self.access.write {
            return Err(StreamError::NOT_WRITABLE);
        }
        io_result("pwrite", syscall::sys_pwrite(fd, data, offset))
    }

    fn shutdown(&mut self, direction: Direction) -> Result<bool> {
        let fd = self.live_fd()?;
        let how = match direction {
            Direction::Read => libc::SHUT_RD,
            Direction::Write => libc::SHUT_WR,
        };
        match syscall::sys_shutdown(fd, how) {
            Ok(()) => Ok(true),
            Err(errno::ENOTSOCK) => Ok(false),
            Err(e) => Err(StreamError::from_errno("shutdown", e)),
        }
    }

    fn is_terminal(&self) -> bool {
        self.fd >= 0 && syscall::sys_isatty(self.fd)
    }
}

impl AsRawFd for FdTransport {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for FdTransport {
    fn drop(&mut self) {
        if self.fd < 0 {
            return;
        }
        let fd = self.fd;
        if let Err(err) = self.release() {
            LogEntry::new(LogLevel::Warn, "fd.release_failed")
                .with_fd(Some(fd))
                .with_errno(err.errno())
                .with_details(serde_json::json!({ "error": err.to_string() }))
                .emit();
        }
    }
}
