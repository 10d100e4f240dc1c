//! Typed libc veneer.
//!
//! Each wrapper returns `Result<_, i32>` with the raw errno on failure and
//! retries `EINTR` where the call is restartable. Buffer-taking wrappers take
//! slices, so they are safe to call; the remaining `unsafe` is confined to
//! this module.

use std::ffi::CStr;
use std::time::Duration;

use layerio_core::errno;

/// The calling thread's errno after a failed libc call.
#[inline]
fn last_errno() -> i32 {
    std::io::Error::last_os_error()
        .raw_os_error()
        .unwrap_or(errno::EIO)
}

/// Converts a libc return value, retrying the call on `EINTR`.
#[inline]
fn retry<R: Copy + PartialOrd + Default>(mut call: impl FnMut() -> R) -> Result<R, i32> {
    loop {
        let ret = call();
        if ret >= R::default() {
            return Ok(ret);
        }
        match last_errno() {
            errno::EINTR => continue,
            e => return Err(e),
        }
    }
}

/// `read(fd, buf, len)`.
pub fn sys_read(fd: i32, buf: &mut [u8]) -> Result<usize, i32> {
    // SAFETY: buf is a valid writable region of buf.len() bytes.
    retry(|| unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) }).map(|n| n as usize)
}

/// `write(fd, data, len)`.
pub fn sys_write(fd: i32, data: &[u8]) -> Result<usize, i32> {
    // SAFETY: data is a valid readable region of data.len() bytes.
    retry(|| unsafe { libc::write(fd, data.as_ptr().cast(), data.len()) }).map(|n| n as usize)
}

/// `pread(fd, buf, len, offset)`.
pub fn sys_pread(fd: i32, buf: &mut [u8], offset: u64) -> Result<usize, i32> {
    let offset = libc::off_t::try_from(offset).map_err(|_| errno::EINVAL)?;
    // SAFETY: buf is a valid writable region of buf.len() bytes.
    retry(|| unsafe { libc::pread(fd, buf.as_mut_ptr().cast(), buf.len(), offset) })
        .map(|n| n as usize)
}

/// `pwrite(fd, data, len, offset)`.
pub fn sys_pwrite(fd: i32, data: &[u8], offset: u64) -> Result<usize, i32> {
    let offset = libc::off_t::try_from(offset).map_err(|_| errno::EINVAL)?;
    // SAFETY: data is a valid readable region of data.len() bytes.
    retry(|| unsafe { libc::pwrite(fd, data.as_ptr().cast(), data.len(), offset) })
        .map(|n| n as usize)
}

/// `lseek(fd, offset, whence)`.
pub fn sys_lseek(fd: i32, offset: i64, whence: i32) -> Result<u64, i32> {
    // SAFETY: lseek is safe on any fd (bad fd returns EBADF).
    let ret = unsafe { libc::lseek(fd, offset as libc::off_t, whence) };
    if ret < 0 {
        return Err(last_errno());
    }
    Ok(ret as u64)
}

/// `close(fd)`. Not retried: on Linux the descriptor is gone even when
/// `EINTR` is reported.
pub fn sys_close(fd: i32) -> Result<(), i32> {
    // SAFETY: the caller owns fd and never uses it again.
    let ret = unsafe { libc::close(fd) };
    match ret {
        0 => Ok(()),
        _ => match last_errno() {
            errno::EINTR => Ok(()),
            e => Err(e),
        },
    }
}

/// `open(path, flags, 0o666)`.
pub fn sys_open(path: &CStr, oflags: i32) -> Result<i32, i32> {
    // SAFETY: path is a valid NUL-terminated string.
    retry(|| unsafe { libc::open(path.as_ptr(), oflags | libc::O_CLOEXEC, 0o666 as libc::c_uint) })
}

/// `fcntl(fd, F_GETFL)`.
pub fn sys_get_flags(fd: i32) -> Result<i32, i32> {
    // SAFETY: F_GETFL takes no argument.
    retry(|| unsafe { libc::fcntl(fd, libc::F_GETFL) })
}

/// `fcntl(fd, F_SETFL, flags)`.
pub fn sys_set_flags(fd: i32, flags: i32) -> Result<(), i32> {
    // SAFETY: F_SETFL takes an int argument.
    retry(|| unsafe { libc::fcntl(fd, libc::F_SETFL, flags) }).map(|_| ())
}

/// `fstat(fd)`.
pub fn sys_fstat(fd: i32) -> Result<libc::stat, i32> {
    // SAFETY: an all-zero stat is a valid value; fstat overwrites it.
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    // SAFETY: st is a valid, writable stat struct.
    retry(|| unsafe { libc::fstat(fd, &mut st) })?;
    Ok(st)
}

/// `isatty(fd)`.
pub fn sys_isatty(fd: i32) -> bool {
    // SAFETY: isatty is safe on any fd.
    unsafe { libc::isatty(fd) == 1 }
}

/// `shutdown(fd, how)`.
pub fn sys_shutdown(fd: i32, how: i32) -> Result<(), i32> {
    // SAFETY: shutdown is safe on any fd.
    retry(|| unsafe { libc::shutdown(fd, how) }).map(|_| ())
}

/// `pipe2(fds, O_CLOEXEC)`. Returns `(read_end, write_end)`.
pub fn sys_pipe() -> Result<(i32, i32), i32> {
    let mut fds = [-1i32; 2];
    // SAFETY: fds has room for the two descriptors.
    retry(|| unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) })?;
    Ok((fds[0], fds[1]))
}

/// `socketpair(AF_UNIX, SOCK_STREAM | SOCK_CLOEXEC)`.
pub fn sys_socketpair() -> Result<(i32, i32), i32> {
    let mut fds = [-1i32; 2];
    // SAFETY: fds has room for the two descriptors.
    retry(|| unsafe {
        libc::socketpair(
            libc::AF_UNIX,
            libc::SOCK_STREAM | libc::SOCK_CLOEXEC,
            0,
            fds.as_mut_ptr(),
        )
    })?;
    Ok((fds[0], fds[1]))
}

/// `poll` on one descriptor. Returns the ready `revents`, or 0 on timeout.
///
/// `None` waits indefinitely. Timeouts are rounded up to whole
/// milliseconds and clamped to the range poll accepts. `EINTR` restarts
/// the wait with the full timeout.
pub fn sys_poll(fd: i32, events: i16, timeout: Option<Duration>) -> Result<i16, i32> {
    let millis = timeout.map_or(-1, poll_millis);
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    // SAFETY: pfd is one valid pollfd.
    let ready = retry(|| unsafe { libc::poll(&mut pfd, 1, millis) })?;
    Ok(if ready == 0 { 0 } else { pfd.revents })
}

fn poll_millis(timeout: Duration) -> i32 {
    let mut millis = timeout.as_millis();
    if Duration::from_millis(millis as u64) < timeout {
        millis += 1;
    }
    i32::try_from(millis).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_millis_rounds_up_and_clamps() {
        assert_eq!(poll_millis(Duration::ZERO), 0);
        assert_eq!(poll_millis(Duration::from_micros(1)), 1);
        assert_eq!(poll_millis(Duration::from_millis(250)), 250);
        assert_eq!(poll_millis(Duration::from_secs(u64::MAX / 1000)), i32::MAX);
    }

    #[test]
    fn pipe_read_write_close() {
        let (r, w) = sys_pipe().unwrap();
        assert_eq!(sys_write(w, b"ping").unwrap(), 4);
        let mut buf = [0u8; 8];
        assert_eq!(sys_read(r, &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"ping");
        sys_close(w).unwrap();
        assert_eq!(sys_read(r, &mut buf).unwrap(), 0);
        sys_close(r).unwrap();
        assert_eq!(sys_close(r), Err(errno::EBADF));
    }

    #[test]
    fn lseek_on_pipe_is_espipe() {
        let (r, w) = sys_pipe().unwrap();
        assert_eq!(sys_lseek(r, 0, libc::SEEK_CUR), Err(errno::ESPIPE));
        sys_close(r).unwrap();
        sys_close(w).unwrap();
    }
}
