//! fopen-style mode strings.

use layerio_core::{Access, EncodingSpec, Result, StreamError};

/// File open mode flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub readable: bool,
    pub writable: bool,
    pub append: bool,
    pub truncate: bool,
    pub create: bool,
    pub binary: bool,
    pub exclusive: bool,
    /// Encodings named after the first `:`.
    pub encoding: Option<EncodingSpec>,
}

impl OpenFlags {
    /// Directions a stream over this file may use.
    pub fn access(&self) -> Access {
        Access {
            read: self.readable,
            write: self.writable,
        }
    }

    /// POSIX `O_*` bits for `open(2)`.
    pub fn oflags(&self) -> i32 {
        let mut oflags = match (self.readable, self.writable) {
            (true, true) => libc::O_RDWR,
            (false, true) => libc::O_WRONLY,
            _ => libc::O_RDONLY,
        };
        if self.create {
            oflags |= libc::O_CREAT;
        }
        if self.truncate {
            oflags |= libc::O_TRUNC;
        }
        if self.append {
            oflags |= libc::O_APPEND;
        }
        if self.exclusive {
            oflags |= libc::O_EXCL;
        }
        oflags
    }
}

/// Parses a mode string such as `"r"`, `"w+"`, `"rb"` or `"a+b"`.
///
/// A base of `r`, `w` or `a` is followed by any of `+`, `b`, `x`, then
/// optionally `:` and an `"[BOM|]external[:internal]"` encoding string, as in
/// `"rb:utf-16le:utf-8"`.
pub fn parse_mode(mode: &str) -> Result<OpenFlags> {
    let invalid = || StreamError::InvalidArgument(format!("invalid access mode {mode}"));
    let (access, encoding) = match mode.split_once(':') {
        Some((access, encoding)) => (access, Some(encoding.parse::<EncodingSpec>()?)),
        None => (mode, None),
    };
    let mut chars = access.bytes();
    let mut flags = OpenFlags {
        encoding,
        ..OpenFlags::default()
    };
    match chars.next() {
        Some(b'r') => flags.readable = true,
        Some(b'w') => {
            flags.writable = true;
            flags.create = true;
            flags.truncate = true;
        }
        Some(b'a') => {
            flags.writable = true;
            flags.create = true;
            flags.append = true;
        }
        _ => return Err(invalid()),
    }
    for c in chars {
        match c {
            b'+' => {
                flags.readable = true;
                flags.writable = true;
            }
            b'b' => flags.binary = true,
            b'x' if flags.create => flags.exclusive = true,
            _ => return Err(invalid()),
        }
    }
    Ok(flags)
}
