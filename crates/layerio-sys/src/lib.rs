//! # layerio-sys
//!
//! Transport adapter for OS file descriptors. Everything that touches a raw
//! descriptor lives here so `layerio-core` can stay free of `unsafe`.
//!
//! - [`FdTransport`]: one owned descriptor (file, pipe end, socket).
//! - [`open`]: path + fopen mode string → stream.
//! - [`pipe`], [`socketpair`]: connected descriptor pairs.
//! - [`popen`]: child process as a split duplex stream.

pub mod fd;
pub mod mode;
pub mod pipe;
pub mod process;
mod syscall;

pub use fd::{FdTransport, open};
pub use mode::{OpenFlags, parse_mode};
pub use pipe::{pipe, socketpair};
pub use process::{ProcessStream, popen};
