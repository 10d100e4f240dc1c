//! Command-line driver for layerio streams.
//!
//! This crate provides:
//! - Line splitting: report every line of a file under given line options
//! - BOM sniffing: report the encoding announced by a byte-order mark
//! - Buffered copy: copy a file through two streams and report metrics
//!
//! Each command returns a serializable report; the `harness` binary prints
//! them as JSON.

#![forbid(unsafe_code)]

pub mod commands;
pub mod error;
pub mod report;

pub use commands::{LinesRequest, bom, copy, lines};
pub use error::HarnessError;
pub use report::{BomReport, CopyReport, LineRecord, LinesReport};
