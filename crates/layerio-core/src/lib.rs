//! # layerio-core
//!
//! Buffered, duplexed, encoding-aware streams built over any transport that
//! only offers raw read/write/seek/close primitives.
//!
//! Layers, leaf first: [`transport`] → [`retry`] → [`buffer`] → [`chars`]
//! → [`pipeline`] → [`duplex`] → [`stream`]. No `unsafe` code is permitted
//! at the crate level; OS descriptors live in `layerio-sys`.

#![deny(unsafe_code)]

pub mod buffer;
pub mod chars;
pub mod config;
pub mod duplex;
pub mod encoding;
pub mod errno;
pub mod error;
pub mod log;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod stream;
pub mod transport;

pub use buffer::{BUFSIZ, BufMode};
pub use chars::{LineOptions, Separator};
pub use config::StreamConfig;
pub use duplex::{Duplex, DuplexState};
pub use encoding::{Encoding, EncodingSpec};
pub use error::{Result, StreamError};
pub use metrics::{METRICS, MetricsSnapshot};
pub use pipeline::Pipeline;
pub use stream::Stream;
pub use transport::{
    Access, BoxedTransport, Direction, Interest, Io, Transport, TransportStat, Whence,
};
