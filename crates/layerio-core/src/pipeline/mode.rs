use std::time::Duration;

use crate::buffer::BufMode;
use crate::config::StreamConfig;
use crate::encoding::{Encoding, Transcoder};
use crate::transport::Access;

/// Mode flags shared by every layer of one pipeline.
///
/// Owned by the [`Pipeline`](super::Pipeline); layers receive it by shared
/// reference. The setters are reachable only through the pipeline's
/// mutation methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeState {
    access: Access,
    nonblocking: bool,
    buf_mode: BufMode,
    closed: bool,
    external: Encoding,
    internal: Option<Encoding>,
    timeout: Option<Duration>,
}

impl ModeState {
    /// Initial mode for a pipeline over a transport (`terminal` selects
    /// line buffering when the config leaves the mode open).
    #[must_use]
    pub fn new(access: Access, config: &StreamConfig, terminal: bool) -> Self {
        Self {
            access,
            nonblocking: false,
            buf_mode: config.effective_buf_mode(terminal),
            closed: false,
            external: config.effective_external(),
            internal: config.internal_encoding,
            timeout: config.timeout,
        }
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking
    }

    pub fn buf_mode(&self) -> BufMode {
        self.buf_mode
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn external(&self) -> Encoding {
        self.external
    }

    pub fn internal(&self) -> Option<Encoding> {
        self.internal
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Encoding of the characters handed to callers.
    pub fn read_encoding(&self) -> Encoding {
        match self.read_transcoder() {
            Some(conv) => conv.target(),
            None => self.external,
        }
    }

    /// Converter from transport bytes to caller characters, if any.
    pub fn read_transcoder(&self) -> Option<Transcoder> {
        self.internal
            .and_then(|internal| Transcoder::new(self.external, internal))
    }

    /// Converter from caller characters to transport bytes, if any.
    pub fn write_transcoder(&self) -> Option<Transcoder> {
        self.read_transcoder().map(|conv| conv.reverse())
    }

    pub(super) fn set_nonblocking(&mut self, nonblocking: bool) {
        self.nonblocking = nonblocking;
    }

    pub(super) fn set_buf_mode(&mut self, mode: BufMode) {
        self.buf_mode = mode;
    }

    pub(super) fn set_encoding(&mut self, external: Encoding, internal: Option<Encoding>) {
        self.external = external;
        self.internal = internal;
    }

    pub(super) fn mark_closed(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_config() {
        let mode = ModeState::new(Access::READ, &StreamConfig::default(), false);
        assert_eq!(mode.buf_mode(), BufMode::Full);
        assert_eq!(mode.external(), Encoding::Utf8);
        assert_eq!(mode.read_encoding(), Encoding::Utf8);
        assert!(mode.read_transcoder().is_none());
        assert!(!mode.is_closed());
    }

    #[test]
    fn transcoders_follow_encodings() {
        let config = StreamConfig::default().with_encoding(Encoding::Utf16Le, Some(Encoding::Utf8));
        let mode = ModeState::new(Access::READ_WRITE, &config, true);
        assert_eq!(mode.buf_mode(), BufMode::Line);
        assert_eq!(mode.read_encoding(), Encoding::Utf8);
        let write = mode.write_transcoder().unwrap();
        assert_eq!(write.source(), Encoding::Utf8);
        assert_eq!(write.target(), Encoding::Utf16Le);
    }

    #[test]
    fn binary_external_disables_conversion() {
        let config = StreamConfig::binary().with_encoding(Encoding::Binary, Some(Encoding::Utf8));
        let mode = ModeState::new(Access::READ, &config, false);
        assert!(mode.read_transcoder().is_none());
        assert_eq!(mode.read_encoding(), Encoding::Binary);
    }
}
