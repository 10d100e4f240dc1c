//! Stream configuration.
//!
//! Formatting and buffering defaults are passed to each stream explicitly as
//! a [`StreamConfig`]; nothing in the layers reads process-wide state.
//! [`StreamConfig::from_env`] seeds a config from environment variables,
//! read once and cached:
//!
//! - `LAYERIO_BUFSIZ`: buffer size in bytes (default 8192).
//! - `LAYERIO_EXTERNAL_ENCODING`, `LAYERIO_INTERNAL_ENCODING`: encoding names.
//! - `LAYERIO_SYNC`: `1`/`true` disables write batching.
//! - `LAYERIO_LOG`: log threshold (`trace`..`error`, anything else is off).

use std::sync::OnceLock;
use std::time::Duration;

use crate::buffer::{BUFSIZ, BufMode};
use crate::chars::Separator;
use crate::encoding::Encoding;
use crate::log::LogLevel;

/// Per-stream configuration, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Capacity of each byte buffer and size of each transport read.
    pub buffer_size: usize,
    /// Write buffering; `None` picks line buffering for terminals and full
    /// buffering otherwise.
    pub buf_mode: Option<BufMode>,
    /// Flush after every write.
    pub sync: bool,
    /// Separator used by `gets` when none is given.
    pub input_separator: Separator,
    /// Appended by `print` after its arguments.
    pub output_separator: Option<Vec<u8>>,
    /// Encoding of the bytes on the transport; `None` means UTF-8, or
    /// ASCII-8BIT in binmode.
    pub external_encoding: Option<Encoding>,
    /// Encoding reads are transcoded into (and writes from).
    pub internal_encoding: Option<Encoding>,
    /// Binary mode: no encoding conversion, ASCII-8BIT external encoding.
    pub binmode: bool,
    /// Upper bound on each blocking readiness wait.
    pub timeout: Option<Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: BUFSIZ,
            buf_mode: None,
            sync: false,
            input_separator: Separator::default(),
            output_separator: None,
            external_encoding: None,
            internal_encoding: None,
            binmode: false,
            timeout: None,
        }
    }
}

impl StreamConfig {
    /// Default configuration with environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let env = env_overrides();
        let mut config = Self::default();
        if let Some(size) = env.buffer_size {
            config.buffer_size = size;
        }
        config.external_encoding = env.external_encoding.or(config.external_encoding);
        config.internal_encoding = env.internal_encoding.or(config.internal_encoding);
        config.sync |= env.sync;
        config
    }

    /// Binary-mode configuration.
    #[must_use]
    pub fn binary() -> Self {
        Self {
            binmode: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    #[must_use]
    pub fn with_buf_mode(mut self, mode: BufMode) -> Self {
        self.buf_mode = Some(mode);
        self
    }

    #[must_use]
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    #[must_use]
    pub fn with_encoding(mut self, external: Encoding, internal: Option<Encoding>) -> Self {
        self.external_encoding = Some(external);
        self.internal_encoding = internal;
        self
    }

    #[must_use]
    pub fn with_input_separator(mut self, separator: Separator) -> Self {
        self.input_separator = separator;
        self
    }

    #[must_use]
    pub fn with_output_separator(mut self, separator: impl Into<Vec<u8>>) -> Self {
        self.output_separator = Some(separator.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// External encoding after applying the binmode default.
    #[must_use]
    pub fn effective_external(&self) -> Encoding {
        match self.external_encoding {
            Some(enc) => enc,
            None if self.binmode => Encoding::Binary,
            None => Encoding::Utf8,
        }
    }

    /// Write buffering mode for a transport (`terminal` picks line mode).
    #[must_use]
    pub fn effective_buf_mode(&self, terminal: bool) -> BufMode {
        if self.sync {
            return BufMode::None;
        }
        match self.buf_mode {
            Some(mode) => mode,
            None if terminal => BufMode::Line,
            None => BufMode::Full,
        }
    }
}

#[derive(Debug, Default)]
struct EnvOverrides {
    buffer_size: Option<usize>,
    external_encoding: Option<Encoding>,
    internal_encoding: Option<Encoding>,
    sync: bool,
    log_level: Option<LogLevel>,
}

fn parse_overrides(get: impl Fn(&str) -> Option<String>) -> EnvOverrides {
    EnvOverrides {
        buffer_size: get("LAYERIO_BUFSIZ")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0),
        external_encoding: get("LAYERIO_EXTERNAL_ENCODING").and_then(|v| v.parse().ok()),
        internal_encoding: get("LAYERIO_INTERNAL_ENCODING").and_then(|v| v.parse().ok()),
        sync: get("LAYERIO_SYNC")
            .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
        log_level: get("LAYERIO_LOG").and_then(|v| LogLevel::from_str_loose(&v)),
    }
}

fn env_overrides() -> &'static EnvOverrides {
    static OVERRIDES: OnceLock<EnvOverrides> = OnceLock::new();
    OVERRIDES.get_or_init(|| parse_overrides(|key| std::env::var(key).ok()))
}

/// Log threshold configured through `LAYERIO_LOG` (reads env on first call).
#[must_use]
pub fn log_level() -> Option<LogLevel> {
    env_overrides().log_level
}
