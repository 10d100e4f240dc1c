//! Structured logging for stream layers.
//!
//! Records are canonical JSONL lines ([`LogEntry`]). Nothing is written
//! until a [`LogSink`] is installed with [`install_sink`]; the level
//! threshold defaults from `LAYERIO_LOG` (see [`crate::config::log_level`]).
//!
//! ```ignore
//! use layerio_core::log::{self, LogLevel, MemorySink};
//!
//! let sink = MemorySink::default();
//! log::install_sink(Box::new(sink.clone()));
//! log::set_level(Some(LogLevel::Trace));
//! ```

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse from string (case-insensitive). `None` means logging is off.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    const fn to_u8(self) -> u8 {
        match self {
            Self::Trace => 0,
            Self::Debug => 1,
            Self::Info => 2,
            Self::Warn => 3,
            Self::Error => 4,
        }
    }
}

/// Canonical structured log entry.
///
/// Required fields: `timestamp`, `level`, `event`. The rest describe the
/// transport and operation involved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fd: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errno: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    /// Create a new log entry with required fields only.
    #[must_use]
    pub fn new(level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            level,
            event: event.into(),
            fd: None,
            bytes: None,
            errno: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_fd(mut self, fd: Option<i32>) -> Self {
        self.fd = fd;
        self
    }

    #[must_use]
    pub fn with_bytes(mut self, bytes: usize) -> Self {
        self.bytes = Some(bytes as u64);
        self
    }

    #[must_use]
    pub fn with_errno(mut self, errno: i32) -> Self {
        self.errno = Some(errno);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Hand the entry to the installed sink, if its level passes.
    pub fn emit(self) {
        if !enabled(self.level) {
            return;
        }
        if let Some(sink) = SINK.read().as_ref() {
            if let Ok(line) = self.to_jsonl() {
                sink.write_line(&line);
            }
        }
    }
}

/// Destination for JSONL log lines.
pub trait LogSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Writes JSONL lines to any writer (file, stderr).
pub struct JsonlSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> LogSink for JsonlSink<W> {
    fn write_line(&self, line: &str) {
        let mut writer = self.writer.lock();
        // A failing log writer must not disturb the stream being logged.
        let _ = writeln!(writer, "{line}");
    }
}

/// Collects lines in memory (for tests and the harness).
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Parsed entries whose event equals `event`.
    #[must_use]
    pub fn events(&self, event: &str) -> Vec<LogEntry> {
        self.lines
            .lock()
            .iter()
            .filter_map(|l| serde_json::from_str::<LogEntry>(l).ok())
            .filter(|e| e.event == event)
            .collect()
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) {
        self.lines.lock().push(line.to_owned());
    }
}

const LEVEL_UNSET: u8 = u8::MAX - 1;
const LEVEL_OFF: u8 = u8::MAX;

static SINK: RwLock<Option<Box<dyn LogSink>>> = RwLock::new(None);
static LEVEL: AtomicU8 = AtomicU8::new(LEVEL_UNSET);

/// Install the process-wide sink, replacing any previous one.
pub fn install_sink(sink: Box<dyn LogSink>) {
    *SINK.write() = Some(sink);
}

/// Remove the installed sink.
pub fn clear_sink() {
    *SINK.write() = None;
}

/// Override the level threshold (`None` turns logging off).
pub fn set_level(level: Option<LogLevel>) {
    LEVEL.store(level.map_or(LEVEL_OFF, LogLevel::to_u8), Ordering::Relaxed);
}

fn threshold() -> u8 {
    let raw = LEVEL.load(Ordering::Relaxed);
    if raw != LEVEL_UNSET {
        return raw;
    }
    crate::config::log_level().map_or(LEVEL_OFF, LogLevel::to_u8)
}

/// True when an entry at `level` would be written.
#[must_use]
pub fn enabled(level: LogLevel) -> bool {
    level.to_u8() >= threshold() && SINK.read().is_some()
}

/// Shorthand for building an entry only when it would be written.
pub(crate) fn event(level: LogLevel, name: &str, build: impl FnOnce(LogEntry) -> LogEntry) {
    if enabled(level) {
        build(LogEntry::new(level, name)).emit();
    }
}

fn now_utc() -> String {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = duration.as_secs();
    let (year, month, day) = civil_from_days((secs / 86_400) as i64);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{:03}Z",
        (secs % 86_400) / 3_600,
        (secs % 3_600) / 60,
        secs % 60,
        duration.subsec_millis(),
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
