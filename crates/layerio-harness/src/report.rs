//! Serializable command reports.

use serde::Serialize;

use layerio_core::MetricsSnapshot;

/// One line as read from the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineRecord {
    /// Line number after this line was read.
    pub lineno: u64,
    /// Lossy UTF-8 rendering of the line.
    pub text: String,
    /// Length of the line in bytes (caller encoding).
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinesReport {
    pub path: String,
    pub external_encoding: String,
    pub internal_encoding: Option<String>,
    pub lines: Vec<LineRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BomReport {
    pub path: String,
    /// Encoding named by the mark, `None` when there is no mark.
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CopyReport {
    pub source: String,
    pub destination: String,
    pub bytes: u64,
    /// Counter growth during the copy.
    pub metrics: MetricsSnapshot,
}

/// Renders any report as pretty JSON.
pub fn to_json<T: Serialize>(report: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
