//! Atomic counters for stream observability.
//!
//! All counters use relaxed ordering; they are diagnostic, not
//! synchronization primitives.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide I/O counters.
pub struct IoMetrics {
    /// Transport reads issued to fill a read buffer.
    pub fills: AtomicU64,
    /// Write-buffer flushes that reached the transport.
    pub flushes: AtomicU64,
    /// Bytes delivered by transports.
    pub bytes_read: AtomicU64,
    /// Bytes accepted by transports.
    pub bytes_written: AtomicU64,
    /// Readiness waits performed by the retry layer.
    pub would_block_waits: AtomicU64,
    /// WouldBlock results handed back to non-blocking callers.
    pub would_block_returns: AtomicU64,
    /// Seeks honored (buffered and sys).
    pub seeks: AtomicU64,
    /// Successful `reopen` swaps.
    pub reopens: AtomicU64,
}

impl IoMetrics {
    /// Create a new zeroed metrics instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fills: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            would_block_waits: AtomicU64::new(0),
            would_block_returns: AtomicU64::new(0),
            seeks: AtomicU64::new(0),
            reopens: AtomicU64::new(0),
        }
    }

    /// Increment a counter by 1.
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Add `n` to a counter.
    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Read a counter value.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fills: Self::get(&self.fills),
            flushes: Self::get(&self.flushes),
            bytes_read: Self::get(&self.bytes_read),
            bytes_written: Self::get(&self.bytes_written),
            would_block_waits: Self::get(&self.would_block_waits),
            would_block_returns: Self::get(&self.would_block_returns),
            seeks: Self::get(&self.seeks),
            reopens: Self::get(&self.reopens),
        }
    }
}

impl Default for IoMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`IoMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub fills: u64,
    pub flushes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub would_block_waits: u64,
    pub would_block_returns: u64,
    pub seeks: u64,
    pub reopens: u64,
}

impl MetricsSnapshot {
    /// Counter growth since an earlier snapshot.
    #[must_use]
    pub fn since(&self, earlier: &Self) -> Self {
        Self {
            fills: self.fills.saturating_sub(earlier.fills),
            flushes: self.flushes.saturating_sub(earlier.flushes),
            bytes_read: self.bytes_read.saturating_sub(earlier.bytes_read),
            bytes_written: self.bytes_written.saturating_sub(earlier.bytes_written),
            would_block_waits: self.would_block_waits.saturating_sub(earlier.would_block_waits),
            would_block_returns: self
                .would_block_returns
                .saturating_sub(earlier.would_block_returns),
            seeks: self.seeks.saturating_sub(earlier.seeks),
            reopens: self.reopens.saturating_sub(earlier.reopens),
        }
    }
}

/// Global counters shared by every stream in the process.
pub static METRICS: IoMetrics = IoMetrics::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let m = IoMetrics::new();
        IoMetrics::inc(&m.fills);
        IoMetrics::inc(&m.fills);
        IoMetrics::add(&m.bytes_read, 42);
        let snap = m.snapshot();
        assert_eq!(snap.fills, 2);
        assert_eq!(snap.bytes_read, 42);
        assert_eq!(snap.flushes, 0);
    }

    #[test]
    fn since_is_a_delta() {
        let m = IoMetrics::new();
        IoMetrics::add(&m.bytes_written, 10);
        let before = m.snapshot();
        IoMetrics::add(&m.bytes_written, 5);
        assert_eq!(m.snapshot().since(&before).bytes_written, 5);
    }

    #[test]
    fn snapshot_serializes() {
        let json = serde_json::to_value(IoMetrics::new().snapshot()).unwrap();
        assert_eq!(json["reopens"], 0);
    }
}
