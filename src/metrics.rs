//! Bridge metrics for monitoring and observability.
//!
//! This module provides counters for calls, lookups and writes crossing the
//! bridge, a snapshot type for reporting, and a Prometheus text export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Snapshot of a host session's statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStats {
    /// Host session ID
    pub session_id: String,

    /// When the host session started
    pub started_at: DateTime<Utc>,

    /// Total calls handled
    pub total_calls: u64,

    /// Calls that produced a payload
    pub successful_calls: u64,

    /// Calls that produced an error
    pub failed_calls: u64,

    /// Constant and variable lookups served
    pub lookups: u64,

    /// Guest variable writes
    pub variable_writes: u64,

    /// Guest writes stored as raw text
    pub raw_fallback_writes: u64,

    /// Average call time in microseconds
    pub avg_call_time_us: f64,

    /// Registered methods
    pub registered_methods: usize,
}

/// Metrics collector for a bridge host
pub struct BridgeMetrics {
    total_calls: AtomicU64,
    successful_calls: AtomicU64,
    failed_calls: AtomicU64,
    total_call_time_us: AtomicU64,
    lookups: AtomicU64,
    variable_writes: AtomicU64,
    raw_fallback_writes: AtomicU64,
    method_calls: parking_lot::Mutex<HashMap<String, u64>>,
    error_counts: parking_lot::Mutex<HashMap<String, u64>>,
}

impl BridgeMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            total_calls: AtomicU64::new(0),
            successful_calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
            total_call_time_us: AtomicU64::new(0),
            lookups: AtomicU64::new(0),
            variable_writes: AtomicU64::new(0),
            raw_fallback_writes: AtomicU64::new(0),
            method_calls: parking_lot::Mutex::new(HashMap::new()),
            error_counts: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Record a handled call. `error_kind` is set for failed calls.
    pub fn record_call(&self, method: &str, duration: Duration, error_kind: Option<&str>) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.total_call_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        match error_kind {
            None => {
                self.successful_calls.fetch_add(1, Ordering::Relaxed);
            }
            Some(kind) => {
                self.failed_calls.fetch_add(1, Ordering::Relaxed);
                *self.error_counts.lock().entry(kind.to_string()).or_insert(0) += 1;
            }
        }

        *self.method_calls.lock().entry(method.to_string()).or_insert(0) += 1;
    }

    /// Record a constant or variable lookup
    pub fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a guest variable write
    pub fn record_write(&self, raw_fallback: bool) {
        self.variable_writes.fetch_add(1, Ordering::Relaxed);
        if raw_fallback {
            self.raw_fallback_writes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get total calls
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    /// Get successful calls
    pub fn successful_calls(&self) -> u64 {
        self.successful_calls.load(Ordering::Relaxed)
    }

    /// Get failed calls
    pub fn failed_calls(&self) -> u64 {
        self.failed_calls.load(Ordering::Relaxed)
    }

    /// Get lookup count
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Get guest variable write count
    pub fn variable_writes(&self) -> u64 {
        self.variable_writes.load(Ordering::Relaxed)
    }

    /// Get raw fallback write count
    pub fn raw_fallback_writes(&self) -> u64 {
        self.raw_fallback_writes.load(Ordering::Relaxed)
    }

    /// Get average call time in microseconds
    pub fn avg_call_time_us(&self) -> f64 {
        let total = self.total_calls.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            self.total_call_time_us.load(Ordering::Relaxed) as f64 / total as f64
        }
    }

    /// Get per-method call counts
    pub fn method_calls(&self) -> HashMap<String, u64> {
        self.method_calls.lock().clone()
    }

    /// Get error counts by kind
    pub fn error_counts(&self) -> HashMap<String, u64> {
        self.error_counts.lock().clone()
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.total_calls.store(0, Ordering::Relaxed);
        self.successful_calls.store(0, Ordering::Relaxed);
        self.failed_calls.store(0, Ordering::Relaxed);
        self.total_call_time_us.store(0, Ordering::Relaxed);
        self.lookups.store(0, Ordering::Relaxed);
        self.variable_writes.store(0, Ordering::Relaxed);
        self.raw_fallback_writes.store(0, Ordering::Relaxed);
        self.method_calls.lock().clear();
        self.error_counts.lock().clear();
    }

    /// Export Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP bridge_calls_total Calls handled by the host\n");
        output.push_str("# TYPE bridge_calls_total counter\n");
        output.push_str(&format!(
            "bridge_calls_total{{status=\"success\"}} {}\n",
            self.successful_calls()
        ));
        output.push_str(&format!(
            "bridge_calls_total{{status=\"error\"}} {}\n",
            self.failed_calls()
        ));

        output.push_str("\n# HELP bridge_call_time_us Average call time\n");
        output.push_str("# TYPE bridge_call_time_us gauge\n");
        output.push_str(&format!(
            "bridge_call_time_us {:.2}\n",
            self.avg_call_time_us()
        ));

        output.push_str("\n# HELP bridge_lookups_total Constant and variable lookups\n");
        output.push_str("# TYPE bridge_lookups_total counter\n");
        output.push_str(&format!("bridge_lookups_total {}\n", self.lookups()));

        output.push_str("\n# HELP bridge_variable_writes_total Guest variable writes\n");
        output.push_str("# TYPE bridge_variable_writes_total counter\n");
        output.push_str(&format!(
            "bridge_variable_writes_total{{format=\"json\"}} {}\n",
            self.variable_writes()
                .saturating_sub(self.raw_fallback_writes())
        ));
        output.push_str(&format!(
            "bridge_variable_writes_total{{format=\"raw\"}} {}\n",
            self.raw_fallback_writes()
        ));

        output.push_str("\n# HELP bridge_method_calls_total Calls by method\n");
        output.push_str("# TYPE bridge_method_calls_total counter\n");
        for (name, count) in self.method_calls() {
            output.push_str(&format!(
                "bridge_method_calls_total{{method=\"{}\"}} {}\n",
                name, count
            ));
        }

        output.push_str("\n# HELP bridge_errors_total Error counts by type\n");
        output.push_str("# TYPE bridge_errors_total counter\n");
        for (kind, count) in self.error_counts() {
            output.push_str(&format!(
                "bridge_errors_total{{type=\"{}\"}} {}\n",
                kind, count
            ));
        }

        output
    }
}

impl Default for BridgeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer for measuring call duration
pub struct CallTimer {
    start: Instant,
}

impl CallTimer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_calls() {
        let metrics = BridgeMetrics::new();

        metrics.record_call("addItem", Duration::from_micros(10), None);
        metrics.record_call("addItem", Duration::from_micros(30), Some("ValueError"));
        metrics.record_call("missing", Duration::from_micros(2), Some("NoSuchMethod"));

        assert_eq!(metrics.total_calls(), 3);
        assert_eq!(metrics.successful_calls(), 1);
        assert_eq!(metrics.failed_calls(), 2);
        assert_eq!(metrics.method_calls().get("addItem"), Some(&2));
        assert_eq!(metrics.error_counts().get("NoSuchMethod"), Some(&1));
        assert!((metrics.avg_call_time_us() - 14.0).abs() < 0.01);
    }

    #[test]
    fn test_record_writes() {
        let metrics = BridgeMetrics::new();
        metrics.record_write(false);
        metrics.record_write(true);
        metrics.record_lookup();

        assert_eq!(metrics.variable_writes(), 2);
        assert_eq!(metrics.raw_fallback_writes(), 1);
        assert_eq!(metrics.lookups(), 1);
    }

    #[test]
    fn test_reset() {
        let metrics = BridgeMetrics::new();
        metrics.record_call("x", Duration::ZERO, Some("Panic"));
        metrics.reset();

        assert_eq!(metrics.total_calls(), 0);
        assert!(metrics.error_counts().is_empty());
        assert_eq!(metrics.avg_call_time_us(), 0.0);
    }

    #[test]
    fn test_prometheus_output() {
        let metrics = BridgeMetrics::new();
        metrics.record_call("getItems", Duration::from_micros(5), None);

        let output = metrics.to_prometheus();
        assert!(output.contains("bridge_calls_total{status=\"success\"} 1"));
        assert!(output.contains("bridge_method_calls_total{method=\"getItems\"} 1"));
        assert!(output.contains("bridge_lookups_total 0"));
    }

    #[test]
    fn test_prometheus_write_split_never_underflows() {
        let metrics = BridgeMetrics::new();
        // Raw count read ahead of the total, as a concurrent writer can cause
        metrics.raw_fallback_writes.fetch_add(1, Ordering::Relaxed);

        let output = metrics.to_prometheus();
        assert!(output.contains("bridge_variable_writes_total{format=\"json\"} 0"));
        assert!(output.contains("bridge_variable_writes_total{format=\"raw\"} 1"));
    }

    #[test]
    fn test_call_timer() {
        let timer = CallTimer::start();
        std::thread::sleep(Duration::from_millis(5));
        assert!(timer.elapsed() >= Duration::from_millis(5));
    }
}
