// Run metrics
//
// Lightweight counters for the module outcomes of a single suite run

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Per-run metrics
///
/// Uses atomic operations so the recorder can update counters through a
/// shared reference without locks.
#[derive(Debug)]
pub struct RunMetrics {
    /// Modules whose error stream held only banner noise
    pub modules_succeeded: AtomicUsize,

    /// Modules recorded as failed
    pub modules_failed: AtomicUsize,

    /// Sum of module wall-clock times in milliseconds
    pub total_module_time_ms: AtomicU64,

    /// Run start time
    start_time: Instant,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            modules_succeeded: AtomicUsize::new(0),
            modules_failed: AtomicUsize::new(0),
            total_module_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_module_succeeded(&self) {
        self.modules_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_module_failed(&self) {
        self.modules_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_module_time(&self, duration: Duration) {
        self.total_module_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn succeeded(&self) -> usize {
        self.modules_succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.modules_failed.load(Ordering::Relaxed)
    }

    /// Time since the run started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average module time in milliseconds over all recorded modules
    pub fn avg_module_time_ms(&self) -> f64 {
        let total = self.total_module_time_ms.load(Ordering::Relaxed);
        let count = self.succeeded() + self.failed();
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Run Metrics Summary ===");
        tracing::info!("Elapsed: {:.2}s", self.elapsed().as_secs_f64());
        tracing::info!(
            "Modules: {} succeeded, {} failed",
            self.succeeded(),
            self.failed()
        );
        tracing::info!(
            "Total module time: {:.2}s (avg: {:.2}ms per module)",
            self.total_module_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_module_time_ms()
        );
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = RunMetrics::new();
        assert_eq!(metrics.succeeded(), 0);
        assert_eq!(metrics.failed(), 0);
    }

    #[test]
    fn test_record_module_outcomes() {
        let metrics = RunMetrics::new();

        metrics.record_module_succeeded();
        metrics.record_module_succeeded();
        metrics.record_module_failed();

        assert_eq!(metrics.succeeded(), 2);
        assert_eq!(metrics.failed(), 1);
    }

    #[test]
    fn test_avg_module_time() {
        let metrics = RunMetrics::new();

        metrics.record_module_succeeded();
        metrics.record_module_time(Duration::from_millis(100));
        metrics.record_module_failed();
        metrics.record_module_time(Duration::from_millis(200));

        assert_eq!(metrics.total_module_time_ms.load(Ordering::Relaxed), 300);
        assert_eq!(metrics.avg_module_time_ms(), 150.0);
    }

    #[test]
    fn test_avg_module_time_no_modules() {
        assert_eq!(RunMetrics::new().avg_module_time_ms(), 0.0);
    }

    #[test]
    fn test_elapsed() {
        let metrics = RunMetrics::new();
        thread::sleep(Duration::from_millis(10));
        assert!(metrics.elapsed().as_millis() >= 10);
    }
}
