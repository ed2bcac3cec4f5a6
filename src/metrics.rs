// src/metrics.rs
//
// Controller observability. Tracks frame, vehicle, and tick counts
// across all lane workers. Logged as a summary at shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ControllerMetrics {
    pub frames_processed: Arc<AtomicU64>,
    pub vehicles_counted: Arc<AtomicU64>,
    pub ticks_executed: Arc<AtomicU64>,
    pub fallback_durations: Arc<AtomicU64>,
    pub streams_failed: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ControllerMetrics {
    pub fn new() -> Self {
        Self {
            frames_processed: Arc::new(AtomicU64::new(0)),
            vehicles_counted: Arc::new(AtomicU64::new(0)),
            ticks_executed: Arc::new(AtomicU64::new(0)),
            fallback_durations: Arc::new(AtomicU64::new(0)),
            streams_failed: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.frames_processed.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            fps: self.fps(),
            vehicles_counted: self.vehicles_counted.load(Ordering::Relaxed),
            ticks_executed: self.ticks_executed.load(Ordering::Relaxed),
            fallback_durations: self.fallback_durations.load(Ordering::Relaxed),
            streams_failed: self.streams_failed.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub frames_processed: u64,
    pub fps: f64,
    pub vehicles_counted: u64,
    pub ticks_executed: u64,
    pub fallback_durations: u64,
    pub streams_failed: u64,
    pub elapsed_secs: f64,
}
