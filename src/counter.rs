// src/counter.rs
//
// Per-lane counting worker: reads frames, finds candidate vehicles in the
// motion, counts the ones inside the detection band, and publishes the
// cumulative count after every frame.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::DetectionConfig;
use crate::counts::LaneCountStore;
use crate::metrics::ControllerMetrics;
use crate::motion::MotionDetector;
use crate::types::Lane;
use crate::video::{self, VideoSource};

/// Open the lane's source and run a counter over it to completion. Open
/// failures stay local to the lane: log, bump a metric, count nothing.
pub fn run_lane(
    lane: Lane,
    path: &Path,
    detection: &DetectionConfig,
    fps: f64,
    store: LaneCountStore,
    metrics: ControllerMetrics,
    cancel: Arc<AtomicBool>,
) -> u32 {
    let source = match video::open_source(path, detection, fps) {
        Ok(source) => source,
        Err(e) => {
            error!("lane {}: cannot open {}: {}", lane, path.display(), e);
            metrics.inc(&metrics.streams_failed);
            return 0;
        }
    };
    MotionVehicleCounter::new(lane, source, detection, store, metrics, cancel).run()
}

pub struct MotionVehicleCounter {
    lane: Lane,
    source: Box<dyn VideoSource>,
    detector: MotionDetector,
    store: LaneCountStore,
    metrics: ControllerMetrics,
    cancel: Arc<AtomicBool>,
    line_y: i64,
    band: i64,
    frame_interval: Duration,
    count: u32,
}

impl MotionVehicleCounter {
    pub fn new(
        lane: Lane,
        source: Box<dyn VideoSource>,
        detection: &DetectionConfig,
        store: LaneCountStore,
        metrics: ControllerMetrics,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            lane,
            source,
            detector: MotionDetector::new(detection.clone()),
            store,
            metrics,
            cancel,
            line_y: i64::from(detection.line_y),
            band: i64::from(detection.line_band_px),
            frame_interval: Duration::from_millis(detection.frame_interval_ms),
            count: 0,
        }
    }

    /// Process the stream until it ends, fails, or cancellation is raised.
    /// Returns the final cumulative count.
    pub fn run(mut self) -> u32 {
        let label = self.source.label().to_string();
        info!("lane {}: counting from {}", self.lane, label);
        let mut frames: u64 = 0;

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                info!(
                    "lane {}: cancelled after {} frames, count {}",
                    self.lane, frames, self.count
                );
                break;
            }

            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    if frames == 0 {
                        warn!("lane {}: {} yielded no frames", self.lane, label);
                        self.metrics.inc(&self.metrics.streams_failed);
                    } else {
                        info!(
                            "lane {}: stream ended after {} frames, final count {}",
                            self.lane, frames, self.count
                        );
                    }
                    break;
                }
                Err(e) => {
                    warn!(
                        "lane {}: stream failed after {} frames: {}",
                        self.lane, frames, e
                    );
                    self.metrics.inc(&self.metrics.streams_failed);
                    break;
                }
            };

            for (x, y) in self.detector.process(frame) {
                if self.in_band(y) {
                    self.count += 1;
                    self.metrics.inc(&self.metrics.vehicles_counted);
                    debug!(
                        "lane {}: vehicle {} crossed at ({}, {})",
                        self.lane, self.count, x, y
                    );
                }
            }

            // Overwrite, never increment: readers always see the latest
            // cumulative estimate.
            self.store.set(self.lane, self.count);
            frames += 1;
            self.metrics.inc(&self.metrics.frames_processed);

            if !self.frame_interval.is_zero() {
                thread::sleep(self.frame_interval);
            }
        }
        self.count
    }

    fn in_band(&self, y: u32) -> bool {
        let y = i64::from(y);
        y > self.line_y - self.band && y < self.line_y + self.band
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VideoError;
    use crate::types::Frame;
    use std::collections::VecDeque;
    use std::sync::atomic::Ordering;

    struct ScriptedSource {
        steps: VecDeque<Result<Option<Frame>, VideoError>>,
    }

    impl ScriptedSource {
        fn of_frames(frames: Vec<Frame>) -> Box<Self> {
            Box::new(Self {
                steps: frames.into_iter().map(|f| Ok(Some(f))).collect(),
            })
        }

        fn failing() -> Box<Self> {
            let mut steps = VecDeque::new();
            steps.push_back(Err(VideoError::StreamUnavailable("scripted".to_string())));
            Box::new(Self { steps })
        }
    }

    impl VideoSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, VideoError> {
            self.steps.pop_front().unwrap_or(Ok(None))
        }

        fn label(&self) -> &str {
            "scripted"
        }
    }

    fn test_config() -> DetectionConfig {
        DetectionConfig {
            line_y: 45,
            line_band_px: 10,
            frame_interval_ms: 0,
            ..DetectionConfig::default()
        }
    }

    fn black_frame() -> Frame {
        Frame {
            data: vec![0u8; 100 * 100 * 3],
            width: 100,
            height: 100,
            timestamp: 0.0,
        }
    }

    fn square_frame() -> Frame {
        // 50px square whose motion centroid lands at (45, 45).
        let mut frame = black_frame();
        for y in 20..70 {
            for x in 20..70 {
                let idx = (y * 100 + x) * 3;
                frame.data[idx] = 255;
                frame.data[idx + 1] = 255;
                frame.data[idx + 2] = 255;
            }
        }
        frame
    }

    fn counter_with(
        source: Box<dyn VideoSource>,
        config: DetectionConfig,
    ) -> (MotionVehicleCounter, LaneCountStore, ControllerMetrics) {
        let store = LaneCountStore::new();
        let metrics = ControllerMetrics::new();
        let counter = MotionVehicleCounter::new(
            Lane::A,
            source,
            &config,
            store.clone(),
            metrics.clone(),
            Arc::new(AtomicBool::new(false)),
        );
        (counter, store, metrics)
    }

    #[test]
    fn test_appearing_and_vanishing_motion_in_band_is_counted() {
        let frames = vec![black_frame(), square_frame(), square_frame(), black_frame()];
        let (counter, store, metrics) =
            counter_with(ScriptedSource::of_frames(frames), test_config());

        let final_count = counter.run();

        assert_eq!(final_count, 2);
        assert_eq!(store.get(Lane::A), 2);
        assert_eq!(metrics.frames_processed.load(Ordering::Relaxed), 4);
        assert_eq!(metrics.vehicles_counted.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_motion_outside_band_is_not_counted() {
        let config = DetectionConfig {
            line_y: 500,
            ..test_config()
        };
        let frames = vec![black_frame(), square_frame()];
        let (counter, store, _) = counter_with(ScriptedSource::of_frames(frames), config);

        assert_eq!(counter.run(), 0);
        assert_eq!(store.get(Lane::A), 0);
    }

    #[test]
    fn test_failing_stream_keeps_last_published_count() {
        let (counter, store, metrics) = counter_with(ScriptedSource::failing(), test_config());

        assert_eq!(counter.run(), 0);
        assert_eq!(store.get(Lane::A), 0);
        assert_eq!(metrics.streams_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.frames_processed.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_empty_stream_counts_as_failed() {
        let (counter, _, metrics) =
            counter_with(ScriptedSource::of_frames(Vec::new()), test_config());

        assert_eq!(counter.run(), 0);
        assert_eq!(metrics.streams_failed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_cancellation_stops_worker_before_next_frame() {
        let frames = vec![black_frame(), square_frame(), black_frame()];
        let store = LaneCountStore::new();
        let metrics = ControllerMetrics::new();
        let cancel = Arc::new(AtomicBool::new(true));
        let counter = MotionVehicleCounter::new(
            Lane::B,
            ScriptedSource::of_frames(frames),
            &test_config(),
            store.clone(),
            metrics.clone(),
            cancel,
        );

        assert_eq!(counter.run(), 0);
        assert_eq!(metrics.frames_processed.load(Ordering::Relaxed), 0);
    }
}
