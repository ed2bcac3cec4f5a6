// src/motion/mod.rs
//
// Frame-differencing motion detector: moving parts of the scene become
// blobs, blobs big enough to be vehicles become candidates.

pub mod blobs;
pub mod ops;

use tracing::warn;

use crate::config::DetectionConfig;
use crate::types::Frame;
use blobs::Blob;

const DILATE_KERNEL: usize = 3;
const CLOSE_KERNEL: usize = 2;

pub struct MotionDetector {
    config: DetectionConfig,
    prev: Option<Frame>,
}

impl MotionDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config, prev: None }
    }

    /// Feed the next frame. Returns the centroids of candidate vehicles in
    /// the motion between this frame and the previous one; the first frame
    /// only primes the detector.
    pub fn process(&mut self, frame: Frame) -> Vec<(u32, u32)> {
        let Some(prev) = self.prev.take() else {
            self.prev = Some(frame);
            return Vec::new();
        };

        if prev.width != frame.width || prev.height != frame.height {
            warn!(
                "frame size changed from {}x{} to {}x{}, resynchronizing",
                prev.width, prev.height, frame.width, frame.height
            );
            self.prev = Some(frame);
            return Vec::new();
        }

        let candidates = self.detect(&prev, &frame);
        self.prev = Some(frame);
        candidates
    }

    fn detect(&self, prev: &Frame, frame: &Frame) -> Vec<(u32, u32)> {
        let width = frame.width;
        let height = frame.height;

        let diff = ops::absdiff(&prev.data, &frame.data);
        let gray = ops::rgb_to_gray(&diff);
        let blurred = ops::gaussian_blur(&gray, width, height, self.config.blur_kernel);
        let mask = ops::threshold(&blurred, self.config.diff_threshold);
        let mask = ops::dilate(&mask, width, height, DILATE_KERNEL, DILATE_KERNEL);
        let mask = ops::close(&mask, width, height, CLOSE_KERNEL, CLOSE_KERNEL);

        blobs::connected_components(&mask, width, height)
            .into_iter()
            .filter(|blob| self.is_vehicle(blob))
            .map(|blob| blob.centroid())
            .collect()
    }

    fn is_vehicle(&self, blob: &Blob) -> bool {
        blob.width >= self.config.min_blob_width && blob.height >= self.config.min_blob_height
    }
}
