// src/config.rs

use std::fs;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::fuzzy::FALLBACK_DURATION_S;
use crate::scheduler::PASSAGE_RATIO;
use crate::types::Lane;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub control: ControlConfig,
    pub video: VideoConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file '{}'", path))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.detection.blur_kernel % 2 == 1,
            "detection.blur_kernel must be odd, got {}",
            self.detection.blur_kernel
        );
        ensure!(
            self.control.passage_ratio > 0.0 && self.control.passage_ratio <= 1.0,
            "control.passage_ratio must be in (0, 1], got {}",
            self.control.passage_ratio
        );
        ensure!(
            self.control.decision_interval_s > 0.0 && self.control.decision_interval_s <= 3600.0,
            "control.decision_interval_s must be in (0, 3600] seconds, got {}",
            self.control.decision_interval_s
        );

        let mut seen = [false; 4];
        for source in &self.video.sources {
            let idx = source.lane.index();
            ensure!(
                !seen[idx],
                "duplicate video source for lane {}",
                source.lane
            );
            seen[idx] = true;
        }
        Ok(())
    }
}

/// Motion-detection calibration. Defaults reproduce the 1920x1080 capture
/// geometry the detection line was tuned for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Expected capture width in pixels, used to size decoded frames.
    pub frame_width: usize,
    /// Expected capture height in pixels.
    pub frame_height: usize,
    /// Vertical position of the detection line, pixels from frame top.
    pub line_y: u32,
    /// Half-height of the counting band around the detection line.
    pub line_band_px: u32,
    /// Minimum bounding-box width for a candidate vehicle.
    pub min_blob_width: u32,
    /// Minimum bounding-box height for a candidate vehicle.
    pub min_blob_height: u32,
    /// Binary threshold applied to the blurred frame difference.
    pub diff_threshold: u8,
    /// Gaussian blur kernel size, odd.
    pub blur_kernel: usize,
    /// Delay between frames in milliseconds, 0 to run unthrottled.
    pub frame_interval_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            frame_width: 1920,
            frame_height: 1080,
            line_y: 550,
            line_band_px: 10,
            min_blob_width: 40,
            min_blob_height: 40,
            diff_threshold: 20,
            blur_kernel: 5,
            frame_interval_ms: 33,
        }
    }
}

/// Scheduling knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Fraction of the priority lane's queue assumed to clear per green.
    pub passage_ratio: f64,
    /// Duration reported when fuzzy inference degenerates.
    pub fallback_duration_s: f64,
    /// Seconds between scheduling decisions, at most one hour.
    pub decision_interval_s: f64,
    /// Stop after this many decisions, 0 to run until sources end.
    pub max_ticks: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            passage_ratio: PASSAGE_RATIO,
            fallback_duration_s: FALLBACK_DURATION_S,
            decision_interval_s: 5.0,
            max_ticks: 0,
        }
    }
}

/// Per-lane video inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// One entry per sensed lane; lanes without an entry stay at count 0.
    pub sources: Vec<LaneSource>,
    /// Frame rate used to derive timestamps from frame numbers.
    pub source_fps: f64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            source_fps: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneSource {
    pub lane: Lane,
    /// Directory of frame images, or a video file decoded through ffmpeg.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// File receiving one JSON line per scheduling decision.
    pub decisions_path: String,
    /// Disable to skip the decisions file entirely.
    pub write_decisions: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            decisions_path: "decisions.jsonl".to_string(),
            write_decisions: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "greenwave=info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_reproduce_field_calibration() {
        let config = Config::default();
        assert_eq!(config.detection.line_y, 550);
        assert_eq!(config.detection.line_band_px, 10);
        assert_eq!(config.detection.min_blob_width, 40);
        assert_eq!(config.detection.diff_threshold, 20);
        assert_eq!(config.control.passage_ratio, 0.8);
        assert_eq!(config.control.fallback_duration_s, 30.0);
    }

    #[test]
    fn test_load_accepts_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "control:\n  decision_interval_s: 2.5\nvideo:\n  sources:\n    - lane: B\n      path: data/lane_b"
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.control.decision_interval_s, 2.5);
        assert_eq!(config.control.max_ticks, 0);
        assert_eq!(config.video.sources.len(), 1);
        assert_eq!(config.video.sources[0].lane, Lane::B);
        assert_eq!(config.detection.line_y, 550);
    }

    #[test]
    fn test_load_rejects_unknown_lanes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "video:\n  sources:\n    - lane: X\n      path: data/x").unwrap();

        let err = Config::load(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_load_rejects_duplicate_lane_sources() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "video:\n  sources:\n    - lane: A\n      path: one\n    - lane: A\n      path: two"
        )
        .unwrap();

        let err = Config::load(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("duplicate video source"));
    }

    #[test]
    fn test_load_rejects_even_blur_kernel() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "detection:\n  blur_kernel: 4").unwrap();

        let err = Config::load(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("blur_kernel"));
    }

    #[test]
    fn test_load_rejects_oversized_decision_interval() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "control:\n  decision_interval_s: 1.0e20").unwrap();

        let err = Config::load(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("decision_interval_s"));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Config::load("definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("definitely/not/here.yaml"));
    }
}
