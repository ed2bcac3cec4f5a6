// src/video.rs
//
// Frame acquisition behind one trait: a directory of still frames for
// development and tests, or a real video file decoded by ffmpeg.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::DetectionConfig;
use crate::error::VideoError;
use crate::types::Frame;

const FRAME_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// A stream of decoded RGB frames. End of stream is `Ok(None)`.
pub trait VideoSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>, VideoError>;

    /// Human-readable source name for logs.
    fn label(&self) -> &str;
}

/// Open `path` as a frame source: a directory is read as sorted image
/// files, a file is decoded through ffmpeg.
pub fn open_source(
    path: &Path,
    detection: &DetectionConfig,
    fps: f64,
) -> Result<Box<dyn VideoSource>, VideoError> {
    if path.is_dir() {
        Ok(Box::new(FrameDirectorySource::open(path, fps)?))
    } else if path.is_file() {
        Ok(Box::new(FfmpegPipeSource::open(
            path,
            detection.frame_width,
            detection.frame_height,
            fps,
        )?))
    } else {
        Err(VideoError::StreamUnavailable(format!(
            "{} does not exist",
            path.display()
        )))
    }
}

/// Reads image files under a directory in path order.
#[derive(Debug)]
pub struct FrameDirectorySource {
    frames: Vec<PathBuf>,
    next: usize,
    frame_interval: f64,
    label: String,
}

impl FrameDirectorySource {
    pub fn open(dir: &Path, fps: f64) -> Result<Self, VideoError> {
        let mut frames: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(VideoError::StreamUnavailable(format!(
                "no frame images under {}",
                dir.display()
            )));
        }
        debug!("{}: {} frame images", dir.display(), frames.len());

        Ok(Self {
            frames,
            next: 0,
            frame_interval: frame_interval(fps),
            label: dir.display().to_string(),
        })
    }
}

impl VideoSource for FrameDirectorySource {
    fn next_frame(&mut self) -> Result<Option<Frame>, VideoError> {
        let Some(path) = self.frames.get(self.next) else {
            return Ok(None);
        };
        let image = image::open(path)?.to_rgb8();
        let (width, height) = image.dimensions();

        let frame = Frame {
            data: image.into_raw(),
            width: width as usize,
            height: height as usize,
            timestamp: self.next as f64 * self.frame_interval,
        };
        self.next += 1;
        Ok(Some(frame))
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Decodes a video file by piping raw rgb24 frames out of an ffmpeg child
/// process.
pub struct FfmpegPipeSource {
    child: Child,
    stdout: ChildStdout,
    width: usize,
    height: usize,
    frames_read: u64,
    frame_interval: f64,
    label: String,
}

impl FfmpegPipeSource {
    pub fn open(path: &Path, width: usize, height: usize, fps: f64) -> Result<Self, VideoError> {
        let mut child = Command::new("ffmpeg")
            .arg("-nostdin")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{}x{}", width, height)])
            .arg("pipe:1")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VideoError::StreamUnavailable(format!("ffmpeg spawn failed: {e}")))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            VideoError::StreamUnavailable("ffmpeg stdout not captured".to_string())
        })?;

        Ok(Self {
            child,
            stdout,
            width,
            height,
            frames_read: 0,
            frame_interval: frame_interval(fps),
            label: path.display().to_string(),
        })
    }
}

impl VideoSource for FfmpegPipeSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, VideoError> {
        let expected = self.width * self.height * 3;
        let mut data = vec![0u8; expected];
        let mut filled = 0;

        while filled < expected {
            match self.stdout.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled == 0 {
            // A stream that produced nothing was never playable.
            if self.frames_read == 0 {
                let status = self.child.wait()?;
                if !status.success() {
                    return Err(VideoError::StreamUnavailable(format!(
                        "ffmpeg exited with {status} before any frames"
                    )));
                }
            }
            return Ok(None);
        }
        if filled < expected {
            return Err(VideoError::TruncatedFrame {
                expected,
                got: filled,
            });
        }

        let frame = Frame {
            data,
            width: self.width,
            height: self.height,
            timestamp: self.frames_read as f64 * self.frame_interval,
        };
        self.frames_read += 1;
        Ok(Some(frame))
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for FfmpegPipeSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn frame_interval(fps: f64) -> f64 {
    if fps > 0.0 {
        1.0 / fps
    } else {
        0.0
    }
}
