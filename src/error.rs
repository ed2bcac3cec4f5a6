// src/error.rs

use thiserror::Error;

/// Errors raised at the control boundary.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("unknown lane '{0}', expected one of A, B, C, D")]
    InvalidLane(String),
}

/// Errors raised while acquiring video frames.
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("stream unavailable: {0}")]
    StreamUnavailable(String),

    #[error("truncated frame, got {got} of {expected} bytes")]
    TruncatedFrame { expected: usize, got: usize },

    #[error("frame decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("video i/o error: {0}")]
    Io(#[from] std::io::Error),
}
