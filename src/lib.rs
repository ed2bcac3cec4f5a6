// src/lib.rs

pub mod config;
pub mod counter;
pub mod counts;
pub mod error;
pub mod fuzzy;
pub mod metrics;
pub mod motion;
pub mod scheduler;
pub mod types;
pub mod video;

pub use config::Config;
pub use counts::LaneCountStore;
pub use error::{ControlError, VideoError};
pub use metrics::ControllerMetrics;
pub use scheduler::{CycleScheduler, TickOutcome};
pub use types::{Frame, Lane, LaneCounts};
