//! Real-time skeleton tracking: acquires frames from a depth sensor or a
//! camera, extracts the nearest 3D point per frame, derives a body skeleton
//! through the analysis pipeline, and fans the result out to registered
//! listeners at sensor frame-rate.

pub mod analysis;
pub mod display;
pub mod error;
pub mod extract;
pub mod listener;
pub mod source;
pub mod tracker;
pub mod types;

use std::time::Duration;

pub use tracker::Tracker;

/// Loop-level tuning.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// Bounded wait per acquisition; the loop retries on timeout.
    pub read_timeout: Duration,
    /// Sub-sampling factor for the built-in analyzer.
    pub sub_sample: u32,
    /// Overrides the source's own warm-up frame count when set.
    pub warmup_override: Option<u32>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            read_timeout: source::READ_TIMEOUT,
            sub_sample: analysis::DEFAULT_SUB_SAMPLE,
            warmup_override: None,
        }
    }
}
