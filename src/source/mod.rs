pub mod camera;
pub mod depth;
pub mod gray;

use std::time::Duration;

use crate::types::RawFrame;

/// Default bounded wait for one acquisition.
pub const READ_TIMEOUT: Duration = Duration::from_millis(2000);

/// Initial camera frames discarded before the exposure is trusted.
pub const CAMERA_WARMUP_FRAMES: u32 = 10;

/// One frame supplier behind the processing loop. Which variant runs is a
/// runtime choice; the loop never branches on the concrete source.
pub trait FrameSource {
    /// Next raw frame, or `None` when nothing usable arrived within
    /// `timeout`. `None` is never fatal; the loop retries on its next tick.
    fn acquire(&mut self, timeout: Duration) -> Option<RawFrame>;

    /// Number of leading frames the loop should discard from this source.
    fn warmup_frames(&self) -> u32 {
        0
    }

    /// Release device and stream handles. Idempotent; also runs on drop for
    /// sources that own hardware.
    fn shutdown(&mut self);
}

pub use depth::{DepthDevice, DepthSource, DepthStream};
pub use gray::GrayFrame;

#[cfg(feature = "camera-nokhwa")]
pub use camera::{CameraSource, available_cameras};
pub use camera::StillImageSource;
