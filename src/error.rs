use thiserror::Error;

/// Failures while bringing a frame source up. Each stage gets its own
/// variant so an operator can tell "no hardware" from "wrong mode" from
/// "stream refused to start".
#[derive(Debug, Error)]
pub enum InitError {
    #[error("couldn't open device {uri}: {reason}")]
    DeviceOpen { uri: String, reason: String },

    #[error("couldn't create stream on {uri}: {reason}")]
    StreamCreate { uri: String, reason: String },

    #[error("stream refused to start: {reason}")]
    StreamStart { reason: String },
}

/// Conditions that end a tracking run.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(
        "frame size changed after buffer init: expected {expected_width}x{expected_height}, \
         got {width}x{height}"
    )]
    FrameSizeChanged {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    #[error("analysis pipeline construction failed: {0}")]
    AnalyzerInit(anyhow::Error),
}
