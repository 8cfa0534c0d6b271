//! Display sink boundary: one-way, fire-and-forget delivery of the finished
//! presentation raster. Real windowing lives outside this crate.

use log::info;

pub trait FrameSink: Send {
    fn show(&mut self, buffer: &[u8], width: u32, height: u32);
}

/// Discards every frame. Useful for headless runs and tests.
pub struct NullSink;

impl FrameSink for NullSink {
    fn show(&mut self, _buffer: &[u8], _width: u32, _height: u32) {}
}

/// Logs a heartbeat every `every` frames instead of rendering.
pub struct LogSink {
    shown: u64,
    every: u64,
}

impl LogSink {
    pub fn new(every: u64) -> Self {
        LogSink {
            shown: 0,
            every: every.max(1),
        }
    }
}

impl FrameSink for LogSink {
    fn show(&mut self, _buffer: &[u8], width: u32, height: u32) {
        self.shown += 1;
        if self.shown % self.every == 0 {
            info!("presented frame #{} ({}x{})", self.shown, width, height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sink_counts_frames() {
        let mut sink = LogSink::new(2);
        for _ in 0..5 {
            sink.show(&[0; 12], 2, 2);
        }
        assert_eq!(sink.shown, 5);
    }
}
