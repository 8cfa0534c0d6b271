use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use log::{info, warn};

use super::FrameSource;
use crate::error::InitError;
use crate::types::RawFrame;

/// Blocking read side of a depth sensor. `read_frame` blocks until the
/// sensor produces a frame or the implementation decides to give up; it must
/// return (frame or error) within a bounded time so shutdown can join the
/// device thread.
pub trait DepthStream: Send + 'static {
    fn read_frame(&mut self) -> anyhow::Result<RawFrame>;
}

/// Staged bring-up of a physical depth sensor. Splitting open from stream
/// start keeps init failures operator-distinguishable (no hardware vs.
/// wrong mode vs. stream refused to start).
pub trait DepthDevice: Send + 'static {
    type Stream: DepthStream;

    fn open(uri: Option<&str>) -> Result<Self, InitError>
    where
        Self: Sized;

    fn start_stream(&mut self) -> Result<Self::Stream, InitError>;
}

/// Depth-sensor frame source. The device lives on its own read thread and
/// feeds a single-slot channel; `acquire` is a bounded-wait receive, so the
/// processing loop sees the same blocking profile as a direct sensor read.
pub struct DepthSource {
    frames: Receiver<RawFrame>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl DepthSource {
    /// Open `uri` through `D`, start its stream, and spawn the read thread.
    pub fn open<D: DepthDevice>(uri: Option<&str>) -> Result<Self, InitError> {
        let mut device = D::open(uri)?;
        let stream = device.start_stream()?;
        info!("depth stream started on {}", uri.unwrap_or("<default device>"));
        Ok(Self::start(device, stream))
    }

    /// Wire an already-started device/stream pair into a source.
    pub fn start<D: Send + 'static, S: DepthStream>(device: D, mut stream: S) -> Self {
        let (tx, rx) = bounded(1);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::spawn(move || {
            // Device handles stay alive for exactly as long as this thread.
            let _device = device;
            while !stop_flag.load(Ordering::Relaxed) {
                match stream.read_frame() {
                    Ok(frame) => {
                        // Drop the frame if the loop is mid-iteration; the
                        // next acquire wants the freshest frame anyway.
                        let _ = tx.try_send(frame);
                    }
                    Err(err) => {
                        warn!("depth read failed: {err:?}");
                    }
                }
            }
        });

        DepthSource {
            frames: rx,
            stop,
            handle: Some(handle),
        }
    }

    fn stop_reader(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl FrameSource for DepthSource {
    fn acquire(&mut self, timeout: Duration) -> Option<RawFrame> {
        let frame = match self.frames.recv_timeout(timeout) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => {
                warn!("depth wait failed (timeout is {} ms)", timeout.as_millis());
                return None;
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("depth stream ended");
                return None;
            }
        };

        if !frame.encoding.is_depth() {
            warn!("unexpected frame encoding: {}", frame.encoding.label());
            return None;
        }
        if !frame.is_valid() {
            warn!(
                "discarding invalid depth frame ({}x{}, {} samples)",
                frame.width,
                frame.height,
                frame.data.len()
            );
            return None;
        }
        Some(frame)
    }

    fn shutdown(&mut self) {
        self.stop_reader();
    }
}

impl Drop for DepthSource {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelEncoding;
    use crossbeam_channel::{Sender, unbounded};

    struct ChannelStream {
        rx: Receiver<RawFrame>,
    }

    impl DepthStream for ChannelStream {
        fn read_frame(&mut self) -> anyhow::Result<RawFrame> {
            self.rx
                .recv_timeout(Duration::from_millis(20))
                .map_err(|err| anyhow::anyhow!("no frame: {err}"))
        }
    }

    fn channel_source() -> (Sender<RawFrame>, DepthSource) {
        let (tx, rx) = unbounded();
        let source = DepthSource::start((), ChannelStream { rx });
        (tx, source)
    }

    #[test]
    fn acquire_returns_pushed_depth_frame() {
        let (tx, mut source) = channel_source();
        tx.send(RawFrame::depth(2, 2, PixelEncoding::Depth1Mm, vec![9; 4]))
            .unwrap();

        let frame = source.acquire(Duration::from_millis(500)).unwrap();
        assert_eq!(frame.width, 2);
        assert_eq!(frame.encoding, PixelEncoding::Depth1Mm);
        source.shutdown();
    }

    #[test]
    fn acquire_times_out_without_frames() {
        let (_tx, mut source) = channel_source();
        assert!(source.acquire(Duration::from_millis(10)).is_none());
        source.shutdown();
    }

    #[test]
    fn non_depth_encodings_are_rejected() {
        let (tx, mut source) = channel_source();
        tx.send(RawFrame::gray(2, 2, vec![1; 4])).unwrap();
        assert!(source.acquire(Duration::from_millis(500)).is_none());
        source.shutdown();
    }

    #[test]
    fn truncated_frames_are_rejected() {
        let (tx, mut source) = channel_source();
        tx.send(RawFrame::depth(4, 4, PixelEncoding::Depth100Um, vec![1; 3]))
            .unwrap();
        assert!(source.acquire(Duration::from_millis(500)).is_none());
        source.shutdown();
    }

    #[test]
    fn shutdown_is_idempotent_and_joins_reader() {
        let (_tx, mut source) = channel_source();
        source.shutdown();
        source.shutdown();
        assert!(source.handle.is_none());
    }
}
