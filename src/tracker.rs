//! The frame-processing loop: acquire, lazily prime buffers, extract the
//! closest point, run the analysis pipeline, present, notify, release.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use log::{debug, info, warn};

use crate::TrackerConfig;
use crate::analysis::{AnalysisPipeline, AnalyzerFactory, WorkingBuffers};
use crate::display::FrameSink;
use crate::error::TrackerError;
use crate::extract;
use crate::listener::{ClosestPointFeed, ListenerRegistry, SharedListener};
use crate::source::FrameSource;

pub struct Tracker {
    source: Box<dyn FrameSource>,
    factory: AnalyzerFactory,
    analyzer: Option<Box<dyn AnalysisPipeline>>,
    buffers: Option<WorkingBuffers>,
    registry: ListenerRegistry,
    sink: Box<dyn FrameSink>,
    feed: ClosestPointFeed,
    config: TrackerConfig,
    stop: Arc<AtomicBool>,
    frame_count: u64,
}

impl Tracker {
    pub fn new(
        source: Box<dyn FrameSource>,
        factory: AnalyzerFactory,
        sink: Box<dyn FrameSink>,
        config: TrackerConfig,
    ) -> Self {
        Tracker {
            source,
            factory,
            analyzer: None,
            buffers: None,
            registry: ListenerRegistry::new(),
            sink,
            feed: ClosestPointFeed::new(),
            config,
            stop: Arc::new(AtomicBool::new(false)),
            frame_count: 0,
        }
    }

    /// Accessor mailbox subscribers pull the latest (frame, point) pair from.
    pub fn feed(&self) -> ClosestPointFeed {
        self.feed.clone()
    }

    /// Flag another thread may set to end `run` after the current iteration.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn register_listener(&mut self, listener: SharedListener) {
        self.registry.register(listener);
    }

    /// Drives iterations until the stop flag is raised, then tears the
    /// source down. Acquisition misses are skipped iterations, never fatal.
    pub fn run(&mut self) -> Result<(), TrackerError> {
        let outcome = loop {
            if self.stop.load(Ordering::Relaxed) {
                break Ok(());
            }
            if let Err(err) = self.tick() {
                break Err(err);
            }
        };
        self.source.shutdown();
        outcome
    }

    /// One full iteration of the loop. The acquired frame is an owned value,
    /// so it is released at the end of this scope on every exit path.
    pub fn tick(&mut self) -> Result<(), TrackerError> {
        let Some(frame) = self.source.acquire(self.config.read_timeout) else {
            return Ok(());
        };
        if !frame.is_valid() {
            warn!("discarding invalid frame");
            return Ok(());
        }
        self.frame_count += 1;

        // First frame with data: size the working buffers and build the
        // analysis pipeline, exactly once for the life of the loop.
        if self.buffers.is_none() {
            info!("first frame: {}x{}", frame.width, frame.height);
            let analyzer =
                (self.factory)(frame.width, frame.height).map_err(TrackerError::AnalyzerInit)?;
            self.buffers = Some(WorkingBuffers::new(frame.width, frame.height));
            self.analyzer = Some(analyzer);
        }
        let (Some(buffers), Some(analyzer)) = (self.buffers.as_mut(), self.analyzer.as_mut())
        else {
            return Ok(());
        };
        if frame.width != buffers.width() || frame.height != buffers.height() {
            return Err(TrackerError::FrameSizeChanged {
                expected_width: buffers.width(),
                expected_height: buffers.height(),
                width: frame.width,
                height: frame.height,
            });
        }

        let warmup = self
            .config
            .warmup_override
            .unwrap_or_else(|| self.source.warmup_frames());
        if self.frame_count <= warmup as u64 {
            debug!("warm-up frame {}/{} discarded", self.frame_count, warmup);
            return Ok(());
        }

        // The extractor needs no pipeline state; a miss flows downstream as
        // "no point", not an error.
        let closest = extract::closest_point(&frame);
        if let Some(point) = closest {
            self.feed.publish(frame.clone(), point);
        }

        match analyzer.process(&frame, closest.as_ref(), buffers) {
            Ok(Some(result)) => {
                self.sink.show(&buffers.presentation, buffers.width(), buffers.height());
                self.registry.publish(&result, result.afa());
            }
            Ok(None) => {
                self.sink.show(&buffers.presentation, buffers.width(), buffers.height());
                debug!("no skeleton in frame {}", self.frame_count);
            }
            Err(err) => {
                warn!("analysis failed on frame {}: {err:?}", self.frame_count);
            }
        }
        Ok(())
    }

    pub fn frames_seen(&self) -> u64 {
        self.frame_count
    }
}
