use std::env;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use log::info;

use skeltrace::analysis::threshold_factory;
use skeltrace::display::LogSink;
use skeltrace::listener::ClosestPointListener;
use skeltrace::source::{FrameSource, StillImageSource};
use skeltrace::{Tracker, TrackerConfig};

fn main() -> Result<()> {
    env_logger::init();

    let uri = env::args().nth(1);
    let source = open_source(uri.as_deref())?;

    let config = TrackerConfig::default();
    let mut tracker = Tracker::new(
        source,
        threshold_factory(config.sub_sample),
        Box::new(LogSink::new(30)),
        config,
    );

    let listener = Arc::new(Mutex::new(ClosestPointListener::new(tracker.feed())));
    tracker.register_listener(listener);

    info!("skeltrace starting");
    tracker.run()?;
    Ok(())
}

fn open_source(uri: Option<&str>) -> Result<Box<dyn FrameSource>> {
    match uri {
        Some(path) if Path::new(path).is_file() => {
            Ok(Box::new(StillImageSource::open(Path::new(path))?))
        }
        #[cfg(feature = "camera-nokhwa")]
        other => {
            use nokhwa::utils::CameraIndex;
            use skeltrace::source::CameraSource;
            let index = other.and_then(|arg| arg.parse().ok()).unwrap_or(0);
            Ok(Box::new(CameraSource::open(CameraIndex::Index(index))?))
        }
        #[cfg(not(feature = "camera-nokhwa"))]
        _ => anyhow::bail!("no camera backend compiled in; pass an image path"),
    }
}
