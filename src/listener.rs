//! Publish/subscribe fan-out for computed skeletons, plus the single-slot
//! closest-point mailbox subscriber.

use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::types::{Point3D, RawFrame, SkeletonResult};

/// The one contract a consumer implements to observe the pipeline. The
/// result reference is only valid for the duration of the callback; copy
/// what you keep.
pub trait SkeletonListener: Send {
    fn on_event(&mut self, skeleton: &SkeletonResult, afa: f32) -> anyhow::Result<()>;
}

pub type SharedListener = Arc<Mutex<dyn SkeletonListener>>;

/// Ordered, synchronous fan-out. The registry shares listeners with their
/// owners; it never takes over their lifetime.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Vec<SharedListener>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends without deduplication: registering the same listener twice
    /// means two notifications per publish.
    pub fn register(&mut self, listener: SharedListener) {
        self.listeners.push(listener);
    }

    /// Notifies every listener in registration order, on the caller's
    /// thread. A failing listener is logged and skipped so it cannot starve
    /// the rest of the pass.
    pub fn publish(&self, skeleton: &SkeletonResult, afa: f32) {
        for listener in &self.listeners {
            let mut guard = match listener.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Err(err) = guard.on_event(skeleton, afa) {
                warn!("skeleton listener failed: {err:?}");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

/// Producer-side accessor for the latest extracted (frame, closest point)
/// pair. Single slot: a new pair overwrites an unread one.
#[derive(Clone, Default)]
pub struct ClosestPointFeed {
    slot: Arc<Mutex<Option<(RawFrame, Point3D)>>>,
}

impl ClosestPointFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: RawFrame, point: Point3D) {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some((frame, point));
    }

    /// Latest pair, if any. Cloning a frame is a reference bump.
    pub fn latest(&self) -> Option<(RawFrame, Point3D)> {
        let slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.clone()
    }
}

/// Mailbox subscriber: on each notification it pulls the latest pair from
/// the feed and flags availability. The owner polls `is_available`, reads,
/// then calls `set_unavailable` to re-arm; nothing re-arms automatically. A
/// failed pull leaves prior state untouched and does not raise the flag.
pub struct ClosestPointListener {
    feed: ClosestPointFeed,
    frame: Option<RawFrame>,
    closest: Option<Point3D>,
    ready: bool,
}

impl ClosestPointListener {
    pub fn new(feed: ClosestPointFeed) -> Self {
        ClosestPointListener {
            feed,
            frame: None,
            closest: None,
            ready: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.ready
    }

    pub fn set_unavailable(&mut self) {
        self.ready = false;
    }

    pub fn frame(&self) -> Option<&RawFrame> {
        self.frame.as_ref()
    }

    pub fn closest_point(&self) -> Option<Point3D> {
        self.closest
    }
}

impl SkeletonListener for ClosestPointListener {
    fn on_event(&mut self, _skeleton: &SkeletonResult, _afa: f32) -> anyhow::Result<()> {
        match self.feed.latest() {
            Some((frame, point)) => {
                self.frame = Some(frame);
                self.closest = Some(point);
                self.ready = true;
            }
            None => {
                debug!("no closest point pending on notification");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelEncoding;

    struct Recorder {
        tag: u32,
        events: Arc<Mutex<Vec<u32>>>,
    }

    impl SkeletonListener for Recorder {
        fn on_event(&mut self, _skeleton: &SkeletonResult, _afa: f32) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(self.tag);
            Ok(())
        }
    }

    struct Failing;

    impl SkeletonListener for Failing {
        fn on_event(&mut self, _skeleton: &SkeletonResult, _afa: f32) -> anyhow::Result<()> {
            anyhow::bail!("listener on strike")
        }
    }

    fn empty_result() -> SkeletonResult {
        SkeletonResult::new(Vec::new(), 0.0)
    }

    fn depth_frame(z: u16) -> RawFrame {
        RawFrame::depth(2, 2, PixelEncoding::Depth1Mm, vec![z; 4])
    }

    #[test]
    fn publish_runs_in_registration_order() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        for tag in [1, 2, 3] {
            registry.register(Arc::new(Mutex::new(Recorder {
                tag,
                events: events.clone(),
            })));
        }

        registry.publish(&empty_result(), 0.0);
        assert_eq!(*events.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_registration_delivers_twice() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let listener: SharedListener = Arc::new(Mutex::new(Recorder {
            tag: 7,
            events: events.clone(),
        }));

        let mut registry = ListenerRegistry::new();
        registry.register(listener.clone());
        registry.register(listener);
        assert_eq!(registry.len(), 2);

        registry.publish(&empty_result(), 0.0);
        assert_eq!(*events.lock().unwrap(), vec![7, 7]);
    }

    #[test]
    fn failing_listener_does_not_block_the_rest() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        registry.register(Arc::new(Mutex::new(Failing)));
        registry.register(Arc::new(Mutex::new(Recorder {
            tag: 9,
            events: events.clone(),
        })));

        registry.publish(&empty_result(), 0.0);
        assert_eq!(*events.lock().unwrap(), vec![9]);
    }

    #[test]
    fn mailbox_overwrites_unread_payload() {
        let feed = ClosestPointFeed::new();
        let mut listener = ClosestPointListener::new(feed.clone());

        feed.publish(depth_frame(100), Point3D { x: 0, y: 0, z: 100 });
        feed.publish(depth_frame(200), Point3D { x: 1, y: 1, z: 200 });

        listener.on_event(&empty_result(), 0.0).unwrap();
        assert!(listener.is_available());
        assert_eq!(listener.closest_point().unwrap().z, 200);
    }

    #[test]
    fn empty_feed_does_not_raise_readiness() {
        let feed = ClosestPointFeed::new();
        let mut listener = ClosestPointListener::new(feed);

        listener.on_event(&empty_result(), 0.0).unwrap();
        assert!(!listener.is_available());
        assert!(listener.frame().is_none());
    }

    #[test]
    fn owner_rearms_explicitly() {
        let feed = ClosestPointFeed::new();
        let mut listener = ClosestPointListener::new(feed.clone());

        feed.publish(depth_frame(50), Point3D { x: 0, y: 0, z: 50 });
        listener.on_event(&empty_result(), 0.0).unwrap();
        assert!(listener.is_available());

        listener.set_unavailable();
        assert!(!listener.is_available());
        // Retained payload survives re-arming until the next pull.
        assert_eq!(listener.closest_point().unwrap().z, 50);
    }
}
