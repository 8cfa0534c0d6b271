use std::sync::Arc;
use std::time::Instant;

/// Pixel encodings a source may deliver. Depth sources must produce one of
/// the two depth encodings; camera sources convert everything to `Gray8`
/// before the frame leaves the source boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelEncoding {
    /// Depth samples in millimetres.
    Depth1Mm,
    /// Depth samples in hundreds of micrometres.
    Depth100Um,
    /// Single-channel 8-bit intensity.
    Gray8,
}

impl PixelEncoding {
    pub fn is_depth(self) -> bool {
        matches!(self, PixelEncoding::Depth1Mm | PixelEncoding::Depth100Um)
    }

    pub fn label(self) -> &'static str {
        match self {
            PixelEncoding::Depth1Mm => "depth (1mm)",
            PixelEncoding::Depth100Um => "depth (100um)",
            PixelEncoding::Gray8 => "gray8",
        }
    }
}

/// Per-pixel sample storage. Reference-counted so a frame handed to a
/// subscriber is a cheap clone and the buffer is freed when the last owner
/// drops it, whichever exit path that happens on.
#[derive(Clone, Debug)]
pub enum FrameData {
    Depth(Arc<[u16]>),
    Gray(Arc<[u8]>),
}

impl FrameData {
    pub fn len(&self) -> usize {
        match self {
            FrameData::Depth(samples) => samples.len(),
            FrameData::Gray(samples) => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One acquisition worth of sensor data.
#[derive(Clone, Debug)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub encoding: PixelEncoding,
    pub data: FrameData,
    pub timestamp: Instant,
}

impl RawFrame {
    pub fn depth(width: u32, height: u32, encoding: PixelEncoding, samples: Vec<u16>) -> Self {
        RawFrame {
            width,
            height,
            encoding,
            data: FrameData::Depth(samples.into()),
            timestamp: Instant::now(),
        }
    }

    pub fn gray(width: u32, height: u32, samples: Vec<u8>) -> Self {
        RawFrame {
            width,
            height,
            encoding: PixelEncoding::Gray8,
            data: FrameData::Gray(samples.into()),
            timestamp: Instant::now(),
        }
    }

    /// A frame is valid when its buffer covers the advertised dimensions.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == (self.width * self.height) as usize
    }

    pub fn depth_samples(&self) -> Option<&[u16]> {
        match &self.data {
            FrameData::Depth(samples) => Some(samples),
            FrameData::Gray(_) => None,
        }
    }

    pub fn gray_samples(&self) -> Option<&[u8]> {
        match &self.data {
            FrameData::Gray(samples) => Some(samples),
            FrameData::Depth(_) => None,
        }
    }
}

/// Integer pixel coordinate plus sensor-reported depth. A `z` of zero means
/// "no return" and is never produced as a found extraction result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point3D {
    pub x: i32,
    pub y: i32,
    pub z: u16,
}

/// Named body landmarks, in the order the analysis stage emits them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyPart {
    Head,
    Neck,
    Torso,
    LeftShoulder,
    RightShoulder,
    LeftHand,
    RightHand,
}

impl BodyPart {
    pub fn label(self) -> &'static str {
        match self {
            BodyPart::Head => "head",
            BodyPart::Neck => "neck",
            BodyPart::Torso => "torso",
            BodyPart::LeftShoulder => "left shoulder",
            BodyPart::RightShoulder => "right shoulder",
            BodyPart::LeftHand => "left hand",
            BodyPart::RightHand => "right hand",
        }
    }
}

/// Body-part pairs connected when markers are drawn over a frame.
pub const SKELETON_CONNECTIONS: &[(BodyPart, BodyPart)] = &[
    (BodyPart::Head, BodyPart::Neck),
    (BodyPart::Neck, BodyPart::Torso),
    (BodyPart::Neck, BodyPart::LeftShoulder),
    (BodyPart::Neck, BodyPart::RightShoulder),
    (BodyPart::LeftShoulder, BodyPart::LeftHand),
    (BodyPart::RightShoulder, BodyPart::RightHand),
];

/// Skeleton produced for one processed frame: ordered named landmarks plus
/// the body orientation angle ("afa", degrees). Listeners must copy anything
/// they want to keep past the notification callback.
#[derive(Clone, Debug)]
pub struct SkeletonResult {
    points: Vec<(BodyPart, Point3D)>,
    afa: f32,
}

impl SkeletonResult {
    pub fn new(points: Vec<(BodyPart, Point3D)>, afa: f32) -> Self {
        SkeletonResult { points, afa }
    }

    pub fn points(&self) -> &[(BodyPart, Point3D)] {
        &self.points
    }

    pub fn point(&self, part: BodyPart) -> Option<Point3D> {
        self.points
            .iter()
            .find(|(p, _)| *p == part)
            .map(|(_, point)| *point)
    }

    pub fn afa(&self) -> f32 {
        self.afa
    }
}
