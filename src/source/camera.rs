use std::path::Path;
use std::time::Duration;

use super::{CAMERA_WARMUP_FRAMES, FrameSource};
use crate::error::InitError;
use crate::types::RawFrame;

#[cfg(feature = "camera-nokhwa")]
use super::gray;
#[cfg(feature = "camera-nokhwa")]
use log::warn;
#[cfg(feature = "camera-nokhwa")]
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, CameraInfo, FrameFormat, RequestedFormat, RequestedFormatType},
};

// Prefer formats the converter can collapse to intensity without a full
// decode; MJPEG last because it costs a JPEG decode per frame.
#[cfg(feature = "camera-nokhwa")]
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::GRAY,
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

#[cfg(feature = "camera-nokhwa")]
fn requested_formats() -> [RequestedFormat<'static>; 3] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestResolution,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

#[cfg(feature = "camera-nokhwa")]
#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

#[cfg(feature = "camera-nokhwa")]
pub fn available_cameras() -> anyhow::Result<Vec<CameraDevice>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .map(|info: CameraInfo| CameraDevice {
            label: info.human_name(),
            index: info.index().clone(),
        })
        .collect())
}

/// Live camera variant: pulls the next frame synchronously and hands it on
/// as `Gray8`, so nothing downstream cares what the hardware delivered.
#[cfg(feature = "camera-nokhwa")]
pub struct CameraSource {
    camera: Camera,
}

#[cfg(feature = "camera-nokhwa")]
impl CameraSource {
    pub fn open(index: CameraIndex) -> Result<Self, InitError> {
        let uri = format!("camera #{index:?}");
        let mut last_err: Option<InitError> = None;

        for requested in requested_formats() {
            match Camera::new(index.clone(), requested) {
                Ok(mut camera) => match camera.open_stream() {
                    Ok(()) => return Ok(CameraSource { camera }),
                    Err(err) => {
                        last_err = Some(InitError::StreamStart {
                            reason: err.to_string(),
                        });
                    }
                },
                Err(err) => {
                    last_err = Some(InitError::DeviceOpen {
                        uri: uri.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        Err(last_err.unwrap_or(InitError::DeviceOpen {
            uri,
            reason: "no supported capture format".into(),
        }))
    }
}

#[cfg(feature = "camera-nokhwa")]
impl FrameSource for CameraSource {
    fn acquire(&mut self, _timeout: Duration) -> Option<RawFrame> {
        let buffer = match self.camera.frame() {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!("camera frame read failed: {err:?}");
                return None;
            }
        };

        let converted = match gray::convert_camera_frame(&buffer) {
            Ok(gray) => gray,
            Err(err) => {
                warn!("failed to decode camera frame: {err:?}");
                return None;
            }
        };

        let frame = RawFrame::gray(converted.width, converted.height, converted.gray);
        if !frame.is_valid() {
            warn!("camera produced an empty frame");
            return None;
        }
        Some(frame)
    }

    fn warmup_frames(&self) -> u32 {
        CAMERA_WARMUP_FRAMES
    }

    fn shutdown(&mut self) {
        if let Err(err) = self.camera.stop_stream() {
            warn!("camera stream stop failed: {err:?}");
        }
    }
}

/// Still-image variant: loads one picture and re-serves it every acquire,
/// which keeps the rest of the pipeline identical to a live capture.
#[derive(Debug)]
pub struct StillImageSource {
    frame: RawFrame,
}

impl StillImageSource {
    pub fn open(path: &Path) -> Result<Self, InitError> {
        let image = image::open(path).map_err(|err| InitError::DeviceOpen {
            uri: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let luma = image.to_luma8();
        let (width, height) = (luma.width(), luma.height());
        Ok(StillImageSource {
            frame: RawFrame::gray(width, height, luma.into_raw()),
        })
    }
}

impl FrameSource for StillImageSource {
    fn acquire(&mut self, _timeout: Duration) -> Option<RawFrame> {
        Some(self.frame.clone())
    }

    fn warmup_frames(&self) -> u32 {
        CAMERA_WARMUP_FRAMES
    }

    fn shutdown(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelEncoding;

    #[test]
    fn still_image_source_serves_the_same_gray_frame() {
        let dir = std::env::temp_dir().join("skeltrace-still-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("frame.png");
        image::GrayImage::from_raw(3, 2, vec![0, 60, 120, 180, 240, 255])
            .unwrap()
            .save(&path)
            .unwrap();

        let mut source = StillImageSource::open(&path).unwrap();
        let first = source.acquire(Duration::from_millis(1)).unwrap();
        let second = source.acquire(Duration::from_millis(1)).unwrap();
        assert_eq!(first.width, 3);
        assert_eq!(first.height, 2);
        assert_eq!(first.encoding, PixelEncoding::Gray8);
        assert_eq!(first.gray_samples(), second.gray_samples());
        assert_eq!(source.warmup_frames(), CAMERA_WARMUP_FRAMES);
    }

    #[test]
    fn missing_image_is_a_device_open_failure() {
        let err = StillImageSource::open(Path::new("/nonexistent/frame.png")).unwrap_err();
        assert!(matches!(err, InitError::DeviceOpen { .. }));
    }
}
