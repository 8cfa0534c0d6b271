use crate::types::{Point3D, RawFrame};

// One past the largest representable depth, so any real sample replaces it.
const ABOVE_MAX_DEPTH: u32 = u16::MAX as u32 + 1;

/// Scans a depth frame in row-major order and returns the nearest valid
/// point: the earliest pixel holding the smallest nonzero depth. Zero means
/// "no return" and never counts. `None` for gray frames and frames with no
/// valid sample at all.
pub fn closest_point(frame: &RawFrame) -> Option<Point3D> {
    let samples = frame.depth_samples()?;
    let width = frame.width as usize;
    if width == 0 {
        return None;
    }

    let mut best = ABOVE_MAX_DEPTH;
    let mut found = None;
    for (idx, &z) in samples.iter().enumerate() {
        if z != 0 && (z as u32) < best {
            best = z as u32;
            found = Some(Point3D {
                x: (idx % width) as i32,
                y: (idx / width) as i32,
                z,
            });
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelEncoding;

    fn depth_frame(width: u32, height: u32, samples: Vec<u16>) -> RawFrame {
        RawFrame::depth(width, height, PixelEncoding::Depth1Mm, samples)
    }

    #[test]
    fn finds_first_minimum_in_row_major_order() {
        let frame = depth_frame(4, 3, vec![5, 0, 2, 9, 0, 0, 1, 0, 7, 3, 0, 4]);
        let point = closest_point(&frame).unwrap();
        assert_eq!(point, Point3D { x: 2, y: 1, z: 1 });
    }

    #[test]
    fn ties_keep_the_earliest_scanned_pixel() {
        let frame = depth_frame(3, 2, vec![0, 7, 7, 7, 7, 7]);
        let point = closest_point(&frame).unwrap();
        assert_eq!(point, Point3D { x: 1, y: 0, z: 7 });
    }

    #[test]
    fn all_zero_frame_yields_none() {
        let frame = depth_frame(4, 4, vec![0; 16]);
        assert!(closest_point(&frame).is_none());
    }

    #[test]
    fn max_depth_sample_is_still_found() {
        let frame = depth_frame(2, 1, vec![0, u16::MAX]);
        let point = closest_point(&frame).unwrap();
        assert_eq!(point.z, u16::MAX);
    }

    #[test]
    fn gray_frames_have_no_closest_point() {
        let frame = RawFrame::gray(2, 2, vec![1, 2, 3, 4]);
        assert!(closest_point(&frame).is_none());
    }
}
