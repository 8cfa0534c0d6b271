//! The image-analysis boundary: binarize, segment, skeletonize, annotate.
//! The loop consumes this stage as a black box behind [`AnalysisPipeline`];
//! [`ThresholdAnalyzer`] is the built-in implementation used for wiring,
//! demos, and tests.

use anyhow::ensure;

use crate::types::{BodyPart, Point3D, RawFrame, SKELETON_CONNECTIONS, SkeletonResult};

/// Per-run scratch memory, sized by the first valid frame and never resized.
pub struct WorkingBuffers {
    width: u32,
    height: u32,
    /// 3-channel raster handed to the display sink each processed frame.
    pub presentation: Vec<u8>,
    /// Full-resolution depth values of the segmented foreground.
    pub depth_scratch: Vec<u16>,
}

impl WorkingBuffers {
    pub fn new(width: u32, height: u32) -> Self {
        let pixels = width as usize * height as usize;
        WorkingBuffers {
            width,
            height,
            presentation: vec![0; pixels * 3],
            depth_scratch: vec![0; pixels],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// One full analysis pass over a frame. Implementations own whatever
/// intermediate state they need; they are built once per run, bound to the
/// first frame's dimensions.
pub trait AnalysisPipeline: Send {
    /// Returns `Ok(None)` when the frame holds no usable body region. The
    /// extracted closest point may be absent; implementations decide whether
    /// they can proceed without it.
    fn process(
        &mut self,
        frame: &RawFrame,
        closest: Option<&Point3D>,
        buffers: &mut WorkingBuffers,
    ) -> anyhow::Result<Option<SkeletonResult>>;
}

/// Builds the analysis pipeline once the frame dimensions are known.
pub type AnalyzerFactory =
    Box<dyn FnMut(u32, u32) -> anyhow::Result<Box<dyn AnalysisPipeline>> + Send>;

pub const DEFAULT_SUB_SAMPLE: u32 = 2;

// Gray pixels darker than this count as foreground (inverted threshold).
const GRAY_THRESHOLD: u8 = 50;
// Depth samples within this many units beyond the closest point count as
// part of the same body.
const DEPTH_BAND: u16 = 600;
// Sub-sampled foreground pixels below this are noise, not a body.
const MIN_REGION_PIXELS: usize = 16;

const MARKER_LINE_COLOR: [u8; 3] = [56, 189, 248];
const MARKER_POINT_COLOR: [u8; 3] = [248, 113, 113];
const MARKER_LINE_THICKNESS: i32 = 3;
const MARKER_POINT_RADIUS: i32 = 5;

/// Threshold-based analyzer: binarizes the frame at a sub-sampled
/// resolution, takes the aggregate foreground region, and derives head,
/// neck, torso, shoulder and hand landmarks from its extents.
pub struct ThresholdAnalyzer {
    width: u32,
    height: u32,
    sub_sample: u32,
    mask: Vec<u8>,
}

impl ThresholdAnalyzer {
    pub fn new(width: u32, height: u32, sub_sample: u32) -> Self {
        let sub_sample = sub_sample.max(1);
        let mask_len = (width / sub_sample) as usize * (height / sub_sample) as usize;
        ThresholdAnalyzer {
            width,
            height,
            sub_sample,
            mask: vec![0; mask_len],
        }
    }

    fn binarize_depth(&mut self, samples: &[u16], closest: &Point3D, buffers: &mut WorkingBuffers) {
        let limit = closest.z.saturating_add(DEPTH_BAND);
        let (w, h) = (self.width as usize, self.height as usize);
        let sub = self.sub_sample as usize;

        for (idx, &z) in samples.iter().enumerate() {
            let foreground = z != 0 && z <= limit;
            if foreground {
                buffers.depth_scratch[idx] = z;
                // Nearer surfaces render brighter.
                let shade =
                    255 - ((z - closest.z) as u32 * 200 / DEPTH_BAND as u32).min(200) as u8;
                let base = idx * 3;
                buffers.presentation[base] = shade;
                buffers.presentation[base + 1] = shade;
                buffers.presentation[base + 2] = shade;
            }
        }

        let sw = w / sub;
        let sh = h / sub;
        for sy in 0..sh {
            for sx in 0..sw {
                let z = samples[sy * sub * w + sx * sub];
                self.mask[sy * sw + sx] = if z != 0 && z <= limit { 255 } else { 0 };
            }
        }
    }

    fn binarize_gray(&mut self, samples: &[u8], buffers: &mut WorkingBuffers) {
        let (w, h) = (self.width as usize, self.height as usize);
        let sub = self.sub_sample as usize;

        for (idx, &v) in samples.iter().enumerate() {
            let base = idx * 3;
            buffers.presentation[base] = v;
            buffers.presentation[base + 1] = v;
            buffers.presentation[base + 2] = v;
        }

        let sw = w / sub;
        let sh = h / sub;
        for sy in 0..sh {
            for sx in 0..sw {
                let v = samples[sy * sub * w + sx * sub];
                self.mask[sy * sw + sx] = if v < GRAY_THRESHOLD { 255 } else { 0 };
            }
        }
    }

    fn region_stats(&self) -> Option<RegionStats> {
        let sw = (self.width / self.sub_sample) as usize;
        let mut stats: Option<RegionStats> = None;
        let mut count = 0usize;
        let mut sum_x = 0u64;
        let mut sum_y = 0u64;

        for (idx, &m) in self.mask.iter().enumerate() {
            if m == 0 {
                continue;
            }
            let x = (idx % sw) as i32;
            let y = (idx / sw) as i32;
            count += 1;
            sum_x += x as u64;
            sum_y += y as u64;
            match &mut stats {
                None => {
                    stats = Some(RegionStats {
                        top: (x, y),
                        leftmost: (x, y),
                        rightmost: (x, y),
                        centroid: (0, 0),
                        min_x: x,
                        max_x: x,
                    });
                }
                Some(s) => {
                    if x < s.leftmost.0 {
                        s.leftmost = (x, y);
                    }
                    if x > s.rightmost.0 {
                        s.rightmost = (x, y);
                    }
                    s.min_x = s.min_x.min(x);
                    s.max_x = s.max_x.max(x);
                }
            }
        }

        if count < MIN_REGION_PIXELS {
            return None;
        }
        let mut s = stats?;
        s.centroid = ((sum_x / count as u64) as i32, (sum_y / count as u64) as i32);
        Some(s)
    }

    fn locate_body_points(&self, stats: &RegionStats, buffers: &WorkingBuffers) -> SkeletonResult {
        let sub = self.sub_sample as i32;
        let up = |(x, y): (i32, i32)| (x * sub + sub / 2, y * sub + sub / 2);

        let head = up(stats.top);
        let torso = up(stats.centroid);
        let neck = ((head.0 + torso.0) / 2, (head.1 + torso.1) / 2);
        let half_span = (stats.max_x - stats.min_x).max(1) * sub / 4;
        let left_shoulder = ((neck.0 - half_span).max(0), neck.1);
        let right_shoulder = ((neck.0 + half_span).min(self.width as i32 - 1), neck.1);
        let left_hand = up(stats.leftmost);
        let right_hand = up(stats.rightmost);

        let depth_at = |(x, y): (i32, i32)| -> u16 {
            let x = x.clamp(0, self.width as i32 - 1) as usize;
            let y = y.clamp(0, self.height as i32 - 1) as usize;
            buffers.depth_scratch[y * self.width as usize + x]
        };
        let point = |(x, y): (i32, i32)| Point3D {
            x,
            y,
            z: depth_at((x, y)),
        };

        // Body lean off vertical, degrees; zero when upright.
        let afa = ((head.0 - torso.0) as f32)
            .atan2((torso.1 - head.1) as f32)
            .to_degrees();

        SkeletonResult::new(
            vec![
                (BodyPart::Head, point(head)),
                (BodyPart::Neck, point(neck)),
                (BodyPart::Torso, point(torso)),
                (BodyPart::LeftShoulder, point(left_shoulder)),
                (BodyPart::RightShoulder, point(right_shoulder)),
                (BodyPart::LeftHand, point(left_hand)),
                (BodyPart::RightHand, point(right_hand)),
            ],
            afa,
        )
    }
}

struct RegionStats {
    top: (i32, i32),
    leftmost: (i32, i32),
    rightmost: (i32, i32),
    centroid: (i32, i32),
    min_x: i32,
    max_x: i32,
}

impl AnalysisPipeline for ThresholdAnalyzer {
    fn process(
        &mut self,
        frame: &RawFrame,
        closest: Option<&Point3D>,
        buffers: &mut WorkingBuffers,
    ) -> anyhow::Result<Option<SkeletonResult>> {
        ensure!(
            frame.width == self.width && frame.height == self.height,
            "frame {}x{} does not match analyzer {}x{}",
            frame.width,
            frame.height,
            self.width,
            self.height
        );

        buffers.presentation.fill(0);
        buffers.depth_scratch.fill(0);
        self.mask.fill(0);

        if let Some(samples) = frame.depth_samples() {
            // Without a closest point there is nothing to segment against.
            let Some(closest) = closest else {
                return Ok(None);
            };
            self.binarize_depth(samples, closest, buffers);
        } else if let Some(samples) = frame.gray_samples() {
            self.binarize_gray(samples, buffers);
        } else {
            return Ok(None);
        }

        let Some(stats) = self.region_stats() else {
            return Ok(None);
        };
        let result = self.locate_body_points(&stats, buffers);
        draw_markers(
            &mut buffers.presentation,
            self.width,
            self.height,
            &result,
        );
        Ok(Some(result))
    }
}

/// Annotates the presentation buffer with the computed skeleton.
pub fn draw_markers(buffer: &mut [u8], width: u32, height: u32, result: &SkeletonResult) {
    for &(a, b) in SKELETON_CONNECTIONS {
        if let (Some(pa), Some(pb)) = (result.point(a), result.point(b)) {
            draw_line(
                buffer,
                width,
                height,
                (pa.x, pa.y),
                (pb.x, pb.y),
                MARKER_LINE_COLOR,
                MARKER_LINE_THICKNESS,
            );
        }
    }
    for &(_, p) in result.points() {
        draw_circle(
            buffer,
            width,
            height,
            (p.x, p.y),
            MARKER_POINT_RADIUS,
            MARKER_POINT_COLOR,
        );
    }
}

fn draw_line(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    p0: (i32, i32),
    p1: (i32, i32),
    color: [u8; 3],
    thickness: i32,
) {
    let (mut x0, mut y0) = p0;
    let (x1, y1) = p1;
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (thickness.max(1) - 1) / 2;

    loop {
        put_pixel_safe(buffer, width, height, x0, y0, color);
        if radius > 0 {
            for ox in -radius..=radius {
                for oy in -radius..=radius {
                    if ox == 0 && oy == 0 {
                        continue;
                    }
                    if ox.abs() + oy.abs() <= radius {
                        put_pixel_safe(buffer, width, height, x0 + ox, y0 + oy, color);
                    }
                }
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_circle(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    center: (i32, i32),
    radius: i32,
    color: [u8; 3],
) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel_safe(buffer, width, height, cx + dx, cy + dy, color);
            }
        }
    }
}

fn put_pixel_safe(buffer: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: [u8; 3]) {
    if x < 0 || y < 0 {
        return;
    }
    let (ux, uy) = (x as u32, y as u32);
    if ux >= width || uy >= height {
        return;
    }
    let idx = ((uy * width + ux) as usize) * 3;
    if idx + 2 < buffer.len() {
        buffer[idx..idx + 3].copy_from_slice(&color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract;
    use crate::types::PixelEncoding;

    // 32x32 depth frame with a person-shaped column in the middle.
    fn depth_body_frame() -> RawFrame {
        let (w, h) = (32usize, 32usize);
        let mut samples = vec![0u16; w * h];
        for y in 2..30 {
            for x in 12..20 {
                samples[y * w + x] = 900 + y as u16;
            }
        }
        RawFrame::depth(w as u32, h as u32, PixelEncoding::Depth1Mm, samples)
    }

    #[test]
    fn depth_body_yields_a_skeleton() {
        let frame = depth_body_frame();
        let closest = extract::closest_point(&frame).unwrap();
        let mut analyzer = ThresholdAnalyzer::new(32, 32, 2);
        let mut buffers = WorkingBuffers::new(32, 32);

        let result = analyzer
            .process(&frame, Some(&closest), &mut buffers)
            .unwrap()
            .unwrap();

        let head = result.point(BodyPart::Head).unwrap();
        let torso = result.point(BodyPart::Torso).unwrap();
        assert!(head.y < torso.y);
        assert!(torso.z > 0);
        assert!(result.afa().abs() < 20.0);
        // Presentation got painted where the body is.
        let mid = (16 * 32 + 16) * 3;
        assert!(buffers.presentation[mid] > 0);
    }

    #[test]
    fn depth_frame_without_closest_point_yields_no_skeleton() {
        let frame = depth_body_frame();
        let mut analyzer = ThresholdAnalyzer::new(32, 32, 2);
        let mut buffers = WorkingBuffers::new(32, 32);
        assert!(analyzer.process(&frame, None, &mut buffers).unwrap().is_none());
    }

    #[test]
    fn gray_dark_region_is_foreground() {
        let (w, h) = (32usize, 32usize);
        let mut samples = vec![200u8; w * h];
        for y in 4..28 {
            for x in 10..22 {
                samples[y * w + x] = 10;
            }
        }
        let frame = RawFrame::gray(w as u32, h as u32, samples);

        let mut analyzer = ThresholdAnalyzer::new(32, 32, 2);
        let mut buffers = WorkingBuffers::new(32, 32);
        let result = analyzer.process(&frame, None, &mut buffers).unwrap();
        assert!(result.is_some());
    }

    #[test]
    fn near_empty_frame_yields_no_skeleton() {
        let mut samples = vec![0u16; 32 * 32];
        samples[0] = 700;
        let frame = RawFrame::depth(32, 32, PixelEncoding::Depth1Mm, samples);
        let closest = extract::closest_point(&frame).unwrap();

        let mut analyzer = ThresholdAnalyzer::new(32, 32, 2);
        let mut buffers = WorkingBuffers::new(32, 32);
        assert!(
            analyzer
                .process(&frame, Some(&closest), &mut buffers)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn mismatched_dimensions_are_an_error() {
        let frame = RawFrame::gray(8, 8, vec![0; 64]);
        let mut analyzer = ThresholdAnalyzer::new(32, 32, 2);
        let mut buffers = WorkingBuffers::new(32, 32);
        assert!(analyzer.process(&frame, None, &mut buffers).is_err());
    }
}

/// Factory producing the built-in threshold analyzer.
pub fn threshold_factory(sub_sample: u32) -> AnalyzerFactory {
    Box::new(move |width, height| {
        let analyzer: Box<dyn AnalysisPipeline> =
            Box::new(ThresholdAnalyzer::new(width, height, sub_sample));
        Ok(analyzer)
    })
}
