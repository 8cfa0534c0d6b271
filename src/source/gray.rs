//! Color-to-intensity conversion for camera frames. Everything downstream of
//! the source boundary is encoding-agnostic, so each capture format collapses
//! to a single gray channel here.

use anyhow::{Result, anyhow};
use rayon::prelude::*;
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

#[cfg(feature = "camera-nokhwa")]
use nokhwa::{Buffer, utils::FrameFormat};

#[derive(Debug)]
pub struct GrayFrame {
    pub gray: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[cfg(feature = "camera-nokhwa")]
pub fn convert_camera_frame(frame: &Buffer) -> Result<GrayFrame> {
    let resolution = frame.resolution();
    let width = resolution.width_x;
    let height = resolution.height_y;
    let data = frame.buffer();

    let gray = match frame.source_frame_format() {
        FrameFormat::NV12 => nv12_to_gray(data, width, height)?,
        FrameFormat::YUYV => yuyv_to_gray(data, width, height)?,
        FrameFormat::MJPEG => return mjpeg_to_gray(data),
        FrameFormat::RAWRGB => rgb_to_gray(data, width, height)?,
        FrameFormat::RAWBGR => bgr_to_gray(data, width, height)?,
        FrameFormat::GRAY => gray_passthrough(data, width, height)?,
    };

    Ok(GrayFrame {
        gray,
        width,
        height,
    })
}

/// NV12 leads with a full-resolution luma plane; intensity is a plain copy.
pub fn nv12_to_gray(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let y_plane_len = width as usize * height as usize;
    if data.len() < y_plane_len {
        return Err(anyhow!(
            "NV12 buffer too small: got {}, expected at least {}",
            data.len(),
            y_plane_len
        ));
    }
    Ok(data[..y_plane_len].to_vec())
}

/// YUYV packs luma into every even byte.
pub fn yuyv_to_gray(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected_len = width as usize * height as usize * 2;
    if data.len() < expected_len {
        return Err(anyhow!(
            "YUYV buffer too small: got {}, expected {}",
            data.len(),
            expected_len
        ));
    }
    Ok(data[..expected_len].iter().step_by(2).copied().collect())
}

pub fn mjpeg_to_gray(data: &[u8]) -> Result<GrayFrame> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::Luma);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let gray = decoder
        .decode()
        .map_err(|err| anyhow!("MJPEG decode failed: {err:?}"))?;

    let info = decoder
        .info()
        .ok_or_else(|| anyhow!("MJPEG decode yielded no image info"))?;
    let width = info.width as u32;
    let height = info.height as u32;
    let expected_len = width as usize * height as usize;
    if gray.len() < expected_len {
        return Err(anyhow!(
            "MJPEG decode produced too few bytes: got {}, expected {}",
            gray.len(),
            expected_len
        ));
    }

    Ok(GrayFrame {
        gray,
        width,
        height,
    })
}

pub fn rgb_to_gray(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    rgb_like_to_gray(data, width, height, false)
}

pub fn bgr_to_gray(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    rgb_like_to_gray(data, width, height, true)
}

fn rgb_like_to_gray(data: &[u8], width: u32, height: u32, swap_rb: bool) -> Result<Vec<u8>> {
    let pixels = width as usize * height as usize;
    let expected_len = pixels * 3;
    if data.len() < expected_len {
        return Err(anyhow!(
            "RGB buffer too small: got {}, expected {}",
            data.len(),
            expected_len
        ));
    }

    let mut gray = vec![0u8; pixels];
    gray.par_iter_mut()
        .zip(data[..expected_len].par_chunks_exact(3))
        .for_each(|(dst, src)| {
            let (r, b) = if swap_rb {
                (src[2], src[0])
            } else {
                (src[0], src[2])
            };
            *dst = luma(r, src[1], b);
        });

    Ok(gray)
}

pub fn gray_passthrough(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected_len = width as usize * height as usize;
    if data.len() < expected_len {
        return Err(anyhow!(
            "GRAY buffer too small: got {}, expected {}",
            data.len(),
            expected_len
        ));
    }
    Ok(data[..expected_len].to_vec())
}

// BT.709 integer luma.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((54 * r as u32 + 183 * g as u32 + 19 * b as u32) >> 8) as u8
}
