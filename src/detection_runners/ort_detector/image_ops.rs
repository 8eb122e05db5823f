//! Functions to preprocess images and map boxes back to the source frame.

use anyhow::{bail, Result};
use fast_image_resize::{
    images::{CroppedImageMut, Image as FirImage},
    pixels::PixelType,
    FilterType, ResizeAlg, ResizeOptions, Resizer,
};
use image::RgbImage;
use ndarray::{Array, ArrayViewMut2};

use crate::detection_runners::input_wrapper::X;

/// Grey used to fill the letterbox border.
pub const LETTERBOX_FILL: u8 = 114;

/// Geometry of one letterbox transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxInfo {
    pub width_src: u32,
    pub height_src: u32,
    /// Size of the resized content before padding.
    pub width_unpad: u32,
    pub height_unpad: u32,
    /// Size of the padded network input.
    pub width_dst: u32,
    pub height_dst: u32,
    pub left: u32,
    pub top: u32,
    pub gain: f32,
}

impl LetterboxInfo {
    /// Plans the resize of a `width x height` image into a `target` square.
    ///
    /// With `auto` the padding is reduced to the smallest amount that keeps both sides
    /// a multiple of `stride`, so the output is usually a rectangle.
    pub fn new(width: u32, height: u32, target: u32, stride: u32, auto: bool) -> Self {
        let gain = (target as f32 / height as f32).min(target as f32 / width as f32);
        let width_unpad = (width as f32 * gain).round() as u32;
        let height_unpad = (height as f32 * gain).round() as u32;

        let (mut dw, mut dh) = (target.saturating_sub(width_unpad), target.saturating_sub(height_unpad));
        if auto && stride > 0 {
            dw %= stride;
            dh %= stride;
        }
        let (dw, dh) = (dw as f32 / 2., dh as f32 / 2.);

        let (top, bottom) = ((dh - 0.1).round() as u32, (dh + 0.1).round() as u32);
        let (left, right) = ((dw - 0.1).round() as u32, (dw + 0.1).round() as u32);

        Self {
            width_src: width,
            height_src: height,
            width_unpad,
            height_unpad,
            width_dst: width_unpad + left + right,
            height_dst: height_unpad + top + bottom,
            left,
            top,
            gain,
        }
    }
}

pub fn make_divisible(x: usize, divisor: usize) -> usize {
    x.div_ceil(divisor) * divisor
}

/// Rounds the requested input size up to a multiple of the model stride.
pub fn check_img_size(img_size: u32, stride: u32) -> u32 {
    let new_size = make_divisible(img_size as usize, stride.max(1) as usize) as u32;
    if new_size != img_size {
        log::warn!("img_size {} must be multiple of max stride {}, updating to {}", img_size, stride, new_size);
    }
    new_size
}

pub fn to_fir_image<'a>(image: &RgbImage) -> Result<FirImage<'a>> {
    let (width, height) = image.dimensions();
    Ok(FirImage::from_vec_u8(width, height, image.as_raw().clone(), PixelType::U8x3)?)
}

/// Reverses BGR pixel data into an RGB image.
pub fn bgr_to_rgb(width: u32, height: u32, bgr: &[u8]) -> Result<RgbImage> {
    let expected = match (width as usize).checked_mul(height as usize).and_then(|n| n.checked_mul(3)) {
        Some(n) => n,
        None => bail!("Image size {}x{} overflows the buffer length", width, height),
    };
    if bgr.len() != expected {
        bail!("Unexpected buffer size: got {}, expected {}", bgr.len(), expected);
    }
    let rgb: Vec<u8> = bgr.chunks_exact(3).flat_map(|c| [c[2], c[1], c[0]]).collect();
    match RgbImage::from_raw(width, height, rgb) {
        Some(image) => Ok(image),
        None => bail!("Failed to build a {}x{} RGB image", width, height),
    }
}

/// Letterboxes `img` into a `target` square input aligned to `stride`.
pub fn letterbox<'a>(img: &RgbImage, target: u32, stride: u32, auto: bool) -> Result<(FirImage<'a>, LetterboxInfo)> {
    let (w0, h0) = img.dimensions();
    if w0 == 0 || h0 == 0 {
        bail!("Cannot letterbox an empty image ({}x{})", w0, h0);
    }
    let info = LetterboxInfo::new(w0, h0, target, stride, auto);

    let mut padded = FirImage::from_vec_u8(
        info.width_dst,
        info.height_dst,
        vec![LETTERBOX_FILL; (info.width_dst * info.height_dst * 3) as usize],
        PixelType::U8x3,
    )?;

    let src = to_fir_image(img)?;
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    let mut resizer = Resizer::new();
    let mut cropped = CroppedImageMut::new(&mut padded, info.left, info.top, info.width_unpad, info.height_unpad)?;
    resizer.resize(&src, &mut cropped, &options)?;

    Ok((padded, info))
}

/// HWC u8 to CHW f32 in `[0, 1]`.
pub fn nchw_normalize_flat(img: &FirImage) -> Result<Vec<f32>> {
    let buf = img.buffer();
    let w = img.width() as usize;
    let h = img.height() as usize;

    if buf.len() != w * h * 3 {
        bail!("Unexpected buffer size: got {}, expected {}", buf.len(), w * h * 3);
    }

    let mut out = vec![0.0f32; buf.len()];
    let hw = w * h;

    for i in 0..hw {
        out[i] = buf[3 * i] as f32 / 255.0;
        out[i + hw] = buf[3 * i + 1] as f32 / 255.0;
        out[i + 2 * hw] = buf[3 * i + 2] as f32 / 255.0;
    }

    Ok(out)
}

/// Builds the `(1, 3, h, w)` network input for one image.
pub fn preprocess(img: &RgbImage, target: u32, stride: u32) -> Result<(X, LetterboxInfo)> {
    let (padded, info) = letterbox(img, target, stride, true)?;
    let chw = nchw_normalize_flat(&padded)?;
    let batch = Array::from_shape_vec(
        (1, 3, info.height_dst as usize, info.width_dst as usize),
        chw,
    )?
    .into_dyn();
    Ok((X::from(batch), info))
}

/// Maps `(x1, y1, x2, y2, ..)` rows from the letterboxed network frame described by
/// `info` back to the source frame and clips them to it.
pub fn scale_boxes(info: &LetterboxInfo, boxes: &mut ArrayViewMut2<f32>) {
    let (left, top) = (info.left as f32, info.top as f32);
    let (w0, h0) = (info.width_src as f32, info.height_src as f32);

    for mut row in boxes.rows_mut() {
        row[0] = ((row[0] - left) / info.gain).clamp(0., w0);
        row[1] = ((row[1] - top) / info.gain).clamp(0., h0);
        row[2] = ((row[2] - left) / info.gain).clamp(0., w0);
        row[3] = ((row[3] - top) / info.gain).clamp(0., h0);
    }
}
