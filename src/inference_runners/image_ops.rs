//! Functions to preprocess images.
//!
//! The transform is fixed: shorter edge to `size / 0.875`, center crop to
//! `size x size`, scale to [0, 1], per-channel CLIP normalization, HWC to CHW
//! and a leading batch axis.

use fast_image_resize::{
    images::Image as FirImage, pixels::PixelType, FilterType, ResizeAlg, ResizeOptions, Resizer,
};
use rayon::prelude::*;

use crate::common::{BinError, BinImage, Result};
use crate::inference_runners::input_wrapper::X;

/// Per-channel mean the reference model was trained with.
pub const CLIP_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
/// Per-channel standard deviation the reference model was trained with.
pub const CLIP_STD: [f32; 3] = [0.26862954, 0.26130258, 0.27577711];
/// Fraction of the resized short edge kept by the center crop.
pub const CROP_PCT: f64 = 0.875;

/// Decodes `bytes` and runs [`preprocess`] on the result.
pub fn preprocess_bytes(bytes: &[u8], target_size: u32) -> Result<X> {
    preprocess(BinImage::decode(bytes)?, target_size)
}

/// Main preprocessing entry point. Returns a `(1, 3, target_size, target_size)` tensor.
pub fn preprocess(image: BinImage, target_size: u32) -> Result<X> {
    if target_size == 0 {
        return Err(BinError::InvalidRequest("target size must be positive".to_string()));
    }
    let src = image.into_fir_image()?;
    let cropped = resize_center_crop(&src, target_size)?;

    let size = target_size as usize;
    let planes = nchw_normalize_flat(cropped.buffer(), size * size);
    X::from_shape_vec(&[1, 3, size, size], planes)
}

/// Output dimensions with the shorter edge at `floor(target / 0.875)`.
pub fn resize_dims(width: u32, height: u32, target_size: u32) -> (u32, u32) {
    let short_target = (target_size as f64 / CROP_PCT) as u32;
    let short_target = short_target.max(target_size);
    let scale_long = |long: u32, short: u32| -> u32 {
        ((long as f64 * short_target as f64 / short as f64).round() as u32).max(short_target)
    };

    if width <= height {
        (short_target, scale_long(height, width))
    } else {
        (scale_long(width, height), short_target)
    }
}

/// Resize to [`resize_dims`] and take the centered `size x size` window.
///
/// The window is mapped back into source coordinates and handed to the resizer
/// as a crop, so only `size x size` pixels are ever allocated regardless of the
/// input aspect ratio.
fn resize_center_crop<'a>(img: &FirImage, size: u32) -> Result<FirImage<'a>> {
    let (w0, h0) = (img.width(), img.height());
    let (new_w, new_h) = resize_dims(w0, h0, size);
    let scale_x = new_w as f64 / w0 as f64;
    let scale_y = new_h as f64 / h0 as f64;

    let left = ((new_w - size) / 2) as f64 / scale_x;
    let top = ((new_h - size) / 2) as f64 / scale_y;
    let options = ResizeOptions::new()
        .resize_alg(ResizeAlg::Convolution(FilterType::CatmullRom))
        .crop(left, top, size as f64 / scale_x, size as f64 / scale_y);

    let mut dst = FirImage::new(size, size, PixelType::U8x3);
    let mut resizer = Resizer::new();
    resizer
        .resize(img, &mut dst, &options)
        .map_err(|e| BinError::Decode(format!("failed to resize image: {e}")))?;
    Ok(dst)
}

/// Interleaved RGB bytes to normalized channel planes, `[R..., G..., B...]`.
fn nchw_normalize_flat(buf: &[u8], hw: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; 3 * hw];

    out.par_chunks_mut(hw)
        .enumerate()
        .for_each(|(c, plane)| {
            let (mean, std) = (CLIP_MEAN[c], CLIP_STD[c]);
            for (i, v) in plane.iter_mut().enumerate() {
                let x = buf[3 * i + c] as f32 / 255.0;
                *v = (x - mean) / std;
            }
        });

    out
}

/// Smallest and largest values a normalized channel can take.
pub fn normalized_bounds(channel: usize) -> (f32, f32) {
    (
        (0.0 - CLIP_MEAN[channel]) / CLIP_STD[channel],
        (1.0 - CLIP_MEAN[channel]) / CLIP_STD[channel],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_edge_goes_to_256_for_224() {
        assert_eq!(resize_dims(640, 480, 224), (341, 256));
        assert_eq!(resize_dims(480, 640, 224), (256, 341));
        assert_eq!(resize_dims(100, 100, 224), (256, 256));
        assert_eq!(resize_dims(4000, 10, 224), (102400, 256));
    }

    #[test]
    fn channels_use_their_own_constants() {
        let buf = [255u8, 0, 128, 255, 0, 128];
        let out = nchw_normalize_flat(&buf, 2);
        assert_eq!(out[0], (1.0 - CLIP_MEAN[0]) / CLIP_STD[0]);
        assert_eq!(out[2], (0.0 - CLIP_MEAN[1]) / CLIP_STD[1]);
        assert_eq!(out[4], (128.0 / 255.0 - CLIP_MEAN[2]) / CLIP_STD[2]);
        assert_eq!(out[4], out[5]);
    }
}
