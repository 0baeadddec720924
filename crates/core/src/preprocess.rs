//! Image preparation ahead of planning: resize, background marking, and the
//! style transform. Steps always run in that order.

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage, RgbaImage};

use crate::bitmap::Bitmap;
use crate::error::{DrawError, Notice};
use crate::types::{Color, DrawStyle};

pub const DEFAULT_WHITE_THRESHOLD: u8 = 245;

/// Channel sum below which a pixel counts as dark (outline predicate).
pub const DEFAULT_DARK_THRESHOLD: u32 = 450;

const FIND_EDGES: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0];
const EDGE_ENHANCE: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 10.0, -1.0, -1.0, -1.0, -1.0];
const SMOOTH: [f32; 9] = [1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0];

const OUTLINE_CONTRAST: f32 = 2.0;
const VECTOR_BLUR_SIGMA: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessOptions {
    /// Scale factor for both dimensions, must be > 0.
    pub resolution: f32,
    /// Pixels with every channel at or above this are background.
    pub white_threshold: u8,
    /// Disable to keep near-white pixels drawable.
    pub skip_background: bool,
    pub style: DrawStyle,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            white_threshold: DEFAULT_WHITE_THRESHOLD,
            skip_background: true,
            style: DrawStyle::Pixel,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub bitmap: Bitmap,
    pub notices: Vec<Notice>,
}

/// Decode an in-memory image file (PNG, JPEG, GIF, BMP).
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, DrawError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

pub fn is_dark(color: Color, threshold: u32) -> bool {
    color.channel_sum() < threshold
}

pub fn preprocess(
    image: Option<&RgbaImage>,
    options: &PreprocessOptions,
) -> Result<Preprocessed, DrawError> {
    let image = image.ok_or(DrawError::NoImage)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(DrawError::InvalidOption("image has no pixels".into()));
    }
    if !options.resolution.is_finite() || options.resolution <= 0.0 {
        return Err(DrawError::InvalidOption(format!(
            "resolution must be greater than 0, got {}",
            options.resolution
        )));
    }

    let mut notices = Vec::new();

    let mut img = if options.resolution != 1.0 {
        let (w, h) = image.dimensions();
        let nw = ((w as f32 * options.resolution) as u32).max(1);
        let nh = ((h as f32 * options.resolution) as u32).max(1);
        notices.push(Notice::Resized { width: nw, height: nh, multiplier: options.resolution });
        imageops::resize(image, nw, nh, FilterType::Lanczos3)
    } else {
        image.clone()
    };

    if options.skip_background {
        let marked = mark_background(&mut img, options.white_threshold);
        let total = img.width() as usize * img.height() as usize;
        notices.push(Notice::BackgroundMarked { marked, total });
    }

    let (rgb, mask) = split_alpha(&img);
    let (width, height) = rgb.dimensions();

    let bitmap = match options.style {
        DrawStyle::Pixel => to_bitmap(&rgb, mask)?,
        DrawStyle::Outline => {
            let edges = outline_transform(&rgb);
            // Edges sit on the bright side of a boundary, which is usually
            // background, so visibility is not carried into outline mode.
            let pixels = edges.pixels().map(|p| Color::new(p[0], p[0], p[0])).collect();
            Bitmap::new(width, height, pixels)?
        }
        DrawStyle::Vector => {
            let (smoothed, fallback) = vector_transform(&rgb, cfg!(feature = "bilateral"));
            if fallback {
                notices.push(Notice::BilateralUnavailable);
            }
            to_bitmap(&smoothed, mask)?
        }
    };

    Ok(Preprocessed { bitmap, notices })
}

/// Set alpha to 0 on near-white pixels. Returns how many were newly marked.
fn mark_background(img: &mut RgbaImage, threshold: u8) -> usize {
    let mut marked = 0;
    for p in img.pixels_mut() {
        if p[3] != 0 && p[0] >= threshold && p[1] >= threshold && p[2] >= threshold {
            p[3] = 0;
            marked += 1;
        }
    }
    marked
}

fn split_alpha(img: &RgbaImage) -> (RgbImage, Vec<bool>) {
    let rgb = RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y);
        Rgb([p[0], p[1], p[2]])
    });
    let mask = img.pixels().map(|p| p[3] != 0).collect();
    (rgb, mask)
}

fn to_bitmap(rgb: &RgbImage, mask: Vec<bool>) -> Result<Bitmap, DrawError> {
    let pixels = rgb.pixels().map(|p| Color::new(p[0], p[1], p[2])).collect();
    Bitmap::with_visibility(rgb.width(), rgb.height(), pixels, mask)
}

/// Grayscale, edge detection, contrast boost, then inversion so that edges
/// come out dark on a light field.
fn outline_transform(rgb: &RgbImage) -> GrayImage {
    let gray = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let p = rgb.get_pixel(x, y);
        let l = (p[0] as u32 * 299 + p[1] as u32 * 587 + p[2] as u32 * 114 + 500) / 1000;
        Luma([l as u8])
    });
    let mut edges = convolve3x3(&gray, &FIND_EDGES, 1.0);
    enhance_contrast(&mut edges, OUTLINE_CONTRAST);
    imageops::invert(&mut edges);
    edges
}

/// Light blur, edge enhancement, then edge-preserving smoothing, or plain
/// smoothing when `bilateral` is off. The second value is true when the
/// plain smoothing ran.
fn vector_transform(rgb: &RgbImage, bilateral: bool) -> (RgbImage, bool) {
    let blurred = imageops::blur(rgb, VECTOR_BLUR_SIGMA);
    let enhanced = convolve3x3(&blurred, &EDGE_ENHANCE, 2.0);
    if bilateral {
        (bilateral_filter(&enhanced, 9, 75.0, 75.0), false)
    } else {
        (convolve3x3(&enhanced, &SMOOTH, 13.0), true)
    }
}

/// 3×3 convolution with clamped borders. `divisor` normalizes the kernel.
fn convolve3x3<P>(src: &ImageBuffer<P, Vec<u8>>, kernel: &[f32; 9], divisor: f32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (w, h) = src.dimensions();
    let mut out: ImageBuffer<P, Vec<u8>> = ImageBuffer::new(w, h);
    let mut acc = vec![0f32; P::CHANNEL_COUNT as usize];

    for (x, y, px) in out.enumerate_pixels_mut() {
        acc.iter_mut().for_each(|a| *a = 0.0);
        for (i, k) in kernel.iter().enumerate() {
            let sx = (x as i64 + (i % 3) as i64 - 1).clamp(0, w as i64 - 1) as u32;
            let sy = (y as i64 + (i / 3) as i64 - 1).clamp(0, h as i64 - 1) as u32;
            for (a, v) in acc.iter_mut().zip(src.get_pixel(sx, sy).channels()) {
                *a += *v as f32 * k;
            }
        }
        for (c, a) in px.channels_mut().iter_mut().zip(&acc) {
            *c = (a / divisor).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Blend each pixel away from the image mean by `factor`.
fn enhance_contrast(img: &mut GrayImage, factor: f32) {
    let count = (img.width() as u64 * img.height() as u64).max(1);
    let sum: u64 = img.pixels().map(|p| p[0] as u64).sum();
    let mean = (sum as f32 / count as f32).round();
    for p in img.pixels_mut() {
        p[0] = (mean + (p[0] as f32 - mean) * factor).round().clamp(0.0, 255.0) as u8;
    }
}

/// Bilateral filter over a circular window; color distance is the L1 sum of
/// channel differences.
fn bilateral_filter(src: &RgbImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> RgbImage {
    let (w, h) = src.dimensions();
    let radius = (diameter / 2) as i64;

    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let color_weight: Vec<f32> = (0..=3 * 255)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    let space_coeff = -0.5 / (sigma_space * sigma_space);
    let mut offsets: Vec<(i64, i64, f32)> = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = dx * dx + dy * dy;
            if r2 <= radius * radius {
                offsets.push((dx, dy, (r2 as f32 * space_coeff).exp()));
            }
        }
    }

    RgbImage::from_fn(w, h, |x, y| {
        let center = src.get_pixel(x, y);
        let mut acc = [0f32; 3];
        let mut norm = 0f32;
        for &(dx, dy, ws) in &offsets {
            let sx = (x as i64 + dx).clamp(0, w as i64 - 1) as u32;
            let sy = (y as i64 + dy).clamp(0, h as i64 - 1) as u32;
            let p = src.get_pixel(sx, sy);
            let diff: usize = (0..3)
                .map(|c| (p[c] as i32 - center[c] as i32).unsigned_abs() as usize)
                .sum();
            let weight = ws * color_weight[diff];
            for c in 0..3 {
                acc[c] += p[c] as f32 * weight;
            }
            norm += weight;
        }
        Rgb(acc.map(|v| (v / norm).round().clamp(0.0, 255.0) as u8))
    })
}
