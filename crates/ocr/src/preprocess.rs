use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::contrast::otsu_level;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

use crate::config::DeskewOptions;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// A page image ready for recognition.
#[derive(Debug, Clone)]
pub struct Prepared {
    /// Grayscale, contrast-stretched, deskewed PNG.
    pub png: Vec<u8>,
    /// Rotation applied, in degrees (counter-clockwise positive).
    pub skew_degrees: f32,
}

/// Load an image file, normalize and deskew it.
pub fn prepare_for_ocr(path: &Path, deskew: &DeskewOptions) -> Result<Prepared, PreprocessError> {
    let img = image::open(path)?;
    prepare(img, deskew)
}

/// Process raw image bytes (JPEG / PNG / WEBP / …).
pub fn prepare_for_ocr_from_bytes(data: &[u8], deskew: &DeskewOptions) -> Result<Prepared, PreprocessError> {
    let img = image::load_from_memory(data)?;
    prepare(img, deskew)
}

fn prepare(img: DynamicImage, deskew: &DeskewOptions) -> Result<Prepared, PreprocessError> {
    let gray = normalize(img);
    let (gray, skew_degrees) = if deskew.enabled {
        let angle = estimate_skew(&gray, deskew);
        (rotate_degrees(&gray, angle, Interpolation::Bicubic), angle)
    } else {
        (gray, 0.0)
    };
    Ok(Prepared { png: encode_as_png(DynamicImage::ImageLuma8(gray))?, skew_degrees })
}

/// Grayscale + contrast stretch.
fn normalize(img: DynamicImage) -> GrayImage {
    // Very large scans are downscaled; recognizers work best around 300 DPI / ~2000 px.
    let img = if img.width() > 2800 || img.height() > 2800 {
        img.resize(2800, 2800, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let gray: GrayImage = img.to_luma8();

    let (min_px, max_px) = gray
        .pixels()
        .fold((255u8, 0u8), |(mn, mx), p| (mn.min(p[0]), mx.max(p[0])));

    if max_px == min_px {
        return gray;
    }

    let range = (max_px - min_px) as u32;
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        Luma([((p - min_px) as u32 * 255 / range) as u8])
    })
}

/// Find the rotation that makes text rows sharpest.
///
/// The page is binarised with Otsu (ink = 255) and each candidate angle in
/// `[-limit, +limit]` is scored by Σ (h[i+1] − h[i])² over the row-projection
/// profile. Aligned text lines produce the steepest profile. The search runs
/// on a copy no larger than 800 px per side.
fn estimate_skew(gray: &GrayImage, opts: &DeskewOptions) -> f32 {
    if opts.step_degrees <= 0.0 || opts.limit_degrees <= 0.0 {
        return 0.0;
    }

    let small = if gray.width() > 800 || gray.height() > 800 {
        DynamicImage::ImageLuma8(gray.clone())
            .resize(800, 800, image::imageops::FilterType::Triangle)
            .to_luma8()
    } else {
        gray.clone()
    };

    let level = otsu_level(&small);
    let ink: GrayImage = ImageBuffer::from_fn(small.width(), small.height(), |x, y| {
        if small.get_pixel(x, y)[0] > level {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });

    let steps = (opts.limit_degrees / opts.step_degrees).floor() as i32;
    let mut best = (0.0f32, f64::NEG_INFINITY);
    for i in -steps..=steps {
        let angle = i as f32 * opts.step_degrees;
        let score = profile_score(&rotate_mask(&ink, angle));
        if score > best.1 {
            best = (angle, score);
        }
    }
    best.0
}

fn profile_score(mask: &GrayImage) -> f64 {
    let rows: Vec<f64> = (0..mask.height())
        .map(|y| (0..mask.width()).map(|x| mask.get_pixel(x, y)[0] as f64).sum())
        .collect();
    rows.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum()
}

fn rotate_mask(mask: &GrayImage, degrees: f32) -> GrayImage {
    if degrees == 0.0 {
        return mask.clone();
    }
    rotate_about_center(mask, -degrees.to_radians(), Interpolation::Nearest, Luma([0u8]))
}

/// Rotate counter-clockwise by `degrees`, filling uncovered corners with paper white.
fn rotate_degrees(gray: &GrayImage, degrees: f32, interpolation: Interpolation) -> GrayImage {
    if degrees == 0.0 {
        return gray.clone();
    }
    rotate_about_center(gray, -degrees.to_radians(), interpolation, Luma([255u8]))
}

fn encode_as_png(img: DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_gray(width: u32, height: u32, value: u8) -> DynamicImage {
        let img: GrayImage = ImageBuffer::from_fn(width, height, |_, _| Luma([value]));
        DynamicImage::ImageLuma8(img)
    }

    fn gradient_gray(width: u32, height: u32) -> DynamicImage {
        let img: GrayImage = ImageBuffer::from_fn(width, height, |x, _| Luma([(x * 255 / width) as u8]));
        DynamicImage::ImageLuma8(img)
    }

    /// White page with dark horizontal bars standing in for text lines.
    fn ruled_page() -> GrayImage {
        ImageBuffer::from_fn(200, 200, |x, y| {
            let on_line = (y % 20) < 4 && (20..180).contains(&x) && (20..180).contains(&y);
            if on_line { Luma([10u8]) } else { Luma([245u8]) }
        })
    }

    #[test]
    fn normalize_uniform_image_returns_same() {
        let result = normalize(solid_gray(10, 10, 128));
        assert_eq!(result.width(), 10);
        assert_eq!(result.height(), 10);
    }

    #[test]
    fn normalize_gradient_stretches_to_full_range() {
        let gray = normalize(gradient_gray(256, 1));
        let min = gray.pixels().map(|p| p[0]).min().unwrap();
        let max = gray.pixels().map(|p| p[0]).max().unwrap();
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn large_image_is_resized() {
        let img: GrayImage = ImageBuffer::from_fn(3000, 3000, |_, _| Luma([200u8]));
        let result = normalize(DynamicImage::ImageLuma8(img));
        assert!(result.width() <= 2800 && result.height() <= 2800);
    }

    #[test]
    fn straight_page_has_no_skew() {
        let opts = DeskewOptions { enabled: true, limit_degrees: 5.0, step_degrees: 1.0 };
        assert_eq!(estimate_skew(&ruled_page(), &opts), 0.0);
    }

    #[test]
    fn rotated_page_is_detected() {
        let tilted = rotate_degrees(&ruled_page(), 3.0, Interpolation::Nearest);
        let opts = DeskewOptions { enabled: true, limit_degrees: 5.0, step_degrees: 1.0 };
        let angle = estimate_skew(&tilted, &opts);
        assert!((angle + 3.0).abs() <= 1.0, "angle was {angle}");
    }

    #[test]
    fn disabled_deskew_reports_zero() {
        let mut png = Vec::new();
        DynamicImage::ImageLuma8(ruled_page())
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let opts = DeskewOptions { enabled: false, ..DeskewOptions::default() };
        let prepared = prepare_for_ocr_from_bytes(&png, &opts).unwrap();
        assert_eq!(prepared.skew_degrees, 0.0);
        assert_eq!(&prepared.png[..4], b"\x89PNG");
    }
}
