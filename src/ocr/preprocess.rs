use image::{GrayImage, RgbaImage};

use crate::config::{Boundary, CropBounds};
use crate::error::PipelineError;

/// An absolute, non-empty pixel rectangle inside an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Converts one boundary to a pixel offset along an axis of length `extent`.
///
/// Fractions truncate toward zero, so 0.9 of 1000 is 900 and 0.5 of 1001 is 500.
fn boundary_to_pixels(boundary: Boundary, extent: u32) -> i64 {
    match boundary {
        Boundary::Fraction(f) => (extent as f64 * f) as i64,
        Boundary::Pixels(p) => p,
    }
}

/// Resolves configured crop bounds against an image of `width` x `height`.
///
/// Every edge is clamped into the image, so out-of-range bounds never lead to
/// an out-of-range read. A rectangle that collapses after clamping is an
/// `InvalidCropRegion` error.
pub fn resolve_crop(width: u32, height: u32, bounds: &CropBounds) -> Result<CropRect, PipelineError> {
    let w = width as i64;
    let h = height as i64;

    let left = boundary_to_pixels(bounds.left, width).clamp(0, w);
    let top = boundary_to_pixels(bounds.top, height).clamp(0, h);
    let right = boundary_to_pixels(bounds.right, width).clamp(0, w);
    let bottom = boundary_to_pixels(bounds.bottom, height).clamp(0, h);

    if left >= right || top >= bottom {
        return Err(PipelineError::InvalidCropRegion {
            left,
            top,
            right,
            bottom,
        });
    }

    // All four values are within [0, u32::MAX] after clamping.
    Ok(CropRect {
        x: left as u32,
        y: top as u32,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    })
}

/// Returns the sub-image covered by `rect`.
pub fn crop_image(img: &RgbaImage, rect: &CropRect) -> RgbaImage {
    image::imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image()
}

/// Converts to 8-bit grayscale for the recognizer.
pub fn to_grayscale(img: &RgbaImage) -> GrayImage {
    image::imageops::grayscale(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn bounds(left: Boundary, top: Boundary, right: Boundary, bottom: Boundary) -> CropBounds {
        CropBounds {
            left,
            top,
            right,
            bottom,
        }
    }

    #[test]
    fn test_default_region() {
        let rect = resolve_crop(1000, 600, &CropBounds::default()).unwrap();
        assert_eq!(
            rect,
            CropRect {
                x: 0,
                y: 60,
                width: 500,
                height: 480
            }
        );
    }

    #[test]
    fn test_fractions_truncate() {
        let rect = resolve_crop(1001, 1000, &CropBounds::default()).unwrap();
        // 0.5 * 1001 = 500.5 -> 500, 0.9 * 1000 = 900
        assert_eq!(rect.width, 500);
        assert_eq!(rect.y, 100);
        assert_eq!(rect.height, 800);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let b = bounds(
            Boundary::Fraction(0.13),
            Boundary::Pixels(7),
            Boundary::Fraction(0.77),
            Boundary::Fraction(0.61),
        );
        let first = resolve_crop(1366, 768, &b).unwrap();
        let second = resolve_crop(1366, 768, &b).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_out_of_range_bounds_are_clamped() {
        let b = bounds(
            Boundary::Pixels(-50),
            Boundary::Fraction(-0.2),
            Boundary::Pixels(5000),
            Boundary::Fraction(1.5),
        );
        let rect = resolve_crop(100, 80, &b).unwrap();
        assert_eq!(
            rect,
            CropRect {
                x: 0,
                y: 0,
                width: 100,
                height: 80
            }
        );
    }

    #[test]
    fn test_inverted_region_is_invalid() {
        let b = bounds(
            Boundary::Fraction(0.6),
            Boundary::Fraction(0.1),
            Boundary::Fraction(0.4),
            Boundary::Fraction(0.9),
        );
        assert!(matches!(
            resolve_crop(100, 100, &b),
            Err(PipelineError::InvalidCropRegion { left: 60, right: 40, .. })
        ));
    }

    #[test]
    fn test_region_clamped_to_nothing_is_invalid() {
        // Both vertical edges land below the image and clamp to the same row.
        let b = bounds(
            Boundary::Pixels(0),
            Boundary::Pixels(150),
            Boundary::Pixels(50),
            Boundary::Pixels(200),
        );
        assert!(matches!(
            resolve_crop(100, 100, &b),
            Err(PipelineError::InvalidCropRegion { top: 100, bottom: 100, .. })
        ));
    }

    #[test]
    fn test_crop_image_and_grayscale() {
        let img: RgbaImage = ImageBuffer::from_fn(100, 200, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let rect = CropRect {
            x: 10,
            y: 50,
            width: 50,
            height: 20,
        };
        let cropped = crop_image(&img, &rect);

        assert_eq!(cropped.dimensions(), (50, 20));
        assert_eq!(cropped.get_pixel(0, 0)[0], 10);
        assert_eq!(cropped.get_pixel(0, 0)[1], 50);

        let gray = to_grayscale(&cropped);
        assert_eq!(gray.dimensions(), (50, 20));
    }
}
