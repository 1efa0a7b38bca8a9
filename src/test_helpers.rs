//! Shared fixtures for the imagemill test suite.
//!
//! Small deterministic images for transform tests, plus a shorthand for
//! building args maps from JSON literals.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let image = rgba_fixture(100, 200);
//! let args = obj(json!({"rotation_angle": 90}));
//! ```

use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use serde_json::{Map, Value};

/// Opaque RGBA gradient image. Pixel values vary with position so
/// transforms that move pixels around are distinguishable.
pub fn rgba_fixture(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    }))
}

/// Plain RGB gradient image, the layout a decoded JPEG arrives in.
pub fn rgb_fixture(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

/// RGBA image whose every pixel is fully transparent red.
pub fn transparent_fixture(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 0])))
}

/// JSON object literal as an owned args map.
///
/// Panics when handed anything but an object; tests only ever pass
/// `json!({...})` literals.
pub fn obj(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}
