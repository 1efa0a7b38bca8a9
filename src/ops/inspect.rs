//! Read-only image inspection.
//!
//! Reports dimensions, color mode, and whether the pixel layout carries
//! an alpha channel. Never replaces the image, so a pipeline step using
//! it leaves the carried image untouched.

use image::DynamicImage;
use serde_json::{Map, Value};

use super::StepOutput;

/// Inspect `image` and return its details as metrics.
pub fn run(image: &DynamicImage) -> StepOutput {
    let mut metrics = Map::new();
    metrics.insert(
        "success".to_string(),
        "Successfully retrieved image details.".into(),
    );
    metrics.insert("width".to_string(), image.width().into());
    metrics.insert("height".to_string(), image.height().into());
    metrics.insert("mode".to_string(), mode_label(image).into());
    let has_alpha = if image.color().has_alpha() { 1 } else { 0 };
    metrics.insert("has_transparency_data".to_string(), has_alpha.into());
    StepOutput::metrics_only(metrics)
}

/// Color-mode label for the report.
///
/// The label vocabulary is inherited from the wire contract: RGB, L,
/// CMYK, YCbCr, CMY, HLS, HSV, LAB, Luv, XYZ, Unknown. Decoded images
/// only ever hold RGB or luma samples, so the exotic labels stay
/// reserved and anything unrecognized maps to Unknown.
fn mode_label(image: &DynamicImage) -> &'static str {
    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_) => "L",
        DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_)
        | DynamicImage::ImageRgb32F(_)
        | DynamicImage::ImageRgba32F(_) => "RGB",
        _ => "Unknown",
    }
}
