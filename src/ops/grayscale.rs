//! Grayscale conversion.

use image::DynamicImage;
use serde_json::Map;

use super::StepOutput;

/// Convert `image` to a single 8-bit luma channel. Takes no arguments
/// and cannot fail.
pub fn run(image: &DynamicImage) -> StepOutput {
    let gray = DynamicImage::ImageLuma8(image.to_luma8());
    let mut metrics = Map::new();
    metrics.insert("success".to_string(), "Image grayscaled successfully.".into());
    metrics.insert("original_width".to_string(), image.width().into());
    metrics.insert("original_height".to_string(), image.height().into());
    StepOutput::with_replacement(gray, metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::rgba_fixture;
    use serde_json::json;

    #[test]
    fn output_is_single_channel_same_size() {
        let output = run(&rgba_fixture(32, 16));
        let gray = output.replacement.unwrap();
        assert!(matches!(gray, DynamicImage::ImageLuma8(_)));
        assert_eq!((gray.width(), gray.height()), (32, 16));
        assert_eq!(output.metrics.get("original_width"), Some(&json!(32)));
        assert_eq!(
            output.metrics.get("success"),
            Some(&json!("Image grayscaled successfully."))
        );
    }

    #[test]
    fn grayscale_is_idempotent() {
        let once = run(&rgba_fixture(8, 8)).replacement.unwrap();
        let twice = run(&once).replacement.unwrap();
        assert_eq!(once.to_luma8(), twice.to_luma8());
    }
}
