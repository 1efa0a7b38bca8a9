//! Exact-dimension resize with smooth resampling.

use image::imageops::FilterType;
use image::DynamicImage;
use serde_json::{Map, Value};

use crate::config::PipelineConfig;

use super::args;
use super::{StepError, StepOutput};

/// Resize `image` to the exact `target_width` x `target_height`.
///
/// Targets must be positive integers. When `policy.allow_upscale` is
/// false, a target exceeding either source dimension is a structured
/// error instead of a blurry enlargement.
pub fn run(
    image: &DynamicImage,
    step_args: &Map<String, Value>,
    policy: &PipelineConfig,
) -> Result<StepOutput, StepError> {
    let width = args::int_arg(step_args, "target_width").ok_or(StepError::NonPositiveTarget)?;
    let height = args::int_arg(step_args, "target_height").ok_or(StepError::NonPositiveTarget)?;
    if width <= 0 || height <= 0 {
        return Err(StepError::NonPositiveTarget);
    }
    let width = u32::try_from(width).map_err(|_| StepError::NonPositiveTarget)?;
    let height = u32::try_from(height).map_err(|_| StepError::NonPositiveTarget)?;
    if !policy.allow_upscale && (width > image.width() || height > image.height()) {
        return Err(StepError::UpscaleRefused);
    }

    let resized = apply(image, width, height);
    let mut metrics = Map::new();
    metrics.insert("success".to_string(), "Image resized successfully.".into());
    metrics.insert("original_width".to_string(), image.width().into());
    metrics.insert("original_height".to_string(), image.height().into());
    metrics.insert("target_width".to_string(), width.into());
    metrics.insert("target_height".to_string(), height.into());
    Ok(StepOutput::with_replacement(resized, metrics))
}

pub fn apply(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    // Encoders downstream expect 8-bit samples.
    let source = match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => image.clone(),
        _ => DynamicImage::ImageRgba8(image.to_rgba8()),
    };
    source.resize_exact(width, height, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::test_helpers::{obj, rgba_fixture};
    use serde_json::json;

    fn policy() -> PipelineConfig {
        AppConfig::default().pipeline
    }

    fn upscaling_policy() -> PipelineConfig {
        PipelineConfig {
            allow_upscale: true,
            ..policy()
        }
    }

    #[test]
    fn downscales_to_exact_target() {
        let args = obj(json!({"target_width": 40, "target_height": 25}));
        let output = run(&rgba_fixture(80, 50), &args, &policy()).unwrap();
        let resized = output.replacement.unwrap();
        assert_eq!((resized.width(), resized.height()), (40, 25));
        assert_eq!(output.metrics.get("original_width"), Some(&json!(80)));
        assert_eq!(output.metrics.get("target_height"), Some(&json!(25)));
        assert_eq!(
            output.metrics.get("success"),
            Some(&json!("Image resized successfully."))
        );
    }

    #[test]
    fn aspect_ratio_is_not_preserved() {
        let args = obj(json!({"target_width": 10, "target_height": 10}));
        let output = run(&rgba_fixture(100, 20), &args, &policy()).unwrap();
        let resized = output.replacement.unwrap();
        assert_eq!((resized.width(), resized.height()), (10, 10));
    }

    #[test]
    fn rejects_non_positive_targets() {
        for (w, h) in [(0, 10), (10, 0), (-3, 10), (10, -3)] {
            let args = obj(json!({"target_width": w, "target_height": h}));
            let err = run(&rgba_fixture(20, 20), &args, &policy()).unwrap_err();
            assert_eq!(err, StepError::NonPositiveTarget);
        }
        assert_eq!(
            StepError::NonPositiveTarget.to_string(),
            "Target dimensions must be positive integers."
        );
    }

    #[test]
    fn rejects_fractional_targets() {
        let args = obj(json!({"target_width": 10.5, "target_height": 10}));
        let err = run(&rgba_fixture(20, 20), &args, &policy()).unwrap_err();
        assert_eq!(err, StepError::NonPositiveTarget);
    }

    #[test]
    fn refuses_upscale_by_default() {
        let args = obj(json!({"target_width": 40, "target_height": 10}));
        let err = run(&rgba_fixture(20, 20), &args, &policy()).unwrap_err();
        assert_eq!(err, StepError::UpscaleRefused);
    }

    #[test]
    fn upscales_when_allowed() {
        let args = obj(json!({"target_width": 40, "target_height": 40}));
        let output = run(&rgba_fixture(20, 20), &args, &upscaling_policy()).unwrap();
        let resized = output.replacement.unwrap();
        assert_eq!((resized.width(), resized.height()), (40, 40));
    }

    #[test]
    fn sixteen_bit_sources_come_back_eight_bit() {
        let deep = DynamicImage::ImageRgb16(image::ImageBuffer::new(16, 16));
        let resized = apply(&deep, 8, 8);
        assert!(matches!(resized, DynamicImage::ImageRgba8(_)));
    }
}
