//! Output format conversion.
//!
//! The conversion itself happens at encode time; this step decides the
//! target, renames the artifact, and prepares the pixels for encoders
//! that cannot carry alpha. JPEG has no alpha channel, so a transparent
//! source is first flattened onto the configured opaque background.

use image::{imageops, DynamicImage, Rgba, RgbaImage};
use serde_json::{Map, Value};

use crate::config::PipelineConfig;

use super::args::TargetFormat;
use super::{StepError, StepOutput};

/// Select the output format from the `target_format` argument, falling
/// back to `policy.default_target_format` when the argument is absent.
pub fn run(
    image: &DynamicImage,
    step_args: &Map<String, Value>,
    policy: &PipelineConfig,
) -> Result<StepOutput, StepError> {
    let target = target_from(step_args, policy)?;

    let mut metrics = Map::new();
    metrics.insert(
        "success".to_string(),
        "Successfully transformed image.".into(),
    );
    metrics.insert("target_format".to_string(), target.label().into());

    let mut output = match target {
        TargetFormat::Jpeg if image.color().has_alpha() => StepOutput::with_replacement(
            flatten(image, policy.flatten_background_rgb()),
            metrics,
        ),
        _ => StepOutput::metrics_only(metrics),
    };
    output.output_format = Some(target);
    Ok(output)
}

fn target_from(
    step_args: &Map<String, Value>,
    policy: &PipelineConfig,
) -> Result<TargetFormat, StepError> {
    match step_args.get("target_format") {
        Some(value) => {
            let name = value.as_str().ok_or(StepError::UnsupportedTargetFormat)?;
            TargetFormat::parse(name).ok_or(StepError::UnsupportedTargetFormat)
        }
        None => Ok(TargetFormat::parse(&policy.default_target_format).unwrap_or(TargetFormat::Png)),
    }
}

/// Composite `image` onto an opaque `background` and drop the alpha
/// channel.
pub fn flatten(image: &DynamicImage, background: [u8; 3]) -> DynamicImage {
    let [r, g, b] = background;
    let mut canvas = RgbaImage::from_pixel(image.width(), image.height(), Rgba([r, g, b, 255]));
    imageops::overlay(&mut canvas, &image.to_rgba8(), 0, 0);
    DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
}
