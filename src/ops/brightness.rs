//! Linear brightness adjustment.

use image::DynamicImage;
use serde_json::{Map, Value};

use super::args::{self, BrightnessDelta};
use super::{StepError, StepOutput};

/// Rescale color channels by `brightness_delta / 50`, so 50 is a no-op,
/// 1 darkens to near black, and 100 doubles every channel. The alpha
/// channel is left alone.
pub fn run(image: &DynamicImage, step_args: &Map<String, Value>) -> Result<StepOutput, StepError> {
    let raw =
        args::int_arg(step_args, "brightness_delta").ok_or(StepError::BrightnessNotInteger)?;
    let delta = BrightnessDelta::new(raw)?;
    let brightened = apply(image, delta);

    let mut metrics = Map::new();
    metrics.insert(
        "success".to_string(),
        "Successfully changed image brightness.".into(),
    );
    metrics.insert("brightness_delta".to_string(), delta.value().into());
    metrics.insert("brightness_factor".to_string(), delta.factor().into());
    Ok(StepOutput::with_replacement(brightened, metrics))
}

pub fn apply(image: &DynamicImage, delta: BrightnessDelta) -> DynamicImage {
    let factor = delta.factor();
    let mut pixels = image.to_rgba8();
    for pixel in pixels.pixels_mut() {
        for channel in &mut pixel.0[..3] {
            *channel = scale(*channel, factor);
        }
    }
    DynamicImage::ImageRgba8(pixels)
}

fn scale(channel: u8, factor: f64) -> u8 {
    (f64::from(channel) * factor).round().clamp(0.0, 255.0) as u8
}
