//! Quarter-turn rotation.

use image::DynamicImage;
use serde_json::{Map, Value};

use super::args::{self, RightAngle};
use super::{StepError, StepOutput};

/// Rotate `image` clockwise by the `rotation_angle` argument.
///
/// Only 90, 180, and 270 are accepted; a fractional, non-numeric, or
/// out-of-set angle is a structured error.
pub fn run(image: &DynamicImage, step_args: &Map<String, Value>) -> Result<StepOutput, StepError> {
    let degrees =
        args::int_arg(step_args, "rotation_angle").ok_or(StepError::InvalidRotationAngle)?;
    let angle = RightAngle::from_degrees(degrees).ok_or(StepError::InvalidRotationAngle)?;
    let rotated = apply(image, angle);

    let mut metrics = Map::new();
    metrics.insert("success".to_string(), "Successfully rotated image.".into());
    metrics.insert("original_width".to_string(), image.width().into());
    metrics.insert("original_height".to_string(), image.height().into());
    metrics.insert("rotated_width".to_string(), rotated.width().into());
    metrics.insert("rotated_height".to_string(), rotated.height().into());
    metrics.insert("rotation_angle".to_string(), angle.degrees().into());
    Ok(StepOutput::with_replacement(rotated, metrics))
}

pub fn apply(image: &DynamicImage, angle: RightAngle) -> DynamicImage {
    match angle {
        RightAngle::Deg90 => image.rotate90(),
        RightAngle::Deg180 => image.rotate180(),
        RightAngle::Deg270 => image.rotate270(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{obj, rgba_fixture};
    use serde_json::json;

    #[test]
    fn quarter_turn_swaps_dimensions() {
        let output = run(&rgba_fixture(100, 200), &obj(json!({"rotation_angle": 90}))).unwrap();
        let rotated = output.replacement.unwrap();
        assert_eq!((rotated.width(), rotated.height()), (200, 100));
        assert_eq!(output.metrics.get("original_width"), Some(&json!(100)));
        assert_eq!(output.metrics.get("rotated_width"), Some(&json!(200)));
        assert_eq!(output.metrics.get("rotated_height"), Some(&json!(100)));
        assert_eq!(output.metrics.get("rotation_angle"), Some(&json!(90)));
    }

    #[test]
    fn half_turn_keeps_dimensions() {
        let output = run(&rgba_fixture(30, 40), &obj(json!({"rotation_angle": 180}))).unwrap();
        let rotated = output.replacement.unwrap();
        assert_eq!((rotated.width(), rotated.height()), (30, 40));
    }

    #[test]
    fn rotation_moves_pixels_clockwise() {
        // Top-left of the gradient fixture lands at the top-right after
        // a clockwise quarter turn.
        let image = rgba_fixture(10, 20);
        let corner = image.to_rgba8()[(0, 0)];
        let output = run(&image, &obj(json!({"rotation_angle": 90}))).unwrap();
        let rotated = output.replacement.unwrap().to_rgba8();
        assert_eq!(rotated[(19, 0)], corner);
    }

    #[test]
    fn four_quarter_turns_restore_the_image() {
        let image = rgba_fixture(7, 5);
        let mut current = image.clone();
        for _ in 0..4 {
            current = apply(&current, RightAngle::Deg90);
        }
        assert_eq!(current.to_rgba8(), image.to_rgba8());
    }

    #[test]
    fn rejects_angles_outside_the_set() {
        for angle in [json!(0), json!(45), json!(360), json!(-90)] {
            let err = run(&rgba_fixture(4, 4), &obj(json!({"rotation_angle": angle}))).unwrap_err();
            assert_eq!(err, StepError::InvalidRotationAngle);
        }
        assert_eq!(
            StepError::InvalidRotationAngle.to_string(),
            "Invalid rotation angle. Only 90, 180, or 270 degrees are supported."
        );
    }

    #[test]
    fn rejects_non_integer_angles() {
        for angle in [json!(90.5), json!("90"), json!(null)] {
            let err = run(&rgba_fixture(4, 4), &obj(json!({"rotation_angle": angle}))).unwrap_err();
            assert_eq!(err, StepError::InvalidRotationAngle);
        }
    }
}
