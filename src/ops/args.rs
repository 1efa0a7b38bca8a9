//! Typed operation arguments.
//!
//! Raw args arrive as a JSON object per step. The helpers here pull
//! values out of that object and the newtypes hold them once validated,
//! so the transform functions never re-check ranges.

use serde_json::{Map, Value};

use super::StepError;

/// Quarter-turn rotation amounts. The only angles the rotate operation
/// accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightAngle {
    Deg90,
    Deg180,
    Deg270,
}

impl RightAngle {
    pub fn from_degrees(degrees: i64) -> Option<RightAngle> {
        match degrees {
            90 => Some(RightAngle::Deg90),
            180 => Some(RightAngle::Deg180),
            270 => Some(RightAngle::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            RightAngle::Deg90 => 90,
            RightAngle::Deg180 => 180,
            RightAngle::Deg270 => 270,
        }
    }
}

/// Brightness delta on the wire scale: an integer in 1..=100 where 50
/// leaves the image unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessDelta(u8);

impl BrightnessDelta {
    pub const MIN: i64 = 1;
    pub const MAX: i64 = 100;

    pub fn new(delta: i64) -> Result<BrightnessDelta, StepError> {
        if !(Self::MIN..=Self::MAX).contains(&delta) {
            return Err(StepError::BrightnessOutOfBounds);
        }
        Ok(BrightnessDelta(delta as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Linear rescale factor: delta 50 maps to exactly 1.0, the ends of
    /// the range to 0.02 and 2.0.
    pub fn factor(self) -> f64 {
        f64::from(self.0) / 50.0
    }
}

/// Output encodings the service can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Jpeg,
    Png,
}

impl TargetFormat {
    /// Parse a wire value, case-insensitive. `jpg` is not an accepted
    /// spelling for a *target* format, only for source extensions.
    pub fn parse(value: &str) -> Option<TargetFormat> {
        match value.to_uppercase().as_str() {
            "JPEG" => Some(TargetFormat::Jpeg),
            "PNG" => Some(TargetFormat::Png),
            _ => None,
        }
    }

    /// Uppercase label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "JPEG",
            TargetFormat::Png => "PNG",
        }
    }

    /// Lowercase file extension for derived names.
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "jpeg",
            TargetFormat::Png => "png",
        }
    }

    pub fn image_format(self) -> image::ImageFormat {
        match self {
            TargetFormat::Jpeg => image::ImageFormat::Jpeg,
            TargetFormat::Png => image::ImageFormat::Png,
        }
    }
}

/// Check that every key in `required` is present in the step's args.
///
/// The missing-key list in the error preserves `required` order.
pub fn require_args(args: &Map<String, Value>, required: &[&str]) -> Result<(), StepError> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|key| !args.contains_key(*key))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StepError::MissingArgs(missing.join(", ")))
    }
}

/// Integer argument value, or `None` when the value is absent, fractional,
/// or not a number at all.
pub fn int_arg(args: &Map<String, Value>, key: &str) -> Option<i64> {
    args.get(key)?.as_i64()
}
