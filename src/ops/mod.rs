//! The operation registry.
//!
//! Every image operation lives here behind a single calling convention:
//! a pure transform from a decoded image plus a JSON args object to a
//! [`StepOutput`]. The pipeline executor drives exactly the same
//! functions the standalone wrappers do, so chained and one-shot
//! invocations cannot drift apart.
//!
//! | Name         | Args                            | Replaces image      |
//! |--------------|---------------------------------|---------------------|
//! | `details`    | none                            | never               |
//! | `rotate`     | `rotation_angle`                | always              |
//! | `resize`     | `target_width`, `target_height` | always              |
//! | `grayscale`  | none                            | always              |
//! | `brightness` | `brightness_delta`              | always              |
//! | `transform`  | `target_format` (optional)      | only to drop alpha  |

use std::time::Instant;

use image::{DynamicImage, ImageFormat};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::{AppConfig, PipelineConfig};
use crate::naming;
use crate::request::{self, RequestError};
use crate::response;
use crate::storage::{self, ObjectLocation, Storage};

pub mod args;
pub mod brightness;
pub mod convert;
pub mod grayscale;
pub mod inspect;
pub mod resize;
pub mod rotate;

use args::TargetFormat;

/// A structured operation failure. Recorded in the step's report slot;
/// the rest of a pipeline still runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("Missing request parameters: {0}")]
    MissingArgs(String),
    #[error("Invalid rotation angle. Only 90, 180, or 270 degrees are supported.")]
    InvalidRotationAngle,
    #[error("Target dimensions must be positive integers.")]
    NonPositiveTarget,
    #[error("Upscaling is disabled; target dimensions exceed the source image.")]
    UpscaleRefused,
    #[error("Invalid brightness_delta. Must be between 1 and 100.")]
    BrightnessOutOfBounds,
    #[error("'brightness_delta' is not parsable as an integer.")]
    BrightnessNotInteger,
    #[error("Only JPEG and PNG formats are supported.")]
    UnsupportedSourceFormat,
    #[error("Target format must be JPEG or PNG.")]
    UnsupportedTargetFormat,
}

/// What a successful operation hands back to its caller.
#[derive(Debug)]
pub struct StepOutput {
    /// New carried image, when the operation changed pixels.
    pub replacement: Option<DynamicImage>,
    /// Report record for this step. Never contains pixel data.
    pub metrics: Map<String, Value>,
    /// New output encoding, when the operation changed it.
    pub output_format: Option<TargetFormat>,
}

impl StepOutput {
    pub fn metrics_only(metrics: Map<String, Value>) -> StepOutput {
        StepOutput {
            replacement: None,
            metrics,
            output_format: None,
        }
    }

    pub fn with_replacement(image: DynamicImage, metrics: Map<String, Value>) -> StepOutput {
        StepOutput {
            replacement: Some(image),
            metrics,
            output_format: None,
        }
    }
}

/// The closed set of operations the service knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Details,
    Rotate,
    Resize,
    Grayscale,
    Brightness,
    Transform,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Details,
        Operation::Rotate,
        Operation::Resize,
        Operation::Grayscale,
        Operation::Brightness,
        Operation::Transform,
    ];

    /// Look up an operation by its wire name. Names are exact; there are
    /// no aliases and no case folding.
    pub fn parse(name: &str) -> Option<Operation> {
        match name {
            "details" => Some(Operation::Details),
            "rotate" => Some(Operation::Rotate),
            "resize" => Some(Operation::Resize),
            "grayscale" => Some(Operation::Grayscale),
            "brightness" => Some(Operation::Brightness),
            "transform" => Some(Operation::Transform),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::Details => "details",
            Operation::Rotate => "rotate",
            Operation::Resize => "resize",
            Operation::Grayscale => "grayscale",
            Operation::Brightness => "brightness",
            Operation::Transform => "transform",
        }
    }

    /// Prefix for the standalone output object, `None` for the read-only
    /// operation that persists nothing.
    pub fn output_prefix(self) -> Option<&'static str> {
        match self {
            Operation::Details => None,
            Operation::Rotate => Some("rotated_"),
            Operation::Resize => Some("resized_"),
            Operation::Grayscale => Some("grayscaled_"),
            Operation::Brightness => Some("brightness_"),
            Operation::Transform => Some("transformed_"),
        }
    }

    /// Argument keys that must be present before the transform runs.
    pub fn required_args(self) -> &'static [&'static str] {
        match self {
            Operation::Rotate => &["rotation_angle"],
            Operation::Resize => &["target_width", "target_height"],
            Operation::Brightness => &["brightness_delta"],
            Operation::Details | Operation::Grayscale | Operation::Transform => &[],
        }
    }
}

/// Run one operation's pure transform.
///
/// No I/O happens here; the caller owns fetching and persisting. This is
/// the function the pipeline executor calls once per step.
pub fn run(
    operation: Operation,
    image: &DynamicImage,
    step_args: &Map<String, Value>,
    policy: &PipelineConfig,
) -> Result<StepOutput, StepError> {
    args::require_args(step_args, operation.required_args())?;
    match operation {
        Operation::Details => Ok(inspect::run(image)),
        Operation::Rotate => rotate::run(image, step_args),
        Operation::Resize => resize::run(image, step_args, policy),
        Operation::Grayscale => Ok(grayscale::run(image)),
        Operation::Brightness => brightness::run(image, step_args),
        Operation::Transform => convert::run(image, step_args, policy),
    }
}

/// Run one operation as a complete standalone invocation.
///
/// Validates the flat request map, fetches the source object, runs the
/// pure transform, persists the derived artifact (except for `details`,
/// which writes nothing), and returns the response body. Every failure
/// path collapses to an `{"error": message}` object.
pub fn run_standalone(
    operation: Operation,
    store: &dyn Storage,
    req: &Map<String, Value>,
    config: &AppConfig,
) -> Map<String, Value> {
    let mut required = vec![request::BUCKET_KEY, request::FILE_NAME_KEY];
    required.extend_from_slice(operation.required_args());
    if let Err(err) = request::require_keys(req, &required) {
        return response::error_object(&err.to_string());
    }

    let bucket = match string_param(req, request::BUCKET_KEY) {
        Ok(value) => value,
        Err(message) => return response::error_object(&message),
    };
    let file = match string_param(req, request::FILE_NAME_KEY) {
        Ok(value) => value,
        Err(message) => return response::error_object(&message),
    };
    if let Err(err) = request::check_source_extension(&file) {
        // Format conversion reports the gate in its own words.
        let message = if operation == Operation::Transform {
            StepError::UnsupportedSourceFormat.to_string()
        } else {
            err.to_string()
        };
        return response::error_object(&message);
    }
    let get_download = req
        .get(request::GET_DOWNLOAD_KEY)
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let source = ObjectLocation::new(&bucket, &file);
    let fetch_started = Instant::now();
    let image = match store.fetch(&source) {
        Ok(image) => image,
        Err(_) => return response::error_object(response::FETCH_FAILED),
    };
    let network_latency_ms = u64::try_from(fetch_started.elapsed().as_millis()).unwrap_or(u64::MAX);

    // Standalone requests carry the operation args flat in the request map.
    let output = match run(operation, &image, req, &config.pipeline) {
        Ok(output) => output,
        Err(err) => return response::error_object(&err.to_string()),
    };

    let mut body = output.metrics;
    body.insert("network_latency_ms".to_string(), network_latency_ms.into());

    let download_target = match operation.output_prefix() {
        None => source,
        Some(prefix) => {
            let output_name = match output.output_format {
                Some(format) => naming::derived_name_with_format(prefix, &file, format.extension()),
                None => naming::derived_name(prefix, &file),
            };
            let encoding = storage::format_for_name(&output_name).unwrap_or(ImageFormat::Png);
            let artifact = output.replacement.as_ref().unwrap_or(&image);
            let location = ObjectLocation::new(&bucket, &output_name);
            if store.store(&location, encoding, artifact).is_err() {
                return response::error_object(response::PERSIST_FAILED);
            }
            if operation == Operation::Rotate {
                body.insert("rotated_image_key".to_string(), output_name.clone().into());
            }
            body.insert("output_key".to_string(), output_name.into());
            location
        }
    };

    if get_download {
        match store.signed_url(&download_target, config.storage.url_ttl_seconds) {
            Ok(url) => {
                body.insert("url".to_string(), url.into());
                body.insert(
                    "url_expires_in_seconds".to_string(),
                    config.storage.url_ttl_seconds.into(),
                );
            }
            Err(_) => return response::error_object(response::SIGN_URL_FAILED),
        }
    }
    body
}

fn string_param(req: &Map<String, Value>, key: &'static str) -> Result<String, String> {
    req.get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| {
            RequestError::WrongType {
                key,
                expected: "a string",
            }
            .to_string()
        })
}
