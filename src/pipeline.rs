//! The chained-operation executor.
//!
//! A pipeline request names a source object and an ordered list of
//! operation steps. The executor fetches the source once, threads the
//! decoded image through the steps, and persists a single `batch_`
//! artifact at the end. Each attempted step leaves exactly one record
//! in the report, so a response always accounts for every index in the
//! request, including steps that were skipped or failed.
//!
//! Failure handling is tiered. A malformed request or unreachable
//! source aborts the whole run before any step executes. A structured
//! step failure is recorded in that step's slot and execution moves on
//! (unless `pipeline.abort_on_step_error` promotes it). Only storage
//! faults at the edges, fetch and the final persist, abort a run that
//! has already produced records.

use std::time::Instant;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::AppConfig;
use crate::naming;
use crate::ops::args::TargetFormat;
use crate::ops::{self, convert, Operation, StepError};
use crate::request::{OperationSpec, Request, RequestError};
use crate::response;
use crate::storage::{ObjectLocation, Storage, StorageError};

/// Name prefix of the pipeline's persisted artifact.
pub const BATCH_PREFIX: &str = "batch_";

/// A whole-request failure. Anything recorded before the failure is
/// discarded; the response is a single error object.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request shape was rejected before any I/O.
    #[error(transparent)]
    Validation(#[from] RequestError),
    /// The source object could not be fetched or decoded.
    #[error("{}", response::FETCH_FAILED)]
    Fetch(#[source] StorageError),
    /// A step failure promoted to an abort by `pipeline.abort_on_step_error`.
    #[error(transparent)]
    Step(#[from] StepError),
    /// The final artifact could not be encoded or written.
    #[error("{}", response::PERSIST_FAILED)]
    Persist(#[source] StorageError),
    /// A download URL was requested but could not be built.
    #[error("{}", response::SIGN_URL_FAILED)]
    SignUrl(#[source] StorageError),
}

/// Everything a completed run produced, pixels excluded.
#[derive(Debug)]
pub struct PipelineReport {
    /// One record per attempted step, in request order.
    pub records: Vec<Map<String, Value>>,
    /// Where the final artifact was written.
    pub output: ObjectLocation,
    /// Encoding of the final artifact.
    pub output_format: TargetFormat,
    /// Number of steps the request named.
    pub operations_count: usize,
    /// Time spent fetching the source object.
    pub network_latency_ms: u64,
    /// Download URL, when the request asked for one.
    pub url: Option<String>,
    pub url_ttl_seconds: u64,
}

/// Execute a pipeline request end to end.
pub fn run_pipeline(
    store: &dyn Storage,
    request: &Value,
    config: &AppConfig,
) -> Result<PipelineReport, PipelineError> {
    let request = Request::from_value(request)?;

    let source = ObjectLocation::new(&request.bucket, &request.file);
    let fetch_started = Instant::now();
    let mut image = store.fetch(&source).map_err(PipelineError::Fetch)?;
    let network_latency_ms = u64::try_from(fetch_started.elapsed().as_millis()).unwrap_or(u64::MAX);

    // The artifact starts as a PNG named after the source; a successful
    // format conversion re-points both name and encoding.
    let mut output_format = TargetFormat::Png;
    let mut output_key = naming::derived_name(BATCH_PREFIX, &request.file);

    let mut records: Vec<Map<String, Value>> = Vec::new();
    for (index, spec) in request.operations.iter().enumerate() {
        match spec {
            OperationSpec::Malformed { rendered } => {
                skip_step(
                    &mut records,
                    format!("invalid operation name at index {index}: {rendered}"),
                );
            }
            OperationSpec::BadArgs { name } if Operation::parse(name).is_none() => {
                skip_step(
                    &mut records,
                    format!("invalid operation name at index {index}: {name}"),
                );
            }
            OperationSpec::BadArgs { .. } => {
                skip_step(
                    &mut records,
                    format!("invalid operation arguments at index {index}"),
                );
            }
            OperationSpec::Entry { name, args } => {
                let Some(operation) = Operation::parse(name) else {
                    skip_step(
                        &mut records,
                        format!("invalid operation name at index {index}: {name}"),
                    );
                    continue;
                };
                println!("Executing operation {index}: {name}");
                match ops::run(operation, &image, args, &config.pipeline) {
                    Ok(output) => {
                        if let Some(replacement) = output.replacement {
                            image = replacement;
                        }
                        if let Some(format) = output.output_format {
                            output_format = format;
                            output_key = naming::derived_name_with_format(
                                BATCH_PREFIX,
                                &request.file,
                                format.extension(),
                            );
                        }
                        records.push(output.metrics);
                    }
                    Err(err) if config.pipeline.abort_on_step_error => {
                        return Err(PipelineError::Step(err));
                    }
                    Err(err) => {
                        println!("Pipeline error at index {index}: {err}");
                        records.push(response::error_object(&err.to_string()));
                    }
                }
            }
        }
    }

    // JPEG cannot carry an alpha channel a PNG-era step may have left.
    if output_format == TargetFormat::Jpeg && image.color().has_alpha() {
        image = convert::flatten(&image, config.pipeline.flatten_background_rgb());
    }
    let output = ObjectLocation::new(&request.bucket, &output_key);
    store
        .store(&output, output_format.image_format(), &image)
        .map_err(PipelineError::Persist)?;

    let url = if request.get_download {
        Some(
            store
                .signed_url(&output, config.storage.url_ttl_seconds)
                .map_err(PipelineError::SignUrl)?,
        )
    } else {
        None
    };

    Ok(PipelineReport {
        operations_count: request.operations.len(),
        records,
        output,
        output_format,
        network_latency_ms,
        url,
        url_ttl_seconds: config.storage.url_ttl_seconds,
    })
}

fn skip_step(records: &mut Vec<Map<String, Value>>, diagnostic: String) {
    println!("Pipeline error: {diagnostic}");
    records.push(response::error_object(&diagnostic));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::{MemStore, RecordedOp};
    use crate::test_helpers::{rgba_fixture, transparent_fixture};
    use image::DynamicImage;
    use serde_json::json;

    fn config() -> AppConfig {
        AppConfig::default()
    }

    fn seeded_store(width: u32, height: u32) -> MemStore {
        let store = MemStore::new();
        store.insert("photos", "cat.png", rgba_fixture(width, height));
        store
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn rejects_missing_keys_before_any_io() {
        let store = MemStore::new();
        let err = run_pipeline(&store, &json!({}), &config()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing request parameters: bucketname, filename, operations"
        );
        assert!(store.operations().is_empty());
    }

    #[test]
    fn rejects_disallowed_source_extension() {
        let store = MemStore::new();
        let request = json!({
            "bucketname": "photos",
            "filename": "cat.bmp",
            "operations": []
        });
        let err = run_pipeline(&store, &request, &config()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid file type: bmp. Only JPEG, JPG, and PNG are allowed."
        );
    }

    // =========================================================================
    // Step threading
    // =========================================================================

    #[test]
    fn threads_the_image_through_the_chain() {
        let store = seeded_store(100, 200);
        let request = json!({
            "bucketname": "photos",
            "filename": "cat.png",
            "operations": [["rotate", {"rotation_angle": 90}], ["grayscale", {}]]
        });
        let report = run_pipeline(&store, &request, &config()).unwrap();

        assert_eq!(report.operations_count, 2);
        assert_eq!(report.records.len(), 2);
        assert_eq!(
            report.records[0].get("success"),
            Some(&json!("Successfully rotated image."))
        );
        assert_eq!(report.records[0].get("rotated_width"), Some(&json!(200)));
        assert_eq!(
            report.records[1].get("success"),
            Some(&json!("Image grayscaled successfully."))
        );
        assert_eq!(report.output.key, "batch_cat.png");

        let stored = store.object("photos", "batch_cat.png").unwrap();
        assert_eq!((stored.width(), stored.height()), (200, 100));
        assert!(matches!(stored, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn details_steps_observe_without_replacing() {
        let store = seeded_store(40, 30);
        let request = json!({
            "bucketname": "photos",
            "filename": "cat.png",
            "operations": [["details", {}], ["details", {}]]
        });
        let report = run_pipeline(&store, &request, &config()).unwrap();
        assert_eq!(report.records[0], report.records[1]);
        assert_eq!(report.records[0].get("width"), Some(&json!(40)));
    }

    #[test]
    fn empty_chain_still_persists_the_artifact() {
        let store = seeded_store(10, 10);
        let request = json!({
            "bucketname": "photos",
            "filename": "cat.png",
            "operations": []
        });
        let report = run_pipeline(&store, &request, &config()).unwrap();
        assert_eq!(report.operations_count, 0);
        assert!(report.records.is_empty());
        assert!(store.object("photos", "batch_cat.png").is_some());
    }

    // =========================================================================
    // Skips and step failures
    // =========================================================================

    #[test]
    fn unknown_operation_is_recorded_and_skipped() {
        let store = seeded_store(20, 20);
        let request = json!({
            "bucketname": "photos",
            "filename": "cat.png",
            "operations": [["sharpen", {}], ["grayscale", {}]]
        });
        let report = run_pipeline(&store, &request, &config()).unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(
            report.records[0].get("error"),
            Some(&json!("invalid operation name at index 0: sharpen"))
        );
        assert_eq!(
            report.records[1].get("success"),
            Some(&json!("Image grayscaled successfully."))
        );
    }

    #[test]
    fn missing_args_object_is_recorded_and_skipped() {
        let store = seeded_store(20, 20);
        let request = json!({
            "bucketname": "photos",
            "filename": "cat.png",
            "operations": [["grayscale"]]
        });
        let report = run_pipeline(&store, &request, &config()).unwrap();
        assert_eq!(
            report.records[0].get("error"),
            Some(&json!("invalid operation arguments at index 0"))
        );
    }

    #[test]
    fn unknown_name_wins_over_missing_args() {
        let store = seeded_store(20, 20);
        let request = json!({
            "bucketname": "photos",
            "filename": "cat.png",
            "operations": [["sharpen"]]
        });
        let report = run_pipeline(&store, &request, &config()).unwrap();
        assert_eq!(
            report.records[0].get("error"),
            Some(&json!("invalid operation name at index 0: sharpen"))
        );
    }

    #[test]
    fn malformed_entry_is_recorded_with_its_rendering() {
        let store = seeded_store(20, 20);
        let request = json!({
            "bucketname": "photos",
            "filename": "cat.png",
            "operations": [42]
        });
        let report = run_pipeline(&store, &request, &config()).unwrap();
        assert_eq!(
            report.records[0].get("error"),
            Some(&json!("invalid operation name at index 0: 42"))
        );
    }

    #[test]
    fn step_error_is_recorded_and_the_chain_continues() {
        let store = seeded_store(20, 20);
        let request = json!({
            "bucketname": "photos",
            "filename": "cat.png",
            "operations": [["rotate", {"rotation_angle": 45}], ["grayscale", {}]]
        });
        let report = run_pipeline(&store, &request, &config()).unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(
            report.records[0].get("error"),
            Some(&json!(
                "Invalid rotation angle. Only 90, 180, or 270 degrees are supported."
            ))
        );
        assert_eq!(
            report.records[1].get("success"),
            Some(&json!("Image grayscaled successfully."))
        );
    }

    #[test]
    fn step_error_aborts_when_configured_to() {
        let store = seeded_store(20, 20);
        let mut config = config();
        config.pipeline.abort_on_step_error = true;
        let request = json!({
            "bucketname": "photos",
            "filename": "cat.png",
            "operations": [["rotate", {"rotation_angle": 45}], ["grayscale", {}]]
        });
        let err = run_pipeline(&store, &request, &config).unwrap_err();
        assert!(matches!(err, PipelineError::Step(_)));
        // Nothing was persisted for an aborted run.
        assert_eq!(store.object_count(), 1);
    }

    // =========================================================================
    // Format conversion in a chain
    // =========================================================================

    #[test]
    fn transform_repoints_name_and_encoding() {
        let store = seeded_store(20, 20);
        let request = json!({
            "bucketname": "photos",
            "filename": "cat.png",
            "operations": [["transform", {"target_format": "JPEG"}]]
        });
        let report = run_pipeline(&store, &request, &config()).unwrap();
        assert_eq!(report.output.key, "batch_cat.jpeg");
        assert_eq!(report.output_format, TargetFormat::Jpeg);
        assert!(store.operations().contains(&RecordedOp::Store {
            location: "photos/batch_cat.jpeg".to_string(),
            format: "Jpeg".to_string()
        }));
    }

    #[test]
    fn without_transform_the_artifact_keeps_the_source_name_and_png_bytes() {
        let store = MemStore::new();
        store.insert("photos", "cat.jpg", rgba_fixture(8, 8));
        let request = json!({
            "bucketname": "photos",
            "filename": "cat.jpg",
            "operations": [["grayscale", {}]]
        });
        let report = run_pipeline(&store, &request, &config()).unwrap();
        assert_eq!(report.output.key, "batch_cat.jpg");
        assert!(store.operations().contains(&RecordedOp::Store {
            location: "photos/batch_cat.jpg".to_string(),
            format: "Png".to_string()
        }));
    }

    #[test]
    fn finalize_flattens_alpha_left_behind_for_jpeg() {
        let store = MemStore::new();
        store.insert("photos", "cat.png", transparent_fixture(6, 6));
        // Brightness runs after the transform and hands back RGBA pixels.
        let request = json!({
            "bucketname": "photos",
            "filename": "cat.png",
            "operations": [
                ["transform", {"target_format": "jpeg"}],
                ["brightness", {"brightness_delta": 60}]
            ]
        });
        let report = run_pipeline(&store, &request, &config()).unwrap();
        assert_eq!(report.output_format, TargetFormat::Jpeg);
        let stored = store.object("photos", "batch_cat.jpeg").unwrap();
        assert!(!stored.color().has_alpha());
    }

    // =========================================================================
    // Edges
    // =========================================================================

    #[test]
    fn fetch_failure_aborts_the_request() {
        let store = MemStore::new().failing_fetch();
        let request = json!({
            "bucketname": "photos",
            "filename": "cat.png",
            "operations": [["grayscale", {}]]
        });
        let err = run_pipeline(&store, &request, &config()).unwrap_err();
        assert_eq!(err.to_string(), "Could not access image from S3.");
    }

    #[test]
    fn persist_failure_discards_the_records() {
        let store = MemStore::new().failing_store();
        store.insert("photos", "cat.png", rgba_fixture(8, 8));
        let request = json!({
            "bucketname": "photos",
            "filename": "cat.png",
            "operations": [["grayscale", {}]]
        });
        let err = run_pipeline(&store, &request, &config()).unwrap_err();
        assert_eq!(err.to_string(), "Could not write image to S3.");
    }

    #[test]
    fn download_url_is_signed_for_the_artifact() {
        let store = seeded_store(8, 8);
        let request = json!({
            "bucketname": "photos",
            "filename": "cat.png",
            "operations": [],
            "get_download": true
        });
        let report = run_pipeline(&store, &request, &config()).unwrap();
        assert_eq!(
            report.url.as_deref(),
            Some("memory://photos/batch_cat.png?expires=3600")
        );
        assert_eq!(report.url_ttl_seconds, 3600);
    }

    #[test]
    fn absent_get_download_means_no_url() {
        let store = seeded_store(8, 8);
        let request = json!({
            "bucketname": "photos",
            "filename": "cat.png",
            "operations": []
        });
        let report = run_pipeline(&store, &request, &config()).unwrap();
        assert!(report.url.is_none());
        assert!(store
            .operations()
            .iter()
            .all(|op| !matches!(op, RecordedOp::SignedUrl { .. })));
    }
}
