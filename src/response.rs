//! Response construction.
//!
//! Every invocation, chained or standalone, answers with a single JSON
//! object: either `{"error": message}` or a success body whose keys the
//! callers of the original service already depend on. The builders here
//! own those shapes so the executor and the operation wrappers never
//! assemble response maps by hand.

use serde_json::{Map, Value};

use crate::pipeline::PipelineReport;
use crate::types::InvocationContext;

/// Message used when the source object cannot be fetched or decoded.
pub const FETCH_FAILED: &str = "Could not access image from S3.";
/// Message used when the output object cannot be encoded or written.
pub const PERSIST_FAILED: &str = "Could not write image to S3.";
/// Message used when a download URL was requested but cannot be built.
pub const SIGN_URL_FAILED: &str = "Could not generate download URL.";

/// The uniform error answer.
pub fn error_object(message: &str) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("error".to_string(), message.into());
    body
}

/// Success body for a completed pipeline run.
pub fn pipeline_success(report: &PipelineReport) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert(
        "success".to_string(),
        "Successfully processed image.".into(),
    );
    body.insert(
        "batch_operations_count".to_string(),
        report.operations_count.into(),
    );
    body.insert(
        "operation_outputs".to_string(),
        Value::Array(
            report
                .records
                .iter()
                .map(|record| Value::Object(record.clone()))
                .collect(),
        ),
    );
    body.insert("output_key".to_string(), report.output.key.clone().into());
    body.insert(
        "network_latency_ms".to_string(),
        report.network_latency_ms.into(),
    );
    if let Some(url) = &report.url {
        body.insert("url".to_string(), url.clone().into());
        body.insert(
            "url_expires_in_seconds".to_string(),
            report.url_ttl_seconds.into(),
        );
    }
    body
}

/// Stamp the runtime metrics every response carries and seal the body.
pub fn with_runtime_metrics(mut body: Map<String, Value>, context: &InvocationContext) -> Value {
    body.insert(
        "function_runtime_ms".to_string(),
        context.runtime_ms().into(),
    );
    let cold = if context.cold_start() { 1 } else { 0 };
    body.insert("cold_start".to_string(), cold.into());
    Value::Object(body)
}
