//! Wire request parsing and shape validation.
//!
//! A request is a single JSON object carrying `bucketname`, `filename`,
//! `operations` and the optional `get_download` flag. Missing top-level
//! keys reject the whole request. The *contents* of the operations array
//! are parsed leniently: a malformed entry is carried through so the
//! pipeline can record a diagnostic for it and keep going, instead of
//! failing the request.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::naming;

/// Wire key for the source bucket.
pub const BUCKET_KEY: &str = "bucketname";
/// Wire key for the source object name.
pub const FILE_NAME_KEY: &str = "filename";
/// Wire key for the operation list.
pub const OPERATIONS_KEY: &str = "operations";
/// Wire key for the presigned-URL opt-in flag.
pub const GET_DOWNLOAD_KEY: &str = "get_download";

#[derive(Error, Debug)]
pub enum RequestError {
    /// Required top-level keys are absent. Carries the comma-joined list.
    #[error("Missing request parameters: {0}")]
    MissingParameters(String),
    /// The source object name is outside the extension allow-list.
    #[error("Invalid file type: {0}. Only JPEG, JPG, and PNG are allowed.")]
    UnsupportedExtension(String),
    /// A required key is present but holds the wrong JSON type.
    #[error("Request parameter {key} must be {expected}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
    },
}

/// A fully-shaped pipeline request.
#[derive(Debug, Clone)]
pub struct Request {
    pub bucket: String,
    pub file: String,
    pub operations: Vec<OperationSpec>,
    pub get_download: bool,
}

/// One entry of the `operations` array.
///
/// Entries are `[name, {args}]` pairs on the wire. Anything else is kept
/// as a degenerate variant instead of failing the parse; the pipeline
/// turns those into per-step diagnostics.
#[derive(Debug, Clone)]
pub enum OperationSpec {
    /// A well-formed pair. The name may still be unknown to the registry.
    Entry {
        name: String,
        args: Map<String, Value>,
    },
    /// Name slot is a string but the args slot is missing or not an object.
    BadArgs { name: String },
    /// The entry is not a `[name, {args}]` pair at all. Carries the entry
    /// rendered as compact JSON for the diagnostic.
    Malformed { rendered: String },
}

impl OperationSpec {
    /// Parse one entry of the operations array. Never fails.
    ///
    /// Elements past the first two are ignored, matching the wire format's
    /// tolerance for trailing entries.
    pub fn from_value(entry: &Value) -> OperationSpec {
        let Some(pair) = entry.as_array() else {
            return OperationSpec::Malformed {
                rendered: entry.to_string(),
            };
        };
        let name = match pair.first().and_then(Value::as_str) {
            Some(name) => name.to_string(),
            None => {
                return OperationSpec::Malformed {
                    rendered: entry.to_string(),
                };
            }
        };
        match pair.get(1) {
            Some(Value::Object(args)) => OperationSpec::Entry {
                name,
                args: args.clone(),
            },
            _ => OperationSpec::BadArgs { name },
        }
    }
}

impl Request {
    /// Parse and validate a request object.
    ///
    /// Checks the required keys in wire order, their JSON types, and the
    /// source extension allow-list. The operations array itself is parsed
    /// entry by entry without rejection.
    pub fn from_value(value: &Value) -> Result<Request, RequestError> {
        let Some(map) = value.as_object() else {
            return Err(RequestError::MissingParameters(
                [BUCKET_KEY, FILE_NAME_KEY, OPERATIONS_KEY].join(", "),
            ));
        };
        require_keys(map, &[BUCKET_KEY, FILE_NAME_KEY, OPERATIONS_KEY])?;

        let bucket = map
            .get(BUCKET_KEY)
            .and_then(Value::as_str)
            .ok_or(RequestError::WrongType {
                key: BUCKET_KEY,
                expected: "a string",
            })?
            .to_string();
        let file = map
            .get(FILE_NAME_KEY)
            .and_then(Value::as_str)
            .ok_or(RequestError::WrongType {
                key: FILE_NAME_KEY,
                expected: "a string",
            })?
            .to_string();
        let entries = map
            .get(OPERATIONS_KEY)
            .and_then(Value::as_array)
            .ok_or(RequestError::WrongType {
                key: OPERATIONS_KEY,
                expected: "an array",
            })?;

        check_source_extension(&file)?;

        let operations = entries.iter().map(OperationSpec::from_value).collect();
        let get_download = map
            .get(GET_DOWNLOAD_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Request {
            bucket,
            file,
            operations,
            get_download,
        })
    }
}

/// Check that every key in `required` is present.
///
/// The missing-key list in the error preserves `required` order.
pub fn require_keys(map: &Map<String, Value>, required: &[&str]) -> Result<(), RequestError> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|key| !map.contains_key(*key))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(RequestError::MissingParameters(missing.join(", ")))
    }
}

/// Gate a source object name on the extension allow-list.
pub fn check_source_extension(file: &str) -> Result<(), RequestError> {
    if naming::has_allowed_extension(file) {
        return Ok(());
    }
    let ext = naming::extension(file).unwrap_or_default();
    Err(RequestError::UnsupportedExtension(ext))
}
