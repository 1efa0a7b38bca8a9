//! Service configuration module.
//!
//! Handles loading, validating, and merging `imagemill.toml` files. Stock
//! defaults are the base layer; a user config file overrides just the keys
//! it names.
//!
//! ## Config File Location
//!
//! Place `imagemill.toml` in the directory the CLI runs from (or point at
//! another directory with `--config-dir`):
//!
//! ```text
//! project/
//! ├── imagemill.toml   # Overrides stock defaults
//! └── storage/         # Default object store root
//!     └── my-bucket/
//!         └── cat.png
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [storage]
//! root = "storage"                     # Object store root directory
//! base_url = "http://localhost:8000"   # Base for presigned download URLs
//! url_ttl_seconds = 3600               # Presigned URL lifetime
//! # signing_secret = "change-me"       # Omit for unsigned URLs
//!
//! [pipeline]
//! allow_upscale = false                # Refuse resize targets larger than source
//! default_target_format = "png"        # Format conversion fallback target
//! abort_on_step_error = false          # Stop the pipeline on first step error
//! flatten_background = "#ffffff"       # Fill color when dropping an alpha channel
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: override just the values you want.
//!
//! ```toml
//! # Only override the URL lifetime
//! [storage]
//! url_ttl_seconds = 600
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Service configuration loaded from `imagemill.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Object storage settings (root directory, URL signing).
    pub storage: StorageConfig,
    /// Pipeline behavior settings (upscale policy, error policy).
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.url_ttl_seconds == 0 {
            return Err(ConfigError::Validation(
                "storage.url_ttl_seconds must be positive".into(),
            ));
        }
        if self.storage.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage.base_url must not be empty".into(),
            ));
        }
        if let Some(secret) = &self.storage.signing_secret {
            if secret.is_empty() {
                return Err(ConfigError::Validation(
                    "storage.signing_secret must not be empty when set".into(),
                ));
            }
        }
        let format = self.pipeline.default_target_format.to_lowercase();
        if format != "png" && format != "jpeg" {
            return Err(ConfigError::Validation(
                "pipeline.default_target_format must be png or jpeg".into(),
            ));
        }
        if parse_hex_color(&self.pipeline.flatten_background).is_none() {
            return Err(ConfigError::Validation(
                "pipeline.flatten_background must be a #rrggbb hex color".into(),
            ));
        }
        Ok(())
    }
}

/// Object storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Root directory of the object store. Buckets are its subdirectories.
    pub root: String,
    /// Base URL that presigned download URLs are built on.
    pub base_url: String,
    /// Lifetime of presigned download URLs, in seconds.
    pub url_ttl_seconds: u64,
    /// HMAC-style secret mixed into URL signatures.
    /// When absent, URLs carry an expiry but no signature.
    pub signing_secret: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "storage".to_string(),
            base_url: "http://localhost:8000".to_string(),
            url_ttl_seconds: 3600,
            signing_secret: None,
        }
    }
}

/// Pipeline behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Whether resize may produce an image larger than its source.
    /// When false, an upscaling resize is recorded as a step error.
    pub allow_upscale: bool,
    /// Target format used by format conversion when the request names none.
    pub default_target_format: String,
    /// Whether a structured step error aborts the whole pipeline.
    /// When false, the error is recorded and later steps still run.
    pub abort_on_step_error: bool,
    /// Background color composited under transparent pixels when an alpha
    /// channel has to be dropped (e.g. encoding to JPEG). `#rrggbb`.
    pub flatten_background: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            allow_upscale: false,
            default_target_format: "png".to_string(),
            abort_on_step_error: false,
            flatten_background: "#ffffff".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Flatten background as RGB bytes. Falls back to white if the config
    /// was built without going through `validate`.
    pub fn flatten_background_rgb(&self) -> [u8; 3] {
        parse_hex_color(&self.flatten_background).unwrap_or([0xff, 0xff, 0xff])
    }
}

/// Parse a `#rrggbb` hex color into RGB bytes.
///
/// `from_str_radix` tolerates sign prefixes, so digits are checked first.
pub fn parse_hex_color(s: &str) -> Option<[u8; 3]> {
    let hex = s.strip_prefix('#')?;
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b])
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load an `imagemill.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `imagemill.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join("imagemill.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `imagemill.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `imagemill.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Imagemill Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# The file is looked up as `imagemill.toml` in the working directory
# (or the directory given with --config-dir). Only the keys you want to
# override need to be present. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Object storage
# ---------------------------------------------------------------------------
[storage]
# Root directory of the object store. Each bucket is a subdirectory.
root = "storage"

# Base URL that presigned download URLs are built on.
base_url = "http://localhost:8000"

# Lifetime of presigned download URLs, in seconds.
url_ttl_seconds = 3600

# Secret mixed into URL signatures. When commented out, URLs carry an
# expiry timestamp but no signature.
# signing_secret = "change-me"

# ---------------------------------------------------------------------------
# Pipeline behavior
# ---------------------------------------------------------------------------
[pipeline]
# Whether resize may produce an image larger than its source. When false,
# an upscaling resize is recorded as a step error and the image passes
# through unchanged.
allow_upscale = false

# Target format used by format conversion when the request names none.
# One of "png" or "jpeg".
default_target_format = "png"

# Whether a structured step error aborts the whole pipeline. When false,
# the error is recorded in the report and later steps still run.
abort_on_step_error = false

# Background color composited under transparent pixels when an alpha
# channel has to be dropped (e.g. encoding to JPEG).
flatten_background = "#ffffff"
"##
}
