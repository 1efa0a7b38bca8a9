//! Object storage behind the pipeline.
//!
//! Everything above this module sees storage through the [`Storage`]
//! trait: `fetch` reads and decodes an object into an image, `store`
//! encodes one back under a location, and `signed_url` builds an expiring
//! download link. The CLI runs on [`DirStore`], a plain directory tree
//! where each bucket is a subdirectory. Unit tests run on the recording
//! [`tests::MemStore`].
//!
//! Writes are last-writer-wins. There is no locking and no atomicity
//! across objects.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use image::{DynamicImage, ImageFormat};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::StorageConfig;
use crate::naming;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Failed to decode {0}: {1}")]
    Decode(String, #[source] image::ImageError),
    #[error("Failed to encode {0}: {1}")]
    Encode(String, #[source] image::ImageError),
}

/// Address of one object: a bucket plus a key inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Synchronous object-level storage.
pub trait Storage {
    /// Read and decode the object at `location`.
    fn fetch(&self, location: &ObjectLocation) -> Result<DynamicImage, StorageError>;

    /// Encode `image` as `format` and write it to `location`,
    /// replacing any existing object.
    fn store(
        &self,
        location: &ObjectLocation,
        format: ImageFormat,
        image: &DynamicImage,
    ) -> Result<(), StorageError>;

    /// Expiring download URL for the object.
    fn signed_url(
        &self,
        location: &ObjectLocation,
        ttl_seconds: u64,
    ) -> Result<String, StorageError>;
}

/// Encoding format implied by an object name's extension.
pub fn format_for_name(name: &str) -> Option<ImageFormat> {
    match naming::extension(name)?.as_str() {
        "png" => Some(ImageFormat::Png),
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        _ => None,
    }
}

/// Directory-backed object store.
///
/// Objects live at `<root>/<bucket>/<key>`. Buckets are created on first
/// write; a fetch from a missing bucket or key reports the object as not
/// found rather than surfacing the raw IO error.
pub struct DirStore {
    root: PathBuf,
    base_url: String,
    signing_secret: Option<String>,
}

impl DirStore {
    pub fn new(
        root: impl Into<PathBuf>,
        base_url: impl Into<String>,
        signing_secret: Option<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            root: root.into(),
            base_url,
            signing_secret,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            &config.root,
            &config.base_url,
            config.signing_secret.clone(),
        )
    }

    fn object_path(&self, location: &ObjectLocation) -> PathBuf {
        self.root.join(&location.bucket).join(&location.key)
    }
}

impl Storage for DirStore {
    fn fetch(&self, location: &ObjectLocation) -> Result<DynamicImage, StorageError> {
        let path = self.object_path(location);
        if !path.exists() {
            return Err(StorageError::NotFound(location.to_string()));
        }
        image::open(&path).map_err(|e| StorageError::Decode(location.to_string(), e))
    }

    fn store(
        &self,
        location: &ObjectLocation,
        format: ImageFormat,
        image: &DynamicImage,
    ) -> Result<(), StorageError> {
        let path = self.object_path(location);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        image
            .save_with_format(&path, format)
            .map_err(|e| StorageError::Encode(location.to_string(), e))
    }

    fn signed_url(
        &self,
        location: &ObjectLocation,
        ttl_seconds: u64,
    ) -> Result<String, StorageError> {
        let expires = unix_now() + ttl_seconds;
        let mut url = format!(
            "{}/{}/{}?expires={expires}",
            self.base_url, location.bucket, location.key
        );
        if let Some(secret) = &self.signing_secret {
            url.push_str("&sig=");
            url.push_str(&sign_token(secret, location, expires));
        }
        Ok(url)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// SHA-256 token over the secret, the object path, and the expiry.
/// NUL separators keep `("ab", "c")` and `("a", "bc")` distinct.
fn sign_token(secret: &str, location: &ObjectLocation, expires: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update([0u8]);
    hasher.update(location.bucket.as_bytes());
    hasher.update([0u8]);
    hasher.update(location.key.as_bytes());
    hasher.update([0u8]);
    hasher.update(expires.to_be_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
