//! Centralized naming for derived artifacts.
//!
//! Every operation writes its output next to the source object under a
//! fixed prefix (`rotated_`, `grayscaled_`, ...), and the pipeline writes
//! under `batch_`. This module provides the string machinery all of them
//! share: prefixing, extension extraction, and extension rewriting for
//! format conversions.
//!
//! ## Examples
//!
//! - `rotated_` + `cat.png` → `rotated_cat.png`
//! - `transformed_` + `cat.png` re-encoded as jpeg → `transformed_cat.jpeg`
//! - `batch_` + `photo.album.png` as jpeg → `batch_photo.album.jpeg`

/// Source extensions accepted by every entry point.
pub const ALLOWED_SOURCE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Lowercased extension of an object name, if it has one.
///
/// `"cat.PNG"` → `Some("png")`, `"cat"` → `None`, `"cat."` → `None`.
pub fn extension(name: &str) -> Option<String> {
    let dot = name.rfind('.')?;
    let ext = &name[dot + 1..];
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Whether the object name carries one of the allowed source extensions.
pub fn has_allowed_extension(name: &str) -> bool {
    extension(name)
        .map(|ext| ALLOWED_SOURCE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Derived artifact name: prefix prepended, extension untouched.
pub fn derived_name(prefix: &str, source: &str) -> String {
    format!("{prefix}{source}")
}

/// Derived artifact name with the extension rewritten to `format`.
///
/// A source without an extension keeps its full name as the stem.
pub fn derived_name_with_format(prefix: &str, source: &str, format: &str) -> String {
    format!("{prefix}{}", rewrite_extension(source, format))
}

/// Replace the extension of `name` with `format` (lowercased).
pub fn rewrite_extension(name: &str, format: &str) -> String {
    let stem = match name.rfind('.') {
        Some(dot) => &name[..dot],
        None => name,
    };
    format!("{stem}.{}", format.to_lowercase())
}
