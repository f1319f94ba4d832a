//! Filesystem-safe name handling
//!
//! Portal-supplied text (years, program names, instructor names, derived
//! filenames) becomes path segments under the download root, so every
//! reserved character must be neutralized before it touches the filesystem.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RESERVED: Regex = Regex::new(r#"[<>:"/\\|?*]"#).expect("valid reserved-char pattern");
}

/// Replace each reserved path character (`< > : " / \ | ? *`) with `_` and
/// trim surrounding whitespace. Pure and deterministic.
pub fn sanitize_filename(name: &str) -> String {
    RESERVED.replace_all(name, "_").trim().to_string()
}

/// Sanitize a path segment, substituting `fallback` when the sanitized
/// result is empty. Directory segments must never be empty.
pub fn sanitize_segment(name: &str, fallback: &str) -> String {
    let sanitized = sanitize_filename(name);
    if sanitized.is_empty() {
        fallback.to_string()
    } else {
        sanitized
    }
}
