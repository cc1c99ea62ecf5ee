//! Filename-derived identifiers for installed models.
//!
//! Slugs are URL and filesystem safe: lowercase ASCII alphanumerics joined
//! by single hyphens, never empty.

use std::sync::OnceLock;

use regex::Regex;

/// Slug used when a filename contains no usable characters.
pub const FALLBACK_SLUG: &str = "model";

/// Derive a slug from a display string or filename stem.
///
/// Every run of characters outside `[A-Za-z0-9]` collapses to one hyphen,
/// leading and trailing hyphens are trimmed, and the result is lowercased.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_hyphen = false;

    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Candidate slug for the `attempt`-th collision of `base` (1 = no suffix).
pub fn dedup_candidate(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{base}-{attempt}")
    }
}

fn quantization_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(q\d(?:_[a-z])?_?[a-z0-9]*)").expect("static pattern"))
}

/// Best-effort quantization preset from a GGUF filename (`Q4_K_M`, `Q8_0`).
///
/// The token is never checked against the file contents.
pub fn infer_quantization(filename: &str) -> Option<String> {
    let lowered = filename.to_lowercase();
    quantization_pattern()
        .captures(&lowered)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase())
}
