//! Fuzz target for filename sanitising and slug derivation.
//!
//! Any client-supplied filename must yield a non-empty slug made of
//! lowercase ASCII alphanumerics and single hyphens.

#![no_main]

use chatbot_runtime::models::{sanitize_filename, slugify};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    if let Some(name) = sanitize_filename(raw) {
        assert!(!name.contains('/') && !name.contains('\\'));
        assert!(name != "." && name != "..");
    }

    let slug = slugify(raw);
    assert!(!slug.is_empty());
    assert!(!slug.starts_with('-') && !slug.ends_with('-'));
    assert!(!slug.contains("--"));
    assert!(slug.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-'));
});
