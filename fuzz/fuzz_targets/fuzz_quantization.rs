//! Fuzz target for quantization inference from filenames.

#![no_main]

use chatbot_runtime::models::infer_quantization;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(name) = std::str::from_utf8(data) {
        if let Some(token) = infer_quantization(name) {
            assert!(token.starts_with('Q'));
            assert!(!token.chars().any(|c| c.is_ascii_lowercase()));
        }
    }
});
