#![no_main]

//! Fuzz target for request target parsing and header normalization.
//!
//! # Goal
//! Malformed request URLs and header values must fall back to defaults
//! instead of panicking, and origin-form targets must yield absolute paths.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use spyglasses_gate::context::{normalize_headers, RequestTarget};
use spyglasses_gate::GateRequest;

#[derive(Arbitrary, Debug)]
struct Input {
    url: Option<String>,
    headers: Vec<(String, Vec<u8>)>,
}

fuzz_target!(|input: Input| {
    let target = RequestTarget::parse(input.url.as_deref());
    if input.url.as_deref().is_none_or(|u| u.starts_with('/') || u.is_empty()) {
        assert!(target.path.starts_with('/'));
    }
    assert!(target.query.is_empty() || target.query.starts_with('?'));

    let mut request = GateRequest::new(input.url.unwrap_or_default());
    for (name, value) in input.headers.iter().take(16) {
        if let Ok(value) = std::str::from_utf8(value) {
            request = request.with_header(name, value);
        }
    }

    let normalized = normalize_headers(request.headers());
    for name in normalized.keys() {
        assert_eq!(name, &name.to_ascii_lowercase());
    }
});
