#![no_main]

use libfuzzer_sys::fuzz_target;
use tsls_project::tsconfig;

const MAX_CONFIG_BYTES: usize = 4096;

fuzz_target!(|data: &[u8]| {
    let capped = &data[..data.len().min(MAX_CONFIG_BYTES)];
    let source = String::from_utf8_lossy(capped);

    // Comment stripping must never panic or grow the input.
    let stripped = tsconfig::strip_json_comments(&source);
    assert!(stripped.len() <= source.len());

    let _ = tsconfig::parse(&source);
});
