#![no_main]

use libfuzzer_sys::fuzz_target;
use tsls_backend::lex;
use tsls_backend::scanner;

const MAX_SOURCE_BYTES: usize = 8192;

fuzz_target!(|data: &[u8]| {
    let capped = &data[..data.len().min(MAX_SOURCE_BYTES)];
    let source = String::from_utf8_lossy(capped);

    let (tokens, _errors) = lex::tokenize(&source);
    // Every token span must lie inside the source.
    for token in &tokens {
        let span = token.span();
        assert!(span.end() as usize <= source.len());
    }

    let _ = scanner::extract_declarations(&source, &tokens);
    let _ = scanner::pre_process_text(&source);
});
