#![no_main]

use libfuzzer_sys::fuzz_target;
use pdfjoin::config::{Limits, MergeOptions};
use pdfjoin::{load_document_with, merge_documents_with};

fuzz_target!(|data: &[u8]| {
    let limits = Limits {
        max_input_bytes: 1 << 20,
        max_total_objects: 10_000,
        allow_recovery_scan: true,
        max_nesting_depth: 64,
        max_decoded_bytes: 1 << 22,
    };

    // Arbitrary bytes must never panic; anything that loads must merge
    // with itself into a document that loads again.
    let Ok(document) = load_document_with(data.to_vec(), &limits) else {
        return;
    };
    let options = MergeOptions {
        min_inputs: 1,
        ..MergeOptions::with_limits(&limits)
    };
    if let Ok(bytes) = merge_documents_with(&[document], &options) {
        assert!(load_document_with(bytes, &limits).is_ok());
    }
});
