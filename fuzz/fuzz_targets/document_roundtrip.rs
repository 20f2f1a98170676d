#![no_main]

use libfuzzer_sys::fuzz_target;
use mongo_types::{LazyDocument, encode_document};

fuzz_target!(|data: &[u8]| {
    // Anything that materializes must re-encode to a stable byte form
    let Ok(doc) = LazyDocument::from_bytes(data.to_vec()).to_document() else {
        return;
    };
    let Ok(encoded) = encode_document(&doc) else {
        return;
    };
    let again = LazyDocument::from_bytes(encoded.clone())
        .to_document()
        .expect("re-encoded document must decode");
    assert_eq!(encode_document(&again).ok(), Some(encoded));
});
