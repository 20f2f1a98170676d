#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mongo_types::LazyDocument;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    key: String,
    data: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let doc = LazyDocument::from_bytes(input.data);
    let _ = doc.len();
    let _ = doc.contains_key(&input.key);
    let _ = doc.get(&input.key);
    if let Ok(Some(nested)) = doc.get_lazy(&input.key) {
        let _ = nested.key_set();
    }
    let _ = doc.to_document();
    let _ = doc == doc.clone();
});
