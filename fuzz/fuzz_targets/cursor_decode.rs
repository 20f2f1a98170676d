#![no_main]

use bson_protocol::{ByteCursor, ElementType, skip_value};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Walk the top-level elements; malformed input must only produce errors
    let mut cursor = ByteCursor::from_slice(data);
    if cursor.read_i32().is_err() {
        return;
    }
    while let Ok(tag) = cursor.read_byte() {
        if tag == 0 {
            break;
        }
        let Ok(ty) = ElementType::from_u8(tag) else {
            break;
        };
        if cursor.skip_cstring().is_err() || skip_value(&mut cursor, ty).is_err() {
            break;
        }
    }
});
