#![no_main]

use arbitrary::Arbitrary;
use bytes::{Buf, Bytes};
use libfuzzer_sys::fuzz_target;
use mongo_transport::CompositeBuffer;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    regions: Vec<Vec<u8>>,
    advances: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let expected: Vec<u8> = input.regions.concat();
    let mut buf: CompositeBuffer = input.regions.into_iter().map(Bytes::from).collect();
    assert_eq!(buf.len(), expected.len());

    let mut offset = 0;
    for step in input.advances {
        let n = usize::from(step).min(buf.remaining());
        if n == 0 {
            break;
        }
        assert_eq!(buf.chunk()[0], expected[offset]);
        buf.advance(n);
        offset += n;
    }
    assert_eq!(buf.to_vec(), &expected[offset..]);
});
