//! Benchmarks for cursor decoding.

#![allow(clippy::unwrap_used, missing_docs)]

use bson_protocol::{ByteCursor, DocumentWriter, ElementType, skip_value};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

fn sample_document(fields: usize) -> bytes::Bytes {
    let mut writer = DocumentWriter::with_capacity(fields * 24);
    for i in 0..fields {
        let name = format!("field{i}");
        match i % 3 {
            0 => writer.append_i32(&name, i as i32),
            1 => writer.append_string(&name, "some string value"),
            _ => writer.append_f64(&name, i as f64 * 0.5),
        }
    }
    writer.finish()
}

/// Benchmark reading primitives.
fn bench_read_primitives(c: &mut Criterion) {
    let mut data = Vec::new();
    for i in 0..1024i64 {
        data.extend_from_slice(&i.to_le_bytes());
    }
    let data = bytes::Bytes::from(data);

    let mut group = c.benchmark_group("cursor");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("read_i64", |b| {
        b.iter(|| {
            let mut cursor = ByteCursor::new(data.clone());
            let mut sum = 0i64;
            while cursor.has_remaining().unwrap() {
                sum = sum.wrapping_add(cursor.read_i64().unwrap());
            }
            black_box(sum)
        })
    });
    group.finish();
}

/// Benchmark walking element names while skipping values.
fn bench_skip_scan(c: &mut Criterion) {
    let doc = sample_document(100);

    c.bench_function("skip_scan_100_fields", |b| {
        b.iter(|| {
            let mut cursor = ByteCursor::new(doc.clone());
            cursor.skip(4).unwrap();
            let mut count = 0;
            loop {
                let tag = cursor.read_byte().unwrap();
                if tag == 0 {
                    break;
                }
                cursor.skip_cstring().unwrap();
                skip_value(&mut cursor, ElementType::from_u8(tag).unwrap()).unwrap();
                count += 1;
            }
            black_box(count)
        })
    });
}

criterion_group!(benches, bench_read_primitives, bench_skip_scan);
criterion_main!(benches);
