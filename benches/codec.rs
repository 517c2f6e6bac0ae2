//! Frame codec benchmark suite.
//!
//! Benchmarks envelope encode/decode at different payload sizes:
//! - Payload sizes: 64B, 1KiB, 32KiB, 512KiB
//!
//! Run with: cargo bench --bench codec
//! Results saved to: target/criterion/

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use uplink_transport::protocol::codec;
use uplink_transport::{Envelope, Uri};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const PAYLOAD_SIZES: &[usize] = &[64, 1024, 32 * 1024, 512 * 1024];

fn publish_envelope(payload_len: usize) -> Envelope {
    let topic = Uri::parse("vehicle/door/status").expect("valid uri");
    Envelope::publish(topic, vec![0xa5; payload_len])
}

// ============================================================================
// Benchmark: Encode
// ============================================================================

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_encode");

    for &size in PAYLOAD_SIZES {
        let envelope = publish_envelope(size);
        group.bench_with_input(BenchmarkId::new("encode", size), &envelope, |b, envelope| {
            b.iter(|| codec::encode(envelope).expect("encode"));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Decode
// ============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_decode");

    for &size in PAYLOAD_SIZES {
        let body = codec::encode(&publish_envelope(size)).expect("encode");
        group.bench_with_input(BenchmarkId::new("decode", size), &body, |b, body| {
            b.iter(|| codec::decode(body).expect("decode"));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Round Trip
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_round_trip");

    for &size in PAYLOAD_SIZES {
        let envelope = publish_envelope(size);
        group.bench_with_input(
            BenchmarkId::new("round_trip", size),
            &envelope,
            |b, envelope| {
                b.iter(|| {
                    let body = codec::encode(envelope).expect("encode");
                    codec::decode(&body).expect("decode")
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_round_trip);
criterion_main!(benches);
