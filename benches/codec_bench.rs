//! Performance benchmarks for GateCodec.
//!
//! At 38400 baud the line carries under 4000 bytes per second, so these
//! numbers mostly guard against regressions in the byte-level state machine.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench codec_bench
//! ```

use bytes::{Bytes, BytesMut};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tokio_util::codec::{Decoder, Encoder};
use gatelink_core::Address;
use gatelink_protocol::{GateCodec, GateStatusResponse, GateStatusTransaction, Message, Packet};

const STATUS_SAMPLE: &[u8] =
    b"0404141010000000000000000000000000180000000162680003DF02BA1A000000000000E326002800005E750A6F";

/// Status request: the smallest frame on the wire.
fn create_status_request() -> Packet {
    GateStatusTransaction::new(Address::default()).packet().clone()
}

/// Status response: the largest frame seen in normal polling.
fn create_status_response() -> Packet {
    Packet::new(1, b'N', Bytes::from_static(STATUS_SAMPLE)).unwrap()
}

/// Benchmark encoding a status request.
fn bench_encode_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_request");
    group.throughput(Throughput::Elements(1));

    let packet = create_status_request();

    group.bench_function("encode_status_request", |b| {
        b.iter(|| {
            let mut codec = GateCodec::new();
            let mut buffer = BytesMut::new();
            codec.encode(black_box(&packet), &mut buffer).unwrap();
            black_box(buffer);
        });
    });

    group.finish();
}

/// Benchmark decoding a status response.
fn bench_decode_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_response");
    group.throughput(Throughput::Elements(1));

    let encoded = create_status_response().to_bytes();

    group.bench_function("decode_status_response", |b| {
        b.iter(|| {
            let mut codec = GateCodec::new();
            let mut buffer = BytesMut::from(&encoded[..]);
            let result = codec.decode(&mut buffer).unwrap();
            black_box(result);
        });
    });

    group.finish();
}

/// Benchmark decoding a frame and its status payload.
fn bench_decode_status_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_status_snapshot");
    group.throughput(Throughput::Elements(1));

    let encoded = create_status_response().to_bytes();

    group.bench_function("frame_and_payload", |b| {
        b.iter(|| {
            let mut codec = GateCodec::new();
            let mut buffer = BytesMut::from(&encoded[..]);
            let packet = codec.decode(&mut buffer).unwrap().unwrap().unwrap();
            let status = GateStatusResponse::decode(packet.payload()).unwrap();
            black_box(status);
        });
    });

    group.finish();
}

/// Benchmark decoding multiple frames in sequence.
fn bench_decode_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_batch");

    for batch_size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));

        let mut codec = GateCodec::new();
        let mut encoded = BytesMut::new();
        for _ in 0..*batch_size {
            codec.encode(create_status_response(), &mut encoded).unwrap();
        }
        let encoded_bytes = encoded.freeze();

        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, _| {
                b.iter(|| {
                    let mut codec = GateCodec::new();
                    let mut buffer = BytesMut::from(&encoded_bytes[..]);
                    let mut count = 0;

                    while let Ok(Some(_)) = codec.decode(&mut buffer) {
                        count += 1;
                    }

                    black_box(count);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark resynchronization through line noise and corrupt frames.
fn bench_decode_noisy_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_noisy_stream");
    group.throughput(Throughput::Elements(1));

    let mut stream = BytesMut::new();
    stream.extend_from_slice(&[0x00, 0x13, 0x7E, 0x21]);
    stream.extend_from_slice(&[0xFF, 0x01, 0x05, b'N', b'0']);
    stream.extend_from_slice(&create_status_response().to_bytes());
    let stream = stream.freeze();

    group.bench_function("noise_truncated_then_valid", |b| {
        b.iter(|| {
            let mut codec = GateCodec::new();
            let mut buffer = BytesMut::from(&stream[..]);
            let mut packets = 0;

            while let Ok(Some(item)) = codec.decode(&mut buffer) {
                if item.is_ok() {
                    packets += 1;
                }
            }

            black_box(packets);
        });
    });

    group.finish();
}

/// Benchmark decoding with frames arriving a few bytes at a time, as they
/// do from a UART.
fn bench_decode_partial_streaming(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_partial_streaming");
    group.throughput(Throughput::Elements(1));

    let full_frame = create_status_response().to_bytes();

    for chunk_size in [1, 8, 32].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("chunk_{}_bytes", chunk_size)),
            chunk_size,
            |b, &size| {
                b.iter(|| {
                    let mut codec = GateCodec::new();
                    let mut result = None;

                    for chunk in full_frame.chunks(size) {
                        let mut buf = BytesMut::from(chunk);
                        if let Ok(Some(item)) = codec.decode(&mut buf) {
                            result = Some(item);
                            break;
                        }
                    }

                    black_box(result);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_encode_request,
    bench_decode_response,
    bench_decode_status_snapshot,
    bench_decode_batch,
    bench_decode_noisy_stream,
    bench_decode_partial_streaming,
);

criterion_main!(benches);
