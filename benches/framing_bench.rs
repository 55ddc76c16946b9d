//! Benchmarks for flowframe.
//!
//! Run with:
//!     cargo bench

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

use flowframe::{
    BufferConfig, CodecConfig, FrameError, FramingCodec, GrowableBuffer, IterPublisher, Publisher,
    RawCodec, Subscriber, Subscription, UNBOUNDED,
};

/// Counts delivered units with unbounded demand.
struct Count(Arc<AtomicUsize>);

impl Subscriber<Bytes> for Count {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        subscription.request(UNBOUNDED);
    }

    fn on_next(&mut self, _unit: Bytes) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn on_error(&mut self, error: FrameError) {
        panic!("unexpected error: {error}");
    }

    fn on_complete(&mut self) {}
}

/// `size` bytes of 63-byte lines, split into `chunk`-sized pieces.
fn line_chunks(size: usize, chunk: usize) -> Vec<Bytes> {
    let data: Vec<u8> = (0..size)
        .map(|i| if i % 64 == 63 { b'\n' } else { b'a' + (i % 26) as u8 })
        .collect();
    let data = Bytes::from(data);
    (0..data.len())
        .step_by(chunk)
        .map(|start| data.slice(start..(start + chunk).min(data.len())))
        .collect()
}

fn run(codec: &FramingCodec<RawCodec>, chunks: &[Bytes]) -> usize {
    let count = Arc::new(AtomicUsize::new(0));
    codec
        .decode(IterPublisher::new(chunks.to_vec()))
        .subscribe(Count(Arc::clone(&count)));
    count.load(Ordering::Relaxed)
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let codec = FramingCodec::new(
        RawCodec,
        CodecConfig::default()
            .with_delimiter(b'\n')
            .with_aggregate_on_decode(true),
    )
    .unwrap();

    // Different data sizes
    for size in [64 * 1024, 1024 * 1024, 10 * 1024 * 1024] {
        let chunks = line_chunks(size, 4096);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(format!("lines_{}kb", size / 1024), &chunks, |b, chunks| {
            b.iter(|| black_box(run(&codec, black_box(chunks))));
        });
    }

    group.finish();
}

fn bench_chunk_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_sizes");
    let size = 1024 * 1024; // 1 MB
    let codec = FramingCodec::new(
        RawCodec,
        CodecConfig::default()
            .with_delimiter(b'\n')
            .with_aggregate_on_decode(true),
    )
    .unwrap();

    group.throughput(Throughput::Bytes(size as u64));
    for chunk in [16, 512, 64 * 1024] {
        let chunks = line_chunks(size, chunk);
        group.bench_function(format!("chunk_{chunk}"), |b| {
            b.iter(|| black_box(run(&codec, black_box(&chunks))));
        });
    }

    // Chunks passed through as units
    let pass = FramingCodec::new(RawCodec, CodecConfig::default()).unwrap();
    let chunks = line_chunks(size, 512);
    group.bench_function("pass_through", |b| {
        b.iter(|| black_box(run(&pass, black_box(&chunks))));
    });

    group.finish();
}

fn bench_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer");
    let piece = vec![7u8; 1024];
    let total = 4 * 1024 * 1024;

    group.throughput(Throughput::Bytes(total as u64));
    group.bench_function("append_from_small", |b| {
        b.iter(|| {
            let mut buf = GrowableBuffer::with_config(BufferConfig::new(1024, total).unwrap());
            for _ in 0..total / piece.len() {
                buf.append(black_box(&piece)).unwrap();
            }
            black_box(buf.len())
        });
    });

    group.bench_function("append_past_max", |b| {
        b.iter(|| {
            let mut buf = GrowableBuffer::with_config(BufferConfig::new(1024, 64 * 1024).unwrap());
            for _ in 0..total / piece.len() {
                buf.append(black_box(&piece)).unwrap();
            }
            black_box(buf.len())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_chunk_sizes, bench_buffer);
criterion_main!(benches);
