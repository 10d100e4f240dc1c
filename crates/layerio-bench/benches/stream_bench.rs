//! Stream throughput benchmarks.
//!
//! Measures buffered reads, line splitting and buffered writes over an
//! in-memory transport, across buffer sizes.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use layerio_core::transport::MemoryFile;
use layerio_core::{Access, LineOptions, Stream, StreamConfig};

const PAYLOAD_LEN: usize = 1 << 20;
const BUFFER_SIZES: [usize; 3] = [512, 8192, 65536];

fn payload() -> Vec<u8> {
    (0..PAYLOAD_LEN).map(|i| (i % 251) as u8).collect()
}

fn text_payload() -> Vec<u8> {
    let mut out = Vec::with_capacity(PAYLOAD_LEN);
    let mut n = 0usize;
    while out.len() < PAYLOAD_LEN {
        out.extend_from_slice(format!("line {n} of the benchmark corpus\n").as_bytes());
        n += 1;
    }
    out
}

fn bench_buffered_read(c: &mut Criterion) {
    let data = payload();
    let mut group = c.benchmark_group("buffered_read");
    group.throughput(Throughput::Bytes(PAYLOAD_LEN as u64));
    for size in BUFFER_SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let file = MemoryFile::with_contents(&data, Access::READ);
                let config = StreamConfig::binary().with_buffer_size(size);
                let mut stream = Stream::open(file, config).unwrap();
                let mut total = 0usize;
                while let Some(chunk) = stream.read(Some(4096)).unwrap() {
                    total += chunk.len();
                }
                criterion::black_box(total);
            });
        });
    }
    group.finish();
}

fn bench_line_split(c: &mut Criterion) {
    let data = text_payload();
    let opts = LineOptions::new();
    let mut group = c.benchmark_group("line_split");
    group.throughput(Throughput::Bytes(data.len() as u64));
    for size in BUFFER_SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let file = MemoryFile::with_contents(&data, Access::READ);
                let config = StreamConfig::default().with_buffer_size(size);
                let mut stream = Stream::open(file, config).unwrap();
                let mut lines = 0usize;
                while stream.gets(&opts).unwrap().is_some() {
                    lines += 1;
                }
                criterion::black_box(lines);
            });
        });
    }
    group.finish();
}

fn bench_buffered_write(c: &mut Criterion) {
    let chunk = [b'x'; 100];
    let mut group = c.benchmark_group("buffered_write");
    group.throughput(Throughput::Bytes(PAYLOAD_LEN as u64));
    for size in BUFFER_SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let file = MemoryFile::new(Access::WRITE);
                let handle = file.handle();
                let config = StreamConfig::binary().with_buffer_size(size);
                let mut stream = Stream::open(file, config).unwrap();
                for _ in 0..PAYLOAD_LEN / chunk.len() {
                    stream.write(&chunk).unwrap();
                }
                stream.close().unwrap();
                criterion::black_box(handle.len());
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_buffered_read,
    bench_line_split,
    bench_buffered_write
);
criterion_main!(benches);
