// Write performance benchmarks for segkv

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use segkv::{Options, Store};
use std::hint::black_box;
use tempfile::TempDir;

fn benchmark_sequential_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_write");

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let temp_dir = TempDir::new().unwrap();
                let store = Store::open(temp_dir.path()).unwrap();

                for i in 0..size {
                    let key = format!("key{:08}", i);
                    let value = format!("value{:08}", i);
                    store.put(key.as_bytes(), value.as_bytes()).unwrap();
                }

                black_box(&store);
            });
        });
    }

    group.finish();
}

fn benchmark_overwrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("overwrite");

    group.throughput(Throughput::Elements(1000));
    group.bench_function("overwrite_1000", |b| {
        // Setup store once for all iterations
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(temp_dir.path()).unwrap();

        for i in 0..1000 {
            let key = format!("key{:08}", i);
            let value = format!("initial_value{:08}", i);
            store.put(key.as_bytes(), value.as_bytes()).unwrap();
        }

        b.iter(|| {
            for i in 0..1000 {
                let key = format!("key{:08}", i);
                let value = format!("updated_value{:08}", i);
                store.put(key.as_bytes(), value.as_bytes()).unwrap();
            }
            black_box(&store);
        });
    });

    group.finish();
}

fn benchmark_write_with_rotation(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_with_rotation");

    group.throughput(Throughput::Elements(1000));
    group.bench_function("rotating_64k", |b| {
        b.iter(|| {
            let temp_dir = TempDir::new().unwrap();
            let opts = Options::new().max_log_size(64 * 1024);
            let store = Store::open_with_options(temp_dir.path(), opts).unwrap();

            for i in 0..1000 {
                let key = format!("key{:08}", i);
                let value = vec![b'x'; 100];
                store.put(key.as_bytes(), &value).unwrap();
            }

            black_box(&store);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_sequential_write,
    benchmark_overwrite,
    benchmark_write_with_rotation
);
criterion_main!(benches);
