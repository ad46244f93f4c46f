// Engine and WAL performance benchmarks. Covers the sharded in-memory
// store's hot path and the WAL frame codec that durability rides on.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use namespacedb::engine::Engine;
use namespacedb::wal::{decode, encode, Entry, Op};

fn bench_engine_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_set");

    let partition_counts = vec![1, 4, 16];

    for partitions in partition_counts {
        group.bench_with_input(BenchmarkId::from_parameter(partitions), &partitions, |b, &partitions| {
            let engine = Engine::new(partitions);
            b.iter(|| {
                for i in 0..1000 {
                    engine.set(&format!("key_{i}"), black_box(format!("value_{i}")), 0);
                }
            });
        });
    }

    group.finish();
}

fn bench_engine_get(c: &mut Criterion) {
    let engine = Engine::new(8);
    for i in 0..10000 {
        engine.set(&format!("key_{i}"), format!("value_{i}"), 0);
    }

    c.bench_function("engine_get", |b| {
        b.iter(|| {
            for i in (0..10000).step_by(10) {
                black_box(engine.get(&format!("key_{i}")));
            }
        });
    });
}

fn bench_engine_del(c: &mut Criterion) {
    c.bench_function("engine_del", |b| {
        b.iter(|| {
            let engine = Engine::new(8);
            for i in 0..1000 {
                engine.set(&format!("key_{i}"), format!("value_{i}"), 0);
            }
            for i in 0..1000 {
                engine.del(&format!("key_{i}"));
            }
            black_box(&engine);
        });
    });
}

fn bench_wal_encode(c: &mut Criterion) {
    let entry = Entry {
        lsn: 1,
        op: Op::Set,
        args: vec!["default".to_string(), "key".to_string(), "value".to_string()],
    };

    c.bench_function("wal_encode", |b| {
        b.iter(|| {
            let mut buf = BytesMut::new();
            encode(black_box(&entry), &mut buf);
            black_box(buf);
        });
    });
}

fn bench_wal_decode(c: &mut Criterion) {
    let entry = Entry {
        lsn: 1,
        op: Op::Set,
        args: vec!["default".to_string(), "key".to_string(), "value".to_string()],
    };
    let mut encoded = BytesMut::new();
    encode(&entry, &mut encoded);
    let frozen = encoded.freeze();

    c.bench_function("wal_decode", |b| {
        b.iter(|| {
            let mut reader = frozen.clone();
            black_box(decode(&mut reader).unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_engine_set,
    bench_engine_get,
    bench_engine_del,
    bench_wal_encode,
    bench_wal_decode
);
criterion_main!(benches);
