// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Benchmarks for core kv operations.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use opalkv::{Config, Database, Key, KeyPart, KvU64, ListOptions, Selector, Value};
use tempfile::TempDir;

fn create_db() -> (Database, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(Some(&dir.path().join("bench.db")), Config::default()).unwrap();
    (db, dir)
}

fn user_key(i: u32) -> Key {
    Key::from(vec![KeyPart::from("users"), KeyPart::from(i as i64)])
}

fn bench_point_get(c: &mut Criterion) {
    let (db, _dir) = create_db();

    for i in 0..10_000 {
        db.set(&user_key(i), &Value::Bytes(vec![0u8; 100]), None).unwrap();
    }

    let mut group = c.benchmark_group("kv");
    group.throughput(Throughput::Elements(1));

    group.bench_function("point_get", |b| {
        b.iter_batched(
            || user_key(rand::random::<u32>() % 10_000),
            |key| db.get(&key).unwrap(),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_point_set(c: &mut Criterion) {
    let (db, _dir) = create_db();

    let mut group = c.benchmark_group("kv");
    group.throughput(Throughput::Elements(1));

    let counter = std::sync::atomic::AtomicU32::new(0);

    group.bench_function("point_set", |b| {
        b.iter(|| {
            let i = counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            db.set(&user_key(i), &Value::Bytes(vec![0u8; 100]), None).unwrap()
        })
    });

    group.finish();
}

fn bench_list_prefix(c: &mut Criterion) {
    let (db, _dir) = create_db();

    for i in 0..10_000 {
        db.set(&user_key(i), &Value::Int(i as i64), None).unwrap();
    }

    let mut group = c.benchmark_group("kv");
    group.throughput(Throughput::Elements(100));

    let prefix = Key::from(KeyPart::from("users"));
    group.bench_function("list_100", |b| {
        b.iter(|| {
            let count = db
                .list(
                    &Selector::Prefix(prefix.clone()),
                    ListOptions {
                        limit: Some(100),
                        ..Default::default()
                    },
                )
                .unwrap()
                .count();
            assert_eq!(count, 100);
        })
    });

    group.finish();
}

fn bench_atomic_sum(c: &mut Criterion) {
    let (db, _dir) = create_db();
    let key = Key::from(vec![KeyPart::from("stats"), KeyPart::from("hits")]);
    db.set(&key, &Value::U64(KvU64::new(0)), None).unwrap();

    let mut group = c.benchmark_group("kv");
    group.throughput(Throughput::Elements(1));

    group.bench_function("atomic_sum", |b| {
        b.iter(|| {
            db.atomic()
                .sum(&key, KvU64::new(1))
                .unwrap()
                .commit()
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_point_get,
    bench_point_set,
    bench_list_prefix,
    bench_atomic_sum
);
criterion_main!(benches);
