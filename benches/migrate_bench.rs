//! Benchmarks for kv2couch
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::num::NonZeroUsize;

fn benchmark_partition(c: &mut Criterion) {
    use kv2couch::migrate::jobs;

    let keys: Vec<String> = (0..100_000).map(|i| format!("doc:{}", i)).collect();
    let size = NonZeroUsize::new(100).unwrap();

    c.bench_function("partition_100k_keys", |b| {
        b.iter(|| {
            let jobs = jobs(black_box(&keys), size);
            black_box(jobs);
        })
    });
}

fn benchmark_build_body(c: &mut Criterion) {
    use kv2couch::migrate::bulk::build_body;

    let docs: Vec<String> = (0..1000)
        .map(|i| format!(r#"{{"_id":"doc:{}","type":"bench","value":{}}}"#, i, i))
        .collect();

    c.bench_function("build_body_1000_docs", |b| {
        b.iter(|| {
            let body = build_body(docs.iter().map(String::as_str));
            black_box(body);
        })
    });
}

fn benchmark_fetch(c: &mut Criterion) {
    use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
    use kv2couch::migrate::DocumentFetcher;
    use kv2couch::store::MemoryStore;
    use std::sync::Arc;

    let store = Arc::new(MemoryStore::from_pairs((0..100).map(|i| {
        (
            format!("doc:{}", i),
            BASE64_STANDARD.encode(format!(r#"{{"_id":"doc:{}"}}"#, i)),
        )
    })));
    let keys: Vec<String> = (0..100).map(|i| format!("doc:{}", i)).collect();
    let fetcher = DocumentFetcher::new(store);

    c.bench_function("fetch_and_decode_100_docs", |b| {
        b.iter(|| {
            let batch = fetcher.fetch_documents(0, black_box(&keys));
            black_box(batch);
        })
    });
}

criterion_group!(benches, benchmark_partition, benchmark_build_body, benchmark_fetch);
criterion_main!(benches);
