//! Throughput Benchmark for tcpmap
//!
//! Measures the per-request work that does not touch the network: request
//! parsing, key splitting, template rendering, and a cache pool lookup
//! against the in-process store.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tcpmap::cache::{CacheConnection, CachePool, MemoryConnection};
use tcpmap::lookup::{KeyParts, QueryTemplates, TemplateRenderer};
use tcpmap::protocol::Request;

/// Benchmark request line parsing
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Elements(1));

    group.bench_function("request_line", |b| {
        b.iter(|| black_box(Request::parse(black_box(b"get alice@example.com\n"))));
    });

    group.bench_function("key_parts", |b| {
        let mut i = 0u64;
        let keys: Vec<String> = (0..1000).map(|i| format!("user{}@example.com", i)).collect();
        b.iter(|| {
            let key = &keys[(i % 1000) as usize];
            black_box(KeyParts::parse(key));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark rendering the three backend templates
fn bench_render(c: &mut Criterion) {
    let templates = QueryTemplates {
        mysql: "SELECT destination FROM aliases WHERE address = '%s'".to_string(),
        ldap: "(&(objectClass=inetOrgPerson)(uid=%u)(mailDomain=%d))".to_string(),
        postgres: "SELECT goto FROM alias WHERE local_part = '%u' AND domain = '%d'".to_string(),
    };
    let renderer = TemplateRenderer::default();

    let mut group = c.benchmark_group("render");
    group.throughput(Throughput::Elements(3));

    group.bench_function("all_templates", |b| {
        let parts = KeyParts::parse("alice@example.com");
        b.iter(|| black_box(templates.render(&renderer, &parts)));
    });

    group.bench_function("no_domain", |b| {
        let parts = KeyParts::parse("postmaster");
        b.iter(|| black_box(templates.render(&renderer, &parts)));
    });

    group.finish();
}

/// Benchmark cache pool round trips against the in-process store
fn bench_cache(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let store = MemoryConnection::new();
    let slots: Vec<Box<dyn CacheConnection>> =
        (0..10).map(|_| Box::new(store.clone()) as Box<dyn CacheConnection>).collect();
    let pool = CachePool::new(slots).unwrap();

    runtime.block_on(async {
        for i in 0..10_000 {
            pool.set(&format!("user{}@example.com", i), &format!("200 mailbox:user{}\n", i))
                .await
                .unwrap();
        }
    });

    let mut group = c.benchmark_group("cache");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_hit", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("user{}@example.com", i % 10_000);
            black_box(runtime.block_on(pool.get(&key)).unwrap());
            i += 1;
        });
    });

    group.bench_function("get_miss", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing{}@example.com", i);
            black_box(runtime.block_on(pool.get(&key)).unwrap());
            i += 1;
        });
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_render, bench_cache);
criterion_main!(benches);
