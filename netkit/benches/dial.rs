//! Dial benchmarks against the in-memory host
//!
//! Measures per-dial overhead of resolve + connect + adapter setup, with
//! immediate and probed (in-progress) connects.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use netkit::memory::{ConnectBehavior, MemoryHost};
use netkit::prelude::*;

const PROBES: &[u32] = &[0, 4, 16];

fn dial_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("dial/stream");

    for &probes in PROBES {
        let host = MemoryHost::new();
        let behavior = if probes == 0 {
            ConnectBehavior::Immediate
        } else {
            ConnectBehavior::Pending { probes }
        };
        host.route_inet("10.0.0.1:80".parse().unwrap(), behavior);

        group.bench_with_input(BenchmarkId::new("probes", probes), &host, |b, host| {
            b.iter(|| {
                futures::executor::block_on(async {
                    let mut conn = dial(host, "tcp", black_box("10.0.0.1:80"), None)
                        .await
                        .unwrap();
                    conn.close().unwrap();
                });
            });
        });
    }
    group.finish();
}

fn dial_datagram(c: &mut Criterion) {
    let host = MemoryHost::new();
    c.bench_function("dial/datagram", |b| {
        b.iter(|| {
            futures::executor::block_on(async {
                let mut conn = dial(&host, "udp", black_box("127.0.0.1:9"), None)
                    .await
                    .unwrap();
                conn.close().unwrap();
            });
        });
    });
}

fn resolve_candidates(c: &mut Criterion) {
    let host = MemoryHost::new();
    let addrs: Vec<std::net::IpAddr> = (1..=4)
        .map(|i| format!("10.0.1.{i}").parse().unwrap())
        .collect();
    host.add_host("pool.example", &addrs);

    c.bench_function("resolve/4_candidates", |b| {
        b.iter(|| resolve(&host, "tcp", black_box("pool.example:443")).unwrap());
    });
}

criterion_group!(benches, dial_stream, dial_datagram, resolve_candidates);
criterion_main!(benches);
