//! Address codec benchmarks
//!
//! Measures encode/decode of the fixed 128-byte host address buffer and
//! decoding of resolver entries, the work done per candidate on every dial.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use netkit_core::endpoint::{Endpoint, SocketKind};
use netkit_core::sockaddr::{self, AddrInfoEntry, MAX_ADDR_INFO};
use std::net::SocketAddr;

fn endpoints() -> Vec<(&'static str, Endpoint)> {
    let v4: SocketAddr = "93.184.216.34:443".parse().unwrap();
    let v6: SocketAddr = "[2606:2800:220:1::248]:443".parse().unwrap();
    vec![
        ("inet4", Endpoint::tcp(v4)),
        ("inet6", Endpoint::tcp(v6)),
        ("unix", Endpoint::unix(SocketKind::Stream, "/var/run/app.sock")),
    ]
}

fn encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("sockaddr");

    for (name, endpoint) in endpoints() {
        group.bench_with_input(BenchmarkId::new("encode", name), &endpoint, |b, ep| {
            b.iter(|| sockaddr::encode(black_box(ep)).unwrap());
        });

        let raw = sockaddr::encode(&endpoint).unwrap();
        group.bench_with_input(BenchmarkId::new("decode", name), &raw, |b, raw| {
            b.iter(|| sockaddr::decode(black_box(raw), SocketKind::Stream).unwrap());
        });
    }
    group.finish();
}

fn addr_info(c: &mut Criterion) {
    let addr: SocketAddr = "10.1.2.3:8080".parse().unwrap();
    let entries = [AddrInfoEntry::new(addr, SocketKind::Stream.as_raw()); MAX_ADDR_INFO];

    c.bench_function("sockaddr/addr_info_scan", |b| {
        b.iter(|| {
            black_box(&entries)
                .iter()
                .filter_map(AddrInfoEntry::socket_addr)
                .count()
        });
    });
}

criterion_group!(benches, encode_decode, addr_info);
criterion_main!(benches);
