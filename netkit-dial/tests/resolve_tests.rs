//! Resolver integration tests against the in-memory host.

use netkit_core::endpoint::{Endpoint, SocketKind};
use netkit_core::error::NetError;
use netkit_core::host::{Errno, HostError};
use netkit_core::memory::MemoryHost;
use netkit_core::sockaddr::AddrInfoEntry;
use netkit_dial::{resolve, Dialer};

fn tcp(addr: &str) -> Endpoint {
    Endpoint::tcp(addr.parse().unwrap())
}

fn mixed_host() -> MemoryHost {
    let host = MemoryHost::new();
    host.add_host(
        "mixed.example",
        &[
            "10.0.0.1".parse().unwrap(),
            "2001:db8::1".parse().unwrap(),
            "10.0.0.2".parse().unwrap(),
        ],
    );
    host
}

#[test]
fn test_preserves_host_order_and_kind() {
    let host = mixed_host();
    let endpoints = resolve(&host, "tcp", "mixed.example:80").unwrap();
    assert_eq!(
        endpoints,
        vec![tcp("10.0.0.1:80"), tcp("[2001:db8::1]:80"), tcp("10.0.0.2:80")]
    );
    assert!(endpoints.iter().all(|e| e.kind() == SocketKind::Stream));
    assert_eq!(host.calls("sock_addr_resolve"), 1);

    let endpoints = resolve(&host, "udp", "mixed.example:53").unwrap();
    assert_eq!(endpoints.len(), 3);
    assert!(endpoints.iter().all(|e| e.kind() == SocketKind::Datagram));
}

#[test]
fn test_family_filters() {
    let host = mixed_host();
    let v4 = resolve(&host, "tcp4", "mixed.example:80").unwrap();
    assert_eq!(v4, vec![tcp("10.0.0.1:80"), tcp("10.0.0.2:80")]);

    let v6 = resolve(&host, "udp6", "mixed.example:80").unwrap();
    assert_eq!(
        v6,
        vec![Endpoint::udp("[2001:db8::1]:80".parse().unwrap())]
    );
}

#[test]
fn test_unix_resolves_without_host_call() {
    let host = MemoryHost::new();
    let endpoints = resolve(&host, "unix", "/tmp/x.sock").unwrap();
    assert_eq!(endpoints, vec![Endpoint::unix(SocketKind::Stream, "/tmp/x.sock")]);
    assert_eq!(endpoints[0].path(), Some("/tmp/x.sock"));

    let endpoints = resolve(&host, "unixgram", "/tmp/x.sock").unwrap();
    assert_eq!(endpoints[0].kind(), SocketKind::Datagram);
    assert_eq!(host.total_calls(), 0);
}

#[test]
fn test_unknown_network_before_host_call() {
    let host = MemoryHost::new();
    let err = resolve(&host, "sctp", "example.com:80").unwrap_err();
    assert_eq!(err, NetError::UnknownNetwork("sctp".to_string()));
    assert_eq!(host.total_calls(), 0);
}

#[test]
fn test_malformed_address() {
    let host = MemoryHost::new();
    let err = resolve(&host, "tcp", "example.com").unwrap_err();
    assert!(matches!(err, NetError::InvalidAddress(_)));
    assert_eq!(host.total_calls(), 0);
}

#[test]
fn test_no_matching_entries() {
    let host = MemoryHost::new();
    host.add_host("v6only.example", &["2001:db8::7".parse().unwrap()]);
    let err = resolve(&host, "tcp4", "v6only.example:80").unwrap_err();
    assert_eq!(err, NetError::no_such_host("v6only.example"));
}

#[test]
fn test_host_resolver_failure() {
    let host = MemoryHost::new();
    let err = resolve(&host, "tcp", "nowhere.invalid:80").unwrap_err();
    assert_eq!(
        err,
        NetError::socket("getaddrinfo", HostError::Code(Errno::NOENT))
    );
}

#[test]
fn test_skips_unknown_family_entries() {
    let host = MemoryHost::new();
    let mut odd = AddrInfoEntry::new("10.9.9.9:80".parse().unwrap(), SocketKind::Stream.as_raw());
    odd.family = 9;
    let good = AddrInfoEntry::new("10.0.0.5:80".parse().unwrap(), SocketKind::Stream.as_raw());
    let any = AddrInfoEntry::new("10.0.0.6:80".parse().unwrap(), 0);
    host.add_raw_entries("odd.example", vec![odd, good, any]);

    let endpoints = resolve(&host, "tcp", "odd.example:80").unwrap();
    assert_eq!(endpoints, vec![tcp("10.0.0.5:80"), tcp("10.0.0.6:80")]);
}

#[test]
fn test_host_count_beyond_buffer_is_clamped() {
    let host = mixed_host();
    host.overcount_resolve_by(12);

    let endpoints = resolve(&host, "tcp", "mixed.example:80").unwrap();
    assert_eq!(
        endpoints,
        vec![tcp("10.0.0.1:80"), tcp("[2001:db8::1]:80"), tcp("10.0.0.2:80")]
    );
}

#[test]
fn test_numeric_and_service_names() {
    let host = MemoryHost::new();
    assert_eq!(
        resolve(&host, "tcp", "[::1]:https").unwrap(),
        vec![tcp("[::1]:443")]
    );
    assert_eq!(
        resolve(&host, "tcp6", "localhost:8080").unwrap(),
        vec![tcp("[::1]:8080")]
    );
}

#[test]
fn test_dialer_resolve_wraps_errors() {
    let dialer = Dialer::new(MemoryHost::new());
    let err = dialer.resolve("tcp", "nowhere.invalid:80").unwrap_err();
    assert_eq!(err.op(), "lookup");
    assert_eq!(err.address(), "nowhere.invalid:80");
    assert!(matches!(err.cause(), NetError::Socket { op: "getaddrinfo", .. }));
}
