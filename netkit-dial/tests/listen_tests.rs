//! Listener setup tests against the in-memory host.

use netkit_core::endpoint::{Endpoint, SocketKind};
use netkit_core::error::NetError;
use netkit_core::host::{Errno, HostError};
use netkit_core::memory::MemoryHost;
use netkit_core::options::ListenOptions;
use netkit_dial::listen;

#[test]
fn test_listen_tcp() {
    let host = MemoryHost::new();
    let listener = listen(&host, "tcp", "127.0.0.1:8080", &ListenOptions::default()).unwrap();

    assert!(host.is_listening(listener.fd()));
    assert!(host.reuse_addr_enabled(listener.fd()));
    assert_eq!(
        listener.local_endpoint(),
        &Endpoint::tcp("127.0.0.1:8080".parse().unwrap())
    );
}

#[test]
fn test_listen_ephemeral_port() {
    let host = MemoryHost::new();
    let listener = listen(&host, "tcp4", "127.0.0.1:0", &ListenOptions::default()).unwrap();
    assert_ne!(listener.local_endpoint().port(), 0);
}

#[test]
fn test_listen_without_reuse() {
    let host = MemoryHost::new();
    let options = ListenOptions::new().with_reuse_addr(false).with_backlog(8);
    let listener = listen(&host, "tcp", "127.0.0.1:8081", &options).unwrap();
    assert!(!host.reuse_addr_enabled(listener.fd()));
    assert_eq!(host.calls("sock_set_reuse_addr"), 0);
}

#[test]
fn test_listen_tolerates_missing_reuse() {
    let host = MemoryHost::new();
    host.fail_reuse_addr_with(HostError::Unsupported);
    assert!(listen(&host, "tcp", "127.0.0.1:8082", &ListenOptions::default()).is_ok());
}

#[test]
fn test_listen_unix() {
    let host = MemoryHost::new();
    let listener = listen(&host, "unix", "/tmp/app.sock", &ListenOptions::default()).unwrap();
    assert_eq!(
        listener.local_endpoint(),
        &Endpoint::unix(SocketKind::Stream, "/tmp/app.sock")
    );
    assert_eq!(host.calls("sock_addr_resolve"), 0);
}

#[test]
fn test_listen_rejects_datagram() {
    let host = MemoryHost::new();
    let err = listen(&host, "udp", "127.0.0.1:53", &ListenOptions::default()).unwrap_err();
    assert_eq!(err.op(), "listen");
    assert!(matches!(err.cause(), NetError::Unsupported(_)));
    assert_eq!(host.total_calls(), 0);
}

#[test]
fn test_listen_address_in_use() {
    let host = MemoryHost::new();
    let options = ListenOptions::new().with_reuse_addr(false);
    let _first = listen(&host, "tcp", "127.0.0.1:9000", &options).unwrap();
    let err = listen(&host, "tcp", "127.0.0.1:9000", &options).unwrap_err();
    assert_eq!(
        err.cause(),
        &NetError::socket("bind", HostError::Code(Errno::ADDRINUSE))
    );
    assert_eq!(host.open_count(), 1);
}

#[test]
fn test_close_and_hand_off() {
    let host = MemoryHost::new();
    let mut listener = listen(&host, "tcp", "127.0.0.1:9001", &ListenOptions::default()).unwrap();
    let fd = listener.fd();
    listener.close().unwrap();
    listener.close().unwrap();
    assert!(listener.is_closed());
    assert!(!host.is_open(fd));
    assert_eq!(host.calls("fd_close"), 1);

    let listener = listen(&host, "tcp", "127.0.0.1:9002", &ListenOptions::default()).unwrap();
    let fd = listener.into_raw_fd();
    assert!(host.is_listening(fd));
}
