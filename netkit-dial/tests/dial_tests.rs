//! Dial and connect engine tests against the in-memory host.

use netkit_core::endpoint::{Endpoint, SocketKind};
use netkit_core::error::NetError;
use netkit_core::host::{Errno, HostError, HostSockets};
use netkit_core::memory::{ConnectBehavior, MemoryHost};
use netkit_core::options::DialOptions;
use netkit_core::timeout::{cancel_pair, DialContext};
use netkit_dial::{connect, dial, Connection, Dialer};
use std::time::{Duration, Instant};

fn tcp(addr: &str) -> Endpoint {
    Endpoint::tcp(addr.parse().unwrap())
}

fn host_with(addr: &str, behavior: ConnectBehavior) -> MemoryHost {
    let host = MemoryHost::new();
    host.route_inet(addr.parse().unwrap(), behavior);
    host
}

#[compio::test]
async fn test_dial_tcp_immediate() {
    let host = host_with("93.184.216.34:80", ConnectBehavior::Immediate);
    let deadline = Instant::now() + Duration::from_secs(5);

    let conn = dial(&host, "tcp", "93.184.216.34:80", Some(deadline))
        .await
        .unwrap();
    assert!(conn.is_stream());
    assert_eq!(conn.remote_endpoint(), &tcp("93.184.216.34:80"));
    assert_eq!(conn.local_endpoint().ip(), Some("127.0.0.1".parse().unwrap()));
    assert_eq!(host.calls("fd_write"), 0);
    assert_eq!(host.calls("fd_set_nonblock"), 1);
    assert!(host.is_open(conn.fd()));
}

#[compio::test]
async fn test_dial_udp_no_completion_wait() {
    let host = MemoryHost::new();
    let conn = dial(&host, "udp", "127.0.0.1:9", None).await.unwrap();

    assert!(conn.is_packet());
    assert_eq!(
        conn.remote_endpoint(),
        &Endpoint::udp("127.0.0.1:9".parse().unwrap())
    );
    assert_eq!(conn.local_endpoint().kind(), SocketKind::Datagram);
    assert_eq!(host.calls("fd_write"), 0);
    assert_eq!(host.calls("wait_writable"), 0);
    assert!(host.broadcast_enabled(conn.fd()));
}

#[compio::test]
async fn test_dial_udp_in_progress_is_not_probed() {
    let host = host_with("127.0.0.1:9", ConnectBehavior::Pending { probes: 2 });
    let conn = dial(&host, "udp", "127.0.0.1:9", None).await.unwrap();

    assert!(conn.is_packet());
    assert_eq!(
        conn.remote_endpoint(),
        &Endpoint::udp("127.0.0.1:9".parse().unwrap())
    );
    assert_eq!(host.calls("sock_connect"), 1);
    assert_eq!(host.calls("fd_write"), 0);
    assert_eq!(host.calls("wait_writable"), 0);
    assert!(host.is_open(conn.fd()));
}

#[compio::test]
async fn test_dial_udp_tolerates_missing_broadcast() {
    let host = MemoryHost::new();
    host.fail_broadcast_with(HostError::Unsupported);
    assert!(dial(&host, "udp", "127.0.0.1:9", None).await.is_ok());

    let host = MemoryHost::new();
    host.fail_broadcast_with(HostError::InvalidArgument);
    assert!(dial(&host, "udp", "127.0.0.1:9", None).await.is_ok());
}

#[compio::test]
async fn test_dial_udp_fatal_broadcast_failure() {
    let host = MemoryHost::new();
    host.fail_broadcast_with(HostError::Code(Errno::IO));
    let err = dial(&host, "udp", "127.0.0.1:9", None).await.unwrap_err();
    assert_eq!(
        err.cause(),
        &NetError::socket("setsockopt", HostError::Code(Errno::IO))
    );
    assert_eq!(host.open_count(), 0);
}

#[compio::test]
async fn test_unixgram_skips_broadcast() {
    let host = MemoryHost::new();
    let conn = dial(&host, "unixgram", "/tmp/log.sock", None).await.unwrap();
    assert!(conn.is_packet());
    assert_eq!(host.calls("sock_set_broadcast"), 0);
    assert_eq!(conn.remote_endpoint().path(), Some("/tmp/log.sock"));
}

#[compio::test]
async fn test_in_progress_connect_completes() {
    let host = host_with("10.0.0.1:80", ConnectBehavior::Pending { probes: 3 });
    let conn = dial(&host, "tcp", "10.0.0.1:80", None).await.unwrap();
    assert_eq!(conn.remote_endpoint(), &tcp("10.0.0.1:80"));
    assert_eq!(host.calls("fd_write"), 4);
}

#[compio::test]
async fn test_spurious_wake_is_confirmed() {
    let host = host_with("10.0.0.1:80", ConnectBehavior::Spurious { probes: 2 });
    let conn = dial(&host, "tcp", "10.0.0.1:80", None).await.unwrap();
    assert!(conn.is_stream());
    assert_eq!(host.calls("fd_write"), 3);
    assert_eq!(host.calls("sock_addr_remote"), 3);
}

#[compio::test]
async fn test_deadline_exceeded_closes_descriptor() {
    let host = host_with("10.0.0.1:80", ConnectBehavior::Never);
    let start = Instant::now();
    let deadline = start + Duration::from_millis(50);

    let err = dial(&host, "tcp", "10.0.0.1:80", Some(deadline))
        .await
        .unwrap_err();
    assert_eq!(err.cause(), &NetError::DeadlineExceeded);
    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "dial tcp 10.0.0.1:80: i/o timeout");
    assert!(start.elapsed() >= Duration::from_millis(50));

    let fd = host.last_fd().unwrap();
    assert!(!host.is_open(fd));
    assert_eq!(host.fd_write(fd, &[]), Err(HostError::Code(Errno::BADF)));
}

#[compio::test]
async fn test_host_completes_before_deadline() {
    let host = host_with("10.0.0.1:80", ConnectBehavior::Never);
    let completer = host.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        if let Some(fd) = completer.last_fd() {
            completer.complete_connect(fd);
        }
    });

    let conn = Dialer::new(host.clone())
        .dial_timeout("tcp", "10.0.0.1:80", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(conn.remote_endpoint(), &tcp("10.0.0.1:80"));
}

#[compio::test]
async fn test_zero_or_past_deadline_means_no_timeout() {
    let host = host_with("10.0.0.1:80", ConnectBehavior::Pending { probes: 5 });
    let past = Instant::now()
        .checked_sub(Duration::from_secs(1))
        .unwrap_or_else(Instant::now);
    assert!(dial(&host, "tcp", "10.0.0.1:80", Some(past)).await.is_ok());

    let dialer = Dialer::new(host);
    assert!(dialer
        .dial_timeout("tcp", "10.0.0.1:80", Duration::ZERO)
        .await
        .is_ok());
}

#[compio::test]
async fn test_cancel_aborts_connect() {
    let host = host_with("10.0.0.1:80", ConnectBehavior::Never);
    let (handle, signal) = cancel_pair();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        handle.cancel();
    });

    let err = Dialer::new(host.clone())
        .dial_with_cancel("tcp", "10.0.0.1:80", signal)
        .await
        .unwrap_err();
    assert_eq!(err.cause(), &NetError::Cancelled);
    assert_eq!(host.open_count(), 0);
}

#[compio::test]
async fn test_cancelled_before_start() {
    let host = host_with("10.0.0.1:80", ConnectBehavior::Immediate);
    let (handle, signal) = cancel_pair();
    drop(handle);

    let err = Dialer::new(host.clone())
        .dial_with_cancel("tcp", "10.0.0.1:80", signal)
        .await
        .unwrap_err();
    assert_eq!(err.cause(), &NetError::Cancelled);
    assert_eq!(host.calls("sock_open"), 0);
}

#[compio::test]
async fn test_first_success_wins() {
    let host = MemoryHost::new();
    host.add_host(
        "multi.example",
        &[
            "10.0.0.1".parse().unwrap(),
            "10.0.0.2".parse().unwrap(),
            "10.0.0.3".parse().unwrap(),
        ],
    );
    host.route_inet("10.0.0.2:80".parse().unwrap(), ConnectBehavior::Immediate);
    host.route_inet("10.0.0.3:80".parse().unwrap(), ConnectBehavior::Immediate);

    let conn = dial(&host, "tcp", "multi.example:80", None).await.unwrap();
    assert_eq!(conn.remote_endpoint(), &tcp("10.0.0.2:80"));

    let opened = host.opened_fds();
    assert_eq!(opened.len(), 2);
    assert!(!host.is_open(opened[0]));
    assert_eq!(host.open_count(), 1);
}

#[compio::test]
async fn test_shared_deadline_stops_candidate_loop() {
    let host = MemoryHost::new();
    host.add_host(
        "slow.example",
        &["10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()],
    );
    host.route_inet("10.0.0.1:80".parse().unwrap(), ConnectBehavior::Never);
    host.route_inet("10.0.0.2:80".parse().unwrap(), ConnectBehavior::Immediate);
    let deadline = Instant::now() + Duration::from_millis(50);

    let err = dial(&host, "tcp", "slow.example:80", Some(deadline))
        .await
        .unwrap_err();
    assert_eq!(err.cause(), &NetError::DeadlineExceeded);
    assert_eq!(err.address(), "10.0.0.1:80");
    assert_eq!(host.calls("sock_open"), 1);
    assert_eq!(host.open_count(), 0);
}

#[compio::test]
async fn test_all_candidates_fail_reports_last() {
    let host = MemoryHost::new();
    host.add_host(
        "down.example",
        &["10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()],
    );

    let err = dial(&host, "tcp", "down.example:80", None).await.unwrap_err();
    assert_eq!(err.op(), "dial");
    assert_eq!(err.network(), "tcp");
    assert_eq!(err.address(), "10.0.0.2:80");
    assert_eq!(
        err.cause(),
        &NetError::socket("connect", HostError::Code(Errno::CONNREFUSED))
    );
    assert_eq!(host.calls("sock_open"), 2);
    assert_eq!(host.open_count(), 0);
}

#[compio::test]
async fn test_resolution_failure_is_wrapped() {
    let host = MemoryHost::new();
    let err = dial(&host, "sctp", "example.com:80", None).await.unwrap_err();
    assert_eq!(err.op(), "dial");
    assert_eq!(err.address(), "example.com:80");
    assert_eq!(err.cause(), &NetError::UnknownNetwork("sctp".to_string()));
    assert_eq!(host.total_calls(), 0);
}

#[compio::test]
async fn test_oversized_unix_path_makes_no_host_call() {
    let host = MemoryHost::new();
    let path = format!("/tmp/{}", "x".repeat(200));
    let err = dial(&host, "unix", &path, None).await.unwrap_err();
    assert!(matches!(err.cause(), NetError::InvalidAddress(_)));
    assert_eq!(host.total_calls(), 0);
}

#[compio::test]
async fn test_open_failure() {
    let host = MemoryHost::new();
    host.fail_open_with(HostError::Code(Errno::NOSYS));
    let err = dial(&host, "tcp", "10.0.0.1:80", None).await.unwrap_err();
    assert_eq!(
        err.cause(),
        &NetError::socket("socket", HostError::Code(Errno::NOSYS))
    );
}

#[compio::test]
async fn test_unsupported_options_are_ignored() {
    let host = host_with("10.0.0.1:80", ConnectBehavior::Immediate);
    let options = DialOptions::new()
        .with_local_addr(tcp("127.0.0.1:0"))
        .with_dual_stack(true)
        .with_fallback_delay(Duration::from_millis(300));
    let dialer = Dialer::with_options(host.clone(), options);

    assert!(dialer.dial("tcp", "10.0.0.1:80").await.is_ok());
    assert_eq!(host.calls("sock_bind"), 0);
}

#[compio::test]
async fn test_connect_single_endpoint() {
    let host = host_with("10.0.0.1:80", ConnectBehavior::Refuse);
    let err = connect(&host, &tcp("10.0.0.1:80"), &DialContext::background())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        NetError::socket("connect", HostError::Code(Errno::CONNREFUSED))
    );
    assert_eq!(host.open_count(), 0);
    assert_eq!(host.calls("fd_close"), 1);
}
