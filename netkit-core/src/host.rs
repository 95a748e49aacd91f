//! Host socket primitives.
//!
//! [`HostSockets`] is the narrow seam between netkit and the runtime that
//! actually owns the sockets. Every method maps to exactly one host call; no
//! method retries. Everything above this module depends only on the trait, so
//! the same resolver and connect engine run against the WasmEdge ABI
//! ([`crate::wasip1`]) and against the in-memory fake ([`crate::memory`]).

use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;

use crate::endpoint::{AddressFamily, SocketKind};
use crate::sockaddr::{AddrInfoEntry, AddrInfoHints, RawSockAddr};

/// Host descriptor number.
pub type Fd = u32;

/// WASI preview1 errno value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(pub u16);

impl Errno {
    pub const SUCCESS: Self = Self(0);
    pub const ADDRINUSE: Self = Self(3);
    pub const ADDRNOTAVAIL: Self = Self(4);
    pub const AFNOSUPPORT: Self = Self(5);
    pub const AGAIN: Self = Self(6);
    pub const ALREADY: Self = Self(7);
    pub const BADF: Self = Self(8);
    pub const CANCELED: Self = Self(11);
    pub const CONNABORTED: Self = Self(13);
    pub const CONNREFUSED: Self = Self(14);
    pub const CONNRESET: Self = Self(15);
    pub const HOSTUNREACH: Self = Self(23);
    pub const INPROGRESS: Self = Self(26);
    pub const INTR: Self = Self(27);
    pub const INVAL: Self = Self(28);
    pub const IO: Self = Self(29);
    pub const ISCONN: Self = Self(30);
    pub const NETUNREACH: Self = Self(40);
    pub const NOENT: Self = Self(44);
    pub const NOPROTOOPT: Self = Self(50);
    pub const NOSYS: Self = Self(52);
    pub const NOTCONN: Self = Self(53);
    pub const NOTSOCK: Self = Self(57);
    pub const NOTSUP: Self = Self(58);
    pub const PIPE: Self = Self(64);
    pub const TIMEDOUT: Self = Self(73);

    /// Human readable name, matching the usual strerror wording.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self.0 {
            0 => "success",
            3 => "address already in use",
            4 => "cannot assign requested address",
            5 => "address family not supported",
            6 => "resource temporarily unavailable",
            7 => "connection already in progress",
            8 => "bad file descriptor",
            11 => "operation canceled",
            13 => "connection aborted",
            14 => "connection refused",
            15 => "connection reset by peer",
            23 => "no route to host",
            26 => "operation in progress",
            27 => "interrupted system call",
            28 => "invalid argument",
            29 => "input/output error",
            30 => "socket is already connected",
            40 => "network is unreachable",
            44 => "no such file or directory",
            50 => "protocol not available",
            52 => "function not implemented",
            53 => "socket is not connected",
            57 => "not a socket",
            58 => "operation not supported",
            64 => "broken pipe",
            73 => "connection timed out",
            _ => "unknown error",
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl fmt::Debug for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Errno({}: {})", self.0, self.description())
    }
}

/// Typed status of a failed host call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostError {
    /// Non-blocking operation not ready (`EAGAIN`)
    #[error("operation would block")]
    WouldBlock,

    /// Non-blocking connect started (`EINPROGRESS`)
    #[error("operation in progress")]
    InProgress,

    /// Feature not available on this host (`ENOTSUP`, `ENOPROTOOPT`)
    #[error("operation not supported by host")]
    Unsupported,

    /// Host rejected an argument (`EINVAL`)
    #[error("invalid argument")]
    InvalidArgument,

    /// Any other host status
    #[error("host error: {0}")]
    Code(Errno),
}

/// Result of a single host call.
pub type HostResult<T> = Result<T, HostError>;

impl HostError {
    /// Classify a raw errno.
    #[must_use]
    pub const fn from_errno(errno: Errno) -> Self {
        match errno {
            Errno::AGAIN => Self::WouldBlock,
            Errno::INPROGRESS => Self::InProgress,
            Errno::NOTSUP | Errno::NOPROTOOPT => Self::Unsupported,
            Errno::INVAL => Self::InvalidArgument,
            other => Self::Code(other),
        }
    }

    /// Raw errno of this status.
    #[must_use]
    pub const fn errno(&self) -> Errno {
        match self {
            Self::WouldBlock => Errno::AGAIN,
            Self::InProgress => Errno::INPROGRESS,
            Self::Unsupported => Errno::NOTSUP,
            Self::InvalidArgument => Errno::INVAL,
            Self::Code(errno) => *errno,
        }
    }

    /// Failures that leave a socket usable when an optional socket option
    /// could not be applied.
    #[must_use]
    pub const fn is_benign_option_failure(&self) -> bool {
        matches!(self, Self::Unsupported | Self::InvalidArgument)
    }
}

/// Convert a raw status returned by the host into a [`HostResult`].
#[inline]
pub const fn check(errno: u16) -> HostResult<()> {
    if errno == 0 {
        Ok(())
    } else {
        Err(HostError::from_errno(Errno(errno)))
    }
}

/// Which halves of a connection `sock_shutdown` closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Read,
    Write,
    Both,
}

impl Shutdown {
    /// WASI `sdflags` bits.
    #[must_use]
    pub const fn as_raw(self) -> u8 {
        match self {
            Self::Read => 1,
            Self::Write => 2,
            Self::Both => 3,
        }
    }
}

/// Socket primitives provided by the host runtime.
///
/// Implementations translate one host status into one typed result per call.
/// Descriptors handed out by `sock_open` are owned by the caller until
/// `fd_close`.
///
/// The readiness and timer methods are the only suspension points: they
/// complete when the host signals the descriptor (or clock) and must not
/// spin the calling thread.
#[async_trait(?Send)]
pub trait HostSockets {
    /// Create a socket.
    fn sock_open(&self, family: AddressFamily, kind: SocketKind) -> HostResult<Fd>;

    /// Bind a socket to a local address.
    fn sock_bind(&self, fd: Fd, addr: &RawSockAddr) -> HostResult<()>;

    /// Mark a bound stream socket as listening.
    fn sock_listen(&self, fd: Fd, backlog: u32) -> HostResult<()>;

    /// Connect a socket. Non-blocking stream sockets report
    /// [`HostError::InProgress`].
    fn sock_connect(&self, fd: Fd, addr: &RawSockAddr) -> HostResult<()>;

    /// Send on a connected socket.
    fn sock_send(&self, fd: Fd, buf: &[u8]) -> HostResult<usize>;

    /// Receive on a connected socket. `Ok(0)` is end of stream.
    fn sock_recv(&self, fd: Fd, buf: &mut [u8]) -> HostResult<usize>;

    /// Send a datagram to an explicit address.
    fn sock_send_to(&self, fd: Fd, buf: &[u8], addr: &RawSockAddr) -> HostResult<usize>;

    /// Receive a datagram along with its source address.
    fn sock_recv_from(&self, fd: Fd, buf: &mut [u8]) -> HostResult<(usize, RawSockAddr)>;

    /// Resolve `node`/`service` into `results`, returning the number of
    /// entries written.
    fn sock_addr_resolve(
        &self,
        node: &str,
        service: &str,
        hints: &AddrInfoHints,
        results: &mut [AddrInfoEntry],
    ) -> HostResult<usize>;

    /// Local address of a socket.
    fn sock_addr_local(&self, fd: Fd) -> HostResult<RawSockAddr>;

    /// Peer address of a connected socket.
    fn sock_addr_remote(&self, fd: Fd) -> HostResult<RawSockAddr>;

    /// Shut down one or both halves of a connection.
    fn sock_shutdown(&self, fd: Fd, how: Shutdown) -> HostResult<()>;

    /// Toggle `SO_REUSEADDR`.
    fn sock_set_reuse_addr(&self, fd: Fd, enabled: bool) -> HostResult<()>;

    /// Toggle `SO_BROADCAST`.
    fn sock_set_broadcast(&self, fd: Fd, enabled: bool) -> HostResult<()>;

    /// Put a descriptor in non-blocking mode.
    fn fd_set_nonblock(&self, fd: Fd) -> HostResult<()>;

    /// Write to a descriptor. A zero-length write on a connecting socket
    /// reports the pending connect status.
    fn fd_write(&self, fd: Fd, buf: &[u8]) -> HostResult<usize>;

    /// Release a descriptor.
    fn fd_close(&self, fd: Fd) -> HostResult<()>;

    /// Wait until the host reports the descriptor writable.
    async fn wait_writable(&self, fd: Fd) -> HostResult<()>;

    /// Wait until the host reports the descriptor readable.
    async fn wait_readable(&self, fd: Fd) -> HostResult<()>;

    /// Wait until `deadline` on the host clock.
    async fn sleep_until(&self, deadline: Instant);
}
