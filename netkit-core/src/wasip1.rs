//! WasmEdge socket extension binding.
//!
//! [`WasiHost`] implements [`HostSockets`] on top of the `wasi_snapshot_preview1`
//! socket imports provided by WasmEdge 0.12+, plus the standard preview1
//! descriptor calls (`fd_write`, `fd_close`, `fd_fdstat_set_flags`,
//! `poll_oneoff`).
//!
//! # Safety
//!
//! This module is the only place that calls into the host ABI. Every pointer
//! handed to the host refers to a live local or borrowed buffer whose length is
//! passed alongside it, and the host writes at most that many bytes.

#![allow(unsafe_code)]

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::poll_fn;
use tracing::trace;

use crate::endpoint::{AddressFamily, SocketKind};
use crate::host::{check, Errno, Fd, HostError, HostResult, HostSockets, Shutdown};
use crate::sockaddr::{AddrInfoEntry, AddrInfoHints, RawSockAddr, SOCKADDR_SIZE};

/// `FDFLAGS_NONBLOCK` from preview1.
const FDFLAGS_NONBLOCK: u16 = 4;

/// Longest time a single `poll_oneoff` call may block before yielding back to
/// the executor.
const POLL_SLICE: Duration = Duration::from_millis(10);

const EVENTTYPE_CLOCK: u8 = 0;
const EVENTTYPE_FD_READ: u8 = 1;
const EVENTTYPE_FD_WRITE: u8 = 2;
const CLOCKID_MONOTONIC: u64 = 1;

/// Pointer/length pair the host reads a socket address through.
#[repr(C)]
struct AddressBuffer {
    buf: *mut u8,
    buf_len: u32,
}

impl AddressBuffer {
    fn new(addr: &mut RawSockAddr) -> Self {
        Self {
            buf: addr.as_mut_bytes().as_mut_ptr(),
            buf_len: SOCKADDR_SIZE as u32,
        }
    }
}

#[repr(C)]
struct Iovec {
    buf: *const u8,
    buf_len: u32,
}

#[repr(C)]
struct IovecMut {
    buf: *mut u8,
    buf_len: u32,
}

/// preview1 `subscription` (48 bytes). The union payload is laid out as four
/// little-endian u64 words.
#[repr(C)]
struct Subscription {
    userdata: u64,
    tag: u8,
    _pad: [u8; 7],
    u: [u64; 4],
}

impl Subscription {
    fn fd(tag: u8, fd: Fd) -> Self {
        Self {
            userdata: u64::from(tag),
            tag,
            _pad: [0; 7],
            u: [u64::from(fd), 0, 0, 0],
        }
    }

    fn clock(timeout: Duration) -> Self {
        let nanos = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        Self {
            userdata: u64::from(EVENTTYPE_CLOCK),
            tag: EVENTTYPE_CLOCK,
            _pad: [0; 7],
            u: [CLOCKID_MONOTONIC, nanos, 0, 0],
        }
    }
}

/// preview1 `event` (32 bytes).
#[repr(C)]
#[derive(Default)]
struct Event {
    userdata: u64,
    error: u16,
    kind: u8,
    _pad: [u8; 5],
    nbytes: u64,
    flags: u16,
    _pad2: [u8; 6],
}

#[link(wasm_import_module = "wasi_snapshot_preview1")]
extern "C" {
    fn sock_open(poolfd: i32, af: i32, socktype: i32, fd: *mut u32) -> i32;
    fn sock_bind(fd: i32, addr: *const AddressBuffer) -> i32;
    fn sock_listen(fd: i32, backlog: i32) -> i32;
    fn sock_connect(fd: i32, addr: *const AddressBuffer) -> i32;
    fn sock_send(fd: i32, iovs: *const Iovec, iovs_len: i32, flags: i32, nwritten: *mut u32)
        -> i32;
    fn sock_recv(
        fd: i32,
        iovs: *const IovecMut,
        iovs_len: i32,
        flags: i32,
        nread: *mut u32,
        oflags: *mut u16,
    ) -> i32;
    fn sock_send_to(
        fd: i32,
        iovs: *const Iovec,
        iovs_len: i32,
        addr: *const AddressBuffer,
        port: i32,
        flags: i32,
        nwritten: *mut u32,
    ) -> i32;
    fn sock_recv_from(
        fd: i32,
        iovs: *const IovecMut,
        iovs_len: i32,
        flags: i32,
        addr: *const AddressBuffer,
        nread: *mut u32,
    ) -> i32;
    fn sock_addr_resolve(
        node: *const u8,
        service: *const u8,
        hints: *const AddrInfoHints,
        res: *mut AddrInfoEntry,
        max_res_len: u32,
        res_len: *mut u32,
    ) -> i32;
    fn sock_addr_local(fd: i32, addr: *const AddressBuffer) -> i32;
    fn sock_addr_remote(fd: i32, addr: *const AddressBuffer) -> i32;
    fn sock_shutdown(fd: i32, how: i32) -> i32;
    fn sock_set_reuse_addr(fd: i32, enabled: i32) -> i32;
    fn sock_set_broadcast(fd: i32, enabled: i32) -> i32;
    fn fd_fdstat_set_flags(fd: i32, flags: i32) -> i32;
    fn fd_write(fd: i32, iovs: *const Iovec, iovs_len: i32, nwritten: *mut u32) -> i32;
    fn fd_close(fd: i32) -> i32;
    fn poll_oneoff(
        subs: *const Subscription,
        events: *mut Event,
        nsubscriptions: u32,
        nevents: *mut u32,
    ) -> i32;
}

#[inline]
fn status(raw: i32) -> HostResult<()> {
    check(raw as u16)
}

/// NUL-terminated copy of a string for the host. Input is cut at the first
/// embedded NUL.
fn c_string(s: &str) -> Vec<u8> {
    let mut bytes: Vec<u8> = s.bytes().take_while(|&b| b != 0).collect();
    bytes.push(0);
    bytes
}

/// The WasmEdge host.
#[derive(Debug, Clone, Copy, Default)]
pub struct WasiHost;

impl WasiHost {
    /// Create a handle to the host.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn addr_call(
        fd: Fd,
        call: unsafe extern "C" fn(i32, *const AddressBuffer) -> i32,
    ) -> HostResult<RawSockAddr> {
        let mut addr = RawSockAddr::zeroed();
        let buf = AddressBuffer::new(&mut addr);
        // SAFETY: `buf` points at `addr`, which outlives the call.
        status(unsafe { call(fd as i32, &buf) })?;
        Ok(addr)
    }

    /// Block for at most one slice waiting on `fd`; `Ready` once the host
    /// reports the descriptor event.
    fn poll_fd(tag: u8, fd: Fd, cx: &mut Context<'_>) -> Poll<HostResult<()>> {
        let subs = [Subscription::fd(tag, fd), Subscription::clock(POLL_SLICE)];
        let mut events: [Event; 2] = Default::default();
        let mut n = 0u32;
        // SAFETY: both arrays live across the call and their lengths match
        // `nsubscriptions`.
        let rc = unsafe { poll_oneoff(subs.as_ptr(), events.as_mut_ptr(), 2, &mut n) };
        if let Err(err) = status(rc) {
            return Poll::Ready(Err(err));
        }
        for event in events.iter().take(n as usize) {
            if event.kind == tag {
                return Poll::Ready(status(i32::from(event.error)));
            }
        }
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

#[async_trait(?Send)]
impl HostSockets for WasiHost {
    fn sock_open(&self, family: AddressFamily, kind: SocketKind) -> HostResult<Fd> {
        let mut fd = 0u32;
        // SAFETY: `fd` is a valid out pointer.
        status(unsafe {
            sock_open(0, i32::from(family.as_raw()), kind.as_raw() as i32, &mut fd)
        })?;
        Ok(fd)
    }

    fn sock_bind(&self, fd: Fd, addr: &RawSockAddr) -> HostResult<()> {
        let mut addr = *addr;
        let buf = AddressBuffer::new(&mut addr);
        // SAFETY: `buf` points at a local copy of the address.
        status(unsafe { sock_bind(fd as i32, &buf) })
    }

    fn sock_listen(&self, fd: Fd, backlog: u32) -> HostResult<()> {
        let backlog = i32::try_from(backlog).unwrap_or(i32::MAX);
        // SAFETY: scalar arguments only.
        status(unsafe { sock_listen(fd as i32, backlog) })
    }

    fn sock_connect(&self, fd: Fd, addr: &RawSockAddr) -> HostResult<()> {
        let mut addr = *addr;
        let buf = AddressBuffer::new(&mut addr);
        // SAFETY: `buf` points at a local copy of the address.
        status(unsafe { sock_connect(fd as i32, &buf) })
    }

    fn sock_send(&self, fd: Fd, buf: &[u8]) -> HostResult<usize> {
        let iov = Iovec {
            buf: buf.as_ptr(),
            buf_len: buf.len() as u32,
        };
        let mut n = 0u32;
        // SAFETY: `iov` borrows `buf` for the duration of the call.
        status(unsafe { sock_send(fd as i32, &iov, 1, 0, &mut n) })?;
        Ok(n as usize)
    }

    fn sock_recv(&self, fd: Fd, buf: &mut [u8]) -> HostResult<usize> {
        let iov = IovecMut {
            buf: buf.as_mut_ptr(),
            buf_len: buf.len() as u32,
        };
        let mut n = 0u32;
        let mut oflags = 0u16;
        // SAFETY: the host writes at most `buf_len` bytes into `buf`.
        status(unsafe { sock_recv(fd as i32, &iov, 1, 0, &mut n, &mut oflags) })?;
        Ok(n as usize)
    }

    fn sock_send_to(&self, fd: Fd, buf: &[u8], addr: &RawSockAddr) -> HostResult<usize> {
        let iov = Iovec {
            buf: buf.as_ptr(),
            buf_len: buf.len() as u32,
        };
        let port = i32::from(addr.port());
        let mut addr = *addr;
        let abuf = AddressBuffer::new(&mut addr);
        let mut n = 0u32;
        // SAFETY: `iov` and `abuf` borrow live buffers for the call.
        status(unsafe { sock_send_to(fd as i32, &iov, 1, &abuf, port, 0, &mut n) })?;
        Ok(n as usize)
    }

    fn sock_recv_from(&self, fd: Fd, buf: &mut [u8]) -> HostResult<(usize, RawSockAddr)> {
        let iov = IovecMut {
            buf: buf.as_mut_ptr(),
            buf_len: buf.len() as u32,
        };
        let mut addr = RawSockAddr::zeroed();
        let abuf = AddressBuffer::new(&mut addr);
        let mut n = 0u32;
        // SAFETY: the host writes at most `buf_len` bytes into each buffer.
        status(unsafe { sock_recv_from(fd as i32, &iov, 1, 0, &abuf, &mut n) })?;
        Ok((n as usize, addr))
    }

    fn sock_addr_resolve(
        &self,
        node: &str,
        service: &str,
        hints: &AddrInfoHints,
        results: &mut [AddrInfoEntry],
    ) -> HostResult<usize> {
        let node = c_string(node);
        let service = c_string(service);
        let mut n = 0u32;
        // SAFETY: strings are NUL-terminated, and the host writes at most
        // `results.len()` entries.
        status(unsafe {
            sock_addr_resolve(
                node.as_ptr(),
                service.as_ptr(),
                hints,
                results.as_mut_ptr(),
                results.len() as u32,
                &mut n,
            )
        })?;
        Ok((n as usize).min(results.len()))
    }

    fn sock_addr_local(&self, fd: Fd) -> HostResult<RawSockAddr> {
        Self::addr_call(fd, sock_addr_local)
    }

    fn sock_addr_remote(&self, fd: Fd) -> HostResult<RawSockAddr> {
        Self::addr_call(fd, sock_addr_remote)
    }

    fn sock_shutdown(&self, fd: Fd, how: Shutdown) -> HostResult<()> {
        // SAFETY: scalar arguments only.
        status(unsafe { sock_shutdown(fd as i32, i32::from(how.as_raw())) })
    }

    fn sock_set_reuse_addr(&self, fd: Fd, enabled: bool) -> HostResult<()> {
        // SAFETY: scalar arguments only.
        status(unsafe { sock_set_reuse_addr(fd as i32, i32::from(enabled)) })
    }

    fn sock_set_broadcast(&self, fd: Fd, enabled: bool) -> HostResult<()> {
        // SAFETY: scalar arguments only.
        status(unsafe { sock_set_broadcast(fd as i32, i32::from(enabled)) })
    }

    fn fd_set_nonblock(&self, fd: Fd) -> HostResult<()> {
        // SAFETY: scalar arguments only.
        status(unsafe { fd_fdstat_set_flags(fd as i32, i32::from(FDFLAGS_NONBLOCK)) })
    }

    fn fd_write(&self, fd: Fd, buf: &[u8]) -> HostResult<usize> {
        let iov = Iovec {
            buf: buf.as_ptr(),
            buf_len: buf.len() as u32,
        };
        let mut n = 0u32;
        // SAFETY: `iov` borrows `buf` for the duration of the call.
        status(unsafe { fd_write(fd as i32, &iov, 1, &mut n) })?;
        if buf.is_empty() && n != 0 {
            // A zero-length write on a connecting socket carries the pending
            // connect status in the written count.
            trace!("[WASI] fd={} probe status {}", fd, n);
            return Err(HostError::from_errno(Errno(n as u16)));
        }
        Ok(n as usize)
    }

    fn fd_close(&self, fd: Fd) -> HostResult<()> {
        // SAFETY: scalar arguments only.
        status(unsafe { fd_close(fd as i32) })
    }

    async fn wait_writable(&self, fd: Fd) -> HostResult<()> {
        poll_fn(|cx| Self::poll_fd(EVENTTYPE_FD_WRITE, fd, cx)).await
    }

    async fn wait_readable(&self, fd: Fd) -> HostResult<()> {
        poll_fn(|cx| Self::poll_fd(EVENTTYPE_FD_READ, fd, cx)).await
    }

    async fn sleep_until(&self, deadline: Instant) {
        Sleep { deadline }.await;
    }
}

/// Timer future that blocks at most one slice per poll.
struct Sleep {
    deadline: Instant,
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Poll::Ready(());
        }
        let slice = remaining.min(POLL_SLICE);
        let subs = [Subscription::clock(slice)];
        let mut events: [Event; 1] = Default::default();
        let mut n = 0u32;
        // SAFETY: one subscription in, room for one event out.
        let rc = unsafe { poll_oneoff(subs.as_ptr(), events.as_mut_ptr(), 1, &mut n) };
        let this = self.get_mut();
        if let Err(err) = status(rc) {
            // Nothing blocked; count the slice against the deadline instead.
            trace!("[WASI] clock subscription rejected: {}", err);
            this.deadline = charge_slice(this.deadline, slice);
        }
        if Instant::now() >= this.deadline {
            Poll::Ready(())
        } else {
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// Pull `deadline` in by one slice that the host did not actually wait.
fn charge_slice(deadline: Instant, slice: Duration) -> Instant {
    deadline.checked_sub(slice).unwrap_or_else(Instant::now)
}
