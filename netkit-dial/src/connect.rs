//! Connect engine.
//!
//! Drives one candidate endpoint from a fresh descriptor to an established
//! connection:
//!
//! ```text
//! Idle -> SocketOpened -> ConnectIssued -> Established
//!                                      \-> Failed
//! ```
//!
//! A non-blocking stream connect that the host reports as in progress is
//! completed by probing the descriptor with zero-length writes, suspending on
//! the host's writability notification between probes. The probe loop is
//! raced against the dial's deadline and cancellation signal. When either
//! fires first, the probe future is dropped before the descriptor is closed,
//! so nothing touches the descriptor after release.

use futures::future::{self, Either};
use futures::pin_mut;
use netkit_core::endpoint::{Endpoint, SocketKind};
use netkit_core::error::{NetError, Result};
use netkit_core::host::{Errno, Fd, HostError, HostSockets};
use netkit_core::sockaddr;
use netkit_core::timeout::DialContext;
use tracing::{debug, trace, warn};

use crate::conn::{Conn, PacketConn, StreamConn};
use crate::socket::{SocketHandle, SocketState};

/// Connect to a single endpoint.
///
/// The descriptor opened here is handed to the returned connection on
/// success and released on every other path.
///
/// # Errors
///
/// - [`NetError::InvalidAddress`] / [`NetError::Unsupported`] when the
///   endpoint cannot be encoded (no host call is made)
/// - [`NetError::Socket`] when a host primitive fails
/// - [`NetError::DeadlineExceeded`] / [`NetError::Cancelled`] when the
///   context fires before the connect completes
pub async fn connect<H>(host: &H, endpoint: &Endpoint, ctx: &DialContext) -> Result<Conn<H>>
where
    H: HostSockets + Clone,
{
    if let Some(err) = ctx.err() {
        return Err(err);
    }
    let raw = sockaddr::encode(endpoint)?;
    let kind = endpoint.kind();

    let mut socket = SocketHandle::open(host.clone(), endpoint.family(), kind)?;
    let fd = socket.fd();

    host.fd_set_nonblock(fd)
        .map_err(|e| NetError::socket("setnonblock", e))?;

    if kind == SocketKind::Datagram && endpoint.path().is_none() {
        match host.sock_set_broadcast(fd, true) {
            Ok(()) => {}
            Err(e) if e.is_benign_option_failure() => {
                trace!("[CONNECT] fd={} broadcast not available: {}", fd, e);
            }
            Err(e) => return Err(NetError::socket("setsockopt", e)),
        }
    }

    match host.sock_connect(fd, &raw) {
        Ok(()) => {
            trace!("[CONNECT] fd={} connected immediately to {}", fd, endpoint);
        }
        // Datagram sockets are associated with the target even when the host
        // reports in-progress; probing them would send an empty datagram.
        Err(HostError::InProgress) if kind == SocketKind::Datagram => {
            trace!("[CONNECT] fd={} datagram connect to {} in progress", fd, endpoint);
        }
        Err(HostError::InProgress) => {
            socket.set_state(SocketState::Connecting);
            debug!("[CONNECT] fd={} connect to {} in progress", fd, endpoint);
            wait_connected(&mut socket, ctx).await?;
        }
        Err(e) => return Err(NetError::socket("connect", e)),
    }
    socket.set_state(SocketState::Established);

    let local = host
        .sock_addr_local(fd)
        .map_err(|e| NetError::socket("getsockname", e))
        .and_then(|raw| sockaddr::decode(&raw, kind))?;

    match kind {
        SocketKind::Datagram => {
            let remote = host
                .sock_addr_remote(fd)
                .map_err(|e| NetError::socket("getpeername", e))
                .and_then(|raw| sockaddr::decode(&raw, kind))?;
            Ok(Conn::Packet(PacketConn::new(socket, local, remote)?))
        }
        SocketKind::Stream => Ok(Conn::Stream(StreamConn::new(
            socket,
            local,
            endpoint.clone(),
        ))),
    }
}

/// Race the probe loop against the context. On expiry the descriptor is
/// closed after the probe future has been dropped.
async fn wait_connected<H>(socket: &mut SocketHandle<H>, ctx: &DialContext) -> Result<()>
where
    H: HostSockets,
{
    let fd = socket.fd();
    let outcome = {
        let host = socket.host();
        let probe = probe_until_connected(host, fd);
        let expired = ctx.expired(host);
        pin_mut!(probe, expired);
        match future::select(probe, expired).await {
            Either::Left((result, _)) => result,
            Either::Right((err, _)) => Err(err),
        }
    };

    if let Err(err) = &outcome {
        if err.is_cancelled() {
            debug!("[CONNECT] fd={} aborted: {}", fd, err);
            if let Err(e) = socket.close() {
                warn!("[CONNECT] fd={} close after abort failed: {}", fd, e);
            }
        }
    }
    outcome
}

/// Probe a connecting descriptor until the host reports the outcome.
async fn probe_until_connected<H>(host: &H, fd: Fd) -> Result<()>
where
    H: HostSockets + ?Sized,
{
    let mut probes = 0u32;
    loop {
        probes += 1;
        match host.fd_write(fd, &[]) {
            Ok(_) => {
                // Readiness can be reported before the connect has settled.
                if host.sock_addr_remote(fd).is_ok() {
                    trace!("[CONNECT] fd={} established after {} probes", fd, probes);
                    return Ok(());
                }
                trace!("[CONNECT] fd={} spurious wake", fd);
            }
            Err(HostError::Code(Errno::ISCONN)) => {
                return host
                    .sock_addr_remote(fd)
                    .map(|_| ())
                    .map_err(|e| NetError::socket("getpeername", e));
            }
            Err(HostError::WouldBlock | HostError::InProgress | HostError::Code(Errno::INTR)) => {}
            Err(e) => return Err(NetError::socket("connect", e)),
        }
        host.wait_writable(fd)
            .await
            .map_err(|e| NetError::socket("connect", e))?;
    }
}
