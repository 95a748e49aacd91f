//! Stream listener setup.
//!
//! Produces a bound, listening descriptor. Accepting connections is left to
//! the listener wiring that takes the descriptor over via
//! [`Listener::into_raw_fd`].

use netkit_core::endpoint::{Endpoint, Network, SocketKind};
use netkit_core::error::{NetError, OpError, Result};
use netkit_core::host::{Fd, HostSockets};
use netkit_core::options::ListenOptions;
use netkit_core::sockaddr;
use tracing::{debug, trace};

use crate::resolve::resolve;
use crate::socket::{SocketHandle, SocketState};

/// A listening stream socket.
#[derive(Debug)]
pub struct Listener<H: HostSockets> {
    socket: SocketHandle<H>,
    local: Endpoint,
}

impl<H: HostSockets> Listener<H> {
    /// Address the listener is bound to, as reported by the host.
    pub const fn local_endpoint(&self) -> &Endpoint {
        &self.local
    }

    pub const fn fd(&self) -> Fd {
        self.socket.fd()
    }

    pub const fn is_closed(&self) -> bool {
        self.socket.is_closed()
    }

    /// Stop listening and release the descriptor. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if !self.socket.is_closed() {
            debug!("[LISTEN] closing fd={}", self.socket.fd());
        }
        self.socket.close()
    }

    /// Hand the descriptor to external listener wiring.
    pub fn into_raw_fd(self) -> Fd {
        self.socket.into_raw_fd()
    }
}

/// Listen on `address` for stream `network`s.
///
/// The first resolved endpoint is bound. Address reuse is enabled on a
/// best-effort basis when requested.
///
/// # Errors
///
/// Returns an [`OpError`] for operation `"listen"`. Datagram networks fail
/// with [`NetError::Unsupported`].
pub fn listen<H>(
    host: &H,
    network: &str,
    address: &str,
    options: &ListenOptions,
) -> std::result::Result<Listener<H>, OpError>
where
    H: HostSockets + Clone,
{
    let wrap = |err| OpError::new("listen", network, address, err);

    let net: Network = network.parse().map_err(wrap)?;
    if net.kind() == SocketKind::Datagram {
        return Err(wrap(NetError::unsupported(format!(
            "listen on datagram network {net}"
        ))));
    }

    let endpoint = resolve(host, network, address)
        .map_err(wrap)?
        .into_iter()
        .next()
        .ok_or_else(|| wrap(NetError::no_such_host(address)))?;

    bind_and_listen(host, &endpoint, options).map_err(wrap)
}

fn bind_and_listen<H>(host: &H, endpoint: &Endpoint, options: &ListenOptions) -> Result<Listener<H>>
where
    H: HostSockets + Clone,
{
    let raw = sockaddr::encode(endpoint)?;
    let mut socket = SocketHandle::open(host.clone(), endpoint.family(), endpoint.kind())?;
    let fd = socket.fd();

    if options.reuse_addr {
        match host.sock_set_reuse_addr(fd, true) {
            Ok(()) => {}
            Err(e) if e.is_benign_option_failure() => {
                trace!("[LISTEN] fd={} address reuse not available: {}", fd, e);
            }
            Err(e) => return Err(NetError::socket("setsockopt", e)),
        }
    }

    host.sock_bind(fd, &raw)
        .map_err(|e| NetError::socket("bind", e))?;
    host.sock_listen(fd, options.backlog)
        .map_err(|e| NetError::socket("listen", e))?;
    socket.set_state(SocketState::Listening);

    let local = host
        .sock_addr_local(fd)
        .map_err(|e| NetError::socket("getsockname", e))
        .and_then(|raw| sockaddr::decode(&raw, endpoint.kind()))?;
    debug!("[LISTEN] fd={} listening on {}", fd, local);

    Ok(Listener { socket, local })
}
