//! Owned host descriptors.
//!
//! A [`SocketHandle`] owns exactly one host descriptor. Ownership moves from
//! the connect engine to a connection adapter on success; on any other path
//! the handle is dropped and the descriptor released, so every descriptor is
//! closed exactly once.

use std::fmt;

use netkit_core::endpoint::{AddressFamily, SocketKind};
use netkit_core::error::{NetError, Result};
use netkit_core::host::{Fd, HostSockets};
use tracing::{trace, warn};

/// Lifecycle of a socket descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// Created, not yet connected.
    Open,
    /// Connect issued; the host reported it in progress.
    Connecting,
    /// Connect confirmed, or completed immediately.
    Established,
    /// Bound and listening.
    Listening,
    /// Descriptor released (or handed off).
    Closed,
}

/// A host descriptor with its family, kind and lifecycle state.
pub struct SocketHandle<H: HostSockets> {
    host: H,
    fd: Fd,
    family: AddressFamily,
    kind: SocketKind,
    state: SocketState,
}

impl<H: HostSockets> SocketHandle<H> {
    /// Open a socket on `host`.
    pub fn open(host: H, family: AddressFamily, kind: SocketKind) -> Result<Self> {
        let fd = host
            .sock_open(family, kind)
            .map_err(|e| NetError::socket("socket", e))?;
        trace!("[SOCKET] opened fd={} {:?}/{:?}", fd, family, kind);
        Ok(Self {
            host,
            fd,
            family,
            kind,
            state: SocketState::Open,
        })
    }

    #[inline]
    pub fn host(&self) -> &H {
        &self.host
    }

    #[inline]
    pub const fn fd(&self) -> Fd {
        self.fd
    }

    #[inline]
    pub const fn family(&self) -> AddressFamily {
        self.family
    }

    #[inline]
    pub const fn kind(&self) -> SocketKind {
        self.kind
    }

    #[inline]
    pub const fn state(&self) -> SocketState {
        self.state
    }

    #[inline]
    pub const fn is_closed(&self) -> bool {
        matches!(self.state, SocketState::Closed)
    }

    pub(crate) fn set_state(&mut self, state: SocketState) {
        trace!("[SOCKET] fd={} {:?} -> {:?}", self.fd, self.state, state);
        self.state = state;
    }

    /// Release the descriptor. Calling this again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.state = SocketState::Closed;
        self.host
            .fd_close(self.fd)
            .map_err(|e| NetError::socket("close", e))
    }

    /// Give up ownership of the descriptor without closing it.
    pub fn into_raw_fd(mut self) -> Fd {
        self.state = SocketState::Closed;
        self.fd
    }
}

impl<H: HostSockets> Drop for SocketHandle<H> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("[SOCKET] failed to release fd={}: {}", self.fd, e);
        }
    }
}

impl<H: HostSockets> fmt::Debug for SocketHandle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketHandle")
            .field("fd", &self.fd)
            .field("family", &self.family)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .finish()
    }
}
