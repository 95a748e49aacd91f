//! Connection adapters.
//!
//! An established descriptor is wrapped into either a [`StreamConn`] (byte
//! stream) or a [`PacketConn`] (datagrams anchored to a resolved remote
//! endpoint). Both implement [`Connection`], the capability set handed to
//! whatever consumes dialed connections; [`Conn`] is the sum of the two that
//! `dial` returns.
//!
//! Reads and writes issue one host call at a time and suspend on the host's
//! readiness notification when the descriptor is not ready.

use async_trait::async_trait;
use netkit_core::endpoint::{Endpoint, SocketKind};
use netkit_core::error::{NetError, Result};
use netkit_core::host::{Errno, Fd, HostError, HostSockets, Shutdown};
use netkit_core::sockaddr::{self, RawSockAddr};
use tracing::{debug, trace};

use crate::socket::SocketHandle;

/// Read/write/close capability set of a dialed connection.
#[async_trait(?Send)]
pub trait Connection {
    /// Read into `buf`. `Ok(0)` means end of stream (or an empty datagram).
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write `buf`, returning the number of bytes the host accepted.
    async fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Close the connection. Closing twice is not an error and makes no
    /// further host calls.
    fn close(&mut self) -> Result<()>;

    fn local_endpoint(&self) -> &Endpoint;

    fn remote_endpoint(&self) -> &Endpoint;
}

/// Statuses after which an I/O call should wait for readiness and retry.
#[inline]
const fn is_retryable(err: HostError) -> bool {
    matches!(err, HostError::WouldBlock | HostError::Code(Errno::INTR))
}

async fn wait_readable<H: HostSockets>(socket: &SocketHandle<H>, op: &'static str) -> Result<()> {
    socket
        .host()
        .wait_readable(socket.fd())
        .await
        .map_err(|e| NetError::socket(op, e))
}

async fn wait_writable<H: HostSockets>(socket: &SocketHandle<H>, op: &'static str) -> Result<()> {
    socket
        .host()
        .wait_writable(socket.fd())
        .await
        .map_err(|e| NetError::socket(op, e))
}

/// Byte-stream connection over an established stream descriptor.
#[derive(Debug)]
pub struct StreamConn<H: HostSockets> {
    socket: SocketHandle<H>,
    local: Endpoint,
    remote: Endpoint,
}

impl<H: HostSockets> StreamConn<H> {
    pub(crate) fn new(socket: SocketHandle<H>, local: Endpoint, remote: Endpoint) -> Self {
        debug!("[CONN] stream fd={} {} -> {}", socket.fd(), local, remote);
        Self {
            socket,
            local,
            remote,
        }
    }

    /// Host descriptor.
    pub const fn fd(&self) -> Fd {
        self.socket.fd()
    }

    pub const fn is_closed(&self) -> bool {
        self.socket.is_closed()
    }

    /// Shut down the write half, leaving reads open.
    pub fn close_write(&mut self) -> Result<()> {
        if self.socket.is_closed() {
            return Err(NetError::Closed);
        }
        self.socket
            .host()
            .sock_shutdown(self.socket.fd(), Shutdown::Write)
            .map_err(|e| NetError::socket("shutdown", e))
    }

    /// Hand the descriptor to the caller without closing it.
    pub fn into_raw_fd(self) -> Fd {
        self.socket.into_raw_fd()
    }
}

#[async_trait(?Send)]
impl<H: HostSockets> Connection for StreamConn<H> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.socket.is_closed() {
            return Err(NetError::Closed);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.socket.host().sock_recv(self.socket.fd(), buf) {
                Ok(n) => return Ok(n),
                Err(e) if is_retryable(e) => wait_readable(&self.socket, "read").await?,
                Err(e) => return Err(NetError::socket("read", e)),
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.socket.is_closed() {
            return Err(NetError::Closed);
        }
        let mut written = 0;
        while written < buf.len() {
            match self.socket.host().sock_send(self.socket.fd(), &buf[written..]) {
                Ok(n) => written += n,
                Err(e) if is_retryable(e) => wait_writable(&self.socket, "write").await?,
                Err(e) => return Err(NetError::socket("write", e)),
            }
        }
        trace!("[CONN] fd={} wrote {} bytes", self.socket.fd(), written);
        Ok(written)
    }

    fn close(&mut self) -> Result<()> {
        if self.socket.is_closed() {
            return Ok(());
        }
        let fd = self.socket.fd();
        match self.socket.host().sock_shutdown(fd, Shutdown::Both) {
            // The peer may already be gone; the descriptor still needs releasing.
            Ok(()) | Err(HostError::Code(Errno::NOTCONN)) => {}
            Err(e) => trace!("[CONN] fd={} shutdown failed: {}", fd, e),
        }
        debug!("[CONN] closing stream fd={}", fd);
        self.socket.close()
    }

    fn local_endpoint(&self) -> &Endpoint {
        &self.local
    }

    fn remote_endpoint(&self) -> &Endpoint {
        &self.remote
    }
}

/// Datagram connection anchored to a resolved remote endpoint.
#[derive(Debug)]
pub struct PacketConn<H: HostSockets> {
    socket: SocketHandle<H>,
    local: Endpoint,
    remote: Endpoint,
    remote_raw: RawSockAddr,
}

impl<H: HostSockets> PacketConn<H> {
    pub(crate) fn new(socket: SocketHandle<H>, local: Endpoint, remote: Endpoint) -> Result<Self> {
        let remote_raw = sockaddr::encode(&remote)?;
        debug!("[CONN] packet fd={} {} -> {}", socket.fd(), local, remote);
        Ok(Self {
            socket,
            local,
            remote,
            remote_raw,
        })
    }

    /// Host descriptor.
    pub const fn fd(&self) -> Fd {
        self.socket.fd()
    }

    pub const fn is_closed(&self) -> bool {
        self.socket.is_closed()
    }

    /// Send a datagram to an explicit destination.
    pub async fn send_to(&mut self, buf: &[u8], target: &Endpoint) -> Result<usize> {
        let raw = sockaddr::encode(target)?;
        self.send_raw(buf, &raw).await
    }

    /// Receive a datagram and its source.
    pub async fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, Endpoint)> {
        if self.socket.is_closed() {
            return Err(NetError::Closed);
        }
        loop {
            match self.socket.host().sock_recv_from(self.socket.fd(), buf) {
                Ok((n, raw)) => {
                    let from = sockaddr::decode(&raw, SocketKind::Datagram)?;
                    return Ok((n, from));
                }
                Err(e) if is_retryable(e) => wait_readable(&self.socket, "recvfrom").await?,
                Err(e) => return Err(NetError::socket("recvfrom", e)),
            }
        }
    }

    async fn send_raw(&mut self, buf: &[u8], raw: &RawSockAddr) -> Result<usize> {
        if self.socket.is_closed() {
            return Err(NetError::Closed);
        }
        loop {
            match self.socket.host().sock_send_to(self.socket.fd(), buf, raw) {
                Ok(n) => return Ok(n),
                Err(e) if is_retryable(e) => wait_writable(&self.socket, "sendto").await?,
                Err(e) => return Err(NetError::socket("sendto", e)),
            }
        }
    }

    /// Hand the descriptor to the caller without closing it.
    pub fn into_raw_fd(self) -> Fd {
        self.socket.into_raw_fd()
    }
}

#[async_trait(?Send)]
impl<H: HostSockets> Connection for PacketConn<H> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.socket.is_closed() {
            return Err(NetError::Closed);
        }
        loop {
            match self.socket.host().sock_recv(self.socket.fd(), buf) {
                Ok(n) => return Ok(n),
                Err(e) if is_retryable(e) => wait_readable(&self.socket, "read").await?,
                Err(e) => return Err(NetError::socket("read", e)),
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let raw = self.remote_raw;
        self.send_raw(buf, &raw).await
    }

    fn close(&mut self) -> Result<()> {
        if self.socket.is_closed() {
            return Ok(());
        }
        debug!("[CONN] closing packet fd={}", self.socket.fd());
        self.socket.close()
    }

    fn local_endpoint(&self) -> &Endpoint {
        &self.local
    }

    fn remote_endpoint(&self) -> &Endpoint {
        &self.remote
    }
}

/// A dialed connection.
#[derive(Debug)]
pub enum Conn<H: HostSockets> {
    Stream(StreamConn<H>),
    Packet(PacketConn<H>),
}

impl<H: HostSockets> Conn<H> {
    pub const fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    pub const fn is_packet(&self) -> bool {
        matches!(self, Self::Packet(_))
    }

    pub const fn fd(&self) -> Fd {
        match self {
            Self::Stream(conn) => conn.fd(),
            Self::Packet(conn) => conn.fd(),
        }
    }

    pub fn into_stream(self) -> Option<StreamConn<H>> {
        match self {
            Self::Stream(conn) => Some(conn),
            Self::Packet(_) => None,
        }
    }

    pub fn into_packet(self) -> Option<PacketConn<H>> {
        match self {
            Self::Packet(conn) => Some(conn),
            Self::Stream(_) => None,
        }
    }
}

#[async_trait(?Send)]
impl<H: HostSockets> Connection for Conn<H> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            Self::Stream(conn) => conn.read(buf).await,
            Self::Packet(conn) => conn.read(buf).await,
        }
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self {
            Self::Stream(conn) => conn.write(buf).await,
            Self::Packet(conn) => conn.write(buf).await,
        }
    }

    fn close(&mut self) -> Result<()> {
        match self {
            Self::Stream(conn) => conn.close(),
            Self::Packet(conn) => conn.close(),
        }
    }

    fn local_endpoint(&self) -> &Endpoint {
        match self {
            Self::Stream(conn) => conn.local_endpoint(),
            Self::Packet(conn) => conn.local_endpoint(),
        }
    }

    fn remote_endpoint(&self) -> &Endpoint {
        match self {
            Self::Stream(conn) => conn.remote_endpoint(),
            Self::Packet(conn) => conn.remote_endpoint(),
        }
    }
}
