//! In-memory host for tests and local development.
//!
//! [`MemoryHost`] implements [`HostSockets`] without touching the network. It
//! keeps a descriptor table, a small name table for `sock_addr_resolve`, and a
//! per-target script deciding how connects behave. Every primitive call is
//! counted so tests can assert that a code path made (or avoided) host calls.
//!
//! # Usage
//!
//! ```rust
//! use netkit_core::memory::{ConnectBehavior, MemoryHost};
//!
//! let host = MemoryHost::new();
//! host.add_host("example.com", &["93.184.216.34".parse().unwrap()]);
//! host.route_inet("93.184.216.34:80".parse().unwrap(), ConnectBehavior::Immediate);
//! assert_eq!(host.calls("sock_open"), 0);
//! ```
//!
//! Readiness is signalled through per-descriptor flume channels and the clock
//! is a thread-backed timer, so the fake works under any executor.

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::trace;

use crate::endpoint::{Address, AddressFamily, Endpoint, SocketKind};
use crate::host::{Errno, Fd, HostError, HostResult, HostSockets, Shutdown};
use crate::sockaddr::{self, AddrInfoEntry, AddrInfoHints, RawSockAddr};

/// First descriptor number handed out (0-2 are stdio).
const FIRST_FD: Fd = 3;

/// Base of the ephemeral port range assigned to unbound sockets.
const EPHEMERAL_PORT_BASE: u16 = 40000;

/// How a stream connect to a given target completes.
///
/// Datagram connects always associate at once; any non-immediate behavior
/// other than `Refuse` makes a non-blocking one report in-progress anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// `sock_connect` succeeds straight away.
    Immediate,
    /// `sock_connect` reports in-progress; the connect completes after the
    /// given number of zero-length write probes.
    Pending { probes: u32 },
    /// Like `Pending`, but the probes before completion report a zero status
    /// while the socket is not yet connected (a spurious wake).
    Spurious { probes: u32 },
    /// `sock_connect` reports in-progress and never completes on its own.
    Never,
    /// `sock_connect` fails with `ECONNREFUSED`.
    Refuse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    Bound,
    Listening,
    Connecting {
        probes_left: u32,
        spurious: bool,
        never: bool,
    },
    Connected,
}

#[derive(Debug)]
struct MemSocket {
    family: AddressFamily,
    kind: SocketKind,
    nonblocking: bool,
    broadcast: bool,
    reuse_addr: bool,
    phase: Phase,
    local: Option<Endpoint>,
    remote: Option<Endpoint>,
    inbound: VecDeque<(Bytes, Option<Endpoint>)>,
    peer_closed: bool,
    read_shut: bool,
    write_shut: bool,
    ready_tx: flume::Sender<()>,
    ready_rx: flume::Receiver<()>,
}

impl MemSocket {
    fn new(family: AddressFamily, kind: SocketKind) -> Self {
        let (ready_tx, ready_rx) = flume::unbounded();
        Self {
            family,
            kind,
            nonblocking: false,
            broadcast: false,
            reuse_addr: false,
            phase: Phase::Open,
            local: None,
            remote: None,
            inbound: VecDeque::new(),
            peer_closed: false,
            read_shut: false,
            write_shut: false,
            ready_tx,
            ready_rx,
        }
    }

    fn notify(&self) {
        let _ = self.ready_tx.send(());
    }

    fn readable(&self) -> bool {
        !self.inbound.is_empty() || self.peer_closed || self.read_shut
    }
}

#[derive(Debug, Default)]
struct State {
    next_fd: Fd,
    sockets: HashMap<Fd, MemSocket>,
    opened: Vec<Fd>,
    names: HashMap<String, Vec<IpAddr>>,
    raw_names: HashMap<String, Vec<AddrInfoEntry>>,
    routes: HashMap<Address, ConnectBehavior>,
    sent: HashMap<Fd, Vec<(Bytes, Option<Endpoint>)>>,
    calls: HashMap<&'static str, usize>,
    open_error: Option<HostError>,
    broadcast_error: Option<HostError>,
    reuse_addr_error: Option<HostError>,
    resolve_overcount: usize,
}

impl State {
    fn count(&mut self, primitive: &'static str) {
        *self.calls.entry(primitive).or_insert(0) += 1;
    }

    fn socket(&mut self, fd: Fd) -> HostResult<&mut MemSocket> {
        self.sockets
            .get_mut(&fd)
            .ok_or(HostError::Code(Errno::BADF))
    }

    fn ephemeral(fd: Fd, family: AddressFamily, kind: SocketKind) -> Endpoint {
        let port = EPHEMERAL_PORT_BASE.wrapping_add(fd as u16);
        match family {
            AddressFamily::Inet4 => {
                Endpoint::inet(kind, SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port))
            }
            AddressFamily::Inet6 => {
                Endpoint::inet(kind, SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), port))
            }
            AddressFamily::Unix => Endpoint::unix(kind, ""),
        }
    }
}

/// Scripted in-memory implementation of [`HostSockets`].
///
/// Cloning is cheap; clones share the same descriptor table.
#[derive(Debug, Clone)]
pub struct MemoryHost {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Create a host with `localhost` pre-registered.
    #[must_use]
    pub fn new() -> Self {
        let mut state = State {
            next_fd: FIRST_FD,
            ..State::default()
        };
        state.names.insert(
            "localhost".to_string(),
            vec![
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ],
        );
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Register a host name. Each address is returned twice by the resolver,
    /// once as a stream entry and once as a datagram entry, in the given
    /// order.
    pub fn add_host(&self, name: &str, addrs: &[IpAddr]) {
        self.state
            .lock()
            .names
            .insert(name.to_string(), addrs.to_vec());
    }

    /// Register verbatim resolver entries for a host name.
    pub fn add_raw_entries(&self, name: &str, entries: Vec<AddrInfoEntry>) {
        self.state
            .lock()
            .raw_names
            .insert(name.to_string(), entries);
    }

    /// Script how stream connects to `addr` behave. Unrouted stream targets
    /// refuse the connection.
    pub fn route_inet(&self, addr: SocketAddr, behavior: ConnectBehavior) {
        self.state
            .lock()
            .routes
            .insert(Address::Inet(addr), behavior);
    }

    /// Script how stream connects to a Unix path behave.
    pub fn route_unix(&self, path: &str, behavior: ConnectBehavior) {
        self.state
            .lock()
            .routes
            .insert(Address::Unix(path.to_string()), behavior);
    }

    /// Make every subsequent `sock_open` fail.
    pub fn fail_open_with(&self, err: HostError) {
        self.state.lock().open_error = Some(err);
    }

    /// Report `extra` more resolver results than were written, like a host
    /// that ignores the caller's buffer length.
    pub fn overcount_resolve_by(&self, extra: usize) {
        self.state.lock().resolve_overcount = extra;
    }

    /// Make `sock_set_broadcast` fail.
    pub fn fail_broadcast_with(&self, err: HostError) {
        self.state.lock().broadcast_error = Some(err);
    }

    /// Make `sock_set_reuse_addr` fail.
    pub fn fail_reuse_addr_with(&self, err: HostError) {
        self.state.lock().reuse_addr_error = Some(err);
    }

    /// Complete a connect that is still in progress.
    pub fn complete_connect(&self, fd: Fd) {
        let mut state = self.state.lock();
        if let Some(socket) = state.sockets.get_mut(&fd) {
            if matches!(socket.phase, Phase::Connecting { .. }) {
                socket.phase = Phase::Connected;
                socket.notify();
            }
        }
    }

    /// Queue inbound data on a descriptor and wake readers.
    pub fn push_inbound(&self, fd: Fd, data: impl Into<Bytes>) {
        self.push_inbound_from(fd, data, None);
    }

    /// Queue an inbound datagram with an explicit source.
    pub fn push_inbound_from(&self, fd: Fd, data: impl Into<Bytes>, from: Option<Endpoint>) {
        let mut state = self.state.lock();
        if let Some(socket) = state.sockets.get_mut(&fd) {
            socket.inbound.push_back((data.into(), from));
            socket.notify();
        }
    }

    /// Simulate the peer closing its side.
    pub fn close_peer(&self, fd: Fd) {
        let mut state = self.state.lock();
        if let Some(socket) = state.sockets.get_mut(&fd) {
            socket.peer_closed = true;
            socket.notify();
        }
    }

    /// Number of calls made to a primitive, by its host name
    /// (e.g. `"sock_connect"`).
    #[must_use]
    pub fn calls(&self, primitive: &str) -> usize {
        self.state.lock().calls.get(primitive).copied().unwrap_or(0)
    }

    /// Total number of primitive calls.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.values().sum()
    }

    /// Every descriptor handed out so far, in order.
    #[must_use]
    pub fn opened_fds(&self) -> Vec<Fd> {
        self.state.lock().opened.clone()
    }

    /// Most recently opened descriptor.
    #[must_use]
    pub fn last_fd(&self) -> Option<Fd> {
        self.state.lock().opened.last().copied()
    }

    /// Whether a descriptor is still open.
    #[must_use]
    pub fn is_open(&self, fd: Fd) -> bool {
        self.state.lock().sockets.contains_key(&fd)
    }

    /// Number of descriptors currently open.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.state.lock().sockets.len()
    }

    /// Whether `SO_BROADCAST` was enabled on a descriptor.
    #[must_use]
    pub fn broadcast_enabled(&self, fd: Fd) -> bool {
        self.state
            .lock()
            .sockets
            .get(&fd)
            .is_some_and(|s| s.broadcast)
    }

    /// Whether `SO_REUSEADDR` was enabled on a descriptor.
    #[must_use]
    pub fn reuse_addr_enabled(&self, fd: Fd) -> bool {
        self.state
            .lock()
            .sockets
            .get(&fd)
            .is_some_and(|s| s.reuse_addr)
    }

    /// Whether a descriptor is listening.
    #[must_use]
    pub fn is_listening(&self, fd: Fd) -> bool {
        self.state
            .lock()
            .sockets
            .get(&fd)
            .is_some_and(|s| s.phase == Phase::Listening)
    }

    /// Data written on a descriptor, with the explicit destination for
    /// `sock_send_to`. Kept after the descriptor is closed.
    #[must_use]
    pub fn sent(&self, fd: Fd) -> Vec<(Bytes, Option<Endpoint>)> {
        self.state.lock().sent.get(&fd).cloned().unwrap_or_default()
    }

    fn receive(
        &self,
        primitive: &'static str,
        fd: Fd,
        buf: &mut [u8],
    ) -> HostResult<(usize, RawSockAddr)> {
        let mut state = self.state.lock();
        state.count(primitive);
        let socket = state.socket(fd)?;
        if socket.phase != Phase::Connected && socket.phase != Phase::Bound {
            return Err(HostError::Code(Errno::NOTCONN));
        }
        if socket.read_shut {
            return Ok((0, RawSockAddr::zeroed()));
        }
        let Some((data, from)) = socket.inbound.pop_front() else {
            if socket.peer_closed {
                return Ok((0, RawSockAddr::zeroed()));
            }
            return Err(HostError::WouldBlock);
        };
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        if socket.kind == SocketKind::Stream && n < data.len() {
            socket.inbound.push_front((data.slice(n..), from.clone()));
        }
        let source = from.or_else(|| socket.remote.clone());
        let raw = match source {
            Some(endpoint) => sockaddr::encode(&endpoint).map_err(|_| HostError::InvalidArgument)?,
            None => RawSockAddr::zeroed(),
        };
        Ok((n, raw))
    }

    fn service_port(service: &str) -> HostResult<u16> {
        if let Ok(port) = service.parse::<u16>() {
            return Ok(port);
        }
        match service {
            "http" => Ok(80),
            "https" => Ok(443),
            "domain" => Ok(53),
            _ => Err(HostError::Code(Errno::NOENT)),
        }
    }
}

#[async_trait(?Send)]
impl HostSockets for MemoryHost {
    fn sock_open(&self, family: AddressFamily, kind: SocketKind) -> HostResult<Fd> {
        let mut state = self.state.lock();
        state.count("sock_open");
        if let Some(err) = state.open_error {
            return Err(err);
        }
        let fd = state.next_fd;
        state.next_fd += 1;
        state.sockets.insert(fd, MemSocket::new(family, kind));
        state.opened.push(fd);
        trace!("[MEMHOST] open fd={} {:?}/{:?}", fd, family, kind);
        Ok(fd)
    }

    fn sock_bind(&self, fd: Fd, addr: &RawSockAddr) -> HostResult<()> {
        let mut state = self.state.lock();
        state.count("sock_bind");
        let kind = state.socket(fd)?.kind;
        let mut local = sockaddr::decode(addr, kind).map_err(|_| HostError::InvalidArgument)?;
        if let Some(inet) = local.socket_addr().filter(|a| a.port() == 0) {
            let port = EPHEMERAL_PORT_BASE.wrapping_add(fd as u16);
            local = Endpoint::inet(kind, SocketAddr::new(inet.ip(), port));
        }
        let in_use = state
            .sockets
            .iter()
            .any(|(other, s)| *other != fd && s.local.as_ref() == Some(&local) && !s.reuse_addr);
        if in_use {
            return Err(HostError::Code(Errno::ADDRINUSE));
        }
        let socket = state.socket(fd)?;
        if socket.phase != Phase::Open {
            return Err(HostError::InvalidArgument);
        }
        socket.local = Some(local);
        socket.phase = Phase::Bound;
        Ok(())
    }

    fn sock_listen(&self, fd: Fd, _backlog: u32) -> HostResult<()> {
        let mut state = self.state.lock();
        state.count("sock_listen");
        let socket = state.socket(fd)?;
        if socket.kind != SocketKind::Stream {
            return Err(HostError::Unsupported);
        }
        if socket.phase != Phase::Bound {
            return Err(HostError::InvalidArgument);
        }
        socket.phase = Phase::Listening;
        Ok(())
    }

    fn sock_connect(&self, fd: Fd, addr: &RawSockAddr) -> HostResult<()> {
        let mut state = self.state.lock();
        state.count("sock_connect");
        let (kind, family) = {
            let socket = state.socket(fd)?;
            (socket.kind, socket.family)
        };
        let target = sockaddr::decode(addr, kind).map_err(|_| HostError::InvalidArgument)?;
        if target.family() != family {
            return Err(HostError::Code(Errno::AFNOSUPPORT));
        }
        let behavior = state
            .routes
            .get(target.address())
            .copied()
            .unwrap_or(ConnectBehavior::Refuse);
        let socket = state.socket(fd)?;
        match socket.phase {
            Phase::Connected => return Err(HostError::Code(Errno::ISCONN)),
            Phase::Connecting { .. } => return Err(HostError::Code(Errno::ALREADY)),
            Phase::Listening => return Err(HostError::InvalidArgument),
            Phase::Open | Phase::Bound => {}
        }
        if socket.local.is_none() {
            socket.local = Some(State::ephemeral(fd, family, kind));
        }
        socket.remote = Some(target);

        // Datagram sockets are "connected" by address association. A routed
        // non-immediate behavior still reports in-progress, as some hosts do.
        if kind == SocketKind::Datagram {
            socket.phase = Phase::Connected;
            return match (behavior, socket.nonblocking) {
                (ConnectBehavior::Pending { .. } | ConnectBehavior::Spurious { .. }, true)
                | (ConnectBehavior::Never, true) => Err(HostError::InProgress),
                _ => Ok(()),
            };
        }
        trace!("[MEMHOST] connect fd={} behavior={:?}", fd, behavior);
        let connecting = |probes_left, spurious, never| Phase::Connecting {
            probes_left,
            spurious,
            never,
        };
        match (behavior, socket.nonblocking) {
            (ConnectBehavior::Refuse, _) => {
                socket.remote = None;
                Err(HostError::Code(Errno::CONNREFUSED))
            }
            (ConnectBehavior::Immediate, _) | (ConnectBehavior::Pending { .. }, false) => {
                socket.phase = Phase::Connected;
                Ok(())
            }
            (ConnectBehavior::Spurious { .. } | ConnectBehavior::Never, false) => {
                socket.remote = None;
                Err(HostError::Code(Errno::TIMEDOUT))
            }
            (ConnectBehavior::Pending { probes }, true) => {
                socket.phase = connecting(probes, false, false);
                Err(HostError::InProgress)
            }
            (ConnectBehavior::Spurious { probes }, true) => {
                socket.phase = connecting(probes, true, false);
                Err(HostError::InProgress)
            }
            (ConnectBehavior::Never, true) => {
                socket.phase = connecting(0, false, true);
                Err(HostError::InProgress)
            }
        }
    }

    fn sock_send(&self, fd: Fd, buf: &[u8]) -> HostResult<usize> {
        let mut state = self.state.lock();
        state.count("sock_send");
        let socket = state.socket(fd)?;
        if socket.phase != Phase::Connected {
            return Err(HostError::Code(Errno::NOTCONN));
        }
        if socket.write_shut || socket.peer_closed {
            return Err(HostError::Code(Errno::PIPE));
        }
        state
            .sent
            .entry(fd)
            .or_default()
            .push((Bytes::copy_from_slice(buf), None));
        Ok(buf.len())
    }

    fn sock_recv(&self, fd: Fd, buf: &mut [u8]) -> HostResult<usize> {
        self.receive("sock_recv", fd, buf).map(|(n, _)| n)
    }

    fn sock_send_to(&self, fd: Fd, buf: &[u8], addr: &RawSockAddr) -> HostResult<usize> {
        let mut state = self.state.lock();
        state.count("sock_send_to");
        let socket = state.socket(fd)?;
        if socket.kind != SocketKind::Datagram {
            return Err(HostError::Code(Errno::ISCONN));
        }
        let target = sockaddr::decode(addr, SocketKind::Datagram)
            .map_err(|_| HostError::InvalidArgument)?;
        state
            .sent
            .entry(fd)
            .or_default()
            .push((Bytes::copy_from_slice(buf), Some(target)));
        Ok(buf.len())
    }

    fn sock_recv_from(&self, fd: Fd, buf: &mut [u8]) -> HostResult<(usize, RawSockAddr)> {
        self.receive("sock_recv_from", fd, buf)
    }

    fn sock_addr_resolve(
        &self,
        node: &str,
        service: &str,
        _hints: &AddrInfoHints,
        results: &mut [AddrInfoEntry],
    ) -> HostResult<usize> {
        let mut state = self.state.lock();
        state.count("sock_addr_resolve");
        let port = Self::service_port(service)?;

        if let Some(raw) = state.raw_names.get(node) {
            let n = raw.len().min(results.len());
            results[..n].copy_from_slice(&raw[..n]);
            return Ok(n + state.resolve_overcount);
        }

        let addrs = if node.is_empty() {
            vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]
        } else if let Ok(ip) = node.parse::<IpAddr>() {
            vec![ip]
        } else {
            state
                .names
                .get(node)
                .cloned()
                .ok_or(HostError::Code(Errno::NOENT))?
        };

        let entries = addrs.iter().flat_map(|ip| {
            let addr = SocketAddr::new(*ip, port);
            [
                AddrInfoEntry::new(addr, SocketKind::Stream.as_raw()),
                AddrInfoEntry::new(addr, SocketKind::Datagram.as_raw()),
            ]
        });
        let mut n = 0;
        for (slot, entry) in results.iter_mut().zip(entries) {
            *slot = entry;
            n += 1;
        }
        Ok(n + state.resolve_overcount)
    }

    fn sock_addr_local(&self, fd: Fd) -> HostResult<RawSockAddr> {
        let mut state = self.state.lock();
        state.count("sock_addr_local");
        let socket = state.socket(fd)?;
        let local = match &socket.local {
            Some(local) => local.clone(),
            None => match socket.family {
                AddressFamily::Inet4 => Endpoint::inet(
                    socket.kind,
                    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
                ),
                AddressFamily::Inet6 => Endpoint::inet(
                    socket.kind,
                    SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
                ),
                AddressFamily::Unix => Endpoint::unix(socket.kind, ""),
            },
        };
        sockaddr::encode(&local).map_err(|_| HostError::InvalidArgument)
    }

    fn sock_addr_remote(&self, fd: Fd) -> HostResult<RawSockAddr> {
        let mut state = self.state.lock();
        state.count("sock_addr_remote");
        let socket = state.socket(fd)?;
        match (&socket.phase, &socket.remote) {
            (Phase::Connected, Some(remote)) => {
                sockaddr::encode(remote).map_err(|_| HostError::InvalidArgument)
            }
            _ => Err(HostError::Code(Errno::NOTCONN)),
        }
    }

    fn sock_shutdown(&self, fd: Fd, how: Shutdown) -> HostResult<()> {
        let mut state = self.state.lock();
        state.count("sock_shutdown");
        let socket = state.socket(fd)?;
        if socket.phase != Phase::Connected {
            return Err(HostError::Code(Errno::NOTCONN));
        }
        match how {
            Shutdown::Read => socket.read_shut = true,
            Shutdown::Write => socket.write_shut = true,
            Shutdown::Both => {
                socket.read_shut = true;
                socket.write_shut = true;
            }
        }
        socket.notify();
        Ok(())
    }

    fn sock_set_reuse_addr(&self, fd: Fd, enabled: bool) -> HostResult<()> {
        let mut state = self.state.lock();
        state.count("sock_set_reuse_addr");
        let err = state.reuse_addr_error;
        let socket = state.socket(fd)?;
        if let Some(err) = err {
            return Err(err);
        }
        socket.reuse_addr = enabled;
        Ok(())
    }

    fn sock_set_broadcast(&self, fd: Fd, enabled: bool) -> HostResult<()> {
        let mut state = self.state.lock();
        state.count("sock_set_broadcast");
        let err = state.broadcast_error;
        let socket = state.socket(fd)?;
        if let Some(err) = err {
            return Err(err);
        }
        socket.broadcast = enabled;
        Ok(())
    }

    fn fd_set_nonblock(&self, fd: Fd) -> HostResult<()> {
        let mut state = self.state.lock();
        state.count("fd_set_nonblock");
        state.socket(fd)?.nonblocking = true;
        Ok(())
    }

    fn fd_write(&self, fd: Fd, buf: &[u8]) -> HostResult<usize> {
        let mut state = self.state.lock();
        state.count("fd_write");
        let socket = state.socket(fd)?;
        let phase = socket.phase;
        match phase {
            Phase::Connecting { never: true, .. } => Err(HostError::InProgress),
            Phase::Connecting { .. } if !buf.is_empty() => Err(HostError::WouldBlock),
            Phase::Connecting {
                probes_left: 0, ..
            } => {
                socket.phase = Phase::Connected;
                Ok(0)
            }
            Phase::Connecting {
                probes_left,
                spurious,
                never,
            } => {
                socket.phase = Phase::Connecting {
                    probes_left: probes_left - 1,
                    spurious,
                    never,
                };
                if spurious {
                    Ok(0)
                } else {
                    Err(HostError::InProgress)
                }
            }
            Phase::Connected if buf.is_empty() => Ok(0),
            Phase::Connected => {
                if socket.write_shut {
                    return Err(HostError::Code(Errno::PIPE));
                }
                state
                    .sent
                    .entry(fd)
                    .or_default()
                    .push((Bytes::copy_from_slice(buf), None));
                Ok(buf.len())
            }
            Phase::Open | Phase::Bound | Phase::Listening => Err(HostError::Code(Errno::NOTCONN)),
        }
    }

    fn fd_close(&self, fd: Fd) -> HostResult<()> {
        let mut state = self.state.lock();
        state.count("fd_close");
        // Dropping the socket drops its readiness sender, waking waiters.
        state
            .sockets
            .remove(&fd)
            .map(|_| ())
            .ok_or(HostError::Code(Errno::BADF))
    }

    async fn wait_writable(&self, fd: Fd) -> HostResult<()> {
        let ready = {
            let mut state = self.state.lock();
            state.count("wait_writable");
            let socket = state.socket(fd)?;
            match socket.phase {
                Phase::Connecting { never: true, .. } => socket.ready_rx.clone(),
                _ => return Ok(()),
            }
        };
        ready
            .recv_async()
            .await
            .map_err(|_| HostError::Code(Errno::BADF))
    }

    async fn wait_readable(&self, fd: Fd) -> HostResult<()> {
        let ready = {
            let mut state = self.state.lock();
            state.count("wait_readable");
            let socket = state.socket(fd)?;
            if socket.readable() {
                return Ok(());
            }
            socket.ready_rx.clone()
        };
        ready
            .recv_async()
            .await
            .map_err(|_| HostError::Code(Errno::BADF))
    }

    async fn sleep_until(&self, deadline: Instant) {
        let now = Instant::now();
        if deadline <= now {
            return;
        }
        let (tx, rx) = flume::bounded::<()>(1);
        let wait = deadline - now;
        std::thread::spawn(move || {
            std::thread::sleep(wait);
            let _ = tx.send(());
        });
        let _ = rx.recv_async().await;
    }
}
