//! Endpoint abstraction for family-tagged socket addressing.
//!
//! An [`Endpoint`] is what the resolver produces and what the connect engine
//! consumes: a socket kind (stream or datagram) plus either an IP socket
//! address or a Unix socket path.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::error::NetError;

/// Address family as understood by the host socket ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum AddressFamily {
    /// IPv4 (`AF_INET`)
    Inet4 = 0,
    /// IPv6 (`AF_INET6`)
    Inet6 = 1,
    /// Unix domain socket (`AF_UNIX`)
    Unix = 2,
}

impl AddressFamily {
    /// Raw family tag used on the host boundary.
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> u16 {
        self as u16
    }

    /// Parse a raw family tag.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::Inet4),
            1 => Some(Self::Inet6),
            2 => Some(Self::Unix),
            _ => None,
        }
    }
}

/// Socket kind as understood by the host socket ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SocketKind {
    /// Datagram socket (`SOCK_DGRAM`)
    Datagram = 1,
    /// Stream socket (`SOCK_STREAM`)
    Stream = 2,
}

impl SocketKind {
    /// Raw socket type used on the host boundary.
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    /// Parse a raw socket type. `SOCK_ANY` (0) has no kind.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::Datagram),
            2 => Some(Self::Stream),
            _ => None,
        }
    }
}

/// Network names accepted by `dial`, `resolve` and `listen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Tcp,
    Tcp4,
    Tcp6,
    Udp,
    Udp4,
    Udp6,
    Unix,
    Unixgram,
}

impl Network {
    /// Get the network as its canonical string name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Tcp4 => "tcp4",
            Self::Tcp6 => "tcp6",
            Self::Udp => "udp",
            Self::Udp4 => "udp4",
            Self::Udp6 => "udp6",
            Self::Unix => "unix",
            Self::Unixgram => "unixgram",
        }
    }

    /// Socket kind used for this network.
    #[must_use]
    pub const fn kind(&self) -> SocketKind {
        match self {
            Self::Tcp | Self::Tcp4 | Self::Tcp6 | Self::Unix => SocketKind::Stream,
            Self::Udp | Self::Udp4 | Self::Udp6 | Self::Unixgram => SocketKind::Datagram,
        }
    }

    /// Family filter applied to resolved candidates.
    ///
    /// `None` accepts both IP families.
    #[must_use]
    pub const fn family_filter(&self) -> Option<AddressFamily> {
        match self {
            Self::Tcp4 | Self::Udp4 => Some(AddressFamily::Inet4),
            Self::Tcp6 | Self::Udp6 => Some(AddressFamily::Inet6),
            Self::Unix | Self::Unixgram => Some(AddressFamily::Unix),
            Self::Tcp | Self::Udp => None,
        }
    }

    /// Family passed in the host resolver hints.
    ///
    /// The host ABI has no "unspecified" family, so the dual-family networks
    /// hint IPv4 and rely on client-side filtering.
    #[must_use]
    pub const fn hint_family(&self) -> AddressFamily {
        match self.family_filter() {
            Some(family) => family,
            None => AddressFamily::Inet4,
        }
    }

    /// Returns true for `unix` and `unixgram`.
    #[must_use]
    pub const fn is_unix(&self) -> bool {
        matches!(self, Self::Unix | Self::Unixgram)
    }
}

impl FromStr for Network {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Self::Tcp),
            "tcp4" => Ok(Self::Tcp4),
            "tcp6" => Ok(Self::Tcp6),
            "udp" => Ok(Self::Udp),
            "udp4" => Ok(Self::Udp4),
            "udp6" => Ok(Self::Udp6),
            "unix" => Ok(Self::Unix),
            "unixgram" => Ok(Self::Unixgram),
            other => Err(NetError::UnknownNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The address part of an [`Endpoint`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// IPv4 or IPv6 socket address
    Inet(SocketAddr),
    /// Unix socket path
    Unix(String),
}

/// Resolved, family-tagged network address ready for socket operations.
///
/// Endpoints are immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    kind: SocketKind,
    address: Address,
}

impl Endpoint {
    /// Create an IP endpoint.
    #[must_use]
    pub const fn inet(kind: SocketKind, addr: SocketAddr) -> Self {
        Self {
            kind,
            address: Address::Inet(addr),
        }
    }

    /// Create a Unix socket endpoint.
    pub fn unix(kind: SocketKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            address: Address::Unix(path.into()),
        }
    }

    /// Create a stream (TCP) endpoint.
    #[must_use]
    pub const fn tcp(addr: SocketAddr) -> Self {
        Self::inet(SocketKind::Stream, addr)
    }

    /// Create a datagram (UDP) endpoint.
    #[must_use]
    pub const fn udp(addr: SocketAddr) -> Self {
        Self::inet(SocketKind::Datagram, addr)
    }

    /// Socket kind of this endpoint.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> SocketKind {
        self.kind
    }

    /// Address of this endpoint.
    #[inline]
    #[must_use]
    pub const fn address(&self) -> &Address {
        &self.address
    }

    /// Address family of this endpoint.
    #[must_use]
    pub const fn family(&self) -> AddressFamily {
        match &self.address {
            Address::Inet(SocketAddr::V4(_)) => AddressFamily::Inet4,
            Address::Inet(SocketAddr::V6(_)) => AddressFamily::Inet6,
            Address::Unix(_) => AddressFamily::Unix,
        }
    }

    /// IP socket address, if this is not a Unix endpoint.
    #[must_use]
    pub const fn socket_addr(&self) -> Option<SocketAddr> {
        match &self.address {
            Address::Inet(addr) => Some(*addr),
            Address::Unix(_) => None,
        }
    }

    /// IP address, if this is not a Unix endpoint.
    #[must_use]
    pub fn ip(&self) -> Option<IpAddr> {
        self.socket_addr().map(|addr| addr.ip())
    }

    /// Port number; always 0 for Unix endpoints.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.socket_addr().map_or(0, |addr| addr.port())
    }

    /// Unix socket path, if this is a Unix endpoint.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match &self.address {
            Address::Unix(path) => Some(path),
            Address::Inet(_) => None,
        }
    }

    /// Network name of this endpoint (`tcp`, `udp`, `unix`, `unixgram`).
    #[must_use]
    pub const fn network(&self) -> &'static str {
        match (self.kind, &self.address) {
            (SocketKind::Stream, Address::Inet(_)) => "tcp",
            (SocketKind::Datagram, Address::Inet(_)) => "udp",
            (SocketKind::Stream, Address::Unix(_)) => "unix",
            (SocketKind::Datagram, Address::Unix(_)) => "unixgram",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.address {
            Address::Inet(addr) => write!(f, "{addr}"),
            Address::Unix(path) => f.write_str(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_networks() {
        assert_eq!("tcp".parse::<Network>().unwrap(), Network::Tcp);
        assert_eq!("udp6".parse::<Network>().unwrap(), Network::Udp6);
        assert_eq!("unixgram".parse::<Network>().unwrap(), Network::Unixgram);
        assert_eq!(Network::Tcp4.to_string(), "tcp4");
    }

    #[test]
    fn test_unknown_network() {
        let result = "sctp".parse::<Network>();
        assert!(matches!(result, Err(NetError::UnknownNetwork(ref n)) if n == "sctp"));
    }

    #[test]
    fn test_network_classification() {
        assert_eq!(Network::Tcp6.kind(), SocketKind::Stream);
        assert_eq!(Network::Unixgram.kind(), SocketKind::Datagram);
        assert_eq!(Network::Tcp.family_filter(), None);
        assert_eq!(Network::Tcp.hint_family(), AddressFamily::Inet4);
        assert_eq!(Network::Udp6.hint_family(), AddressFamily::Inet6);
        assert!(Network::Unix.is_unix());
    }

    #[test]
    fn test_endpoint_display() {
        let v4 = Endpoint::tcp("93.184.216.34:80".parse().unwrap());
        assert_eq!(v4.to_string(), "93.184.216.34:80");
        assert_eq!(v4.network(), "tcp");
        assert_eq!(v4.family(), AddressFamily::Inet4);

        let v6 = Endpoint::udp("[::1]:53".parse().unwrap());
        assert_eq!(v6.to_string(), "[::1]:53");
        assert_eq!(v6.network(), "udp");

        let unix = Endpoint::unix(SocketKind::Datagram, "/tmp/x.sock");
        assert_eq!(unix.to_string(), "/tmp/x.sock");
        assert_eq!(unix.network(), "unixgram");
        assert_eq!(unix.port(), 0);
    }

    #[test]
    fn test_raw_tags() {
        assert_eq!(AddressFamily::from_raw(1), Some(AddressFamily::Inet6));
        assert_eq!(AddressFamily::from_raw(7), None);
        assert_eq!(SocketKind::from_raw(0), None);
        assert_eq!(SocketKind::Stream.as_raw(), 2);
    }
}
