//! Address codec for the host socket ABI.
//!
//! The host exchanges socket addresses as a fixed 128-byte buffer:
//!
//! ```text
//! offset 0..2    family tag (u16 LE): 0 = AF_INET, 1 = AF_INET6, 2 = AF_UNIX
//! AF_INET        2..6 address,  6..8 port (u16 LE)
//! AF_INET6       2..18 address, 18..20 port (u16 LE)
//! AF_UNIX        2..128 NUL-terminated path
//! ```
//!
//! Resolution results use [`AddrInfoEntry`], a `#[repr(C)]` record holding the
//! family, an 18-byte address+port buffer and the socket type.
//!
//! Encoding is pure: nothing here talks to the host.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use crate::endpoint::{Address, AddressFamily, Endpoint, SocketKind};
use crate::error::{NetError, Result};

/// Size of the host socket address buffer.
pub const SOCKADDR_SIZE: usize = 128;

/// Offset of the address payload after the family tag.
const PAYLOAD: usize = 2;

/// Capacity of the Unix path area, including the NUL terminator slot.
///
/// Paths must be strictly shorter than this.
pub const UNIX_PATH_CAPACITY: usize = SOCKADDR_SIZE - PAYLOAD - 1;

/// Number of entries in the resolver scratch buffer.
pub const MAX_ADDR_INFO: usize = 8;

/// Raw socket address buffer in host layout.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(C, align(4))]
pub struct RawSockAddr {
    bytes: [u8; SOCKADDR_SIZE],
}

impl RawSockAddr {
    /// An all-zero buffer for the host to fill in.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            bytes: [0; SOCKADDR_SIZE],
        }
    }

    /// Wrap raw bytes received from the host.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; SOCKADDR_SIZE]) -> Self {
        Self { bytes }
    }

    /// Raw family tag.
    #[inline]
    #[must_use]
    pub const fn family_tag(&self) -> u16 {
        u16::from_le_bytes([self.bytes[0], self.bytes[1]])
    }

    /// Port stored in the buffer; 0 for Unix addresses.
    #[must_use]
    pub fn port(&self) -> u16 {
        match AddressFamily::from_raw(self.family_tag()) {
            Some(AddressFamily::Inet4) => read_port(&self.bytes, PAYLOAD + 4),
            Some(AddressFamily::Inet6) => read_port(&self.bytes, PAYLOAD + 16),
            _ => 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SOCKADDR_SIZE] {
        &self.bytes
    }

    #[inline]
    pub fn as_mut_bytes(&mut self) -> &mut [u8; SOCKADDR_SIZE] {
        &mut self.bytes
    }
}

impl Default for RawSockAddr {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl std::fmt::Debug for RawSockAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawSockAddr")
            .field("family", &self.family_tag())
            .field("payload", &&self.bytes[PAYLOAD..PAYLOAD + 18])
            .finish()
    }
}

#[inline]
fn read_port(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

#[inline]
fn write_port(bytes: &mut [u8], at: usize, port: u16) {
    bytes[at..at + 2].copy_from_slice(&port.to_le_bytes());
}

/// Encode an endpoint into a host address buffer.
///
/// # Errors
///
/// - [`NetError::InvalidAddress`] for Unix paths that do not fit the buffer
///   or contain a NUL byte
/// - [`NetError::Unsupported`] for IPv6 addresses with a scope id, which the
///   host layout cannot carry
pub fn encode(endpoint: &Endpoint) -> Result<RawSockAddr> {
    let mut raw = RawSockAddr::zeroed();
    let family = endpoint.family();
    raw.bytes[..PAYLOAD].copy_from_slice(&family.as_raw().to_le_bytes());

    match endpoint.address() {
        Address::Inet(SocketAddr::V4(v4)) => {
            raw.bytes[PAYLOAD..PAYLOAD + 4].copy_from_slice(&v4.ip().octets());
            write_port(&mut raw.bytes, PAYLOAD + 4, v4.port());
        }
        Address::Inet(SocketAddr::V6(v6)) => {
            if v6.scope_id() != 0 {
                return Err(NetError::unsupported(format!(
                    "zoned IPv6 address {v6} (scope id {})",
                    v6.scope_id()
                )));
            }
            raw.bytes[PAYLOAD..PAYLOAD + 16].copy_from_slice(&v6.ip().octets());
            write_port(&mut raw.bytes, PAYLOAD + 16, v6.port());
        }
        Address::Unix(path) => {
            let path = path.as_bytes();
            if path.len() >= UNIX_PATH_CAPACITY {
                return Err(NetError::invalid_address(format!(
                    "unix path of {} bytes exceeds {} byte limit",
                    path.len(),
                    UNIX_PATH_CAPACITY - 1
                )));
            }
            if path.contains(&0) {
                return Err(NetError::invalid_address("unix path contains NUL byte"));
            }
            raw.bytes[PAYLOAD..PAYLOAD + path.len()].copy_from_slice(path);
            // Terminator already present from zeroed().
        }
    }
    Ok(raw)
}

/// Decode a host address buffer into an endpoint of the given kind.
///
/// # Errors
///
/// - [`NetError::Unsupported`] for unknown family tags
/// - [`NetError::InvalidAddress`] for Unix paths that are not valid UTF-8
pub fn decode(raw: &RawSockAddr, kind: SocketKind) -> Result<Endpoint> {
    let bytes = &raw.bytes;
    match AddressFamily::from_raw(raw.family_tag()) {
        Some(AddressFamily::Inet4) => {
            let mut octets = [0u8; 4];
            octets.copy_from_slice(&bytes[PAYLOAD..PAYLOAD + 4]);
            let port = read_port(bytes, PAYLOAD + 4);
            Ok(Endpoint::inet(
                kind,
                SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(octets), port)),
            ))
        }
        Some(AddressFamily::Inet6) => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&bytes[PAYLOAD..PAYLOAD + 16]);
            let port = read_port(bytes, PAYLOAD + 16);
            Ok(Endpoint::inet(
                kind,
                SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::from(octets), port, 0, 0)),
            ))
        }
        Some(AddressFamily::Unix) => {
            let area = &bytes[PAYLOAD..];
            let len = area.iter().position(|&b| b == 0).unwrap_or(area.len());
            let path = std::str::from_utf8(&area[..len])
                .map_err(|_| NetError::invalid_address("unix path is not valid UTF-8"))?;
            Ok(Endpoint::unix(kind, path))
        }
        None => Err(NetError::unsupported(format!(
            "address family {}",
            raw.family_tag()
        ))),
    }
}

/// One resolver result in host layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct AddrInfoEntry {
    /// Address family tag
    pub family: u32,
    /// Address bytes followed by a u16 LE port
    pub addr: [u8; 18],
    /// Socket type (`SOCK_ANY` = 0, `SOCK_DGRAM` = 1, `SOCK_STREAM` = 2)
    pub socktype: u32,
}

impl AddrInfoEntry {
    /// Build an entry, as a host resolver would.
    #[must_use]
    pub fn new(addr: SocketAddr, socktype: u32) -> Self {
        let mut entry = Self {
            socktype,
            ..Self::default()
        };
        match addr {
            SocketAddr::V4(v4) => {
                entry.family = u32::from(AddressFamily::Inet4.as_raw());
                entry.addr[..4].copy_from_slice(&v4.ip().octets());
                write_port(&mut entry.addr, 4, v4.port());
            }
            SocketAddr::V6(v6) => {
                entry.family = u32::from(AddressFamily::Inet6.as_raw());
                entry.addr[..16].copy_from_slice(&v6.ip().octets());
                write_port(&mut entry.addr, 16, v6.port());
            }
        }
        entry
    }

    /// Address family of this entry, if known.
    #[must_use]
    pub fn family(&self) -> Option<AddressFamily> {
        u16::try_from(self.family)
            .ok()
            .and_then(AddressFamily::from_raw)
    }

    /// Decode the IP socket address. Returns `None` for unknown or Unix
    /// families.
    #[must_use]
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self.family()? {
            AddressFamily::Inet4 => {
                let mut octets = [0u8; 4];
                octets.copy_from_slice(&self.addr[..4]);
                Some(SocketAddr::V4(SocketAddrV4::new(
                    Ipv4Addr::from(octets),
                    read_port(&self.addr, 4),
                )))
            }
            AddressFamily::Inet6 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&self.addr[..16]);
                Some(SocketAddr::V6(SocketAddrV6::new(
                    Ipv6Addr::from(octets),
                    read_port(&self.addr, 16),
                    0,
                    0,
                )))
            }
            AddressFamily::Unix => None,
        }
    }
}

/// Resolver hints in host layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct AddrInfoHints {
    pub socktype: u32,
    pub family: u32,
    pub hints_enabled: u8,
}

impl AddrInfoHints {
    /// Hints restricting results to a socket kind and family.
    #[must_use]
    pub fn new(kind: SocketKind, family: AddressFamily) -> Self {
        Self {
            socktype: kind.as_raw(),
            family: u32::from(family.as_raw()),
            hints_enabled: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(endpoint: Endpoint) {
        let raw = encode(&endpoint).unwrap();
        assert_eq!(decode(&raw, endpoint.kind()).unwrap(), endpoint);
    }

    #[test]
    fn test_round_trip_families() {
        round_trip(Endpoint::tcp("93.184.216.34:80".parse().unwrap()));
        round_trip(Endpoint::udp("[2001:db8::1]:5353".parse().unwrap()));
        round_trip(Endpoint::unix(SocketKind::Stream, "/tmp/x.sock"));
    }

    #[test]
    fn test_ipv4_layout() {
        let raw = encode(&Endpoint::tcp("10.1.2.3:8080".parse().unwrap())).unwrap();
        let bytes = raw.as_bytes();
        assert_eq!(&bytes[..2], &[0, 0]);
        assert_eq!(&bytes[2..6], &[10, 1, 2, 3]);
        assert_eq!(&bytes[6..8], &8080u16.to_le_bytes());
        assert_eq!(raw.port(), 8080);
    }

    #[test]
    fn test_unix_path_limit() {
        let fits = "a".repeat(UNIX_PATH_CAPACITY - 1);
        let raw = encode(&Endpoint::unix(SocketKind::Stream, fits.clone())).unwrap();
        assert_eq!(raw.as_bytes()[SOCKADDR_SIZE - 1], 0);
        assert_eq!(decode(&raw, SocketKind::Stream).unwrap().path(), Some(fits.as_str()));

        let too_long = "a".repeat(UNIX_PATH_CAPACITY);
        let result = encode(&Endpoint::unix(SocketKind::Stream, too_long));
        assert!(matches!(result, Err(NetError::InvalidAddress(_))));
    }

    #[test]
    fn test_unix_path_with_nul() {
        let result = encode(&Endpoint::unix(SocketKind::Stream, "/tmp/a\0b"));
        assert!(matches!(result, Err(NetError::InvalidAddress(_))));
    }

    #[test]
    fn test_zoned_ipv6_unsupported() {
        let addr = SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::LOCALHOST, 80, 0, 3));
        let result = encode(&Endpoint::tcp(addr));
        assert!(matches!(result, Err(NetError::Unsupported(_))));
    }

    #[test]
    fn test_decode_unknown_family() {
        let mut raw = RawSockAddr::zeroed();
        raw.as_mut_bytes()[0] = 9;
        assert!(matches!(
            decode(&raw, SocketKind::Stream),
            Err(NetError::Unsupported(_))
        ));
    }

    #[test]
    fn test_addr_info_entry() {
        let addr: SocketAddr = "[::1]:443".parse().unwrap();
        let entry = AddrInfoEntry::new(addr, SocketKind::Stream.as_raw());
        assert_eq!(entry.family(), Some(AddressFamily::Inet6));
        assert_eq!(entry.socket_addr(), Some(addr));

        let unknown = AddrInfoEntry {
            family: 42,
            ..AddrInfoEntry::default()
        };
        assert_eq!(unknown.socket_addr(), None);
    }

    #[test]
    fn test_abi_sizes() {
        assert_eq!(std::mem::size_of::<RawSockAddr>(), SOCKADDR_SIZE);
        assert_eq!(std::mem::size_of::<AddrInfoEntry>(), 28);
        assert_eq!(std::mem::size_of::<AddrInfoHints>(), 12);
    }
}
