//! Address resolution.
//!
//! Turns a `(network, address)` pair into an ordered list of candidate
//! endpoints. IP networks go through the host resolver; Unix networks are
//! answered locally from the literal path.

use netkit_core::endpoint::{AddressFamily, Endpoint, Network};
use netkit_core::error::{NetError, Result};
use netkit_core::host::HostSockets;
use netkit_core::sockaddr::{AddrInfoEntry, AddrInfoHints, MAX_ADDR_INFO};
use tracing::{debug, trace};

/// `SOCK_ANY` socket type in resolver entries.
const SOCKTYPE_ANY: u32 = 0;

/// Split `host:port` or `[host]:port`.
///
/// # Errors
///
/// Fails with [`NetError::InvalidAddress`] when the port is missing or empty,
/// brackets are unbalanced, an unbracketed host contains a colon, or the input
/// contains a NUL byte.
pub fn split_host_port(address: &str) -> Result<(&str, &str)> {
    if address.contains('\0') {
        return Err(NetError::invalid_address(format!(
            "{address:?}: embedded NUL"
        )));
    }

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let Some((host, after)) = rest.split_once(']') else {
            return Err(NetError::invalid_address(format!("{address}: missing ']'")));
        };
        let Some(port) = after.strip_prefix(':') else {
            return Err(NetError::invalid_address(format!(
                "{address}: missing port in address"
            )));
        };
        (host, port)
    } else {
        let Some((host, port)) = address.rsplit_once(':') else {
            return Err(NetError::invalid_address(format!(
                "{address}: missing port in address"
            )));
        };
        if host.contains(':') {
            return Err(NetError::invalid_address(format!(
                "{address}: too many colons in address"
            )));
        }
        (host, port)
    };

    if port.is_empty() {
        return Err(NetError::invalid_address(format!(
            "{address}: missing port in address"
        )));
    }
    if port.contains(|c: char| matches!(c, '[' | ']' | ':')) {
        return Err(NetError::invalid_address(format!(
            "{address}: unexpected character in port"
        )));
    }
    Ok((host, port))
}

/// Resolve `address` on `network` into candidate endpoints, in the order the
/// host returned them.
///
/// # Errors
///
/// - [`NetError::UnknownNetwork`] for unrecognized networks, before any host
///   call
/// - [`NetError::InvalidAddress`] for malformed addresses
/// - [`NetError::Socket`] when the host resolver fails
/// - [`NetError::NoSuchHost`] when no entry matches the network
pub fn resolve<H>(host: &H, network: &str, address: &str) -> Result<Vec<Endpoint>>
where
    H: HostSockets + ?Sized,
{
    let net: Network = network.parse()?;
    let kind = net.kind();

    if net.is_unix() {
        if address.contains('\0') {
            return Err(NetError::invalid_address(format!(
                "{address:?}: embedded NUL"
            )));
        }
        trace!("[RESOLVE] {} {} is a literal path", network, address);
        return Ok(vec![Endpoint::unix(kind, address)]);
    }

    let (name, service) = split_host_port(address)?;
    let hints = AddrInfoHints::new(kind, net.hint_family());
    let mut scratch = [AddrInfoEntry::default(); MAX_ADDR_INFO];
    let n = host
        .sock_addr_resolve(name, service, &hints, &mut scratch)
        .map_err(|e| NetError::socket("getaddrinfo", e))?;

    let n = n.min(scratch.len());
    let filter = net.family_filter();
    let mut endpoints = Vec::with_capacity(n);
    for entry in &scratch[..n] {
        if entry.socktype != kind.as_raw() && entry.socktype != SOCKTYPE_ANY {
            continue;
        }
        let Some(family) = entry.family() else {
            trace!("[RESOLVE] skipping entry with family tag {}", entry.family);
            continue;
        };
        if family == AddressFamily::Unix || filter.is_some_and(|f| f != family) {
            continue;
        }
        if let Some(addr) = entry.socket_addr() {
            endpoints.push(Endpoint::inet(kind, addr));
        }
    }

    debug!(
        "[RESOLVE] {} {}: {} of {} entries usable",
        network,
        address,
        endpoints.len(),
        n
    );

    if endpoints.is_empty() {
        return Err(NetError::no_such_host(name));
    }
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("example.com:80").unwrap(), ("example.com", "80"));
        assert_eq!(split_host_port("[::1]:443").unwrap(), ("::1", "443"));
        assert_eq!(split_host_port(":8080").unwrap(), ("", "8080"));
        assert_eq!(split_host_port("host:http").unwrap(), ("host", "http"));
    }

    #[test]
    fn test_split_host_port_errors() {
        for bad in ["example.com", "example.com:", "::1:80", "[::1]80", "[::1:80", "a\0b:80"] {
            let err = split_host_port(bad).unwrap_err();
            assert!(
                matches!(err, NetError::InvalidAddress(_)),
                "{bad:?} gave {err:?}"
            );
        }
    }
}
