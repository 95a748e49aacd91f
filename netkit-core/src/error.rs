//! Netkit Error Types
//!
//! Error handling for address encoding, resolution, connect and dial.

use std::fmt;
use thiserror::Error;

use crate::host::{Errno, HostError};

/// Main error type for netkit operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetError {
    /// Malformed or oversized address
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Unrecognized network string
    #[error("unknown network {0}")]
    UnknownNetwork(String),

    /// Resolution returned no usable candidates
    #[error("lookup {name}: no such host")]
    NoSuchHost { name: String },

    /// A host primitive failed
    #[error("{op}: {source}")]
    Socket {
        op: &'static str,
        #[source]
        source: HostError,
    },

    /// Feature not available on this host
    #[error("not supported: {0}")]
    Unsupported(String),

    /// Caller-initiated cancellation fired
    #[error("operation was canceled")]
    Cancelled,

    /// Dial deadline elapsed
    #[error("i/o timeout")]
    DeadlineExceeded,

    /// Use of a connection after close
    #[error("use of closed network connection")]
    Closed,
}

/// Result type alias for netkit operations
pub type Result<T> = std::result::Result<T, NetError>;

impl NetError {
    /// Create an invalid address error with a message
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::InvalidAddress(msg.into())
    }

    /// Create an unsupported error with a message
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a no-such-host error
    pub fn no_such_host(name: impl Into<String>) -> Self {
        Self::NoSuchHost { name: name.into() }
    }

    /// Wrap a host failure with the primitive that produced it
    #[must_use]
    pub const fn socket(op: &'static str, source: HostError) -> Self {
        Self::Socket { op, source }
    }

    /// Host status of a socket error, if any
    #[must_use]
    pub const fn host_error(&self) -> Option<HostError> {
        match self {
            Self::Socket { source, .. } => Some(*source),
            _ => None,
        }
    }

    /// Check if this error is a timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        match self {
            Self::DeadlineExceeded => true,
            Self::Socket { source, .. } => matches!(source, HostError::Code(Errno::TIMEDOUT)),
            _ => false,
        }
    }

    /// Check if this error was caused by cancellation or deadline expiry
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Check if this error is recoverable
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Socket { source, .. } => matches!(
                source,
                HostError::WouldBlock | HostError::Code(Errno::INTR) | HostError::Code(Errno::TIMEDOUT)
            ),
            _ => false,
        }
    }
}

/// Error returned by dial and listen, annotated with the operation, network
/// and the last address that was tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpError {
    op: &'static str,
    network: String,
    address: String,
    source: NetError,
}

impl OpError {
    /// Wrap an error for the given operation and address
    pub fn new(
        op: &'static str,
        network: impl Into<String>,
        address: impl Into<String>,
        source: NetError,
    ) -> Self {
        Self {
            op,
            network: network.into(),
            address: address.into(),
            source,
        }
    }

    /// Operation name (`dial`, `listen`)
    #[inline]
    #[must_use]
    pub const fn op(&self) -> &'static str {
        self.op
    }

    /// Network name the operation was invoked with
    #[inline]
    #[must_use]
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Last address tried, or the original address if none was resolved
    #[inline]
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Underlying cause
    #[inline]
    #[must_use]
    pub const fn cause(&self) -> &NetError {
        &self.source
    }

    /// Consume the wrapper and return the underlying cause
    #[must_use]
    pub fn into_cause(self) -> NetError {
        self.source
    }

    /// Check if the underlying cause is a timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        self.source.is_timeout()
    }
}

impl fmt::Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.network)?;
        if !self.address.is_empty() {
            write!(f, " {}", self.address)?;
        }
        write!(f, ": {}", self.source)
    }
}

impl std::error::Error for OpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_error_display() {
        let err = NetError::socket("connect", HostError::Code(Errno::CONNREFUSED));
        assert_eq!(err.to_string(), "connect: host error: connection refused");
        assert_eq!(err.host_error(), Some(HostError::Code(Errno::CONNREFUSED)));
    }

    #[test]
    fn test_op_error_display() {
        let err = OpError::new("dial", "tcp", "10.0.0.1:80", NetError::DeadlineExceeded);
        assert_eq!(err.to_string(), "dial tcp 10.0.0.1:80: i/o timeout");
        assert!(err.is_timeout());
        assert_eq!(err.cause(), &NetError::DeadlineExceeded);
    }

    #[test]
    fn test_classification() {
        assert!(NetError::Cancelled.is_cancelled());
        assert!(!NetError::Cancelled.is_timeout());
        assert!(NetError::socket("read", HostError::WouldBlock).is_recoverable());
        assert!(!NetError::Closed.is_recoverable());
    }
}
