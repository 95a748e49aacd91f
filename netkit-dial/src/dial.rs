//! Dial orchestration.
//!
//! `dial` resolves an address, then tries each candidate in resolver order
//! through the connect engine, sequentially, until one succeeds. All attempts
//! share one [`DialContext`], so a timeout bounds the whole dial rather than
//! each attempt.
//!
//! # Usage
//!
//! ```rust,no_run
//! use netkit_core::memory::MemoryHost;
//! use netkit_core::options::DialOptions;
//! use netkit_dial::{Connection, Dialer};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dialer = Dialer::with_options(
//!     MemoryHost::new(),
//!     DialOptions::new().with_timeout(Duration::from_secs(5)),
//! );
//! let mut conn = dialer.dial("tcp", "localhost:8080").await?;
//! conn.write(b"hello").await?;
//! conn.close()?;
//! # Ok(())
//! # }
//! ```

use std::time::{Duration, Instant};

use netkit_core::endpoint::Endpoint;
use netkit_core::error::{NetError, OpError};
use netkit_core::host::HostSockets;
use netkit_core::options::DialOptions;
use netkit_core::timeout::{CancelSignal, DialContext};
use tracing::{debug, warn};

use crate::conn::Conn;
use crate::connect::connect;
use crate::resolve::resolve;

/// Dial `address` on `network`, giving up at `deadline`.
///
/// A deadline that is absent or already in the past means "no timeout".
///
/// # Errors
///
/// Returns an [`OpError`] for operation `"dial"` carrying the last address
/// tried and the last failure.
pub async fn dial<H>(
    host: &H,
    network: &str,
    address: &str,
    deadline: Option<Instant>,
) -> Result<Conn<H>, OpError>
where
    H: HostSockets + Clone,
{
    let mut options = DialOptions::new();
    options.deadline = deadline;
    dial_context(host, network, address, &DialContext::from_options(&options)).await
}

/// Dial under an explicit context.
///
/// # Errors
///
/// See [`dial`].
pub async fn dial_context<H>(
    host: &H,
    network: &str,
    address: &str,
    ctx: &DialContext,
) -> Result<Conn<H>, OpError>
where
    H: HostSockets + Clone,
{
    let endpoints = resolve(host, network, address)
        .map_err(|e| OpError::new("dial", network, address, e))?;
    debug!(
        "[DIAL] {} {}: {} candidate(s)",
        network,
        address,
        endpoints.len()
    );

    let mut last: Option<(&Endpoint, NetError)> = None;
    for endpoint in &endpoints {
        match connect(host, endpoint, ctx).await {
            Ok(conn) => {
                debug!("[DIAL] {} {}: connected to {}", network, address, endpoint);
                return Ok(conn);
            }
            Err(err) => {
                debug!("[DIAL] {} {}: {} failed: {}", network, address, endpoint, err);
                last = Some((endpoint, err));
                if ctx.is_done() {
                    break;
                }
            }
        }
    }

    Err(match last {
        Some((endpoint, err)) => OpError::new("dial", network, endpoint.to_string(), err),
        None => OpError::new("dial", network, address, NetError::no_such_host(address)),
    })
}

/// Dialer bound to an explicit host, in the manner of a `net.Dialer`.
#[derive(Debug, Clone)]
pub struct Dialer<H> {
    host: H,
    options: DialOptions,
}

impl<H> Dialer<H>
where
    H: HostSockets + Clone,
{
    /// Dialer with default options.
    pub fn new(host: H) -> Self {
        Self::with_options(host, DialOptions::default())
    }

    /// Dialer with explicit options.
    pub fn with_options(host: H, options: DialOptions) -> Self {
        Self { host, options }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn options(&self) -> &DialOptions {
        &self.options
    }

    /// Dial using this dialer's options.
    ///
    /// # Errors
    ///
    /// See [`dial`].
    pub async fn dial(&self, network: &str, address: &str) -> Result<Conn<H>, OpError> {
        self.dial_with(&self.options, network, address, None).await
    }

    /// Dial with a timeout overriding the configured one.
    ///
    /// # Errors
    ///
    /// See [`dial`].
    pub async fn dial_timeout(
        &self,
        network: &str,
        address: &str,
        timeout: Duration,
    ) -> Result<Conn<H>, OpError> {
        let options = self.options.clone().with_timeout(timeout);
        self.dial_with(&options, network, address, None).await
    }

    /// Dial that also stops when `signal` fires.
    ///
    /// # Errors
    ///
    /// See [`dial`].
    pub async fn dial_with_cancel(
        &self,
        network: &str,
        address: &str,
        signal: CancelSignal,
    ) -> Result<Conn<H>, OpError> {
        self.dial_with(&self.options, network, address, Some(signal))
            .await
    }

    /// Resolve without dialing.
    ///
    /// # Errors
    ///
    /// Returns an [`OpError`] for operation `"lookup"`.
    pub fn resolve(&self, network: &str, address: &str) -> Result<Vec<Endpoint>, OpError> {
        resolve(&self.host, network, address)
            .map_err(|e| OpError::new("lookup", network, address, e))
    }

    async fn dial_with(
        &self,
        options: &DialOptions,
        network: &str,
        address: &str,
        signal: Option<CancelSignal>,
    ) -> Result<Conn<H>, OpError> {
        for name in options.unsupported_options() {
            warn!("[DIAL] option {} is not supported on this host, ignoring", name);
        }
        let mut ctx = DialContext::from_options(options);
        if let Some(signal) = signal {
            ctx = ctx.with_cancel(signal);
        }
        dial_context(&self.host, network, address, &ctx).await
    }
}
