//! Blocking convenience functions bound to the WasmEdge host.
//!
//! WASI preview1 guests are single-threaded, so each call drives its future
//! to completion on the current thread. Readiness waits inside the host
//! binding block in bounded `poll_oneoff` slices.

use std::future::Future;
use std::time::{Duration, Instant};

use netkit_core::endpoint::Endpoint;
use netkit_core::error::OpError;
use netkit_core::options::{DialOptions, ListenOptions};
use netkit_core::wasip1::WasiHost;
use netkit_dial::{Conn, Dialer, Listener};

/// Run a future to completion on the current thread.
pub fn block_on<F: Future>(future: F) -> F::Output {
    futures::executor::block_on(future)
}

/// Dial `address` on `network`, giving up at `deadline` (`None` or a passed
/// deadline means no timeout).
///
/// # Errors
///
/// Returns an [`OpError`] carrying the last address tried.
pub fn dial(
    network: &str,
    address: &str,
    deadline: Option<Instant>,
) -> Result<Conn<WasiHost>, OpError> {
    block_on(netkit_dial::dial(&WasiHost, network, address, deadline))
}

/// Dial with a relative timeout. A zero timeout means no timeout.
///
/// # Errors
///
/// Returns an [`OpError`] carrying the last address tried.
pub fn dial_timeout(
    network: &str,
    address: &str,
    timeout: Duration,
) -> Result<Conn<WasiHost>, OpError> {
    let dialer = Dialer::with_options(WasiHost, DialOptions::new().with_timeout(timeout));
    block_on(dialer.dial(network, address))
}

/// Resolve `address` on `network` through the host resolver.
///
/// # Errors
///
/// Returns an [`OpError`] for operation `"lookup"`.
pub fn resolve(network: &str, address: &str) -> Result<Vec<Endpoint>, OpError> {
    Dialer::new(WasiHost).resolve(network, address)
}

/// Listen on a stream network with default options.
///
/// # Errors
///
/// Returns an [`OpError`] for operation `"listen"`.
pub fn listen(network: &str, address: &str) -> Result<Listener<WasiHost>, OpError> {
    netkit_dial::listen(&WasiHost, network, address, &ListenOptions::default())
}
