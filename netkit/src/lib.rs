//! # Netkit
//!
//! Go-style `dial` / `resolve` / `listen` for WebAssembly guests running on
//! WasmEdge, built on the host's socket extension primitives.
//!
//! ## Architecture
//!
//! Netkit is split into small layers:
//!
//! - **`netkit-core`**: address codec, the `HostSockets` seam with the
//!   WasmEdge binding and an in-memory fake, options, deadlines and errors
//! - **`netkit-dial`**: resolver, connect engine, dial orchestration,
//!   connection adapters and listener setup
//! - **`netkit`**: public API surface (this crate)
//!
//! The host is always passed explicitly. Nothing registers a process-wide
//! resolver or dial hook.
//!
//! ## Quick Start
//!
//! ### Dial with an explicit host
//!
//! ```rust,no_run
//! use netkit::prelude::*;
//! use netkit::memory::{ConnectBehavior, MemoryHost};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let host = MemoryHost::new();
//! host.route_inet("10.0.0.1:80".parse()?, ConnectBehavior::Immediate);
//!
//! let dialer = Dialer::with_options(host, DialOptions::new().with_timeout(Duration::from_secs(5)));
//! let mut conn = dialer.dial("tcp", "10.0.0.1:80").await?;
//! conn.write(b"GET / HTTP/1.0\r\n\r\n").await?;
//! conn.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Blocking calls inside a WasmEdge guest
//!
//! ```rust,ignore
//! let conn = netkit::wasip1::dial_timeout("tcp", "example.com:80", Duration::from_secs(5))?;
//! ```
//!
//! ## Safety
//!
//! - `unsafe` code is isolated to `netkit-core/src/wasip1.rs` (host ABI calls)
//! - Resolution, connect and adapter layers are 100% safe Rust

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dev_tracing;

#[cfg(target_os = "wasi")]
pub mod wasip1;

pub use netkit_core::endpoint::{Address, AddressFamily, Endpoint, Network, SocketKind};
pub use netkit_core::error::{NetError, OpError, Result};
pub use netkit_core::host::{Errno, Fd, HostError, HostResult, HostSockets, Shutdown};
pub use netkit_core::options::{DialOptions, ListenOptions};
pub use netkit_core::timeout::{cancel_pair, CancelHandle, CancelSignal, DialContext};
pub use netkit_core::{memory, sockaddr};
pub use netkit_dial::{
    connect, dial, dial_context, listen, resolve, split_host_port, Conn, Connection, Dialer,
    Listener, PacketConn, SocketState, StreamConn,
};

/// Common imports for dialing code.
pub mod prelude {
    pub use super::{
        cancel_pair, dial, listen, resolve, Conn, Connection, DialOptions, Dialer, Endpoint,
        HostSockets, ListenOptions, NetError, OpError,
    };
}
