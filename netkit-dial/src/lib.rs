//! # Netkit Dial
//!
//! Go-style dialing on top of the host socket primitives in `netkit-core`.
//!
//! ## Overview
//!
//! - **Resolver** (`resolve`): `(network, address)` to ordered candidate
//!   endpoints, with family filtering and Unix short-circuiting
//! - **Connect engine** (`connect`): non-blocking connect with deadline and
//!   cancellation
//! - **Orchestrator** (`dial`): first-success-wins over the candidates, under
//!   one shared deadline
//! - **Adapters** (`conn`): stream and packet connections
//! - **Listener** (`listen`): bound, listening stream sockets
//!
//! Everything is generic over [`HostSockets`](netkit_core::host::HostSockets):
//! the same code runs against the WasmEdge host and the in-memory fake.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netkit_core::memory::{ConnectBehavior, MemoryHost};
//! use netkit_dial::{dial, Connection};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let host = MemoryHost::new();
//! host.route_inet("93.184.216.34:80".parse()?, ConnectBehavior::Immediate);
//!
//! let mut conn = dial(&host, "tcp", "93.184.216.34:80", None).await?;
//! assert_eq!(conn.remote_endpoint().to_string(), "93.184.216.34:80");
//! conn.close()?;
//! # Ok(())
//! # }
//! ```

// Allow some pedantic lints
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod conn;
pub mod connect;
pub mod dial;
pub mod listen;
pub mod resolve;
pub mod socket;

pub use conn::{Conn, Connection, PacketConn, StreamConn};
pub use connect::connect;
pub use dial::{dial, dial_context, Dialer};
pub use listen::{listen, Listener};
pub use resolve::{resolve, split_host_port};
pub use socket::{SocketHandle, SocketState};
