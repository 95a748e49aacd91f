//! Netkit Core
//!
//! This crate contains the host-facing building blocks of the netkit socket
//! bridge:
//! - Endpoints, networks and socket kinds (`endpoint`)
//! - Fixed-layout address codec for the host ABI (`sockaddr`)
//! - Host socket primitives (`host`), with the WasmEdge binding (`wasip1`)
//!   and an in-memory fake (`memory`)
//! - Dial and listen options (`options`)
//! - Deadlines and cancellation (`timeout`)
//! - Error types (`error`)

// The wasip1 module needs raw pointers to call into the host ABI
#![cfg_attr(not(test), deny(unsafe_code))]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::match_same_arms)]
pub mod endpoint;
pub mod error;
pub mod host;
pub mod memory;
pub mod options;
pub mod sockaddr;
pub mod timeout;

#[cfg(target_os = "wasi")]
pub mod wasip1;

// Keep the prelude to what dialing code needs.
pub mod prelude {
    pub use crate::endpoint::{Address, AddressFamily, Endpoint, Network, SocketKind};
    pub use crate::error::{NetError, OpError, Result};
    pub use crate::host::{Errno, Fd, HostError, HostResult, HostSockets, Shutdown};
    pub use crate::options::{DialOptions, ListenOptions};
    pub use crate::sockaddr::{AddrInfoEntry, AddrInfoHints, RawSockAddr};
    pub use crate::timeout::{cancel_pair, CancelHandle, CancelSignal, DialContext};

    #[cfg(target_os = "wasi")]
    pub use crate::wasip1::WasiHost;
}
