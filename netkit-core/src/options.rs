//! Dial and listen configuration options
//!
//! This module provides configuration for dialing and listening, similar to
//! the knobs of a conventional `net.Dialer` / `net.ListenConfig`.

use std::time::{Duration, Instant};

use crate::endpoint::Endpoint;

/// Default listen backlog.
pub const DEFAULT_BACKLOG: u32 = 128;

/// Dial configuration options.
///
/// # Examples
///
/// ```
/// use netkit_core::options::DialOptions;
/// use std::time::Duration;
///
/// let opts = DialOptions::default()
///     .with_timeout(Duration::from_secs(5));
/// assert_eq!(opts.effective_timeout(), Some(Duration::from_secs(5)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct DialOptions {
    /// Maximum time for the whole dial, across all candidates.
    ///
    /// - `None` or `Some(Duration::ZERO)`: no timeout
    pub timeout: Option<Duration>,

    /// Absolute point in time after which the dial fails.
    ///
    /// When both `timeout` and `deadline` are set, the earlier wins. A deadline
    /// that has already passed means "no timeout".
    pub deadline: Option<Instant>,

    /// Local address to bind before connecting.
    ///
    /// Not supported by the host; ignored with a warning.
    pub local_addr: Option<Endpoint>,

    /// RFC 6555 fast fallback between address families.
    ///
    /// Not supported by the host; ignored with a warning.
    pub dual_stack: bool,

    /// Delay before spawning a fallback connection when `dual_stack` is set.
    ///
    /// Not supported by the host; ignored with a warning.
    pub fallback_delay: Duration,
}

impl DialOptions {
    /// Create new dial options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dial timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set an absolute dial deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the local address to bind before connecting.
    #[must_use]
    pub fn with_local_addr(mut self, addr: Endpoint) -> Self {
        self.local_addr = Some(addr);
        self
    }

    /// Enable or disable dual-stack fast fallback.
    #[must_use]
    pub fn with_dual_stack(mut self, enabled: bool) -> Self {
        self.dual_stack = enabled;
        self
    }

    /// Set the dual-stack fallback delay.
    #[must_use]
    pub fn with_fallback_delay(mut self, delay: Duration) -> Self {
        self.fallback_delay = delay;
        self
    }

    /// Time budget for one dial, measured from now.
    ///
    /// Returns `None` when the dial should block until the host or a
    /// cancellation decides.
    #[must_use]
    pub fn effective_timeout(&self) -> Option<Duration> {
        let mut timeout = self.timeout.filter(|t| !t.is_zero());
        if let Some(deadline) = self.deadline {
            let until = deadline.saturating_duration_since(Instant::now());
            if !until.is_zero() && timeout.map_or(true, |t| until < t) {
                timeout = Some(until);
            }
        }
        timeout
    }

    /// Names of options that are set but have no effect on this host.
    #[must_use]
    pub fn unsupported_options(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.local_addr.is_some() {
            names.push("local_addr");
        }
        if self.dual_stack {
            names.push("dual_stack");
        }
        if !self.fallback_delay.is_zero() {
            names.push("fallback_delay");
        }
        names
    }
}

/// Listen configuration options.
#[derive(Debug, Clone)]
pub struct ListenOptions {
    /// Enable `SO_REUSEADDR` before binding (best effort).
    ///
    /// - Default: true
    pub reuse_addr: bool,

    /// Pending connection queue length passed to `sock_listen`.
    ///
    /// - Default: 128
    pub backlog: u32,
}

impl Default for ListenOptions {
    fn default() -> Self {
        Self {
            reuse_addr: true,
            backlog: DEFAULT_BACKLOG,
        }
    }
}

impl ListenOptions {
    /// Create new listen options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable `SO_REUSEADDR`.
    #[must_use]
    pub fn with_reuse_addr(mut self, enabled: bool) -> Self {
        self.reuse_addr = enabled;
        self
    }

    /// Set the listen backlog.
    #[must_use]
    pub fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }
}
