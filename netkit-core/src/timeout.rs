//! Deadline and cancellation utilities for dial operations
//!
//! A dial translates its timeout once into an absolute expiry and carries it,
//! together with an optional cancellation signal, in a [`DialContext`] shared
//! by every candidate attempt.

use std::future::Future;
use std::time::{Duration, Instant};

use futures::future::{self, Either};
use futures::pin_mut;

use crate::error::NetError;
use crate::host::HostSockets;
use crate::options::DialOptions;

/// Caller side of a cancellation pair.
///
/// Cancelling (or dropping) the handle fires every clone of the paired
/// [`CancelSignal`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: flume::Sender<()>,
}

/// Observer side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: flume::Receiver<()>,
}

/// Create a linked cancellation handle and signal.
///
/// # Example
///
/// ```
/// use netkit_core::timeout::cancel_pair;
///
/// let (handle, signal) = cancel_pair();
/// assert!(!signal.is_cancelled());
/// handle.cancel();
/// assert!(signal.is_cancelled());
/// ```
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = flume::bounded(0);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    /// Fire the signal.
    pub fn cancel(self) {
        drop(self.tx);
    }
}

impl CancelSignal {
    /// Returns true once the paired handle has been cancelled or dropped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.rx.is_disconnected()
    }

    /// Completes when the paired handle is cancelled or dropped.
    pub fn cancelled(&self) -> impl Future<Output = ()> + '_ {
        async move {
            // Nothing is ever sent: the only way out is disconnection.
            while self.rx.recv_async().await.is_ok() {}
        }
    }
}

/// Expiry and cancellation shared by all candidate attempts of one dial.
#[derive(Debug, Clone, Default)]
pub struct DialContext {
    deadline: Option<Instant>,
    cancel: Option<CancelSignal>,
}

impl DialContext {
    /// Context without expiry or cancellation.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Build a context from a relative timeout.
    ///
    /// A zero timeout means "no timeout".
    #[must_use]
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        let deadline = timeout
            .filter(|t| !t.is_zero())
            .and_then(|t| Instant::now().checked_add(t));
        Self {
            deadline,
            cancel: None,
        }
    }

    /// Build a context from dial options.
    #[must_use]
    pub fn from_options(options: &DialOptions) -> Self {
        Self::with_timeout(options.effective_timeout())
    }

    /// Attach a cancellation signal.
    #[must_use]
    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Absolute expiry, if any.
    #[inline]
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before expiry, if any.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Why the context is done, if it is.
    #[must_use]
    pub fn err(&self) -> Option<NetError> {
        if self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
            return Some(NetError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(NetError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Returns true once the deadline has passed or cancellation fired.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Completes with [`NetError::DeadlineExceeded`] or
    /// [`NetError::Cancelled`], whichever fires first. Never completes for a
    /// background context.
    pub async fn expired<H>(&self, host: &H) -> NetError
    where
        H: HostSockets + ?Sized,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => {
                    host.sleep_until(deadline).await;
                    NetError::DeadlineExceeded
                }
                None => future::pending().await,
            }
        };
        let cancel = async {
            match &self.cancel {
                Some(signal) => {
                    signal.cancelled().await;
                    NetError::Cancelled
                }
                None => future::pending().await,
            }
        };
        pin_mut!(deadline, cancel);
        match future::select(deadline, cancel).await {
            Either::Left((err, _)) | Either::Right((err, _)) => err,
        }
    }
}
