//! Cooperative cancellation shared by a download, its workers and its reader.
//!
//! A `CancelToken` is cheap to clone; all clones observe the same flag. Child
//! tokens are cancelled when their parent is, but cancelling a child leaves the
//! parent untouched, so a download can shut down its own workers without
//! affecting the caller's token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound on how long a blocked wait goes without re-checking the token.
pub(crate) const CANCEL_POLL: Duration = Duration::from_millis(20);

/// Why a token stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// `cancel()` was called on this token or an ancestor.
    Cancelled,
    /// A deadline on this token or an ancestor passed.
    DeadlineExceeded,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "operation cancelled"),
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

impl std::error::Error for CancelReason {}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    parent: Option<CancelToken>,
}

/// Shared cancellation flag with optional deadline and parent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that reports `DeadlineExceeded` once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: Instant::now().checked_add(timeout),
                parent: None,
            }),
        }
    }

    /// New token that is cancelled whenever `self` is.
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: None,
                parent: Some(self.clone()),
            }),
        }
    }

    /// Cancel this token and every child derived from it.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    /// Reason this token (or an ancestor) stopped, if it has.
    pub fn reason(&self) -> Option<CancelReason> {
        let mut token = Some(self);
        while let Some(t) = token {
            if t.inner.cancelled.load(Ordering::Acquire) {
                return Some(CancelReason::Cancelled);
            }
            if let Some(deadline) = t.inner.deadline {
                if Instant::now() >= deadline {
                    return Some(CancelReason::DeadlineExceeded);
                }
            }
            token = t.inner.parent.as_ref();
        }
        None
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Sleep for `duration`, returning early with the reason if the token stops.
    /// A duration too large to represent sleeps until the token stops.
    pub fn sleep(&self, duration: Duration) -> Result<(), CancelReason> {
        let until = Instant::now().checked_add(duration);
        loop {
            if let Some(reason) = self.reason() {
                return Err(reason);
            }
            let wait = match until {
                Some(until) => {
                    let now = Instant::now();
                    if now >= until {
                        return Ok(());
                    }
                    (until - now).min(CANCEL_POLL)
                }
                None => CANCEL_POLL,
            };
            std::thread::sleep(wait);
        }
    }
}
