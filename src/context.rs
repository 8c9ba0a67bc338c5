//! Per-call cancellation and deadline propagation.
//!
//! A [`CallContext`] is passed by reference into every client operation. The
//! only places the core suspends (rate-limit admission, the in-flight
//! transport attempt, and the backoff sleep) race against
//! [`CallContext::done`], so cancelling a context or letting its deadline
//! pass unblocks the caller promptly instead of after the full wait.

use crate::error::CancelReason;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token plus an optional deadline.
///
/// Cloning is cheap and clones share the same token: cancelling one clone
/// cancels them all. Use [`CallContext::child`] for a context that can be
/// cancelled independently of its parent.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing token, e.g. one tied to a shutdown signal.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// A child context: cancelled when `self` is, cancellable on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// A child context that also expires `timeout` from now.
    ///
    /// The earlier of the parent deadline and the new one wins.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A child context that expires at `deadline` (or earlier, if the
    /// parent already expires earlier).
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking check: `Some(reason)` once the context has ended.
    pub fn err(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolve when the context is cancelled or its deadline passes.
    ///
    /// Never resolves for a context with no deadline that is never cancelled.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => CancelReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_is_live() {
        let ctx = CallContext::new();
        assert_eq!(ctx.err(), None);
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn cancel_propagates_to_children_not_parents() {
        let parent = CallContext::new();
        let child = parent.child();
        child.cancel();
        assert_eq!(child.err(), Some(CancelReason::Cancelled));
        assert_eq!(parent.err(), None);

        let other = parent.child();
        parent.cancel();
        assert_eq!(other.err(), Some(CancelReason::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let ctx = CallContext::new().with_timeout(Duration::from_millis(200));
        assert_eq!(ctx.err(), None);
        let reason = ctx.done().await;
        assert_eq!(reason, CancelReason::DeadlineExceeded);
        assert_eq!(ctx.err(), Some(CancelReason::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_parent_deadline_wins() {
        let parent = CallContext::new().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test]
    async fn done_resolves_on_cancel() {
        let ctx = CallContext::new();
        let remote = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            remote.cancel();
        });
        assert_eq!(ctx.done().await, CancelReason::Cancelled);
    }
}
