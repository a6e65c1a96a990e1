//! Per-call cancellation and deadline.
//!
//! A [`Context`] travels by reference through every stage of one
//! conversion. It is cheap to clone; clones share the same cancellation
//! signal. Cancelling one call's context never affects another call, even
//! when both run on the same pool.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

/// Why a context is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context cancelled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation signal plus an optional deadline.
#[derive(Debug, Clone)]
pub struct Context {
    cancel: Arc<watch::Sender<bool>>,
    deadline: Option<Instant>,
}

/// Cancels the [`Context`] it was created with (and all its clones).
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancel: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            cancel: Arc::new(tx),
            deadline: None,
        }
    }

    /// A fresh context plus the handle that cancels it.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let ctx = Self::background();
        let handle = CancelHandle {
            cancel: Arc::clone(&ctx.cancel),
        };
        (ctx, handle)
    }

    /// Derive a context that additionally expires after `timeout`.
    ///
    /// The earlier of the existing and the new deadline wins.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            cancel: Arc::clone(&self.cancel),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// `Some` once the context is cancelled or past its deadline.
    pub fn err(&self) -> Option<ContextError> {
        if *self.cancel.borrow() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// `Err` once the context is done; convenient with `?`.
    pub fn check(&self) -> Result<(), ContextError> {
        match self.err() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Resolves when the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        let mut rx = self.cancel.subscribe();
        let cancelled = async move {
            // The sender lives as long as `self`, so this only ends on `true`.
            let _ = rx.wait_for(|c| *c).await;
        };
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = cancelled => ContextError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
                }
            }
            None => {
                cancelled.await;
                ContextError::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_is_never_done() {
        let ctx = Context::background();
        assert!(ctx.err().is_none());
        assert!(ctx.check().is_ok());
        assert!(ctx.remaining().is_none());
    }

    #[test]
    fn cancel_is_shared_by_clones() {
        let (ctx, handle) = Context::with_cancel();
        let clone = ctx.clone();
        handle.cancel();
        assert_eq!(ctx.err(), Some(ContextError::Cancelled));
        assert_eq!(clone.err(), Some(ContextError::Cancelled));
    }

    #[test]
    fn independent_contexts_do_not_interfere() {
        let (a, cancel_a) = Context::with_cancel();
        let (b, _cancel_b) = Context::with_cancel();
        cancel_a.cancel();
        assert!(a.err().is_some());
        assert!(b.err().is_none());
    }

    #[tokio::test]
    async fn zero_timeout_is_already_expired() {
        let ctx = Context::background().with_timeout(Duration::ZERO);
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
        assert_eq!(ctx.done().await, ContextError::DeadlineExceeded);
    }

    #[tokio::test]
    async fn earlier_deadline_wins() {
        let short = Context::background().with_timeout(Duration::from_millis(10));
        let derived = short.with_timeout(Duration::from_secs(60));
        assert_eq!(short.deadline(), derived.deadline());
    }

    #[tokio::test]
    async fn done_resolves_on_cancel() {
        let (ctx, handle) = Context::with_cancel();
        let waiter = tokio::spawn({
            let ctx = ctx.clone();
            async move { ctx.done().await }
        });
        handle.cancel();
        assert_eq!(waiter.await.unwrap(), ContextError::Cancelled);
    }

    #[test]
    fn done_stays_pending_until_cancelled() {
        let (ctx, handle) = Context::with_cancel();
        let mut done = tokio_test::task::spawn(ctx.done());
        tokio_test::assert_pending!(done.poll());

        handle.cancel();
        assert!(done.is_woken());
        assert_eq!(tokio_test::assert_ready!(done.poll()), ContextError::Cancelled);
    }
}
