//! Per-request context: cancellation and an optional deadline.
//!
//! The simulation core imposes no timeouts of its own. A caller that wants
//! one attaches a deadline here; a caller that wants to abort hands out a
//! [`CancelHandle`]. Every suspension point in the core (backend fan-out and
//! the synthesis call) is raced against [`RequestContext::interrupted`], so
//! in-flight backend futures are dropped as soon as either fires.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Why a request stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupt {
    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,
    /// The caller-supplied deadline passed.
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation and deadline carrier for one simulation request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    cancel: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

/// Owner side of a cancellable [`RequestContext`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signal cancellation to every clone of the paired context.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl RequestContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        let (_tx, cancel) = watch::channel(false);
        Self {
            cancel,
            deadline: None,
        }
    }

    /// A context plus the handle that cancels it.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, cancel) = watch::channel(false);
        (
            Self {
                cancel,
                deadline: None,
            },
            CancelHandle { tx },
        )
    }

    /// Attach a deadline `timeout` from now. An earlier deadline wins.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now().checked_add(timeout);
        self.deadline = match (self.deadline, candidate) {
            (Some(existing), Some(new)) => Some(existing.min(new)),
            (existing, new) => existing.or(new),
        };
        self
    }

    /// Non-blocking check, for use before any work starts.
    pub fn check(&self) -> Result<(), Interrupt> {
        if *self.cancel.borrow() {
            return Err(Interrupt::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(Interrupt::DeadlineExceeded);
        }
        Ok(())
    }

    /// Resolves once the request is cancelled or its deadline passes.
    ///
    /// Never resolves for a context without a deadline whose handle was
    /// dropped without cancelling.
    pub async fn interrupted(&self) -> Interrupt {
        let mut rx = self.cancel.clone();
        let cancelled = async move {
            let sender_gone = rx.wait_for(|cancelled| *cancelled).await.is_err();
            if sender_gone {
                std::future::pending::<()>().await;
            }
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = cancelled => Interrupt::Cancelled,
                    () = tokio::time::sleep_until(deadline) => Interrupt::DeadlineExceeded,
                }
            }
            None => {
                cancelled.await;
                Interrupt::Cancelled
            }
        }
    }

    /// Await `fut` unless the request is interrupted first.
    ///
    /// On interruption `fut` is dropped, which abandons any HTTP call it
    /// was driving.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Interrupt> {
        self.check()?;
        tokio::select! {
            biased;
            reason = self.interrupted() => Err(reason),
            output = fut => Ok(output),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}
