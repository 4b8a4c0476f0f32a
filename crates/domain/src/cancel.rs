//! Request-scoped cancellation: explicit cancel plus an optional deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Cloneable token threaded through every suspending call of a request.
///
/// Clones share state: cancelling one cancels all. [`CancelToken::child`]
/// creates a token that is cancelled with its parent but can also be
/// cancelled on its own.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Child token; the earlier of the two deadlines applies.
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let own = timeout.map(|t| Instant::now() + t);
        let deadline = match (self.deadline, own) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            inner: self.inner.child_token(),
            deadline,
        }
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled() || self.deadline_passed()
    }

    /// Resolves once the token is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.inner.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.inner.cancelled().await,
        }
    }

    fn canceled_error(&self, step: &str) -> Error {
        if self.deadline_passed() && !self.inner.is_cancelled() {
            Error::Canceled(format!("deadline exceeded at {step}"))
        } else {
            Error::Canceled(format!("cancelled at {step}"))
        }
    }

    /// Step-boundary check.
    pub fn checkpoint(&self, step: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(self.canceled_error(step))
        } else {
            Ok(())
        }
    }

    /// Run `fut` unless the token fires first. A token that is already
    /// cancelled never polls `fut`.
    pub async fn run<T, F>(&self, step: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.checkpoint(step)?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(self.canceled_error(step)),
            out = fut => out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(clone.checkpoint("start").is_ok());
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(matches!(clone.checkpoint("x"), Err(Error::Canceled(_))));
    }

    #[test]
    fn child_follows_parent_but_not_back() {
        let parent = CancelToken::new();
        let child = parent.child(None);
        child.cancel();
        assert!(!parent.is_cancelled());

        let child = parent.child(None);
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn run_never_polls_after_cancel() {
        let token = CancelToken::new();
        token.cancel();
        let polled = AtomicBool::new(false);
        let res = token
            .run("provider", async {
                polled.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(res, Err(Error::Canceled(_))));
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn deadline_interrupts_slow_work() {
        let token = CancelToken::with_timeout(Duration::from_millis(50));
        let res: Result<()> = token
            .run("slow", async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
        let err = res.unwrap_err();
        assert!(err.to_string().contains("deadline exceeded"));
    }

    #[tokio::test]
    async fn run_passes_through_results() {
        let token = CancelToken::with_timeout(Duration::from_secs(5));
        let v = token.run("fast", async { Ok(7) }).await.unwrap();
        assert_eq!(v, 7);
    }
}
