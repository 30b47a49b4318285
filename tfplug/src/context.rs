//! Context implementation for request-scoped cancellation
//!
//! Every RPC hands resources a Context derived from the server's root
//! context. StopProvider cancels the root, which lets long-running waits
//! (async job polling, retry back-off) return early.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Context carries cancellation and an optional deadline
/// CRITICAL: Pass this as first parameter to ALL async trait methods
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    done: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        let (done_tx, done) = watch::channel(false);

        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                done,
                done_tx,
            }),
        }
    }

    /// Derives a context that is cancelled when `self` is cancelled or when
    /// `timeout` elapses, whichever comes first
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let child = self.child(Some(deadline));

        let tx = child.inner.done_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline.into()).await;
            let _ = tx.send(true);
        });

        child
    }

    /// Derives a context that follows `self`'s cancellation
    pub fn child_context(&self) -> Self {
        self.child(self.inner.deadline)
    }

    fn child(&self, deadline: Option<Instant>) -> Self {
        let (done_tx, done) = watch::channel(self.is_cancelled());

        let mut parent = self.inner.done.clone();
        let tx = done_tx.clone();
        tokio::spawn(async move {
            while !*parent.borrow_and_update() {
                tokio::select! {
                    changed = parent.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    _ = tx.closed() => return,
                }
            }
            let _ = tx.send(true);
        });

        Self {
            inner: Arc::new(ContextInner {
                deadline,
                done,
                done_tx,
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    pub fn cancel(&self) {
        let _ = self.inner.done_tx.send(true);
    }

    /// Resolves once the context is cancelled
    pub async fn cancelled(&self) {
        let mut done = self.inner.done.clone();
        while !*done.borrow_and_update() {
            if done.changed().await.is_err() {
                // Sender dropped without cancelling; never resolve
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn context_timeout_cancels() {
        let ctx = Context::new().with_timeout(Duration::from_millis(50));

        assert!(!ctx.is_cancelled());
        sleep(Duration::from_millis(120)).await;
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn context_manual_cancel() {
        let ctx = Context::new();

        assert!(!ctx.is_cancelled());
        ctx.cancel();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn child_follows_parent_cancellation() {
        let root = Context::new();
        let child = root.child_context();

        root.cancel();
        tokio::time::timeout(Duration::from_secs(1), child.cancelled())
            .await
            .expect("child should observe cancellation");
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn cancelling_child_leaves_parent_running() {
        let root = Context::new();
        let child = root.child_context();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[tokio::test]
    async fn context_deadline() {
        let ctx = Context::new();
        assert!(ctx.deadline().is_none());

        let ctx_with_timeout = ctx.with_timeout(Duration::from_secs(1));
        assert!(ctx_with_timeout.deadline().is_some());
    }
}
