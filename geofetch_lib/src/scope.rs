//! Explicit cancellation scopes.
//!
//! A [`Scope`] stands for the lifetime of whatever asked for a value. Work
//! started on its behalf checks the scope before touching shared state and
//! drops its result once the scope has ended.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable cancellation handle. All clones observe the same state.
#[derive(Clone, Debug)]
pub struct Scope {
    state: Arc<watch::Sender<bool>>,
}

impl Scope {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Ends the scope. Idempotent.
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Completes once the scope has been cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Returns a guard that cancels the scope when dropped.
    pub fn guard(&self) -> ScopeGuard {
        ScopeGuard {
            scope: self.clone(),
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancels its [`Scope`] on drop, tying the scope to a Rust lifetime.
#[derive(Debug)]
pub struct ScopeGuard {
    scope: Scope,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_wakes_waiters() {
        let scope = Scope::new();
        let waiter = {
            let scope = scope.clone();
            tokio::spawn(async move { scope.cancelled().await })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        scope.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(scope.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_returns_immediately_when_already_cancelled() {
        let scope = Scope::new();
        scope.cancel();
        scope.cancel();
        tokio::time::timeout(Duration::from_millis(10), scope.cancelled())
            .await
            .unwrap();
    }

    #[test]
    fn guard_cancels_on_drop() {
        let scope = Scope::new();
        {
            let _guard = scope.guard();
            assert!(!scope.is_cancelled());
        }
        assert!(scope.is_cancelled());
    }
}
