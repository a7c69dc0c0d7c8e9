//! Cancellation scopes.
//!
//! Every task runs inside a [`Scope`]. Cancelling a scope cancels all tasks
//! spawned in it and in its child scopes. A [`Scope::detached`] scope has no
//! parent: nothing but its own `cancel()` will ever stop it.

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

#[derive(Debug, Clone, Default)]
pub struct Scope {
    token: CancellationToken,
}

impl Scope {
    /// A fresh top-level scope.
    pub fn root() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// A top-level scope created on purpose to outlive (and ignore the
    /// cancellation of) whatever scope the caller is running in.
    pub fn detached() -> Self {
        Self::root()
    }

    /// A scope cancelled whenever `self` is. Cancelling the child does not
    /// affect the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the scope is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{Outcome, Task, TaskHandle};

    #[test]
    fn child_follows_parent() {
        let parent = Scope::root();
        let child = parent.child();
        let grandchild = child.child();
        parent.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn child_cancel_does_not_reach_parent() {
        let parent = Scope::root();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn detached_ignores_spawning_scope() {
        let spawning = Scope::root();
        let detached = Scope::detached();
        spawning.cancel();
        assert!(!detached.is_cancelled());
    }

    #[tokio::test]
    async fn detached_created_inside_task_survives_task_cancellation() {
        let parent = Scope::root();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle: TaskHandle<(), ()> = Task::builder("spawner")
            .scope(&parent)
            .spawn_cooperative(move |ctx| async move {
                let _ = tx.send((ctx.scope().child(), Scope::detached()));
                ctx.cancelled().await;
                Ok(())
            });

        let (inherited, detached) = rx.await.unwrap();
        parent.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(2), handle.join())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Cancelled);
        assert!(inherited.is_cancelled());
        assert!(!detached.is_cancelled());
    }
}
