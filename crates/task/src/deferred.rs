//! Single-assignment deferred value.
//!
//! A [`Deferred`] starts empty and is resolved exactly once, by whichever
//! writer gets there first. Any number of readers can [`wait`](Deferred::wait)
//! on it; all of them are released by the single resolution and observe the
//! same [`Outcome`]. Later writes are ignored.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::outcome::Outcome;

/// A write-once, read-many cell carrying a task's [`Outcome`].
pub struct Deferred<T, E> {
    slot: Arc<watch::Sender<Option<Outcome<T, E>>>>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T, E> Default for Deferred<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Deferred<T, E> {
    /// Create an empty deferred.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { slot: Arc::new(tx) }
    }

    /// Resolve with `outcome` if still empty.
    ///
    /// Returns `true` iff this call performed the resolution.
    pub fn complete(&self, outcome: Outcome<T, E>) -> bool {
        self.slot.send_if_modified(move |current| {
            if current.is_some() {
                return false;
            }
            *current = Some(outcome);
            true
        })
    }

    pub fn succeed(&self, value: T) -> bool {
        self.complete(Outcome::Succeeded(value))
    }

    pub fn fail(&self, error: E) -> bool {
        self.complete(Outcome::Failed(error))
    }

    /// Resolve as [`Outcome::Cancelled`], releasing every waiter.
    pub fn interrupt(&self) -> bool {
        self.complete(Outcome::Cancelled)
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Run `future` and resolve with its result.
    ///
    /// If the returned future is dropped before `future` finishes (the
    /// owning task was cancelled), the deferred is resolved with
    /// [`Outcome::Cancelled`] so no waiter is left hanging. Returns `true`
    /// iff this call performed the resolution.
    pub async fn complete_from<F>(&self, future: F) -> bool
    where
        F: Future<Output = Result<T, E>>,
    {
        let guard = ResolveOnDrop::new(self.clone());
        let result = future.await;
        guard.disarm();
        self.complete(result.into())
    }
}

impl<T: Clone, E: Clone> Deferred<T, E> {
    /// Current outcome, without waiting.
    pub fn try_get(&self) -> Option<Outcome<T, E>> {
        self.slot.borrow().clone()
    }

    /// Suspend until resolved and return the outcome.
    ///
    /// Returns immediately when already resolved.
    pub async fn wait(&self) -> Outcome<T, E> {
        let mut rx = self.slot.subscribe();
        loop {
            if let Some(outcome) = rx.borrow_and_update().as_ref() {
                return outcome.clone();
            }
            // The sender lives in `self.slot`, so this only fails if the
            // channel is torn down underneath us.
            if rx.changed().await.is_err() {
                return Outcome::Cancelled;
            }
        }
    }
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Resolves the deferred as interrupted (or panicked) unless disarmed.
pub(crate) struct ResolveOnDrop<T, E> {
    deferred: Option<Deferred<T, E>>,
}

impl<T, E> ResolveOnDrop<T, E> {
    pub(crate) fn new(deferred: Deferred<T, E>) -> Self {
        Self {
            deferred: Some(deferred),
        }
    }

    pub(crate) fn disarm(mut self) {
        self.deferred = None;
    }
}

impl<T, E> Drop for ResolveOnDrop<T, E> {
    fn drop(&mut self) {
        let Some(deferred) = self.deferred.take() else {
            return;
        };
        if std::thread::panicking() {
            deferred.complete(Outcome::Panicked("resolver panicked".into()));
        } else if deferred.interrupt() {
            debug!("resolver dropped before completion, deferred interrupted");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn first_write_wins() {
        let d: Deferred<u32, String> = Deferred::new();
        assert!(!d.is_resolved());
        assert!(d.succeed(1));
        assert!(!d.succeed(2));
        assert!(!d.fail("late".into()));
        assert!(!d.interrupt());
        assert_eq!(d.wait().await, Outcome::Succeeded(1));
        assert_eq!(d.try_get(), Some(Outcome::Succeeded(1)));
    }

    #[tokio::test]
    async fn all_waiters_released_by_one_resolution() {
        let d: Deferred<&'static str, ()> = Deferred::new();
        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let d = d.clone();
                tokio::spawn(async move { d.wait().await })
            })
            .collect();

        tokio::task::yield_now().await;
        d.succeed("done");

        for w in waiters {
            let outcome = tokio::time::timeout(TIMEOUT, w).await.unwrap().unwrap();
            assert_eq!(outcome, Outcome::Succeeded("done"));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_agree_on_one_value() {
        for _ in 0..50 {
            let d: Deferred<usize, usize> = Deferred::new();
            let writers: Vec<_> = (0..6)
                .map(|i| {
                    let d = d.clone();
                    tokio::spawn(async move {
                        let won = if i % 2 == 0 { d.succeed(i) } else { d.fail(i) };
                        won.then_some(i)
                    })
                })
                .collect();

            let mut winners = Vec::new();
            for w in writers {
                if let Some(i) = w.await.unwrap() {
                    winners.push(i);
                }
            }
            assert_eq!(winners.len(), 1);
            let winner = winners[0];
            let expected = if winner % 2 == 0 {
                Outcome::Succeeded(winner)
            } else {
                Outcome::Failed(winner)
            };
            assert_eq!(d.wait().await, expected);
        }
    }

    #[tokio::test]
    async fn complete_from_resolves_with_result() {
        let d: Deferred<u8, String> = Deferred::new();
        assert!(d.complete_from(async { Err("bad".to_string()) }).await);
        assert_eq!(d.wait().await, Outcome::Failed("bad".into()));
    }

    #[tokio::test]
    async fn dropped_resolver_interrupts_waiters() {
        let d: Deferred<u8, String> = Deferred::new();
        let resolver = {
            let d = d.clone();
            tokio::spawn(async move {
                d.complete_from(async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(1)
                })
                .await
            })
        };

        tokio::task::yield_now().await;
        resolver.abort();

        let outcome = tokio::time::timeout(TIMEOUT, d.wait()).await.unwrap();
        assert_eq!(outcome, Outcome::Cancelled);
    }
}
