use std::fmt;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use spool_core::ConcurrencyPolicy;
use spool_queue::{AsyncQueue, QueueError};
use spool_task::{Runtime, TaskContext, TaskHandle};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, Instrument, Span};

use super::tracker::Tracker;
use super::PoolShared;
use crate::error::PoolError;

/// Everything the dispatcher task owns.
pub(super) struct Dispatcher<T, H> {
    pub queue: AsyncQueue<T>,
    pub handler: H,
    pub shared: Arc<PoolShared>,
    pub runtime: Runtime,
    pub policy: ConcurrencyPolicy,
    pub batch_size: usize,
    pub span: Span,
}

impl<T, H, Fut, E> Dispatcher<T, H>
where
    T: fmt::Debug + Send + 'static,
    H: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Take batches until the queue is closed and empty or the dispatcher
    /// is cancelled.
    pub async fn run(self, ctx: TaskContext) -> Result<(), PoolError> {
        let limiter = self
            .policy
            .ceiling()
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

        loop {
            let taken = tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                taken = self.take_batch() => taken,
            };
            let batch = match taken {
                Ok(batch) => batch,
                Err(QueueError::Closed) => {
                    debug!(pool = %self.shared.name, "queue closed and drained");
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            debug!(pool = %self.shared.name, items = batch.len(), "dispatching batch");

            let mut items = batch.into_iter();
            while let Some(item) = items.next() {
                let permit = match &limiter {
                    Some(semaphore) => match self.admit(&ctx, semaphore).await {
                        Some(permit) => Some(permit),
                        None => {
                            self.shared.drop_items(1 + items.len());
                            return Ok(());
                        }
                    },
                    None if ctx.is_cancelled() && !self.shared.is_draining() => {
                        self.shared.drop_items(1 + items.len());
                        return Ok(());
                    }
                    None => None,
                };
                let handle = self.spawn_item(item, permit);
                if self.policy == ConcurrencyPolicy::Sequential {
                    // Cancel mode interrupts the handler, so this cannot outlive shutdown.
                    let _ = handle.join().await;
                }
            }
        }
        Ok(())
    }

    /// Sequential pools take one item per round; the others take up to
    /// `batch_size`.
    async fn take_batch(&self) -> Result<Vec<T>, QueueError> {
        match self.policy {
            ConcurrencyPolicy::Sequential => self.queue.take().await.map(|item| vec![item]),
            _ => self.queue.take_up_to(1, self.batch_size).await,
        }
    }

    /// Wait for a free slot. Returns `None` when a cancelling shutdown
    /// arrives first.
    async fn admit(
        &self,
        ctx: &TaskContext,
        semaphore: &Arc<Semaphore>,
    ) -> Option<OwnedSemaphorePermit> {
        let acquire = Arc::clone(semaphore).acquire_owned();
        tokio::pin!(acquire);

        if !ctx.is_cancelled() {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {}
                permit = &mut acquire => return permit.ok(),
            }
        }
        if self.shared.is_draining() {
            acquire.await.ok()
        } else {
            None
        }
    }

    fn spawn_item(&self, item: T, permit: Option<OwnedSemaphorePermit>) -> TaskHandle<(), String> {
        let seq = self.shared.counters.dispatched.fetch_add(1, Ordering::Relaxed) + 1;
        let tracker = Tracker::begin(Arc::clone(&self.shared), format!("{item:?}"), permit);
        let work = (self.handler)(item);

        let body = async move {
            let mut tracker = tracker;
            let result = work.await.map_err(|e| e.to_string());
            tracker.finish(&result);
            result
        };
        self.runtime
            .task(format!("{}#{seq}", self.shared.name))
            .scope(&self.shared.handler_scope)
            .spawn(body.instrument(self.span.clone()))
    }
}
