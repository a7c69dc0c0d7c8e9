//! Batch sink trait.

use std::sync::Arc;

use async_trait::async_trait;

/// Receives batches drained from a [`FlushBuffer`](crate::FlushBuffer).
///
/// Batches arrive in emission order and each item is delivered once.
/// Failures are the sink's own business: the buffer does not retry.
#[async_trait]
pub trait Sink<T: Send + 'static>: Send + Sync + 'static {
    /// Consume one non-empty batch.
    async fn write(&self, batch: Vec<T>);

    /// Called once after the final flush, when the buffer shuts down.
    async fn close(&self) {}
}

/// Blanket implementation so `Arc<S>` can be handed to a buffer while the
/// caller keeps a reference to the sink.
#[async_trait]
impl<T, S> Sink<T> for Arc<S>
where
    T: Send + 'static,
    S: Sink<T> + ?Sized,
{
    async fn write(&self, batch: Vec<T>) {
        (**self).write(batch).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}
