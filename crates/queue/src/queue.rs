//! Async FIFO queue with optional capacity.
//!
//! All mutation happens under one internal lock, so producers and consumers
//! never need external synchronisation. Waiting is notification based: a
//! blocked `take` or `offer` registers interest before re-checking the
//! buffer and sleeps until the other side changes it, with no polling.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::error::QueueError;

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    capacity: Option<usize>,
    /// Signalled when items are added or the queue closes.
    readable: Notify,
    /// Signalled when items are removed or the queue closes.
    writable: Notify,
}

/// Cloneable handle to a shared FIFO queue.
///
/// Items are delivered in enqueue order and each to exactly one taker.
pub struct AsyncQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for AsyncQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> AsyncQueue<T> {
    /// Queue with no capacity limit; `offer` never waits.
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Queue holding at most `capacity` items; `offer` waits when full.
    ///
    /// A capacity of zero is treated as one.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity.max(1)))
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    items: VecDeque::new(),
                    closed: false,
                }),
                capacity,
                readable: Notify::new(),
                writable: Notify::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn has_room(&self, state: &State<T>, n: usize) -> bool {
        match self.shared.capacity {
            Some(cap) => state.items.len() + n <= cap,
            None => true,
        }
    }

    // ── Producers ───────────────────────────────────────────────────

    /// Append one item, waiting while a bounded queue is full.
    pub async fn offer(&self, item: T) -> Result<(), QueueError> {
        loop {
            let writable = self.shared.writable.notified();
            tokio::pin!(writable);
            writable.as_mut().enable();
            {
                let mut state = self.lock();
                if state.closed {
                    return Err(QueueError::Closed);
                }
                if self.has_room(&state, 1) {
                    state.items.push_back(item);
                    drop(state);
                    self.shared.readable.notify_waiters();
                    return Ok(());
                }
            }
            writable.await;
        }
    }

    /// Append one item without waiting.
    pub fn try_offer(&self, item: T) -> Result<(), QueueError> {
        let mut state = self.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }
        if !self.has_room(&state, 1) {
            return Err(QueueError::Full);
        }
        state.items.push_back(item);
        drop(state);
        self.shared.readable.notify_waiters();
        Ok(())
    }

    /// Append all `items` as one contiguous run, in order.
    ///
    /// On a bounded queue this waits until the whole batch fits; a batch
    /// larger than the capacity is rejected with `BatchTooLarge`.
    pub async fn offer_all(&self, items: impl IntoIterator<Item = T>) -> Result<(), QueueError> {
        let items: Vec<T> = items.into_iter().collect();
        if items.is_empty() {
            return if self.is_closed() {
                Err(QueueError::Closed)
            } else {
                Ok(())
            };
        }
        if let Some(capacity) = self.shared.capacity {
            if items.len() > capacity {
                return Err(QueueError::BatchTooLarge {
                    len: items.len(),
                    capacity,
                });
            }
        }

        loop {
            let writable = self.shared.writable.notified();
            tokio::pin!(writable);
            writable.as_mut().enable();
            {
                let mut state = self.lock();
                if state.closed {
                    return Err(QueueError::Closed);
                }
                if self.has_room(&state, items.len()) {
                    state.items.extend(items);
                    drop(state);
                    self.shared.readable.notify_waiters();
                    return Ok(());
                }
            }
            writable.await;
        }
    }

    // ── Consumers ───────────────────────────────────────────────────

    /// Remove the oldest item, waiting while the queue is empty.
    ///
    /// After `close`, remaining items are still handed out; once the
    /// buffer is empty this returns `Closed`.
    pub async fn take(&self) -> Result<T, QueueError> {
        loop {
            let readable = self.shared.readable.notified();
            tokio::pin!(readable);
            readable.as_mut().enable();
            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    drop(state);
                    self.shared.writable.notify_waiters();
                    return Ok(item);
                }
                if state.closed {
                    return Err(QueueError::Closed);
                }
            }
            readable.await;
        }
    }

    /// Wait until at least `min` items are buffered, then remove up to
    /// `max` of them without further waiting.
    ///
    /// `min` is raised to 1, so an open queue never yields an empty batch.
    /// After `close`, whatever is buffered (up to `max`) is returned even
    /// if fewer than `min`; an empty closed queue returns `Closed`.
    ///
    /// `InvalidRange` when `max` is zero, `min > max`, or `min` exceeds the
    /// capacity of a bounded queue (it could never be reached).
    pub async fn take_up_to(&self, min: usize, max: usize) -> Result<Vec<T>, QueueError> {
        let unreachable = self.capacity().is_some_and(|capacity| min > capacity);
        if max == 0 || min > max || unreachable {
            return Err(QueueError::InvalidRange { min, max });
        }
        let min = min.max(1);

        loop {
            let readable = self.shared.readable.notified();
            tokio::pin!(readable);
            readable.as_mut().enable();
            {
                let mut state = self.lock();
                let available = state.items.len();
                if available >= min || (state.closed && available > 0) {
                    let n = available.min(max);
                    let batch: Vec<T> = state.items.drain(..n).collect();
                    drop(state);
                    self.shared.writable.notify_waiters();
                    return Ok(batch);
                }
                if state.closed {
                    return Err(QueueError::Closed);
                }
            }
            readable.await;
        }
    }

    /// Remove everything currently buffered without waiting. May be empty.
    pub fn take_all(&self) -> Vec<T> {
        let mut state = self.lock();
        let batch: Vec<T> = state.items.drain(..).collect();
        drop(state);
        if !batch.is_empty() {
            self.shared.writable.notify_waiters();
        }
        batch
    }

    // ── Lifecycle & introspection ───────────────────────────────────

    /// Stop accepting items and wake every waiter.
    ///
    /// Blocked offers fail with `Closed`; takers drain what is left.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        drop(state);
        self.shared.readable.notify_waiters();
        self.shared.writable.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of buffered items.
    pub fn size(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Capacity limit, `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.shared.capacity
    }
}

impl<T> fmt::Debug for AsyncQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("AsyncQueue")
            .field("len", &state.items.len())
            .field("capacity", &self.shared.capacity)
            .field("closed", &state.closed)
            .finish()
    }
}
