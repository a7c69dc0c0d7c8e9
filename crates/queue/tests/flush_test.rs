//! Integration tests for the scheduled flush buffer.
//!
//! Verify ordering and exactly-once delivery across scheduled and final
//! flushes, shutdown via `close` and via drop, and independence from the
//! starting scope's cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use spool_queue::{AsyncQueue, FlushBuffer, QueueError, Sink, MIN_WINDOW};
use spool_task::Runtime;

const TIMEOUT: Duration = Duration::from_secs(5);
const WINDOW: Duration = Duration::from_millis(40);

/// Sink that records every batch it receives.
#[derive(Default)]
struct RecordingSink {
    batches: Mutex<Vec<Vec<u32>>>,
    closed: AtomicBool,
}

impl RecordingSink {
    fn batches(&self) -> Vec<Vec<u32>> {
        self.batches.lock().unwrap().clone()
    }

    fn flattened(&self) -> Vec<u32> {
        self.batches().into_iter().flatten().collect()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink<u32> for RecordingSink {
    async fn write(&self, batch: Vec<u32>) {
        self.batches.lock().unwrap().push(batch);
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(TIMEOUT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn close_delivers_everything_in_order() {
    let sink = Arc::new(RecordingSink::default());
    let buffer: FlushBuffer<u32> = FlushBuffer::start(Duration::from_secs(60), sink.clone(), &Runtime::current());

    for i in 0..50 {
        buffer.emit(i).unwrap();
    }
    assert_eq!(buffer.pending(), 50);

    let stats = tokio::time::timeout(TIMEOUT, buffer.close()).await.unwrap();

    // Window never elapsed: a single final flush carries everything.
    assert_eq!(sink.batches(), vec![(0..50).collect::<Vec<_>>()]);
    assert_eq!(stats.flushes, 1);
    assert_eq!(stats.items, 50);
    assert!(sink.is_closed());
}

#[tokio::test]
async fn scheduled_flushes_then_final_flush() {
    let sink = Arc::new(RecordingSink::default());
    let buffer: FlushBuffer<u32> = FlushBuffer::start(WINDOW, sink.clone(), &Runtime::current());

    for i in 0..10 {
        buffer.emit(i).unwrap();
    }
    wait_until(|| sink.flattened().len() == 10).await;
    wait_until(|| buffer.flush_count() >= 1).await;
    assert!(!sink.is_closed());

    for i in 10..25 {
        buffer.emit(i).unwrap();
    }
    let stats = buffer.close().await;

    assert_eq!(sink.flattened(), (0..25).collect::<Vec<_>>());
    assert!(stats.flushes >= 2);
    assert_eq!(stats.items, 25);
    assert!(stats.last_flush.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_emitters_each_delivered_once() {
    let sink = Arc::new(RecordingSink::default());
    let buffer = Arc::new(FlushBuffer::<u32>::start(
        Duration::from_millis(5),
        sink.clone(),
        &Runtime::current(),
    ));

    let emitters: Vec<_> = (0..4u32)
        .map(|p| {
            let buffer = buffer.clone();
            tokio::spawn(async move {
                for i in 0..100u32 {
                    buffer.emit(p * 1_000 + i).unwrap();
                    if i % 10 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        })
        .collect();
    for e in emitters {
        e.await.unwrap();
    }

    let buffer = Arc::try_unwrap(buffer).ok().expect("emitters released the buffer");
    buffer.close().await;

    let delivered = sink.flattened();
    assert_eq!(delivered.len(), 400);
    for p in 0..4u32 {
        let seq: Vec<u32> = delivered.iter().copied().filter(|v| v / 1_000 == p).collect();
        assert_eq!(seq, (0..100).map(|i| p * 1_000 + i).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn dropping_the_buffer_still_flushes() {
    let sink = Arc::new(RecordingSink::default());
    {
        let buffer: FlushBuffer<u32> = FlushBuffer::start(Duration::from_secs(60), sink.clone(), &Runtime::current());
        buffer.emit(1).unwrap();
        buffer.emit(2).unwrap();
    }
    wait_until(|| sink.is_closed()).await;
    assert_eq!(sink.batches(), vec![vec![1, 2]]);
}

#[tokio::test]
async fn starter_scope_cancellation_does_not_stop_delivery() {
    let sink = Arc::new(RecordingSink::default());
    let starter = Runtime::current().child();
    let buffer: FlushBuffer<u32> = FlushBuffer::start(WINDOW, sink.clone(), &starter);

    starter.shutdown();

    buffer.emit(7).unwrap();
    wait_until(|| sink.flattened() == vec![7]).await;
    assert!(!sink.is_closed());
    buffer.close().await;
    assert!(sink.is_closed());
}

#[tokio::test]
async fn bounded_buffer_reports_full() {
    let sink = Arc::new(RecordingSink::default());
    let buffer: FlushBuffer<u32> = FlushBuffer::with_queue(
        AsyncQueue::bounded(2),
        Duration::from_secs(60),
        sink.clone(),
        &Runtime::current(),
    );
    buffer.emit(1).unwrap();
    buffer.emit(2).unwrap();
    assert_eq!(buffer.emit(3), Err(QueueError::Full));

    buffer.close().await;
    assert_eq!(sink.flattened(), vec![1, 2]);
}

#[tokio::test]
async fn empty_buffer_never_writes() {
    let sink = Arc::new(RecordingSink::default());
    let buffer: FlushBuffer<u32> = FlushBuffer::start(Duration::from_millis(5), sink.clone(), &Runtime::current());
    tokio::time::sleep(Duration::from_millis(30)).await;
    let stats = buffer.close().await;
    assert!(sink.batches().is_empty());
    assert_eq!(stats.flushes, 0);
    assert!(sink.is_closed());
}

#[tokio::test]
async fn zero_window_is_raised_and_still_delivers() {
    let sink = Arc::new(RecordingSink::default());
    let buffer: FlushBuffer<u32> = FlushBuffer::start(Duration::ZERO, sink.clone(), &Runtime::current());
    assert_eq!(buffer.window(), MIN_WINDOW);

    buffer.emit(1).unwrap();
    wait_until(|| sink.flattened() == vec![1]).await;
    buffer.emit(2).unwrap();

    let stats = tokio::time::timeout(TIMEOUT, buffer.close()).await.unwrap();
    assert_eq!(sink.flattened(), vec![1, 2]);
    assert_eq!(stats.items, 2);
    assert!(sink.is_closed());
}

/// Sink whose first write panics.
struct PanickingSink;

#[async_trait]
impl Sink<u32> for PanickingSink {
    async fn write(&self, _batch: Vec<u32>) {
        panic!("sink exploded");
    }
}

#[tokio::test]
async fn dead_timer_closes_the_queue() {
    let queue = AsyncQueue::unbounded();
    let buffer: FlushBuffer<u32> =
        FlushBuffer::with_queue(queue.clone(), Duration::from_millis(10), PanickingSink, &Runtime::current());

    buffer.emit(1).unwrap();
    wait_until(|| queue.is_closed()).await;
    assert_eq!(buffer.emit(2), Err(QueueError::Closed));

    let stats = tokio::time::timeout(TIMEOUT, buffer.close()).await.unwrap();
    assert_eq!(stats.flushes, 0);
}
