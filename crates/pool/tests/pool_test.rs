//! End-to-end pool behaviour: every item processed once, concurrency
//! ceilings honoured.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use spool_pool::{ConcurrencyPolicy, PoolStats, WorkerPool, WorkerPoolBuilder};
use spool_queue::AsyncQueue;
use spool_task::Runtime;

/// Records how often each item was seen and the highest overlap observed
/// from inside the handlers themselves.
#[derive(Default)]
struct Observer {
    seen: Mutex<HashMap<u32, usize>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl Observer {
    async fn visit(&self, item: u32) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        *self.seen.lock().unwrap().entry(item).or_default() += 1;
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn run_pool(policy: ConcurrencyPolicy, items: u32) -> (Arc<Observer>, PoolStats) {
    let rt = Runtime::current();
    let queue = AsyncQueue::unbounded();
    queue.offer_all(0..=items).await.unwrap();
    queue.close();

    let observer = Arc::new(Observer::default());
    let handler_observer = observer.clone();
    let pool = WorkerPool::start(
        queue,
        move |item: u32| {
            let observer = handler_observer.clone();
            async move {
                observer.visit(item).await;
                Ok::<_, String>(())
            }
        },
        WorkerPoolBuilder::new("observer").policy(policy).build(),
        &rt,
    );

    let stats = tokio::time::timeout(Duration::from_secs(10), pool.await_all())
        .await
        .unwrap()
        .unwrap();
    (observer, stats)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bounded_pool_processes_each_item_once() {
    let (observer, stats) = run_pool(ConcurrencyPolicy::bounded(4), 100).await;

    let seen = observer.seen.lock().unwrap();
    assert_eq!(seen.len(), 101);
    assert!((0..=100).all(|n| seen.get(&n) == Some(&1)));
    assert_eq!(stats.dispatched, 101);
    assert_eq!(stats.succeeded, 101);
    assert!(observer.peak.load(Ordering::SeqCst) <= 4);
    assert!(stats.peak_in_flight <= 4);
    assert!(stats.peak_in_flight >= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unbounded_pool_exceeds_any_small_ceiling() {
    let (observer, stats) = run_pool(ConcurrencyPolicy::Unbounded, 100).await;

    assert_eq!(observer.seen.lock().unwrap().len(), 101);
    assert_eq!(stats.succeeded, 101);
    assert!(observer.peak.load(Ordering::SeqCst) > 4);
}

#[tokio::test]
async fn sequential_pool_never_overlaps() {
    let (observer, stats) = run_pool(ConcurrencyPolicy::Sequential, 20).await;

    assert_eq!(stats.succeeded, 21);
    assert_eq!(observer.peak.load(Ordering::SeqCst), 1);
    assert_eq!(stats.peak_in_flight, 1);
}

#[tokio::test]
async fn bounded_queue_back_pressure_feeds_pool() {
    let rt = Runtime::current();
    let queue = AsyncQueue::bounded(8);
    let processed = Arc::new(AtomicUsize::new(0));
    let counter = processed.clone();

    let pool = WorkerPool::start(
        queue.clone(),
        move |_item: u32| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            }
        },
        WorkerPoolBuilder::new("fed").batch_size(4).build(),
        &rt,
    );

    for item in 0..50u32 {
        queue.offer(item).await.unwrap();
    }
    queue.close();

    let stats = pool.await_all().await.unwrap();
    assert_eq!(stats.succeeded, 50);
    assert_eq!(processed.load(Ordering::SeqCst), 50);
}
