//! Cancellation and deferred-resolution scenarios across tasks.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::Rng;

use spool_task::{sleep, yield_now, Deferred, Outcome, Task, TaskBuilder, TaskHandle};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Captures formatted log output for assertions.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

#[tokio::test]
async fn forked_sleep_is_cut_short_by_timeout() {
    let (logs, _guard) = capture_logs();
    let start = Instant::now();

    let sleeper: TaskHandle<(), ()> = TaskBuilder::new("sleep")
        .timeout(Duration::from_millis(900))
        .spawn(async {
            sleep(Duration::from_millis(1_000)).await;
            Ok(())
        });
    yield_now().await;

    // The parent resumes straight away.
    assert!(start.elapsed() < Duration::from_millis(500));
    assert!(!sleeper.is_done());

    let outcome = tokio::time::timeout(TIMEOUT, sleeper.join()).await.unwrap();
    let elapsed = start.elapsed();
    assert_eq!(outcome, Outcome::TimedOut(Duration::from_millis(900)));
    assert!(elapsed >= Duration::from_millis(900));
    assert!(elapsed < Duration::from_millis(1_000), "waited {elapsed:?}");

    let output = logs.contents();
    let released = output
        .find("sleep interrupted, timer released")
        .expect("timer cleanup should be logged");
    let timed_out = output.find("task timed out").expect("timeout should be logged");
    assert!(released < timed_out, "cleanup must run before the outcome: {output}");
}

#[tokio::test]
async fn cancelled_resolver_never_leaves_waiters_hanging() {
    let deferred: Deferred<u32, String> = Deferred::new();

    let resolver = {
        let deferred = deferred.clone();
        Task::spawn("resolver", async move {
            deferred
                .complete_from(async {
                    sleep(Duration::from_secs(60)).await;
                    Ok(7)
                })
                .await;
            Ok::<_, String>(())
        })
    };

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let deferred = deferred.clone();
            tokio::spawn(async move { deferred.wait().await })
        })
        .collect();

    yield_now().await;
    resolver.cancel();

    for waiter in waiters {
        let outcome = tokio::time::timeout(TIMEOUT, waiter).await.unwrap().unwrap();
        assert_eq!(outcome, Outcome::Cancelled);
    }
    assert_eq!(resolver.join().await, Outcome::Cancelled);
}

#[tokio::test]
async fn randomized_resolver_releases_awaiter_with_first_outcome() {
    for _ in 0..20 {
        let deferred: Deferred<f64, String> = Deferred::new();
        {
            let deferred = deferred.clone();
            Task::spawn("maybe-fail", async move {
                deferred
                    .complete_from(async {
                        let n: f64 = rand::thread_rng().gen();
                        if n > 0.5 {
                            Ok(n)
                        } else {
                            Err(format!("Failed with {n}"))
                        }
                    })
                    .await;
                Ok::<_, ()>(())
            });
        }

        let outcome = tokio::time::timeout(TIMEOUT, deferred.wait()).await.unwrap();
        match &outcome {
            Outcome::Succeeded(n) => assert!(*n > 0.5),
            Outcome::Failed(msg) => assert!(msg.starts_with("Failed with")),
            other => panic!("unexpected outcome {other:?}"),
        }
        // A second read observes the same value.
        assert_eq!(deferred.wait().await, outcome);
    }
}

#[tokio::test]
async fn task_handle_deferred_is_shared_with_consumers() {
    let handle = Task::spawn("compute", async {
        sleep(Duration::from_millis(10)).await;
        Ok::<_, String>(5)
    });
    let consumer = {
        let deferred = handle.deferred().clone();
        tokio::spawn(async move { deferred.wait().await })
    };
    assert_eq!(handle.join().await, Outcome::Succeeded(5));
    assert_eq!(consumer.await.unwrap(), Outcome::Succeeded(5));
}
