use std::convert::Infallible;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use spool_core::{ConcurrencyPolicy, SpoolConfig};
use spool_pool::{PoolConfig, PoolStats, WorkerPool, WorkerPoolBuilder};
use spool_queue::{AsyncQueue, QueueError};
use spool_task::{sleep, yield_now, Deferred, Outcome, Runtime};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::batched_log::{BatchedLogLayer, StdoutSink};
use crate::cli::{BatchedLogArgs, DistributeArgs, SleepArgs};

// ── sleep ────────────────────────────────────────────────────────────

/// Fork a sleep with a timeout shorter than the sleep itself.
pub async fn sleep_demo(args: SleepArgs) -> Result<()> {
    let rt = Runtime::current();
    let millis = args.millis;
    let timeout = Duration::from_millis(args.timeout_ms.unwrap_or(millis.saturating_sub(100)));

    info!(millis, "sleeping for {millis} milliseconds...");
    let handle = rt.task("sleeper").timeout(timeout).spawn(async move {
        sleep(Duration::from_millis(millis)).await;
        Ok::<_, Infallible>(())
    });
    yield_now().await;
    info!("resuming execution");

    let outcome = handle.join().await;
    info!(outcome = outcome.kind(), "forked sleep finished");
    Ok(())
}

// ── deferred ─────────────────────────────────────────────────────────

async fn maybe_fail() -> Result<f64, String> {
    let n: f64 = rand::random();
    if n > 0.5 {
        Ok(n)
    } else {
        Err(format!("failed with {n}"))
    }
}

/// Hand the result of a forked computation to the parent through a deferred.
pub async fn deferred_demo() -> Result<()> {
    let rt = Runtime::current();
    let deferred: Deferred<f64, String> = Deferred::new();

    let resolver = deferred.clone();
    let _ = rt.run_fork("maybe-fail", async move {
        resolver.complete_from(maybe_fail()).await;
        Ok::<_, Infallible>(())
    });

    match deferred.wait().await {
        Outcome::Succeeded(n) => println!("{n}"),
        Outcome::Failed(e) => error!(error = %e, "computation failed"),
        other => warn!(outcome = other.kind(), "computation did not complete"),
    }
    Ok(())
}

// ── distribute ───────────────────────────────────────────────────────

fn selected_policies(selector: &str, config: &SpoolConfig) -> Result<Vec<ConcurrencyPolicy>> {
    let default_limit = match config.pool.policy {
        ConcurrencyPolicy::Bounded { limit } => limit,
        _ => 4,
    };
    if selector == "all" {
        return Ok(vec![
            ConcurrencyPolicy::Sequential,
            ConcurrencyPolicy::Unbounded,
            ConcurrencyPolicy::bounded(default_limit),
        ]);
    }
    match ConcurrencyPolicy::parse(selector, default_limit) {
        Some(policy) => Ok(vec![policy]),
        None => bail!("unknown policy '{selector}' (expected all, sequential, unbounded, bounded or bounded:N)"),
    }
}

async fn do_some_work(value: u32, work: Duration) -> Result<(), Infallible> {
    sleep(work).await;
    info!(value, "consuming value '{value}'");
    Ok(())
}

/// Offer 0..=100 every `every` for `rounds` rounds, then close the queue.
async fn produce(queue: AsyncQueue<u32>, rounds: u32, every: Duration) -> Result<(), QueueError> {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    for round in 1..=rounds {
        ticker.tick().await;
        match queue.offer_all(0..=100).await {
            Err(QueueError::BatchTooLarge { .. }) => {
                for value in 0..=100 {
                    queue.offer(value).await?;
                }
            }
            other => other?,
        }
        info!(round, queued = queue.size(), "offered values 0..=100");
    }
    queue.close();
    Ok(())
}

/// Drain one shared queue with one pool per selected policy.
pub async fn distribute_demo(args: DistributeArgs, config: &SpoolConfig) -> Result<()> {
    let rt = Runtime::current();
    let policies = selected_policies(&args.policy, config)?;
    let queue = AsyncQueue::with_capacity(config.queue.capacity);
    let work = Duration::from_millis(args.work_ms);

    let producer = rt.run_fork(
        "producer",
        produce(queue.clone(), args.rounds, Duration::from_millis(args.every_ms)),
    );

    let pools: Vec<WorkerPool> = policies
        .into_iter()
        .map(|policy| {
            let pool_config = PoolConfig {
                name: policy.label().to_string(),
                policy,
                ..PoolConfig::from_settings("distribute", &config.pool)
            };
            WorkerPool::start(queue.clone(), move |value| do_some_work(value, work), pool_config, &rt)
        })
        .collect();

    if let Outcome::Failed(e) = producer.join().await {
        error!(error = %e, "producer stopped early");
        queue.close();
    }

    let mut summary = Vec::with_capacity(pools.len());
    for pool in &pools {
        let stats: PoolStats = pool
            .await_all()
            .await
            .with_context(|| format!("pool '{}' failed", pool.name()))?;
        summary.push(serde_json::json!({ "pool": pool.name(), "stats": stats }));
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

// ── batched-log ──────────────────────────────────────────────────────

/// Install [`BatchedLogLayer`] as the only log output and log on a schedule.
pub async fn batched_log_demo(args: BatchedLogArgs, config: &SpoolConfig) -> Result<()> {
    let rt = Runtime::current();
    let window = args
        .window_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.flush.window());

    let (layer, guard) = BatchedLogLayer::new(window, StdoutSink, &rt);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(layer)
        .try_init()
        .context("failed to install batched logger")?;

    let mut ticker = tokio::time::interval(Duration::from_millis(args.every_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    for _ in 0..=args.recurs {
        ticker.tick().await;
        println!("Running logs!");
        info!("Info log");
        warn!("Warning log");
        error!("Error log");
    }

    let stats = guard.finish().await;
    println!("delivered {} entries in {} batches", stats.items, stats.flushes);
    Ok(())
}
