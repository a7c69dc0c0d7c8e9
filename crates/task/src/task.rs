//! Cancellable tasks.
//!
//! A task is a tokio task wrapped with a [`Scope`] for cancellation, an
//! optional deadline, panic capture, and a [`Deferred`] that always receives
//! its terminal [`Outcome`].
//!
//! Two cancellation styles are supported:
//! - [`TaskBuilder::spawn`]: interruptible. On cancel or timeout the body is
//!   dropped at its current suspension point; drop guards registered by the
//!   body run before the outcome is published.
//! - [`TaskBuilder::spawn_cooperative`]: the body receives a [`TaskContext`]
//!   and is responsible for watching [`TaskContext::cancelled`] itself. Used
//!   by loops that must finish a unit of work before stopping.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::deferred::{Deferred, ResolveOnDrop};
use crate::outcome::Outcome;
use crate::scope::Scope;

// ── Identity ────────────────────────────────────────────────────────

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First block of the UUID is plenty for log correlation.
        let s = self.0.to_string();
        f.write_str(&s[..8])
    }
}

// ── Context ─────────────────────────────────────────────────────────

/// What a cooperative task body can see of its own task.
#[derive(Debug, Clone)]
pub struct TaskContext {
    id: TaskId,
    name: Arc<str>,
    scope: Scope,
}

impl TaskContext {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The task's own scope. Spawn children with `ctx.scope().child()` to
    /// have them cancelled together with this task.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn is_cancelled(&self) -> bool {
        self.scope.is_cancelled()
    }

    /// Resolves once cancellation of this task has been requested.
    pub async fn cancelled(&self) {
        self.scope.cancelled().await
    }
}

// ── Builder ─────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Mode {
    Interruptible,
    Cooperative,
}

/// Fluent builder for spawning a task.
///
/// # Example
/// ```ignore
/// let handle = TaskBuilder::new("sleeper")
///     .scope(&parent)
///     .timeout(Duration::from_millis(900))
///     .spawn(async {
///         spool_task::sleep(Duration::from_secs(1)).await;
///         Ok::<_, ()>(())
///     });
/// assert!(handle.join().await.is_cancelled());
/// ```
pub struct TaskBuilder {
    name: String,
    parent: Option<Scope>,
    timeout: Option<Duration>,
    handle: Option<Handle>,
}

impl TaskBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            timeout: None,
            handle: None,
        }
    }

    /// Run inside a child of `scope` (default: a fresh root scope).
    pub fn scope(mut self, scope: &Scope) -> Self {
        self.parent = Some(scope.clone());
        self
    }

    /// Cancel the task and report [`Outcome::TimedOut`] if it has not
    /// finished after `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Spawn onto this runtime instead of the ambient one. Required when
    /// spawning from a thread that is not inside a tokio runtime.
    pub fn handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Spawn an interruptible task.
    pub fn spawn<F, T, E>(self, future: F) -> TaskHandle<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        self.launch(Mode::Interruptible, |_| future)
    }

    /// Spawn a task whose body handles its own cancellation.
    ///
    /// If cancellation was requested by the time the body returns, the
    /// outcome is `Cancelled` (or `TimedOut`) regardless of what it returned.
    pub fn spawn_cooperative<B, F, T, E>(self, body: B) -> TaskHandle<T, E>
    where
        B: FnOnce(TaskContext) -> F,
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        self.launch(Mode::Cooperative, body)
    }

    fn launch<B, F, T, E>(self, mode: Mode, body: B) -> TaskHandle<T, E>
    where
        B: FnOnce(TaskContext) -> F,
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        let scope = match &self.parent {
            Some(parent) => parent.child(),
            None => Scope::root(),
        };
        let ctx = TaskContext {
            id: TaskId::new(),
            name: Arc::from(self.name),
            scope,
        };
        let deferred = Deferred::new();
        let future = body(ctx.clone());

        let driver = drive(ctx.clone(), mode, self.timeout, future, deferred.clone());
        match self.handle {
            Some(handle) => drop(handle.spawn(driver)),
            None => drop(tokio::spawn(driver)),
        }

        TaskHandle { ctx, deferred }
    }
}

/// Shorthand constructors.
pub struct Task;

impl Task {
    /// Spawn an interruptible task in a fresh root scope.
    pub fn spawn<F, T, E>(name: impl Into<String>, future: F) -> TaskHandle<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        TaskBuilder::new(name).spawn(future)
    }

    pub fn builder(name: impl Into<String>) -> TaskBuilder {
        TaskBuilder::new(name)
    }
}

// ── Driver ──────────────────────────────────────────────────────────

enum End<T, E> {
    Finished(Result<Result<T, E>, Box<dyn Any + Send>>),
    Cancelled,
    TimedOut(Duration),
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

async fn drive<F, T, E>(
    ctx: TaskContext,
    mode: Mode,
    timeout: Option<Duration>,
    future: F,
    deferred: Deferred<T, E>,
) where
    F: Future<Output = Result<T, E>> + Send + 'static,
{
    // Covers the runtime dropping this task before it publishes.
    let guard = ResolveOnDrop::new(deferred.clone());
    let mut body = Box::pin(AssertUnwindSafe(future).catch_unwind());
    let expired = deadline(timeout);
    tokio::pin!(expired);

    let end = match mode {
        Mode::Interruptible => tokio::select! {
            biased;
            _ = ctx.scope.cancelled() => End::Cancelled,
            _ = &mut expired => End::TimedOut(timeout.unwrap_or_default()),
            result = &mut body => End::Finished(result),
        },
        Mode::Cooperative => {
            let timed_out = tokio::select! {
                biased;
                result = &mut body => Err(result),
                _ = &mut expired => Ok(()),
            };
            match timed_out {
                Err(result) if !ctx.is_cancelled() => End::Finished(result),
                Err(_) => End::Cancelled,
                Ok(()) => {
                    ctx.scope.cancel();
                    let _ = (&mut body).await;
                    End::TimedOut(timeout.unwrap_or_default())
                }
            }
        }
    };
    // Release whatever the body was holding before the outcome is visible.
    drop(body);

    let outcome = match end {
        End::Finished(Ok(result)) => Outcome::from(result),
        End::Finished(Err(panic)) => Outcome::Panicked(panic_message(panic.as_ref())),
        End::Cancelled => Outcome::Cancelled,
        End::TimedOut(d) => Outcome::TimedOut(d),
    };

    match &outcome {
        Outcome::Succeeded(_) => debug!(task = %ctx.name, id = %ctx.id, "task succeeded"),
        Outcome::Failed(_) => debug!(task = %ctx.name, id = %ctx.id, "task failed"),
        Outcome::Cancelled => info!(task = %ctx.name, id = %ctx.id, "task interrupted"),
        Outcome::TimedOut(d) => warn!(task = %ctx.name, id = %ctx.id, timeout = ?d, "task timed out"),
        Outcome::Panicked(msg) => error!(task = %ctx.name, id = %ctx.id, panic = %msg, "task panicked"),
    }

    guard.disarm();
    deferred.complete(outcome);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ── Handle ──────────────────────────────────────────────────────────

/// Handle to a spawned task: cancel it, poll it, or wait for its outcome.
///
/// Dropping the handle does not cancel the task.
pub struct TaskHandle<T, E> {
    ctx: TaskContext,
    deferred: Deferred<T, E>,
}

impl<T, E> Clone for TaskHandle<T, E> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            deferred: self.deferred.clone(),
        }
    }
}

impl<T, E> TaskHandle<T, E> {
    pub fn id(&self) -> TaskId {
        self.ctx.id
    }

    pub fn name(&self) -> &str {
        &self.ctx.name
    }

    /// Request cancellation. No-op once the task has finished.
    pub fn cancel(&self) {
        self.ctx.scope.cancel();
    }

    pub fn is_done(&self) -> bool {
        self.deferred.is_resolved()
    }

    /// The deferred the task publishes its outcome into.
    pub fn deferred(&self) -> &Deferred<T, E> {
        &self.deferred
    }
}

impl<T: Clone, E: Clone> TaskHandle<T, E> {
    /// Wait for the task's terminal outcome.
    pub async fn join(&self) -> Outcome<T, E> {
        self.deferred.wait().await
    }

    /// Wait at most `timeout`; on expiry cancel the task, wait for it to
    /// unwind, and report [`Outcome::TimedOut`].
    pub async fn join_timeout(&self, timeout: Duration) -> Outcome<T, E> {
        match tokio::time::timeout(timeout, self.deferred.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.cancel();
                let _ = self.deferred.wait().await;
                Outcome::TimedOut(timeout)
            }
        }
    }
}

impl<T, E> fmt::Debug for TaskHandle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.ctx.id)
            .field("name", &self.ctx.name)
            .field("done", &self.is_done())
            .finish()
    }
}
