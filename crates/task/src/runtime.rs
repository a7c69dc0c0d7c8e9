//! Explicit execution context.
//!
//! A [`Runtime`] pairs a tokio runtime handle with the [`Scope`] that tasks
//! started through it belong to. Components that spawn work take a
//! `&Runtime` instead of reaching for ambient state, which also lets
//! synchronous callbacks (a logging hook, a request handler) start tasks.

use std::future::Future;

use tokio::runtime::Handle;

use crate::outcome::Outcome;
use crate::scope::Scope;
use crate::task::{TaskBuilder, TaskHandle};

#[derive(Debug, Clone)]
pub struct Runtime {
    handle: Handle,
    scope: Scope,
}

impl Runtime {
    pub fn new(handle: Handle, scope: Scope) -> Self {
        Self { handle, scope }
    }

    /// Capture the ambient tokio runtime with a fresh root scope.
    ///
    /// Panics when called outside a tokio runtime, like `Handle::current`.
    pub fn current() -> Self {
        Self::new(Handle::current(), Scope::root())
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// A runtime on the same tokio handle whose scope is a child of this one.
    pub fn child(&self) -> Self {
        Self::new(self.handle.clone(), self.scope.child())
    }

    /// Builder preconfigured with this runtime's handle and scope.
    pub fn task(&self, name: impl Into<String>) -> TaskBuilder {
        TaskBuilder::new(name)
            .handle(self.handle.clone())
            .scope(&self.scope)
    }

    /// Fire-and-forget: start `future` and return its handle immediately.
    /// Safe to call from synchronous code.
    pub fn run_fork<F, T, E>(&self, name: impl Into<String>, future: F) -> TaskHandle<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        self.task(name).spawn(future)
    }

    /// Start `future` and wait for its outcome.
    pub async fn run_promise<F, T, E>(&self, name: impl Into<String>, future: F) -> Outcome<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        self.run_fork(name, future).join().await
    }

    /// Cancel every task started through this runtime (and its children).
    pub fn shutdown(&self) {
        self.scope.cancel();
    }
}
