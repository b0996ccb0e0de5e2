//! Runtime handle injected into every computation
//!
//! [`GraphRuntime`] is cheap to clone: it shares the caller's context and the
//! engine's [`RunControl`] by reference. Control is cooperative only; nothing
//! here can interrupt a computation that is already in flight.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Status passed to [`GraphRuntime::exit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    Error = 1,
}

impl ExitStatus {
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

/// An interrupt record
///
/// The engine appends these to its interrupt table and never drains it;
/// callers poll the table through [`Engine::interrupts`](super::engine::Engine::interrupts).
#[derive(Clone)]
pub struct Interrupt {
    /// Interrupt type
    pub kind: String,
    pub data: Option<Value>,
    pub priority: i32,
    pub enabled: bool,
    pub handler: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl Interrupt {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: None,
            priority: 0,
            enabled: true,
            handler: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_handler(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }
}

impl fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupt")
            .field("kind", &self.kind)
            .field("data", &self.data)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// A deferred cleanup action run when a run ends
pub type ShutdownHook = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Running flag, interrupt table and shutdown stack owned by an engine
#[derive(Default)]
pub(crate) struct RunControl {
    running: AtomicBool,
    exit_status: Mutex<Option<ExitStatus>>,
    interrupts: Mutex<Vec<Interrupt>>,
    shutdown_hooks: Mutex<Vec<ShutdownHook>>,
}

impl RunControl {
    pub(crate) fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        *self.exit_status.lock() = None;
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn exit(&self, status: ExitStatus) {
        self.running.store(false, Ordering::SeqCst);
        *self.exit_status.lock() = Some(status);
    }

    pub(crate) fn exit_status(&self) -> Option<ExitStatus> {
        *self.exit_status.lock()
    }

    pub(crate) fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub(crate) fn interrupt(&self, interrupt: Interrupt) {
        self.interrupts.lock().push(interrupt);
    }

    pub(crate) fn interrupts(&self) -> Vec<Interrupt> {
        self.interrupts.lock().clone()
    }

    pub(crate) fn push_shutdown_hook(&self, hook: ShutdownHook) {
        self.shutdown_hooks.lock().push(hook);
    }

    pub(crate) fn pop_shutdown_hook(&self) -> Option<ShutdownHook> {
        self.shutdown_hooks.lock().pop()
    }

    pub(crate) fn shutdown_hook_count(&self) -> usize {
        self.shutdown_hooks.lock().len()
    }
}

/// Handle given to computations and routers
pub struct GraphRuntime<C> {
    context: Arc<C>,
    version: u32,
    control: Arc<RunControl>,
}

impl<C> Clone for GraphRuntime<C> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            version: self.version,
            control: Arc::clone(&self.control),
        }
    }
}

impl<C> GraphRuntime<C> {
    pub(crate) fn new(context: Arc<C>, version: u32, control: Arc<RunControl>) -> Self {
        Self {
            context,
            version,
            control,
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    /// Checkpoint schema version fixed at compile time
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Stop scheduling after the current superstep and its checkpoint complete
    pub fn exit(&self, status: ExitStatus) {
        tracing::debug!(status = ?status, "Exit requested");
        self.control.exit(status);
    }

    /// Whether the current run will schedule another superstep
    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Append a record to the interrupt table
    pub fn interrupt(&self, interrupt: Interrupt) {
        tracing::debug!(kind = %interrupt.kind, priority = interrupt.priority, "Interrupt recorded");
        self.control.interrupt(interrupt);
    }

    /// Push a hook onto the shutdown stack
    ///
    /// Each run pops and awaits at most one hook when it ends, so only the most
    /// recently added hook fires; older ones stay queued for later runs.
    pub fn add_shutdown_hook<F, Fut>(&self, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.control
            .push_shutdown_hook(Box::new(move || Box::pin(hook()) as BoxFuture<'static, ()>));
    }
}

impl<C> fmt::Debug for GraphRuntime<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphRuntime")
            .field("version", &self.version)
            .field("running", &self.control.is_running())
            .finish_non_exhaustive()
    }
}
