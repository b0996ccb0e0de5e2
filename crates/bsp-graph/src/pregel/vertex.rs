//! Vertex abstraction for the Pregel engine
//!
//! A vertex is a named unit of computation that owns a JSON state object and
//! a three-valued status. The engine only schedules steps whose target is
//! [`VertexStatus::Active`]; a computation moves its own vertex between
//! statuses through [`ComputeContext`].
//!
//! ```text
//!            wait()                 active()
//!   Active ─────────► Waiting ──────────────► Active
//!     │                  │
//!     │ halt()           │ halt()
//!     ▼                  ▼
//!   Inactive ◄───────────┘      Inactive ──active()──► Active
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use super::error::PregelError;
use super::runtime::GraphRuntime;

/// Unique identifier for a vertex within one graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(String);

impl VertexId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VertexId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for VertexId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&VertexId> for VertexId {
    fn from(id: &VertexId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for VertexId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for VertexId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Activity status of a vertex within the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VertexStatus {
    /// Schedulable; the status every vertex is reset to when a run starts
    #[default]
    Active,
    /// Halted; steps targeting it are not computed
    Inactive,
    /// Suspended; its input is replayed next superstep
    Waiting,
}

impl VertexStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_inactive(&self) -> bool {
        matches!(self, Self::Inactive)
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Waiting)
    }
}

/// The computation bound to a vertex
///
/// `props` is the payload of the step being executed. The returned value is
/// handed to every computed-listener and, unless the vertex ends up
/// [`VertexStatus::Waiting`], to the vertex's router.
///
/// Synchronous closures implement this trait automatically; use
/// [`Vertex::from_fn`] to get their signature inferred.
#[async_trait]
pub trait Compute<C>: Send + Sync {
    async fn compute(&self, props: Value, ctx: &ComputeContext<C>) -> Result<Value, PregelError>;
}

#[async_trait]
impl<C, F> Compute<C> for F
where
    C: Send + Sync + 'static,
    F: Fn(Value, &ComputeContext<C>) -> Result<Value, PregelError> + Send + Sync,
{
    async fn compute(&self, props: Value, ctx: &ComputeContext<C>) -> Result<Value, PregelError> {
        self(props, ctx)
    }
}

#[derive(Debug, Default)]
struct VertexCell {
    status: VertexStatus,
    state: Value,
}

/// A vertex: id, status, state and the computation that drives it
///
/// Status and state sit behind a single short-lived lock. Two steps targeting
/// the same vertex in one superstep are not serialized against each other:
/// every individual call is atomic but their interleaving is unspecified.
pub struct Vertex<C> {
    id: VertexId,
    cell: Mutex<VertexCell>,
    compute: Box<dyn Compute<C>>,
}

impl<C> Vertex<C>
where
    C: Send + Sync + 'static,
{
    /// Create a vertex with an empty (`null`) state
    pub fn new(id: impl Into<VertexId>, compute: impl Compute<C> + 'static) -> Self {
        Self {
            id: id.into(),
            cell: Mutex::new(VertexCell::default()),
            compute: Box::new(compute),
        }
    }

    /// Create a vertex from a synchronous closure
    pub fn from_fn<F>(id: impl Into<VertexId>, f: F) -> Self
    where
        F: Fn(Value, &ComputeContext<C>) -> Result<Value, PregelError> + Send + Sync + 'static,
    {
        Self::new(id, f)
    }

    /// Set the initial state
    pub fn with_state(self, state: Value) -> Self {
        self.cell.lock().state = state;
        self
    }

    pub(crate) async fn compute(
        &self,
        props: Value,
        ctx: &ComputeContext<C>,
    ) -> Result<Value, PregelError> {
        self.compute.compute(props, ctx).await
    }
}

impl<C> Vertex<C> {
    pub fn id(&self) -> &VertexId {
        &self.id
    }

    pub fn status(&self) -> VertexStatus {
        self.cell.lock().status
    }

    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    pub fn is_inactive(&self) -> bool {
        self.status().is_inactive()
    }

    pub fn is_waiting(&self) -> bool {
        self.status().is_waiting()
    }

    pub fn active(&self) {
        self.cell.lock().status = VertexStatus::Active;
    }

    pub fn halt(&self) {
        self.cell.lock().status = VertexStatus::Inactive;
    }

    pub fn wait(&self) {
        self.cell.lock().status = VertexStatus::Waiting;
    }

    /// Snapshot of the current state
    pub fn state(&self) -> Value {
        self.cell.lock().state.clone()
    }

    /// Merge `partial` into the current state, field by field
    pub fn set_state(&self, partial: Value) {
        merge_state(&mut self.cell.lock().state, partial);
    }
}

impl<C> fmt::Debug for Vertex<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.cell.lock();
        f.debug_struct("Vertex")
            .field("id", &self.id)
            .field("status", &cell.status)
            .field("state", &cell.state)
            .finish_non_exhaustive()
    }
}

/// Shallow object merge.
///
/// The result is always an object: fields of the current state survive when it
/// is an object, then every field of `partial` overwrites. A non-object
/// `partial` contributes nothing.
pub(crate) fn merge_state(current: &mut Value, partial: Value) {
    let mut merged = match std::mem::take(current) {
        Value::Object(fields) => fields,
        _ => Map::new(),
    };
    if let Value::Object(fields) = partial {
        merged.extend(fields);
    }
    *current = Value::Object(merged);
}

/// Everything a computation can see and touch while it runs
pub struct ComputeContext<C> {
    vertex: Arc<Vertex<C>>,
    runtime: GraphRuntime<C>,
    superstep: usize,
}

impl<C> ComputeContext<C> {
    pub(crate) fn new(vertex: Arc<Vertex<C>>, runtime: GraphRuntime<C>, superstep: usize) -> Self {
        Self {
            vertex,
            runtime,
            superstep,
        }
    }

    pub fn vertex_id(&self) -> &VertexId {
        self.vertex.id()
    }

    /// Zero-based index of the superstep this computation belongs to
    pub fn superstep(&self) -> usize {
        self.superstep
    }

    pub fn is_first_superstep(&self) -> bool {
        self.superstep == 0
    }

    pub fn runtime(&self) -> &GraphRuntime<C> {
        &self.runtime
    }

    /// Shared caller-supplied context
    pub fn context(&self) -> &C {
        self.runtime.context()
    }

    pub fn status(&self) -> VertexStatus {
        self.vertex.status()
    }

    pub fn state(&self) -> Value {
        self.vertex.state()
    }

    pub fn set_state(&self, partial: Value) {
        self.vertex.set_state(partial);
    }

    /// Suspend: the current input is replayed next superstep
    pub fn wait(&self) {
        self.vertex.wait();
    }

    /// Deactivate: later steps targeting this vertex are not computed
    pub fn halt(&self) {
        self.vertex.halt();
    }

    pub fn active(&self) {
        self.vertex.active();
    }
}
