//! Graph builder and compiled topology
//!
//! ```rust,ignore
//! let mut graph = Graph::new();
//! graph
//!     .add_vertex(Vertex::from_fn("a", |props, ctx| { ctx.halt(); Ok(props) }))?
//!     .add_vertex(Vertex::from_fn("b", |props, _ctx| Ok(props)))?
//!     .add_edge_fn("a", |_output, _state, _runtime| Ok(vec!["b".into()]))?;
//!
//! let mut engine = graph.compile(context, Some(checkpointer));
//! engine.run(vec![Step::new("a", json!(1))], States::new()).await?;
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::checkpoint::Checkpointer;
use super::config::EngineConfig;
use super::engine::Engine;
use super::error::PregelError;
use super::runtime::GraphRuntime;
use super::step::States;
use super::vertex::{Vertex, VertexId};

/// Decides fan-out from a vertex's latest output
///
/// Called with the output, the vertex's state right after it computed, and
/// the runtime handle. Each returned id becomes one step carrying the output.
#[async_trait]
pub trait Router<C>: Send + Sync {
    async fn route(
        &self,
        output: &Value,
        state: &Value,
        runtime: &GraphRuntime<C>,
    ) -> Result<Vec<VertexId>, PregelError>;
}

#[async_trait]
impl<C, F> Router<C> for F
where
    C: Send + Sync + 'static,
    F: Fn(&Value, &Value, &GraphRuntime<C>) -> Result<Vec<VertexId>, PregelError> + Send + Sync,
{
    async fn route(
        &self,
        output: &Value,
        state: &Value,
        runtime: &GraphRuntime<C>,
    ) -> Result<Vec<VertexId>, PregelError> {
        self(output, state, runtime)
    }
}

/// Mutable graph under construction
pub struct Graph<C> {
    vertices: HashMap<VertexId, Arc<Vertex<C>>>,
    routers: HashMap<VertexId, Arc<dyn Router<C>>>,
}

impl<C> Default for Graph<C> {
    fn default() -> Self {
        Self {
            vertices: HashMap::new(),
            routers: HashMap::new(),
        }
    }
}

impl<C> Graph<C>
where
    C: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vertex
    pub fn add_vertex(&mut self, vertex: Vertex<C>) -> Result<&mut Self, PregelError> {
        if self.vertices.contains_key(vertex.id()) {
            return Err(PregelError::DuplicateVertex(vertex.id().clone()));
        }
        self.vertices.insert(vertex.id().clone(), Arc::new(vertex));
        Ok(self)
    }

    /// Register the router for `from`
    ///
    /// The source does not need to be registered yet.
    pub fn add_edge(
        &mut self,
        from: impl Into<VertexId>,
        router: impl Router<C> + 'static,
    ) -> Result<&mut Self, PregelError> {
        let from = from.into();
        if self.routers.contains_key(&from) {
            return Err(PregelError::DuplicateEdge(from));
        }
        self.routers.insert(from, Arc::new(router));
        Ok(self)
    }

    /// Register a synchronous closure as the router for `from`
    pub fn add_edge_fn<F>(
        &mut self,
        from: impl Into<VertexId>,
        router: F,
    ) -> Result<&mut Self, PregelError>
    where
        F: Fn(&Value, &Value, &GraphRuntime<C>) -> Result<Vec<VertexId>, PregelError>
            + Send
            + Sync
            + 'static,
    {
        self.add_edge(from, router)
    }

    pub fn contains_vertex(&self, id: &str) -> bool {
        self.vertices.contains_key(id)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Freeze the topology into an engine with the default configuration
    pub fn compile(self, context: C, checkpointer: Option<Arc<dyn Checkpointer>>) -> Engine<C> {
        self.build(context, checkpointer, EngineConfig::default())
    }

    /// Freeze the topology into an engine
    ///
    /// The configuration is validated first. The checkpointer, if any, is
    /// told the schema version immediately.
    pub fn compile_with_config(
        self,
        context: C,
        checkpointer: Option<Arc<dyn Checkpointer>>,
        config: EngineConfig,
    ) -> Result<Engine<C>, PregelError> {
        config.validate()?;
        Ok(self.build(context, checkpointer, config))
    }

    fn build(
        self,
        context: C,
        checkpointer: Option<Arc<dyn Checkpointer>>,
        config: EngineConfig,
    ) -> Engine<C> {
        if let Some(checkpointer) = &checkpointer {
            checkpointer.set_version(config.version);
        }
        let topology = CompiledGraph {
            vertices: self.vertices,
            routers: self.routers,
        };
        tracing::debug!(
            vertices = topology.vertices.len(),
            routers = topology.routers.len(),
            version = config.version,
            "Graph compiled"
        );
        Engine::new(Arc::new(topology), context, checkpointer, config)
    }
}

impl<C> fmt::Debug for Graph<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut routers: Vec<_> = self.routers.keys().collect();
        routers.sort();
        f.debug_struct("Graph")
            .field("vertices", &self.vertices.values().collect::<Vec<_>>())
            .field("routers", &routers)
            .finish()
    }
}

/// Frozen topology shared by the engine and its tasks
pub struct CompiledGraph<C> {
    vertices: HashMap<VertexId, Arc<Vertex<C>>>,
    routers: HashMap<VertexId, Arc<dyn Router<C>>>,
}

impl<C> CompiledGraph<C> {
    pub fn vertex(&self, id: &str) -> Option<&Arc<Vertex<C>>> {
        self.vertices.get(id)
    }

    pub fn router(&self, id: &str) -> Option<&Arc<dyn Router<C>>> {
        self.routers.get(id)
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Arc<Vertex<C>>> {
        self.vertices.values()
    }

    /// Whether a step targeting `id` would be computed now
    pub fn is_schedulable(&self, id: &str) -> bool {
        self.vertex(id).is_some_and(|v| v.is_active())
    }

    pub(crate) fn activate_all(&self) {
        for vertex in self.vertices.values() {
            vertex.active();
        }
    }

    /// Merge states into the named vertices; unknown ids are ignored
    pub(crate) fn merge_states(&self, states: States) {
        for (id, state) in states {
            match self.vertices.get(&id) {
                Some(vertex) => vertex.set_state(state),
                None => tracing::debug!(vertex_id = %id, "Ignoring state for unknown vertex"),
            }
        }
    }

    /// Snapshot of every vertex's state
    pub fn states(&self) -> States {
        self.vertices
            .iter()
            .map(|(id, vertex)| (id.clone(), vertex.state()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pregel::checkpoint::MemoryCheckpointer;
    use crate::pregel::vertex::VertexStatus;
    use serde_json::json;

    fn echo(id: &str) -> Vertex<()> {
        Vertex::from_fn(id, |props, _ctx| Ok(props))
    }

    #[test]
    fn test_add_vertex_rejects_duplicates() {
        let mut graph = Graph::new();
        graph.add_vertex(echo("a")).unwrap();

        let err = graph.add_vertex(echo("a")).unwrap_err();
        assert!(matches!(err, PregelError::DuplicateVertex(ref id) if id.as_str() == "a"));
        assert_eq!(graph.vertex_count(), 1);
    }

    #[test]
    fn test_add_edge_rejects_second_router() {
        let mut graph = Graph::new();
        graph
            .add_vertex(echo("a"))
            .unwrap()
            .add_vertex(echo("b"))
            .unwrap()
            .add_edge_fn("a", |_, _, _| Ok(vec!["b".into()]))
            .unwrap();

        let err = graph
            .add_edge_fn("a", |_, _, _| Ok(vec![]))
            .unwrap_err();
        assert!(matches!(err, PregelError::DuplicateEdge(ref id) if id.as_str() == "a"));
    }

    #[test]
    fn test_compile_reports_version_to_checkpointer() {
        let checkpointer = Arc::new(MemoryCheckpointer::new());
        let mut graph = Graph::new();
        graph.add_vertex(echo("a")).unwrap();

        let engine = graph.compile_with_config(
            (),
            Some(checkpointer.clone()),
            EngineConfig::default().with_version(3),
        )
        .unwrap();

        assert_eq!(checkpointer.version(), 3);
        assert_eq!(engine.version(), 3);
    }

    #[test]
    fn test_compile_with_config_rejects_invalid_config() {
        let checkpointer = Arc::new(MemoryCheckpointer::new());
        let mut graph = Graph::new();
        graph.add_vertex(echo("a")).unwrap();

        let err = graph
            .compile_with_config(
                (),
                Some(checkpointer.clone()),
                EngineConfig::default().with_version(0),
            )
            .unwrap_err();

        assert!(matches!(err, PregelError::Config(_)));
        assert_eq!(checkpointer.version(), 1);
    }

    #[test]
    fn test_compiled_graph_state_helpers() {
        let mut graph = Graph::new();
        graph
            .add_vertex(echo("a").with_state(json!({"x": 1})))
            .unwrap()
            .add_vertex(echo("b"))
            .unwrap();
        assert!(graph.contains_vertex("a"));

        let engine = graph.compile((), None);
        let topology = engine.topology();

        let mut states = States::new();
        states.insert(VertexId::new("a"), json!({"y": 2}));
        states.insert(VertexId::new("ghost"), json!({"z": 3}));
        topology.merge_states(states);

        let snapshot = topology.states();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&VertexId::new("a")], json!({"x": 1, "y": 2}));
        assert_eq!(snapshot[&VertexId::new("b")], json!(null));

        topology.vertex("a").unwrap().halt();
        assert!(!topology.is_schedulable("a"));
        assert!(!topology.is_schedulable("ghost"));
        topology.activate_all();
        assert_eq!(topology.vertex("a").unwrap().status(), VertexStatus::Active);
    }
}
