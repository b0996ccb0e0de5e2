//! Bulk-synchronous-parallel execution for dynamically routed vertex graphs.
//!
//! Build a [`Graph`], compile it into an [`Engine`] with a shared context and
//! an optional [`Checkpointer`], then [`Engine::run`] it from a list of
//! initial [`Step`]s. See [`pregel`] for the execution model.

pub mod pregel;

pub use pregel::{
    Checkpoint, Checkpointer, Compute, ComputeContext, Engine, EngineConfig, ExitStatus,
    FileCheckpointer, Graph, GraphRuntime, Interrupt, MemoryCheckpointer, PregelError, Router,
    RunReport, States, Step, Termination, Vertex, VertexId, VertexStatus,
};
