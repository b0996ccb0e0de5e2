//! Error types for the Pregel engine
//!
//! Build-time errors (`DuplicateVertex`, `DuplicateEdge`) are returned straight
//! to the graph builder. Everything else aborts the run it happened in and is
//! surfaced to the caller of [`Engine::run`](super::engine::Engine::run).

use thiserror::Error;

use super::vertex::VertexId;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while building or running a graph
#[derive(Debug, Error)]
pub enum PregelError {
    /// A vertex with this id is already registered
    #[error("Vertex {0} already exists")]
    DuplicateVertex(VertexId),

    /// The source vertex already has a router
    #[error("Edge from {0} already exists")]
    DuplicateEdge(VertexId),

    /// A vertex computation failed
    #[error("Vertex {vertex_id} failed: {message}")]
    VertexError {
        vertex_id: VertexId,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// A router failed to resolve successors
    #[error("Router for {vertex_id} failed: {message}")]
    RouterError { vertex_id: VertexId, message: String },

    /// A computation task panicked or was cancelled
    #[error("Superstep task failed: {0}")]
    TaskJoin(String),

    /// Saving or loading a checkpoint failed
    #[error("Checkpoint error: {0}")]
    CheckpointError(String),

    #[error("Max supersteps exceeded: {0}")]
    MaxSuperstepsExceeded(usize),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PregelError {
    /// Create a vertex error without an underlying cause
    pub fn vertex_error(vertex_id: impl Into<VertexId>, message: impl Into<String>) -> Self {
        Self::VertexError {
            vertex_id: vertex_id.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a vertex error wrapping an underlying cause
    pub fn vertex_error_with_source(
        vertex_id: impl Into<VertexId>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::VertexError {
            vertex_id: vertex_id.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn router_error(vertex_id: impl Into<VertexId>, message: impl Into<String>) -> Self {
        Self::RouterError {
            vertex_id: vertex_id.into(),
            message: message.into(),
        }
    }

    pub fn checkpoint_error(message: impl Into<String>) -> Self {
        Self::CheckpointError(message.into())
    }

    /// Whether a caller could reasonably retry the run from its last checkpoint.
    ///
    /// The engine itself never retries; this only classifies the failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::VertexError { .. }
                | Self::RouterError { .. }
                | Self::TaskJoin(_)
                | Self::CheckpointError(_)
                | Self::Io(_)
        )
    }

    /// Whether this error was raised while building the graph
    pub fn is_build_error(&self) -> bool {
        matches!(self, Self::DuplicateVertex(_) | Self::DuplicateEdge(_))
    }
}
