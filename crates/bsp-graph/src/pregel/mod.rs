//! Pregel Engine for Dynamically Routed Vertex Graphs
//!
//! This module implements a bulk-synchronous-parallel engine for graphs whose
//! edges are decided at runtime by per-vertex routers.
//! Key concepts:
//!
//! - **Vertex**: Named computation unit with a JSON state and an activity status
//! - **Router**: Picks the next vertices from a vertex's latest output
//! - **Step**: Pending work, a target vertex plus its input payload
//! - **Superstep**: Barrier-synchronized round of concurrent computations
//! - **Checkpoint**: Pending steps and every vertex's state, saved after each superstep
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                               │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐                     │
//! │  │Superstep│→ │Superstep│→ │Superstep│→ ... drain / exit   │
//! │  │    0    │  │    1    │  │    2    │                     │
//! │  └─────────┘  └─────────┘  └─────────┘                     │
//! │       │            │            │                           │
//! │       ▼            ▼            ▼                           │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │ Per-Superstep: Partition → Compute → Route → Save   │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod runtime;
pub mod step;
pub mod vertex;

// Re-exports
pub use checkpoint::{Checkpoint, Checkpointer, FileCheckpointer, MemoryCheckpointer};
pub use config::{EngineConfig, CHECKPOINT_VERSION};
pub use engine::{ComputedListener, Engine, RunReport, Termination};
pub use error::PregelError;
pub use graph::{CompiledGraph, Graph, Router};
pub use runtime::{ExitStatus, GraphRuntime, Interrupt, ShutdownHook};
pub use step::{States, Step};
pub use vertex::{Compute, ComputeContext, Vertex, VertexId, VertexStatus};
