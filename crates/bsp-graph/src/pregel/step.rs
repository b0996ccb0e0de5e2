//! Pending work items and state snapshots

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::vertex::VertexId;

/// One unit of pending work: a target vertex and its input payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub next: VertexId,
    pub props: Value,
}

impl Step {
    pub fn new(next: impl Into<VertexId>, props: Value) -> Self {
        Self {
            next: next.into(),
            props,
        }
    }
}

/// Per-vertex state snapshot, ordered by id
pub type States = BTreeMap<VertexId, Value>;
