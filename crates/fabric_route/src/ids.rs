//! Opaque ID newtype for routing-resource-graph nodes.

use serde::{Deserialize, Serialize};

/// Opaque, copyable ID for a node of the routing-resource graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct RouteNodeId(u32);

impl RouteNodeId {
    /// Creates an ID from a raw `u32` index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Returns the index as a `usize` for direct vector access.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for RouteNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
