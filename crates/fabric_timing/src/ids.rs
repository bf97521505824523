//! Opaque ID newtypes for timing-graph entities.

use serde::{Deserialize, Serialize};

/// Opaque, copyable ID for an edge of the timing graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct TimingEdgeId(u32);

impl TimingEdgeId {
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

impl std::fmt::Display for TimingEdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let id = TimingEdgeId::from_raw(9);
        assert_eq!(id.as_raw(), 9);
        assert_eq!(id.index(), 9);
        assert_eq!(format!("{id}"), "9");
    }
}
