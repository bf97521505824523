//! Mutable per-node routing state, parallel to the RRG.
//!
//! The RRG itself is immutable and shareable; everything the router
//! mutates (occupancy, congestion penalties, Dijkstra scratch) lives here
//! in one dense array indexed by node ID. The search scratch is reset in
//! O(touched) through the router's touched list, never by scanning the
//! whole graph.

use crate::graph::ResourceGraph;
use crate::ids::RouteNodeId;
use fabric_circuit::PinId;
use std::collections::HashMap;

/// Mutable routing data of one RRG node.
#[derive(Debug, Clone)]
pub struct RouteNodeData {
    /// Number of distinct signals occupying the node.
    pub occupation: u32,
    /// Present congestion penalty factor.
    pub pres_cost: f64,
    /// Accumulated historical congestion penalty.
    pub acc_cost: f64,
    /// Search scratch: node seen in the current expansion.
    pub touched: bool,
    /// Search scratch: best predecessor.
    pub prev: Option<RouteNodeId>,
    /// Search scratch: cost of the best partial path.
    pub partial_path_cost: f64,
    /// Search scratch: lower-bound total path cost (queue key).
    pub lower_bound_cost: f64,
    /// Sources (net driver pins) using the node, with use counts.
    sources: HashMap<PinId, u32>,
}

impl Default for RouteNodeData {
    fn default() -> Self {
        Self {
            occupation: 0,
            pres_cost: 1.0,
            acc_cost: 1.0,
            touched: false,
            prev: None,
            partial_path_cost: 0.0,
            lower_bound_cost: 0.0,
            sources: HashMap::new(),
        }
    }
}

impl RouteNodeData {
    /// How many times `source` currently uses the node.
    pub fn count_source_uses(&self, source: PinId) -> u32 {
        self.sources.get(&source).copied().unwrap_or(0)
    }

    /// The number of distinct sources using the node.
    pub fn num_unique_sources(&self) -> u32 {
        self.sources.len() as u32
    }

    /// Whether any source other than `driver` uses the node.
    pub fn used_by_other(&self, driver: PinId) -> bool {
        self.sources.keys().any(|&source| source != driver)
    }
}

/// The dense array of per-node routing state.
#[derive(Debug)]
pub struct RoutingState {
    data: Vec<RouteNodeData>,
}

impl RoutingState {
    /// Fresh state for every node of `graph`.
    pub fn new(graph: &ResourceGraph) -> Self {
        Self {
            data: vec![RouteNodeData::default(); graph.num_nodes()],
        }
    }

    /// The data of one node.
    pub fn node(&self, id: RouteNodeId) -> &RouteNodeData {
        &self.data[id.index()]
    }

    /// Mutable data of one node.
    pub fn node_mut(&mut self, id: RouteNodeId) -> &mut RouteNodeData {
        &mut self.data[id.index()]
    }

    /// Registers one use of `node` by `source`.
    pub fn add_source(&mut self, node: RouteNodeId, source: PinId) {
        let data = &mut self.data[node.index()];
        *data.sources.entry(source).or_insert(0) += 1;
        data.occupation = data.sources.len() as u32;
    }

    /// Removes one use of `node` by `source`.
    pub fn remove_source(&mut self, node: RouteNodeId, source: PinId) {
        let data = &mut self.data[node.index()];
        if let Some(count) = data.sources.get_mut(&source) {
            *count -= 1;
            if *count == 0 {
                data.sources.remove(&source);
            }
        }
        data.occupation = data.sources.len() as u32;
    }

    /// Refreshes the present congestion penalty of `node` from its current
    /// occupation.
    pub fn update_present_congestion(
        &mut self,
        node: RouteNodeId,
        capacity: u32,
        pres_fac: f64,
    ) {
        let data = &mut self.data[node.index()];
        data.pres_cost = if data.occupation < capacity {
            1.0
        } else {
            1.0 + (data.occupation + 1 - capacity) as f64 * pres_fac
        };
    }

    /// Whether `node` holds more signals than its capacity.
    pub fn overused(&self, node: RouteNodeId, capacity: u32) -> bool {
        self.data[node.index()].occupation > capacity
    }
}
