//! Cached bounding-box cost with O(fanout) incremental updates.
//!
//! The annealer evaluates millions of moves; recomputing every net each
//! time would dominate the runtime. This cache holds the current cost of
//! every net and recomputes only the nets touching a moved block.

use fabric_circuit::{BlockId, Circuit, NetId};
use std::collections::HashSet;

/// Per-net bounding-box cost cache.
#[derive(Debug, Clone)]
pub struct BoundingBoxCost {
    net_cost: Vec<f64>,
    total: f64,
}

impl BoundingBoxCost {
    /// Computes the cost of every net of `circuit`.
    pub fn new(circuit: &Circuit) -> Self {
        let net_cost: Vec<f64> = (0..circuit.num_nets())
            .map(|index| circuit.net_cost(NetId::from_raw(index as u32)))
            .collect();
        let total = net_cost.iter().sum();
        Self { net_cost, total }
    }

    /// The cached total cost.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// The cached cost of one net.
    pub fn net(&self, net: NetId) -> f64 {
        self.net_cost[net.index()]
    }

    /// The nets connected to any of `blocks`, deduplicated.
    pub fn affected_nets(circuit: &Circuit, blocks: &[BlockId]) -> Vec<NetId> {
        let mut nets = HashSet::new();
        for &block in blocks {
            for &pin in &circuit.block(block).pins {
                if let Some(net) = circuit.pin(pin).net {
                    nets.insert(net);
                }
            }
        }
        nets.into_iter().collect()
    }

    /// The cost change of `nets` against the cache, evaluated on the
    /// (already mutated) circuit. The cache is not modified.
    pub fn delta(&self, circuit: &Circuit, nets: &[NetId]) -> f64 {
        nets.iter()
            .map(|&net| circuit.net_cost(net) - self.net_cost[net.index()])
            .sum()
    }

    /// Recomputes and commits the cost of `nets` from the circuit.
    pub fn commit(&mut self, circuit: &Circuit, nets: &[NetId]) {
        for &net in nets {
            let fresh = circuit.net_cost(net);
            self.total += fresh - self.net_cost[net.index()];
            self.net_cost[net.index()] = fresh;
        }
    }
}
