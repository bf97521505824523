//! The timing graph: a DAG over circuit pins.
//!
//! Vertices are the circuit's pins. Edges are either intra-block
//! propagation delays taken from the architecture's port delay tables, or
//! inter-block wire delays that change with placement and routing.
//! Sequential blocks cut the graph: their input pins are timing endpoints
//! (arrival absorbs the sink setup time), their output pins are timing
//! sources (arrival starts at the clock-to-output delay).
//!
//! All delays are picoseconds.

use crate::ids::TimingEdgeId;
use fabric_arch::{Architecture, PortDirection};
use fabric_circuit::{Circuit, PinId};
use fabric_common::{FabricResult, InternalError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default estimated wire delay per grid unit of Manhattan distance.
pub const WIRE_DELAY_PER_UNIT: f64 = 70.0;

/// The kind of a timing edge.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum TimingEdgeKind {
    /// A fixed propagation delay inside one block.
    IntraBlock,
    /// A mutable wire delay between two blocks.
    Wire,
}

/// A directed edge of the timing graph.
#[derive(Clone, Debug)]
pub struct TimingEdge {
    /// The unique ID of this edge.
    pub id: TimingEdgeId,
    /// Source pin.
    pub from: PinId,
    /// Sink pin.
    pub to: PinId,
    /// Whether the delay is fixed (intra-block) or placement-dependent.
    pub kind: TimingEdgeKind,
    /// Current delay in picoseconds.
    pub delay: f64,
    /// Slack from the last arrival/required computation.
    pub slack: f64,
    /// Criticality in [0, 1] from the last criticality computation.
    pub criticality: f64,
}

/// The timing graph with its analysis state.
#[derive(Debug)]
pub struct TimingGraph {
    edges: Vec<TimingEdge>,
    out_edges: Vec<Vec<TimingEdgeId>>,
    in_edges: Vec<Vec<TimingEdgeId>>,
    topo_order: Vec<PinId>,
    /// Arrival offset of source pins (clock-to-output delay).
    source_offset: Vec<f64>,
    /// Setup time absorbed at endpoint pins.
    endpoint_setup: Vec<f64>,
    arrival: Vec<f64>,
    required: Vec<f64>,
    wire_edge_by_pins: HashMap<(PinId, PinId), TimingEdgeId>,
    max_delay: f64,
    /// Estimated wire delay per unit Manhattan distance.
    pub wire_delay_per_unit: f64,
}

impl TimingGraph {
    /// Builds the timing graph of `circuit`.
    ///
    /// Fails with an internal error when the combinational edges form a
    /// cycle, which a well-formed netlist cannot produce.
    pub fn build(circuit: &Circuit, arch: &Architecture) -> FabricResult<Self> {
        let num_pins = circuit.pins.len();
        let mut edges: Vec<TimingEdge> = Vec::new();
        let mut out_edges: Vec<Vec<TimingEdgeId>> = vec![Vec::new(); num_pins];
        let mut in_edges: Vec<Vec<TimingEdgeId>> = vec![Vec::new(); num_pins];
        let mut wire_edge_by_pins = HashMap::new();

        let mut push_edge = |from: PinId,
                             to: PinId,
                             kind: TimingEdgeKind,
                             delay: f64,
                             out_edges: &mut Vec<Vec<TimingEdgeId>>,
                             in_edges: &mut Vec<Vec<TimingEdgeId>>|
         -> TimingEdgeId {
            let id = TimingEdgeId::from_raw(edges.len() as u32);
            edges.push(TimingEdge {
                id,
                from,
                to,
                kind,
                delay,
                slack: 0.0,
                criticality: 0.0,
            });
            out_edges[from.index()].push(id);
            in_edges[to.index()].push(id);
            id
        };

        // Intra-block edges for combinational blocks.
        for block in &circuit.blocks {
            if arch.is_sequential(block.block_type) {
                continue;
            }
            for &input in &block.pins {
                if circuit.pin(input).direction != PortDirection::Input {
                    continue;
                }
                for &output in &block.pins {
                    if circuit.pin(output).direction != PortDirection::Output {
                        continue;
                    }
                    let delay =
                        arch.delay(circuit.pin(input).port_type, circuit.pin(output).port_type);
                    if delay > 0.0 {
                        push_edge(
                            input,
                            output,
                            TimingEdgeKind::IntraBlock,
                            delay,
                            &mut out_edges,
                            &mut in_edges,
                        );
                    }
                }
            }
        }

        // Wire edges, one per connection.
        for (driver, sink) in circuit.connections() {
            let id = push_edge(
                driver,
                sink,
                TimingEdgeKind::Wire,
                0.0,
                &mut out_edges,
                &mut in_edges,
            );
            wire_edge_by_pins.insert((driver, sink), id);
        }

        let topo_order = topological_order(num_pins, &edges, &out_edges, &in_edges)?;

        // Sources start at the clock-to-output delay of their port;
        // endpoints absorb their port's setup time.
        let mut source_offset = vec![0.0; num_pins];
        let mut endpoint_setup = vec![0.0; num_pins];
        for pin in &circuit.pins {
            let setup = arch.port_type(pin.port_type).setup_time;
            if in_edges[pin.id.index()].is_empty() {
                source_offset[pin.id.index()] = setup;
            }
            if out_edges[pin.id.index()].is_empty() {
                endpoint_setup[pin.id.index()] = setup;
            }
        }

        Ok(Self {
            edges,
            out_edges,
            in_edges,
            topo_order,
            source_offset,
            endpoint_setup,
            arrival: vec![0.0; num_pins],
            required: vec![0.0; num_pins],
            wire_edge_by_pins,
            max_delay: 0.0,
            wire_delay_per_unit: WIRE_DELAY_PER_UNIT,
        })
    }

    /// The number of edges.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Returns the edge with the given ID.
    pub fn edge(&self, id: TimingEdgeId) -> &TimingEdge {
        &self.edges[id.index()]
    }

    /// All edges.
    pub fn edges(&self) -> &[TimingEdge] {
        &self.edges
    }

    /// The wire edge of the connection `driver -> sink`, if it exists.
    pub fn wire_edge(&self, driver: PinId, sink: PinId) -> Option<TimingEdgeId> {
        self.wire_edge_by_pins.get(&(driver, sink)).copied()
    }

    /// Sets the delay of one wire edge, typically from a routed path.
    pub fn set_wire_delay(&mut self, edge: TimingEdgeId, delay: f64) {
        debug_assert_eq!(self.edges[edge.index()].kind, TimingEdgeKind::Wire);
        self.edges[edge.index()].delay = delay;
    }

    /// Re-estimates every wire delay from current block positions:
    /// Manhattan distance times the per-unit wire delay.
    pub fn calculate_placement_estimated_wire_delay(&mut self, circuit: &Circuit) {
        for edge in &mut self.edges {
            if edge.kind != TimingEdgeKind::Wire {
                continue;
            }
            let from = circuit.block_position(circuit.pin(edge.from).block);
            let to = circuit.block_position(circuit.pin(edge.to).block);
            edge.delay = match (from, to) {
                (Some((fx, fy)), Some((tx, ty))) => {
                    ((fx - tx).abs() + (fy - ty).abs()) * self.wire_delay_per_unit
                }
                _ => 0.0,
            };
        }
    }

    /// Two linear passes over the cached topological order: arrival times
    /// forward, required times backward.
    pub fn calculate_arrival_and_required_times(&mut self) {
        for value in self.arrival.iter_mut() {
            *value = 0.0;
        }
        for &pin in &self.topo_order {
            let index = pin.index();
            if self.in_edges[index].is_empty() {
                self.arrival[index] = self.source_offset[index];
                continue;
            }
            let mut arrival = f64::NEG_INFINITY;
            for &edge in &self.in_edges[index] {
                let edge = &self.edges[edge.index()];
                arrival = arrival.max(self.arrival[edge.from.index()] + edge.delay);
            }
            self.arrival[index] = arrival;
        }

        // Max delay is over endpoint arrivals including their setup.
        self.max_delay = self
            .topo_order
            .iter()
            .filter(|pin| self.out_edges[pin.index()].is_empty())
            .map(|pin| self.arrival[pin.index()] + self.endpoint_setup[pin.index()])
            .fold(0.0, f64::max);

        for &pin in self.topo_order.iter().rev() {
            let index = pin.index();
            if self.out_edges[index].is_empty() {
                self.required[index] = self.max_delay - self.endpoint_setup[index];
                continue;
            }
            let mut required = f64::INFINITY;
            for &edge in &self.out_edges[index] {
                let edge = &self.edges[edge.index()];
                required = required.min(self.required[edge.to.index()] - edge.delay);
            }
            self.required[index] = required;
        }

        for edge in &mut self.edges {
            edge.slack = self.required[edge.to.index()] - self.arrival[edge.from.index()] - edge.delay;
        }
    }

    /// The arrival time at a pin from the last analysis.
    pub fn arrival(&self, pin: PinId) -> f64 {
        self.arrival[pin.index()]
    }

    /// The required time at a pin from the last analysis.
    pub fn required(&self, pin: PinId) -> f64 {
        self.required[pin.index()]
    }

    /// The critical-path delay from the last analysis.
    pub fn max_delay(&self) -> f64 {
        self.max_delay
    }

    /// Recomputes every edge's criticality:
    /// `min(max_crit, (1 - slack / max_delay) ^ exponent)`.
    pub fn calculate_criticalities(&mut self, max_criticality: f64, exponent: f64) {
        if self.max_delay <= 0.0 {
            for edge in &mut self.edges {
                edge.criticality = 0.0;
            }
            return;
        }
        for edge in &mut self.edges {
            let base = (1.0 - edge.slack / self.max_delay).max(0.0);
            edge.criticality = base.powf(exponent).min(max_criticality);
        }
    }

    /// The criticality of the wire edge `driver -> sink`, 0 when the
    /// connection is not in the graph.
    pub fn connection_criticality(&self, driver: PinId, sink: PinId) -> f64 {
        self.wire_edge(driver, sink)
            .map(|edge| self.edges[edge.index()].criticality)
            .unwrap_or(0.0)
    }

    /// The timing cost surrogate: sum of `delay * criticality` over edges.
    pub fn calculate_total_cost(&self) -> f64 {
        self.edges
            .iter()
            .map(|edge| edge.delay * edge.criticality)
            .sum()
    }
}

/// Kahn's algorithm over the pin graph.
fn topological_order(
    num_pins: usize,
    edges: &[TimingEdge],
    out_edges: &[Vec<TimingEdgeId>],
    in_edges: &[Vec<TimingEdgeId>],
) -> Result<Vec<PinId>, InternalError> {
    let mut in_degree: Vec<usize> = in_edges.iter().map(Vec::len).collect();
    let mut ready: Vec<PinId> = (0..num_pins)
        .filter(|&index| in_degree[index] == 0)
        .map(|index| PinId::from_raw(index as u32))
        .collect();
    let mut order = Vec::with_capacity(num_pins);

    while let Some(pin) = ready.pop() {
        order.push(pin);
        for &edge in &out_edges[pin.index()] {
            let to = edges[edge.index()].to;
            in_degree[to.index()] -= 1;
            if in_degree[to.index()] == 0 {
                ready.push(to);
            }
        }
    }

    if order.len() != num_pins {
        return Err(InternalError::new(
            "combinational loop in the timing graph",
        ));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_arch::load_architecture;
    use fabric_circuit::{parse_net_text, SiteRef};

    const NET: &str = "\
block pad_a io
  out inpad[0] net_a
block ff clb
  in in[0] net_a
  out out[0] net_q
block pad_q io
  in outpad[0] net_q
";

    const COMB: &str = "\
block pad_a io
  out inpad[0] net_a
block pad_b io
  out inpad[0] net_b
block mul mult_4
  in a[0] net_a
  in b[0] net_b
  out out[0] net_p
block pad_p io
  in outpad[0] net_p
";

    fn placed(net: &str) -> (fabric_arch::Architecture, Circuit) {
        let arch = load_architecture("basic").unwrap();
        let mut circuit = parse_net_text(net, "t", "t.net", &arch, None).unwrap();
        // Deterministic trivial placement: walk the sites of each type.
        let types: Vec<_> = circuit
            .blocks
            .iter()
            .map(|block| (block.id, block.block_type))
            .collect();
        let mut cursor: HashMap<fabric_arch::BlockTypeId, usize> = HashMap::new();
        for (block, block_type) in types {
            let sites = circuit.grid().sites_of_type(block_type);
            let offset = cursor.entry(block_type).or_insert(0);
            let capacity = circuit
                .grid()
                .site_at_exact(sites[0].0, sites[0].1)
                .unwrap()
                .capacity() as usize;
            let (x, y) = sites[*offset / capacity];
            let subblock = (*offset % capacity) as u32;
            circuit
                .place(block, SiteRef::with_subblock(x, y, subblock))
                .unwrap();
            *offset += 1;
        }
        (arch, circuit)
    }

    #[test]
    fn sequential_block_cuts_graph() {
        let (arch, circuit) = placed(NET);
        let graph = TimingGraph::build(&circuit, &arch).unwrap();
        // Only the two wire edges; the clocked clb adds no intra edge.
        assert_eq!(graph.num_edges(), 2);
        assert!(graph
            .edges()
            .iter()
            .all(|edge| edge.kind == TimingEdgeKind::Wire));
    }

    #[test]
    fn combinational_block_bridges() {
        let (arch, circuit) = placed(COMB);
        let graph = TimingGraph::build(&circuit, &arch).unwrap();
        // 3 wire edges + 2 intra edges (a->out, b->out for the used bits).
        let intra = graph
            .edges()
            .iter()
            .filter(|edge| edge.kind == TimingEdgeKind::IntraBlock)
            .count();
        assert_eq!(intra, 2);
        assert_eq!(graph.num_edges(), 5);
    }

    #[test]
    fn estimated_delay_scales_with_distance() {
        let (arch, circuit) = placed(NET);
        let mut graph = TimingGraph::build(&circuit, &arch).unwrap();
        graph.calculate_placement_estimated_wire_delay(&circuit);
        for edge in graph.edges() {
            let (fx, fy) = circuit
                .block_position(circuit.pin(edge.from).block)
                .unwrap();
            let (tx, ty) = circuit.block_position(circuit.pin(edge.to).block).unwrap();
            let distance = (fx - tx).abs() + (fy - ty).abs();
            assert_eq!(edge.delay, distance * graph.wire_delay_per_unit);
        }
    }

    #[test]
    fn arrival_required_consistency() {
        let (arch, circuit) = placed(COMB);
        let mut graph = TimingGraph::build(&circuit, &arch).unwrap();
        graph.calculate_placement_estimated_wire_delay(&circuit);
        graph.calculate_arrival_and_required_times();

        assert!(graph.max_delay() > 0.0);
        for edge in graph.edges() {
            // arrival(sink) >= arrival(src) + delay
            assert!(graph.arrival(edge.to) + 1e-9 >= graph.arrival(edge.from) + edge.delay);
            // required(src) <= required(sink) - delay
            assert!(graph.required(edge.from) <= graph.required(edge.to) - edge.delay + 1e-9);
            assert!(edge.slack >= -1e-9);
        }
    }

    #[test]
    fn analysis_is_idempotent() {
        let (arch, circuit) = placed(COMB);
        let mut graph = TimingGraph::build(&circuit, &arch).unwrap();
        graph.calculate_placement_estimated_wire_delay(&circuit);
        graph.calculate_arrival_and_required_times();
        let first: Vec<f64> = graph.edges().iter().map(|edge| edge.slack).collect();
        let max_first = graph.max_delay();
        graph.calculate_arrival_and_required_times();
        let second: Vec<f64> = graph.edges().iter().map(|edge| edge.slack).collect();
        assert_eq!(first, second);
        assert_eq!(max_first, graph.max_delay());
    }

    #[test]
    fn criticality_bounds_and_monotonicity() {
        let (arch, circuit) = placed(COMB);
        let mut graph = TimingGraph::build(&circuit, &arch).unwrap();
        graph.calculate_placement_estimated_wire_delay(&circuit);
        graph.calculate_arrival_and_required_times();
        graph.calculate_criticalities(0.99, 7.0);

        let mut saw_critical = false;
        for edge in graph.edges() {
            assert!(edge.criticality >= 0.0);
            assert!(edge.criticality <= 0.99);
            if edge.slack.abs() < 1e-9 {
                // Zero slack: the path is critical and capped at max_crit.
                assert!((edge.criticality - 0.99).abs() < 1e-9);
                saw_critical = true;
            }
        }
        assert!(saw_critical);
    }

    #[test]
    fn setup_offsets_alone_produce_delay() {
        let (arch, circuit) = placed(NET);
        let mut graph = TimingGraph::build(&circuit, &arch).unwrap();
        // No wire delays set: the clock-to-output and setup offsets still
        // dominate the critical path.
        graph.calculate_arrival_and_required_times();
        graph.calculate_criticalities(0.99, 7.0);
        assert!(graph.max_delay() > 0.0);
        assert!(graph.calculate_total_cost() >= 0.0);
    }

    #[test]
    fn wire_edge_lookup_and_override() {
        let (arch, circuit) = placed(NET);
        let mut graph = TimingGraph::build(&circuit, &arch).unwrap();
        let (driver, sink) = circuit.connections()[0];
        let edge = graph.wire_edge(driver, sink).unwrap();
        graph.set_wire_delay(edge, 123.0);
        assert_eq!(graph.edge(edge).delay, 123.0);
        graph.calculate_arrival_and_required_times();
        graph.calculate_criticalities(0.99, 7.0);
        assert!(graph.connection_criticality(driver, sink) > 0.0);
    }

    #[test]
    fn total_cost_tracks_delay_and_criticality() {
        let (arch, circuit) = placed(COMB);
        let mut graph = TimingGraph::build(&circuit, &arch).unwrap();
        graph.calculate_placement_estimated_wire_delay(&circuit);
        graph.calculate_arrival_and_required_times();
        graph.calculate_criticalities(0.99, 7.0);
        let expected: f64 = graph
            .edges()
            .iter()
            .map(|edge| edge.delay * edge.criticality)
            .sum();
        assert_eq!(graph.calculate_total_cost(), expected);
    }

    #[test]
    fn empty_circuit_builds() {
        let arch = load_architecture("basic").unwrap();
        let circuit = parse_net_text("", "empty", "e.net", &arch, None).unwrap();
        let mut graph = TimingGraph::build(&circuit, &arch).unwrap();
        graph.calculate_arrival_and_required_times();
        assert_eq!(graph.max_delay(), 0.0);
        assert_eq!(graph.num_edges(), 0);
    }
}
