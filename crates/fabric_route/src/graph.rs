//! The routing-resource graph (RRG).
//!
//! A static directed graph over the device's routing resources. Each block
//! output port becomes a SOURCE feeding one OPIN per equivalent pin slot;
//! each input port mirrors that with IPINs into a SINK. Between sites run
//! unit-length channel wires, `channel_width` tracks of CHANX and CHANY
//! per grid position, joined at switchboxes track-to-track.
//!
//! The structure is immutable after construction; all mutable routing
//! state lives in the parallel [`RoutingState`](crate::state::RoutingState)
//! array.

use crate::ids::RouteNodeId;
use fabric_arch::{Architecture, PortDirection, PortTypeId};
use fabric_circuit::{Circuit, PinId};
use std::collections::HashMap;

/// The kind of a routing-resource node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RouteNodeKind {
    /// The logical source of a block output port.
    Source,
    /// A physical output pin.
    Opin,
    /// A horizontal channel wire.
    Chanx,
    /// A vertical channel wire.
    Chany,
    /// A physical input pin.
    Ipin,
    /// The logical sink of a block input port.
    Sink,
}

impl RouteNodeKind {
    /// Whether this node is a channel wire.
    pub fn is_wire(self) -> bool {
        matches!(self, RouteNodeKind::Chanx | RouteNodeKind::Chany)
    }
}

impl std::fmt::Display for RouteNodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RouteNodeKind::Source => "SOURCE",
            RouteNodeKind::Opin => "OPIN",
            RouteNodeKind::Chanx => "CHANX",
            RouteNodeKind::Chany => "CHANY",
            RouteNodeKind::Ipin => "IPIN",
            RouteNodeKind::Sink => "SINK",
        };
        write!(f, "{name}")
    }
}

/// One node of the routing-resource graph.
#[derive(Clone, Debug)]
pub struct RouteNode {
    /// The unique ID of this node.
    pub id: RouteNodeId,
    /// The node kind.
    pub kind: RouteNodeKind,
    /// Grid x of the node's center.
    pub x: u32,
    /// Grid y of the node's center.
    pub y: u32,
    /// Track index for wires, pin slot otherwise.
    pub track: u32,
    /// How many signals may legally use the node.
    pub capacity: u32,
    /// Static cost of taking this node.
    pub base_cost: f64,
    /// Wire length in grid units (0 for non-wires).
    pub length: u32,
    /// Intrinsic delay in picoseconds.
    pub t_linear: f64,
    /// Fan-out edges.
    pub children: Vec<RouteNodeId>,
}

impl RouteNode {
    /// Human-readable description for congestion reports.
    pub fn describe(&self) -> String {
        format!("{} ({}, {}) track {}", self.kind, self.x, self.y, self.track)
    }
}

/// Options of the RRG generator.
#[derive(Debug, Clone)]
pub struct RrgOptions {
    /// Number of wire tracks per channel segment.
    pub channel_width: u32,
    /// Wire delay per unit length, picoseconds.
    pub wire_delay_per_unit: f64,
}

impl Default for RrgOptions {
    fn default() -> Self {
        Self {
            channel_width: 8,
            wire_delay_per_unit: fabric_timing::WIRE_DELAY_PER_UNIT,
        }
    }
}

/// Errors produced while building or querying the resource graph.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// A block must be placed before its pins map to RRG nodes.
    #[error("block `{block}` is not placed; route after placement")]
    UnplacedBlock {
        /// The block name.
        block: String,
    },

    /// Directed search exhausted the queue without reaching the sink.
    #[error("unreachable sink: connection {connection}")]
    UnreachableSink {
        /// Net and pin identification of the failing connection.
        connection: String,
    },

    /// The RRG has no node for a pin's port at its site.
    #[error("no {kind} node at ({x}, {y}) for port `{port}`")]
    MissingNode {
        /// Expected node kind.
        kind: RouteNodeKind,
        /// Site column.
        x: u32,
        /// Site row.
        y: u32,
        /// Port display name.
        port: String,
    },
}

/// The immutable routing-resource graph.
#[derive(Debug)]
pub struct ResourceGraph {
    nodes: Vec<RouteNode>,
    sources: HashMap<(u32, u32, PortTypeId), RouteNodeId>,
    sinks: HashMap<(u32, u32, PortTypeId), RouteNodeId>,
    base_cost_per_distance: f64,
    ipin_base_cost: f64,
}

/// Base cost of an IPIN, relative to a unit wire.
const IPIN_BASE_COST_FACTOR: f64 = 0.95;

impl ResourceGraph {
    /// Generates the RRG for the circuit's device grid.
    pub fn build(circuit: &Circuit, arch: &Architecture, options: &RrgOptions) -> Self {
        let grid = circuit.grid();
        let width = grid.width();
        let height = grid.height();
        let tracks = options.channel_width;

        let mut nodes: Vec<RouteNode> = Vec::new();
        let mut push = |kind: RouteNodeKind,
                        x: u32,
                        y: u32,
                        track: u32,
                        capacity: u32,
                        base_cost: f64,
                        length: u32,
                        t_linear: f64,
                        nodes: &mut Vec<RouteNode>| {
            let id = RouteNodeId::from_raw(nodes.len() as u32);
            nodes.push(RouteNode {
                id,
                kind,
                x,
                y,
                track,
                capacity,
                base_cost,
                length,
                t_linear,
                children: Vec::new(),
            });
            id
        };

        // Channel wires: one CHANX and one CHANY bundle per grid position.
        let mut chanx = HashMap::new();
        let mut chany = HashMap::new();
        for x in 0..width {
            for y in 0..height {
                for track in 0..tracks {
                    let id = push(
                        RouteNodeKind::Chanx,
                        x,
                        y,
                        track,
                        1,
                        1.0,
                        1,
                        options.wire_delay_per_unit,
                        &mut nodes,
                    );
                    chanx.insert((x, y, track), id);
                    let id = push(
                        RouteNodeKind::Chany,
                        x,
                        y,
                        track,
                        1,
                        1.0,
                        1,
                        options.wire_delay_per_unit,
                        &mut nodes,
                    );
                    chany.insert((x, y, track), id);
                }
            }
        }

        // Switchbox and channel continuation edges, track-to-track.
        for x in 0..width {
            for y in 0..height {
                for track in 0..tracks {
                    let hx = chanx[&(x, y, track)];
                    let vy = chany[&(x, y, track)];
                    let mut link = |a: RouteNodeId, b: RouteNodeId, nodes: &mut Vec<RouteNode>| {
                        nodes[a.index()].children.push(b);
                        nodes[b.index()].children.push(a);
                    };
                    link(hx, vy, &mut nodes);
                    if x + 1 < width {
                        let next = chanx[&(x + 1, y, track)];
                        link(hx, next, &mut nodes);
                    }
                    if y + 1 < height {
                        let next = chany[&(x, y + 1, track)];
                        link(vy, next, &mut nodes);
                    }
                }
            }
        }

        // Pin trees per site: SOURCE -> OPINs onto the wires, wires into
        // IPINs -> SINK.
        let mut sources = HashMap::new();
        let mut sinks = HashMap::new();
        for x in 0..width {
            for y in 0..height {
                let Some(site) = grid.site_at_exact(x, y) else {
                    continue;
                };
                let site_capacity = site.capacity();
                let block_type = arch.block_type(site.block_type);
                for port in block_type.ports() {
                    let data = arch.port_type(port);
                    let slots = data.width * site_capacity;
                    if slots == 0 {
                        continue;
                    }
                    match data.direction {
                        PortDirection::Output => {
                            let source = push(
                                RouteNodeKind::Source,
                                x,
                                y,
                                0,
                                slots,
                                1.0,
                                0,
                                0.0,
                                &mut nodes,
                            );
                            sources.insert((x, y, port), source);
                            for slot in 0..slots {
                                let opin = push(
                                    RouteNodeKind::Opin,
                                    x,
                                    y,
                                    slot,
                                    1,
                                    1.0,
                                    0,
                                    0.0,
                                    &mut nodes,
                                );
                                nodes[source.index()].children.push(opin);
                                for track in 0..tracks {
                                    let hx = chanx[&(x, y, track)];
                                    let vy = chany[&(x, y, track)];
                                    nodes[opin.index()].children.push(hx);
                                    nodes[opin.index()].children.push(vy);
                                }
                            }
                        }
                        PortDirection::Input => {
                            let sink = push(
                                RouteNodeKind::Sink,
                                x,
                                y,
                                0,
                                slots,
                                0.0,
                                0,
                                0.0,
                                &mut nodes,
                            );
                            sinks.insert((x, y, port), sink);
                            for slot in 0..slots {
                                let ipin = push(
                                    RouteNodeKind::Ipin,
                                    x,
                                    y,
                                    slot,
                                    1,
                                    IPIN_BASE_COST_FACTOR,
                                    0,
                                    0.0,
                                    &mut nodes,
                                );
                                nodes[ipin.index()].children.push(sink);
                                for track in 0..tracks {
                                    let hx = chanx[&(x, y, track)];
                                    let vy = chany[&(x, y, track)];
                                    nodes[hx.index()].children.push(ipin);
                                    nodes[vy.index()].children.push(ipin);
                                }
                            }
                        }
                    }
                }
            }
        }

        // Average wire delay per unit distance, then rescale wire base
        // costs to that distance equivalent.
        let mut delay_sum = 0.0;
        let mut length_sum = 0u64;
        for node in &nodes {
            if node.kind.is_wire() {
                delay_sum += node.t_linear;
                length_sum += node.length as u64;
            }
        }
        let base_cost_per_distance = if length_sum > 0 {
            delay_sum / length_sum as f64
        } else {
            1.0
        };
        for node in &mut nodes {
            if node.kind.is_wire() {
                node.base_cost = base_cost_per_distance * node.length as f64;
            }
        }
        let ipin_base_cost = IPIN_BASE_COST_FACTOR * base_cost_per_distance;
        for node in &mut nodes {
            if node.kind == RouteNodeKind::Ipin {
                node.base_cost = ipin_base_cost;
            }
        }

        Self {
            nodes,
            sources,
            sinks,
            base_cost_per_distance,
            ipin_base_cost,
        }
    }

    /// All nodes.
    pub fn nodes(&self) -> &[RouteNode] {
        &self.nodes
    }

    /// The number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the node with the given ID.
    pub fn node(&self, id: RouteNodeId) -> &RouteNode {
        &self.nodes[id.index()]
    }

    /// The average wire delay per unit of distance.
    pub fn base_cost_per_distance(&self) -> f64 {
        self.base_cost_per_distance
    }

    /// The rescaled IPIN base cost.
    pub fn ipin_base_cost(&self) -> f64 {
        self.ipin_base_cost
    }

    /// The SOURCE node of a placed driver pin.
    pub fn source_of_pin(&self, circuit: &Circuit, pin: PinId) -> Result<RouteNodeId, RouteError> {
        self.pin_node(circuit, pin, RouteNodeKind::Source)
    }

    /// The SINK node of a placed sink pin.
    pub fn sink_of_pin(&self, circuit: &Circuit, pin: PinId) -> Result<RouteNodeId, RouteError> {
        self.pin_node(circuit, pin, RouteNodeKind::Sink)
    }

    fn pin_node(
        &self,
        circuit: &Circuit,
        pin: PinId,
        kind: RouteNodeKind,
    ) -> Result<RouteNodeId, RouteError> {
        let pin = circuit.pin(pin);
        let block = circuit.block(pin.block);
        let site = block.site.ok_or_else(|| RouteError::UnplacedBlock {
            block: block.name.clone(),
        })?;
        let table = match kind {
            RouteNodeKind::Source => &self.sources,
            _ => &self.sinks,
        };
        table
            .get(&(site.x, site.y, pin.port_type))
            .copied()
            .ok_or_else(|| RouteError::MissingNode {
                kind,
                x: site.x,
                y: site.y,
                port: format!("{}", pin.port_type),
            })
    }

    /// Manhattan distance estimate from a node to a target node, in grid
    /// units.
    pub fn expected_distance_to_target(&self, from: RouteNodeId, to: RouteNodeId) -> f64 {
        let a = &self.nodes[from.index()];
        let b = &self.nodes[to.index()];
        (a.x.abs_diff(b.x) + a.y.abs_diff(b.y)) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_arch::load_architecture;
    use fabric_circuit::parse_net_text;

    const NET: &str = "\
block pad_a io
  out inpad[0] net_a
block u0 clb
  in in[0] net_a
  out out[0] net_b
block pad_b io
  in outpad[0] net_b
";

    fn fixture() -> (fabric_arch::Architecture, Circuit, ResourceGraph) {
        let arch = load_architecture("basic").unwrap();
        let mut circuit = parse_net_text(NET, "c", "c.net", &arch, None).unwrap();
        let mut rng = <rand::rngs::StdRng as rand::SeedableRng>::seed_from_u64(1);
        fabric_place::place_random(&mut circuit, &arch, &mut rng).unwrap();
        let graph = ResourceGraph::build(&circuit, &arch, &RrgOptions::default());
        (arch, circuit, graph)
    }

    #[test]
    fn wires_cover_the_grid() {
        let (_, circuit, graph) = fixture();
        let tracks = RrgOptions::default().channel_width;
        let expected =
            2 * (circuit.grid().width() * circuit.grid().height() * tracks) as usize;
        let wires = graph
            .nodes()
            .iter()
            .filter(|node| node.kind.is_wire())
            .count();
        assert_eq!(wires, expected);
    }

    #[test]
    fn source_fans_into_opins() {
        let (_, circuit, graph) = fixture();
        for node in graph.nodes() {
            if node.kind == RouteNodeKind::Source {
                assert!(!node.children.is_empty());
                assert_eq!(node.capacity, node.children.len() as u32);
                for &child in &node.children {
                    assert_eq!(graph.node(child).kind, RouteNodeKind::Opin);
                }
            }
        }
        let _ = circuit;
    }

    #[test]
    fn ipin_has_unique_sink_child() {
        let (_, _, graph) = fixture();
        for node in graph.nodes() {
            if node.kind == RouteNodeKind::Ipin {
                assert_eq!(node.children.len(), 1);
                assert_eq!(graph.node(node.children[0]).kind, RouteNodeKind::Sink);
            }
        }
    }

    #[test]
    fn sinks_have_no_children() {
        let (_, _, graph) = fixture();
        for node in graph.nodes() {
            if node.kind == RouteNodeKind::Sink {
                assert!(node.children.is_empty());
            }
        }
    }

    #[test]
    fn base_cost_per_distance_is_wire_delay() {
        let (_, _, graph) = fixture();
        // Unit wires with uniform delay: the average per distance equals
        // the per-unit delay, and wire base costs equal it too.
        assert_eq!(
            graph.base_cost_per_distance(),
            RrgOptions::default().wire_delay_per_unit
        );
        for node in graph.nodes() {
            if node.kind.is_wire() {
                assert_eq!(node.base_cost, graph.base_cost_per_distance());
            }
        }
        assert!(graph.ipin_base_cost() > 0.0);
    }

    #[test]
    fn pin_nodes_resolve_for_placed_blocks() {
        let (_, circuit, graph) = fixture();
        for (driver, sink) in circuit.connections() {
            let source = graph.source_of_pin(&circuit, driver).unwrap();
            let target = graph.sink_of_pin(&circuit, sink).unwrap();
            assert_eq!(graph.node(source).kind, RouteNodeKind::Source);
            assert_eq!(graph.node(target).kind, RouteNodeKind::Sink);
        }
    }

    #[test]
    fn unplaced_block_is_an_error() {
        let arch = load_architecture("basic").unwrap();
        let circuit = parse_net_text(NET, "c", "c.net", &arch, None).unwrap();
        let graph = ResourceGraph::build(&circuit, &arch, &RrgOptions::default());
        let (driver, _) = circuit.connections()[0];
        let err = graph.source_of_pin(&circuit, driver).unwrap_err();
        assert!(matches!(err, RouteError::UnplacedBlock { .. }));
    }

    #[test]
    fn expected_distance_is_manhattan() {
        let (_, _, graph) = fixture();
        let a = graph.nodes().iter().find(|n| n.x == 0 && n.y == 0).unwrap();
        let b = graph.nodes().iter().find(|n| n.x == 2 && n.y == 1).unwrap();
        assert_eq!(graph.expected_distance_to_target(a.id, b.id), 3.0);
    }

    #[test]
    fn describe_names_kind_and_position() {
        let (_, _, graph) = fixture();
        let node = &graph.nodes()[0];
        let text = node.describe();
        assert!(text.contains("CHANX") || text.contains("CHANY"));
        assert!(text.contains("(0, 0)"));
    }
}
