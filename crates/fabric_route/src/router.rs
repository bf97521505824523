//! The negotiated-congestion timing-driven connection router.
//!
//! Pathfinder-style: every connection is ripped up and rerouted while the
//! present congestion penalty sharpens and the history penalty accumulates
//! on overused nodes, until no node is overused. Criticality-weighted
//! costs trade wire length against delay per connection, OPIN binding
//! forces every net through a single output pin from iteration
//! `fix_opins_from` on, and a self-limiting reroute-criticality threshold
//! keeps the set of always-rerouted critical connections small.
//!
//! The per-connection search is best-first over the RRG, keyed by a
//! deliberately non-admissible lower bound (directed search, not A*);
//! decrease-key is reinsertion with stale-entry skipping on pop.

use crate::connection::Connection;
use crate::graph::{ResourceGraph, RouteError, RouteNodeKind};
use crate::ids::RouteNodeId;
use crate::state::RoutingState;
use fabric_circuit::{Circuit, NetId};
use fabric_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use fabric_timing::{TimingGraph, CRITICALITY_EXPONENT, MAX_CRITICALITY};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Initial reroute-criticality threshold.
const REROUTE_CRITICALITY: f64 = 0.85;

/// Cap on always-rerouted critical connections, percent of all connections.
const MAX_PERCENTAGE_CRITICAL_CONNECTIONS: f64 = 3.0;

/// Weight of the bias cost steering connections toward their net center.
const BIAS_BETA: f64 = 0.5;

/// Discount multiplier for nodes already used by the same net.
const USAGE_MULTIPLIER: f64 = 10.0;

/// Options of the connection router.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Maximum Pathfinder iterations.
    pub max_trials: usize,
    /// First iteration that binds net OPINs.
    pub fix_opins_from: usize,
    /// Whether delay feedback drives criticalities each iteration.
    pub timing_driven: bool,
    /// Weight of the expected wire-length term of the lower bound.
    pub alpha_wld: f64,
    /// Weight of the expected timing term of the lower bound.
    pub alpha_td: f64,
    /// Present congestion factor of the first iteration.
    pub initial_pres_fac: f64,
    /// Multiplier on the present congestion factor per iteration.
    pub pres_fac_mult: f64,
    /// Historical congestion increment per unit of overuse.
    pub acc_fac: f64,
    /// Margin added around a net's bounding box for wire expansion.
    pub bounding_box_margin: u32,
    /// Sort the first iteration by bounding box instead of fanout.
    pub sort_by_bounding_box: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            max_trials: 100,
            fix_opins_from: 4,
            timing_driven: true,
            alpha_wld: 1.5,
            alpha_td: 0.75,
            initial_pres_fac: 0.6,
            pres_fac_mult: 2.0,
            acc_fac: 1.0,
            bounding_box_margin: 3,
            sort_by_bounding_box: false,
        }
    }
}

/// Statistics of one Pathfinder iteration.
#[derive(Debug, Clone)]
pub struct IterationStats {
    /// 1-based iteration number.
    pub iteration: usize,
    /// Number of overused RRG nodes.
    pub overused_nodes: usize,
    /// Overused nodes as a fraction of the graph.
    pub overuse_fraction: f64,
    /// Total occupied wire length.
    pub wirelength: u64,
    /// Critical-path delay after this iteration, picoseconds.
    pub max_delay: f64,
}

/// The outcome of a routing run.
#[derive(Debug)]
pub struct RoutingResult {
    /// Whether the final routing is free of overuse.
    pub valid: bool,
    /// Per-iteration statistics.
    pub iterations: Vec<IterationStats>,
    /// Descriptions of the overused nodes of a failed run.
    pub overused_report: Vec<String>,
    /// All connections with their final routes.
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone)]
struct QueueElement {
    node: RouteNodeId,
    cost: f64,
}

impl PartialEq for QueueElement {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}

impl Eq for QueueElement {}

impl Ord for QueueElement {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for a min-heap on the lower-bound cost.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for QueueElement {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The connection router over one resource graph.
pub struct ConnectionRouter<'a> {
    graph: &'a ResourceGraph,
    options: RouterOptions,
    state: RoutingState,
    queue: BinaryHeap<QueueElement>,
    nodes_touched: Vec<RouteNodeId>,
    pres_fac: f64,
}

impl<'a> ConnectionRouter<'a> {
    /// Creates a router with fresh routing state.
    pub fn new(graph: &'a ResourceGraph, options: RouterOptions) -> Self {
        let pres_fac = options.initial_pres_fac;
        Self {
            graph,
            options,
            state: RoutingState::new(graph),
            queue: BinaryHeap::new(),
            nodes_touched: Vec::new(),
            pres_fac,
        }
    }

    /// Routes every connection of the circuit.
    ///
    /// An unreachable sink is fatal; running out of iterations is not:
    /// the last routing is returned with `valid == false` and a
    /// congestion report, and a warning goes to `sink`.
    pub fn route(
        &mut self,
        circuit: &Circuit,
        timing: &mut TimingGraph,
        sink: &mut DiagnosticSink,
    ) -> Result<RoutingResult, RouteError> {
        let mut connections = self.build_connections(circuit)?;
        if connections.is_empty() {
            return Ok(RoutingResult {
                valid: true,
                iterations: Vec::new(),
                overused_report: Vec::new(),
                connections,
            });
        }

        // Initial criticalities come from the placement estimate, also in
        // pure wire-length mode.
        timing.calculate_placement_estimated_wire_delay(circuit);
        timing.calculate_arrival_and_required_times();
        timing.calculate_criticalities(MAX_CRITICALITY, CRITICALITY_EXPONENT);
        for connection in connections.iter_mut() {
            connection.criticality = timing.connection_criticality(connection.driver, connection.sink);
        }

        // First-iteration routing order, and the net order for OPIN fixing.
        let mut order: Vec<usize> = (0..connections.len()).collect();
        if self.options.sort_by_bounding_box {
            order.sort_by(|&a, &b| {
                connections[b]
                    .net_hpwl
                    .total_cmp(&connections[a].net_hpwl)
                    .then(a.cmp(&b))
            });
        } else {
            order.sort_by(|&a, &b| {
                connections[b]
                    .net_fanout
                    .total_cmp(&connections[a].net_fanout)
                    .then(a.cmp(&b))
            });
        }

        let mut net_connections: HashMap<NetId, Vec<usize>> = HashMap::new();
        for (index, connection) in connections.iter().enumerate() {
            net_connections.entry(connection.net).or_default().push(index);
        }
        let mut nets_by_fanout: Vec<NetId> = net_connections.keys().copied().collect();
        nets_by_fanout.sort_by_key(|&net| {
            (std::cmp::Reverse(circuit.net(net).fanout()), net.as_raw())
        });
        let mut net_opins: HashMap<NetId, RouteNodeId> = HashMap::new();

        self.pres_fac = self.options.initial_pres_fac;
        let mut iterations = Vec::new();
        let mut valid = false;

        for itry in 1..=self.options.max_trials {
            valid = true;

            // OPIN fixing: bind each still-open net to its most-used free
            // OPIN and pull its stray connections over.
            if itry >= self.options.fix_opins_from {
                for &net in &nets_by_fanout {
                    if net_opins.contains_key(&net) {
                        continue;
                    }
                    let members = &net_connections[&net];
                    let driver = connections[members[0]].driver;
                    if let Some(opin) = self.most_used_opin(&connections, members) {
                        if !self.state.node(opin).used_by_other(driver) {
                            net_opins.insert(net, opin);
                            for &index in members {
                                if connections[index].opin(self.graph) != Some(opin) {
                                    self.ripup(&connections[index]);
                                    self.route_connection(
                                        circuit,
                                        &mut connections[index],
                                        Some(opin),
                                    )?;
                                    self.add(&connections[index]);
                                }
                            }
                        }
                    }
                    valid = false;
                }
            } else {
                valid = false;
            }

            let reroute_criticality = reroute_criticality(&connections);

            for &index in &order {
                let bound_opin = net_opins.get(&connections[index].net).copied();
                if itry == 1 {
                    self.ripup(&connections[index]);
                    self.route_connection(circuit, &mut connections[index], bound_opin)?;
                    self.add(&connections[index]);
                    valid = false;
                } else if connections[index].congested(self.graph, &self.state) {
                    self.ripup(&connections[index]);
                    self.route_connection(circuit, &mut connections[index], bound_opin)?;
                    self.add(&connections[index]);
                    valid = false;
                } else if connections[index].criticality > reroute_criticality {
                    self.ripup(&connections[index]);
                    self.route_connection(circuit, &mut connections[index], bound_opin)?;
                    self.add(&connections[index]);
                }
            }

            // Delay feedback and statistics. Actual wire delays are always
            // computed; criticalities only move in timing-driven mode.
            let old_max_delay = timing.max_delay();
            for connection in connections.iter() {
                if let Some(edge) = timing.wire_edge(connection.driver, connection.sink) {
                    timing.set_wire_delay(edge, connection.route_delay(self.graph));
                }
            }
            timing.calculate_arrival_and_required_times();
            if self.options.timing_driven {
                timing.calculate_criticalities(MAX_CRITICALITY, CRITICALITY_EXPONENT);
                for connection in connections.iter_mut() {
                    connection.criticality =
                        timing.connection_criticality(connection.driver, connection.sink);
                }
                if timing.max_delay() < old_max_delay {
                    valid = false;
                }
            }

            let overused = self.overused_nodes(&connections);
            iterations.push(IterationStats {
                iteration: itry,
                overused_nodes: overused.len(),
                overuse_fraction: overused.len() as f64 / self.graph.num_nodes() as f64,
                wirelength: self.occupied_wirelength(),
                max_delay: timing.max_delay(),
            });

            if valid {
                break;
            }

            if itry > 1 {
                self.pres_fac *= self.options.pres_fac_mult;
            }
            self.update_cost();
        }

        let mut overused_report = Vec::new();
        if !valid {
            let overused = self.overused_nodes(&connections);
            overused_report = overused
                .iter()
                .map(|&node| self.graph.node(node).describe())
                .collect();
            overused_report.sort();
            sink.emit(
                Diagnostic::warning(
                    DiagnosticCode::new(Category::Routing, 20),
                    format!(
                        "routing did not converge after {} iterations",
                        self.options.max_trials
                    ),
                )
                .with_note(format!(
                    "{} overused routing resources remain",
                    overused_report.len()
                )),
            );
        }

        Ok(RoutingResult {
            valid,
            iterations,
            overused_report,
            connections,
        })
    }

    /// Builds one connection per net sink from the placed circuit.
    fn build_connections(&self, circuit: &Circuit) -> Result<Vec<Connection>, RouteError> {
        let mut connections = Vec::new();
        for net in &circuit.nets {
            if net.sinks.is_empty() {
                continue;
            }
            let bounding_box = circuit
                .net_bounding_box(net.id)
                .ok_or_else(|| RouteError::UnplacedBlock {
                    block: circuit.block(circuit.pin(net.driver).block).name.clone(),
                })?;
            let source_node = self.graph.source_of_pin(circuit, net.driver)?;
            for &sink in &net.sinks {
                let sink_node = self.graph.sink_of_pin(circuit, sink)?;
                connections.push(Connection {
                    driver: net.driver,
                    sink,
                    net: net.id,
                    source_node,
                    sink_node,
                    route: Vec::new(),
                    criticality: 0.0,
                    bounding_box,
                    net_center: bounding_box.center(),
                    net_hpwl: f64::from(bounding_box.half_perimeter().max(1)),
                    net_fanout: net.fanout().max(1) as f64,
                });
            }
        }
        Ok(connections)
    }

    /// The OPIN used by most of the net's connections; ties take the
    /// lowest node ID.
    fn most_used_opin(
        &self,
        connections: &[Connection],
        members: &[usize],
    ) -> Option<RouteNodeId> {
        let mut counts: HashMap<RouteNodeId, usize> = HashMap::new();
        for &index in members {
            if let Some(opin) = connections[index].opin(self.graph) {
                *counts.entry(opin).or_insert(0) += 1;
            }
        }
        counts
            .into_iter()
            .max_by_key(|&(opin, count)| (count, std::cmp::Reverse(opin.as_raw())))
            .map(|(opin, _)| opin)
    }

    /// Removes a connection's route from the occupancy bookkeeping.
    pub(crate) fn ripup(&mut self, connection: &Connection) {
        for &node in &connection.route {
            self.state.remove_source(node, connection.driver);
            let capacity = self.graph.node(node).capacity;
            self.state.update_present_congestion(node, capacity, self.pres_fac);
        }
    }

    /// Adds a connection's route to the occupancy bookkeeping.
    pub(crate) fn add(&mut self, connection: &Connection) {
        for &node in &connection.route {
            self.state.add_source(node, connection.driver);
            let capacity = self.graph.node(node).capacity;
            self.state.update_present_congestion(node, capacity, self.pres_fac);
        }
    }

    /// Routes one connection by best-first directed search.
    fn route_connection(
        &mut self,
        circuit: &Circuit,
        connection: &mut Connection,
        bound_opin: Option<RouteNodeId>,
    ) -> Result<(), RouteError> {
        connection.route.clear();
        self.queue.clear();
        self.enqueue(connection.source_node, None, 0.0, 0.0);

        loop {
            let Some(element) = self.queue.pop() else {
                self.reset_path_cost();
                return Err(RouteError::UnreachableSink {
                    connection: format!(
                        "net `{}` to pin {}",
                        circuit.net(connection.net).name,
                        connection.sink
                    ),
                });
            };
            if element.cost > self.state.node(element.node).lower_bound_cost {
                continue; // stale reinsertion
            }
            if element.node == connection.sink_node {
                break;
            }
            self.expand(element.node, connection, bound_opin);
        }

        let mut node = connection.sink_node;
        loop {
            connection.route.push(node);
            match self.state.node(node).prev {
                Some(previous) => node = previous,
                None => break,
            }
        }
        connection.route.reverse();
        self.reset_path_cost();
        Ok(())
    }

    /// Expands every admissible child of `node`.
    fn expand(
        &mut self,
        node: RouteNodeId,
        connection: &Connection,
        bound_opin: Option<RouteNodeId>,
    ) {
        let graph = self.graph;
        for &child in &graph.node(node).children {
            let admissible = match graph.node(child).kind {
                RouteNodeKind::Chanx | RouteNodeKind::Chany => connection.in_bounding_box_limit(
                    graph,
                    child,
                    self.options.bounding_box_margin,
                ),
                RouteNodeKind::Opin => match bound_opin {
                    Some(bound) => child == bound,
                    None => self.state.node(child).occupation == 0,
                },
                RouteNodeKind::Ipin => {
                    graph.node(child).children.first() == Some(&connection.sink_node)
                }
                RouteNodeKind::Sink => true,
                RouteNodeKind::Source => false,
            };
            if admissible {
                self.enqueue_child(node, child, connection);
            }
        }
    }

    /// Computes the partial and lower-bound costs of stepping to `child`
    /// and offers it to the queue.
    fn enqueue_child(&mut self, node: RouteNodeId, child: RouteNodeId, connection: &Connection) {
        let criticality = connection.criticality;
        let uses = self.state.node(child).count_source_uses(connection.driver);
        let partial = self.state.node(node).partial_path_cost;
        let child_node = self.graph.node(child);

        let new_partial = partial
            + (1.0 - criticality) * self.route_node_cost(child, connection, uses)
            + criticality * child_node.t_linear;

        // The remaining-cost estimate is deliberately not an admissible
        // lower bound; the search is directed, not optimal.
        let lower_bound = if child_node.kind.is_wire() {
            let distance_cost = self
                .graph
                .expected_distance_to_target(child, connection.sink_node)
                * self.graph.base_cost_per_distance();
            let expected_wire_cost =
                distance_cost / (1.0 + uses as f64) + self.graph.ipin_base_cost();
            let expected_timing_cost = distance_cost;
            new_partial
                + self.options.alpha_wld * (1.0 - criticality) * expected_wire_cost
                + self.options.alpha_td * criticality * expected_timing_cost
        } else {
            new_partial
        };

        self.enqueue(child, Some(node), new_partial, lower_bound);
    }

    /// Records the candidate path to `node` and pushes a queue entry if it
    /// improves on what the node has seen in this search.
    fn enqueue(
        &mut self,
        node: RouteNodeId,
        prev: Option<RouteNodeId>,
        partial: f64,
        lower_bound: f64,
    ) {
        let data = self.state.node_mut(node);
        if !data.touched {
            data.touched = true;
            data.partial_path_cost = partial;
            data.lower_bound_cost = lower_bound;
            data.prev = prev;
            self.nodes_touched.push(node);
            self.queue.push(QueueElement {
                node,
                cost: lower_bound,
            });
        } else if lower_bound < data.lower_bound_cost {
            data.partial_path_cost = partial;
            data.lower_bound_cost = lower_bound;
            data.prev = prev;
            self.queue.push(QueueElement {
                node,
                cost: lower_bound,
            });
        }
    }

    /// The congestion-aware cost of taking `node` for `connection`.
    fn route_node_cost(&self, node: RouteNodeId, connection: &Connection, uses: u32) -> f64 {
        let graph_node = self.graph.node(node);
        let data = self.state.node(node);

        let pres_cost = if uses != 0 {
            // The connection's net is already on this node; congestion
            // only matters beyond the capacity left for others.
            let overoccupation = data.num_unique_sources() as i64 - graph_node.capacity as i64;
            if overoccupation < 0 {
                1.0
            } else {
                1.0 + overoccupation as f64 * self.pres_fac
            }
        } else {
            data.pres_cost
        };

        let (center_x, center_y) = connection.net_center;
        let bias_cost = BIAS_BETA * graph_node.base_cost / connection.net_fanout
            * ((graph_node.x as f64 - center_x).abs() + (graph_node.y as f64 - center_y).abs())
            / connection.net_hpwl;

        graph_node.base_cost * data.acc_cost * pres_cost / (1.0 + USAGE_MULTIPLIER * uses as f64)
            + bias_cost
    }

    /// O(touched) reset of the search scratch.
    fn reset_path_cost(&mut self) {
        for &node in &self.nodes_touched {
            self.state.node_mut(node).touched = false;
        }
        self.nodes_touched.clear();
    }

    /// End-of-iteration present/history penalty refresh over all nodes.
    fn update_cost(&mut self) {
        for index in 0..self.graph.num_nodes() {
            let node = RouteNodeId::from_raw(index as u32);
            let capacity = self.graph.node(node).capacity;
            let data = self.state.node_mut(node);
            let overuse = data.occupation as i64 - capacity as i64;
            if overuse == 0 {
                data.pres_cost = 1.0 + self.pres_fac;
            } else if overuse > 0 {
                data.pres_cost = 1.0 + (overuse + 1) as f64 * self.pres_fac;
                data.acc_cost += overuse as f64 * self.options.acc_fac;
            }
        }
    }

    /// All overused nodes on current routes.
    fn overused_nodes(&self, connections: &[Connection]) -> HashSet<RouteNodeId> {
        let mut overused = HashSet::new();
        for connection in connections {
            for &node in &connection.route {
                if self.state.overused(node, self.graph.node(node).capacity) {
                    overused.insert(node);
                }
            }
        }
        overused
    }

    /// Total wire length currently occupied, weighted by occupation.
    fn occupied_wirelength(&self) -> u64 {
        self.graph
            .nodes()
            .iter()
            .filter(|node| node.kind.is_wire())
            .map(|node| self.state.node(node.id).occupation as u64 * node.length as u64)
            .sum()
    }

    /// Read access to the routing state, for checks and reports.
    pub fn state(&self) -> &RoutingState {
        &self.state
    }
}

/// The self-limiting reroute-criticality threshold: starting at 0.85, the
/// threshold grows by 1 % steps until at most 3 % of the connections sit
/// above it.
pub fn reroute_criticality(connections: &[Connection]) -> f64 {
    let mut threshold = REROUTE_CRITICALITY;
    let limit =
        (connections.len() as f64 * 0.01 * MAX_PERCENTAGE_CRITICAL_CONNECTIONS) as usize;
    loop {
        let critical = connections
            .iter()
            .filter(|connection| connection.criticality > threshold)
            .count();
        if critical <= limit {
            return threshold;
        }
        threshold *= 1.01;
    }
}
