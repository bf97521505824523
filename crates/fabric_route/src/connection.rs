//! Connections: the unit of routing.
//!
//! Every net decomposes into one connection per sink pin. A connection
//! owns its route (the ordered RRG node list from its SOURCE to its SINK)
//! and carries the timing criticality and the net geometry the cost
//! function needs (bounding box, center, half-perimeter, fanout).

use crate::graph::{ResourceGraph, RouteNodeKind};
use crate::ids::RouteNodeId;
use crate::state::RoutingState;
use fabric_circuit::{BoundingBox, NetId, PinId};

/// One driver-pin to sink-pin connection with its routing.
#[derive(Debug, Clone)]
pub struct Connection {
    /// The driving pin (shared by all connections of the net).
    pub driver: PinId,
    /// The sink pin.
    pub sink: PinId,
    /// The owning net.
    pub net: NetId,
    /// SOURCE node of the driver at its current site.
    pub source_node: RouteNodeId,
    /// SINK node of the sink pin at its current site.
    pub sink_node: RouteNodeId,
    /// The current route, source first (empty = unrouted).
    pub route: Vec<RouteNodeId>,
    /// Timing criticality in [0, 1].
    pub criticality: f64,
    /// The net's placed bounding box.
    pub bounding_box: BoundingBox,
    /// Geometric center of the net's bounding box.
    pub net_center: (f64, f64),
    /// Half-perimeter of the net's bounding box, floored at 1.
    pub net_hpwl: f64,
    /// Sink count of the net, floored at 1.
    pub net_fanout: f64,
}

impl Connection {
    /// The OPIN this connection currently leaves through, if routed.
    pub fn opin(&self, graph: &ResourceGraph) -> Option<RouteNodeId> {
        self.route
            .iter()
            .copied()
            .find(|&node| graph.node(node).kind == RouteNodeKind::Opin)
    }

    /// Whether any node of the current route is overused.
    pub fn congested(&self, graph: &ResourceGraph, state: &RoutingState) -> bool {
        self.route
            .iter()
            .any(|&node| state.overused(node, graph.node(node).capacity))
    }

    /// Sum of the intrinsic delays along the current route.
    pub fn route_delay(&self, graph: &ResourceGraph) -> f64 {
        self.route
            .iter()
            .map(|&node| graph.node(node).t_linear)
            .sum()
    }

    /// Whether a wire node lies within the net's bounding box inflated by
    /// `margin`.
    pub fn in_bounding_box_limit(&self, graph: &ResourceGraph, node: RouteNodeId, margin: u32) -> bool {
        let node = graph.node(node);
        self.bounding_box.contains_with_margin(node.x, node.y, margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_fields_round_trip() {
        let bb = {
            let mut bb = BoundingBox::at(1, 1);
            bb.expand(4, 3);
            bb
        };
        let connection = Connection {
            driver: PinId::from_raw(0),
            sink: PinId::from_raw(1),
            net: NetId::from_raw(0),
            source_node: RouteNodeId::from_raw(0),
            sink_node: RouteNodeId::from_raw(1),
            route: Vec::new(),
            criticality: 0.0,
            bounding_box: bb,
            net_center: bb.center(),
            net_hpwl: bb.half_perimeter().max(1) as f64,
            net_fanout: 1.0,
        };
        assert_eq!(connection.net_center, (2.5, 2.0));
        assert_eq!(connection.net_hpwl, 5.0);
        assert!(connection.route.is_empty());
    }
}
