//! Routing for the Fabric engine.
//!
//! Builds a routing-resource graph (RRG) over the placed device grid and
//! routes every driver-to-sink connection with a negotiated-congestion,
//! timing-driven router in the Pathfinder family. The RRG structure is
//! immutable; all mutable routing state lives in a dense parallel array so
//! one graph can serve many router runs.

#![warn(missing_docs)]

pub mod connection;
pub mod graph;
pub mod ids;
pub mod router;
pub mod state;

pub use connection::Connection;
pub use graph::{ResourceGraph, RouteError, RouteNode, RouteNodeKind, RrgOptions};
pub use ids::RouteNodeId;
pub use router::{ConnectionRouter, IterationStats, RouterOptions, RoutingResult};
pub use state::{RouteNodeData, RoutingState};
