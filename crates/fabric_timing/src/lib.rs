//! Timing graph and criticality analysis for the Fabric engine.
//!
//! The [`TimingGraph`] is a DAG over circuit pins with fixed intra-block
//! delays from the architecture and mutable wire delays fed by the placer
//! (Manhattan estimates) or the router (routed-path delays). Two linear
//! passes produce arrival and required times; slack against the critical
//! path yields per-connection criticalities that weight the timing-driven
//! placement and routing cost functions.

#![warn(missing_docs)]

pub mod graph;
pub mod ids;

pub use graph::{TimingEdge, TimingEdgeKind, TimingGraph, WIRE_DELAY_PER_UNIT};
pub use ids::TimingEdgeId;

/// Criticality cap used by the timing-driven placer and router.
pub const MAX_CRITICALITY: f64 = 0.99;

/// Criticality exponent used by the timing-driven placer and router.
pub const CRITICALITY_EXPONENT: f64 = 7.0;
