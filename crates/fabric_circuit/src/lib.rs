//! Circuit and device-grid model for the Fabric place-and-route engine.
//!
//! This crate owns the shared data model of the pipeline: global blocks,
//! pins, and nets in arena storage, the device [`Grid`] with its I/O ring
//! and hardblock column pattern, the bounding-box wire-length cost, and
//! the netlist/placement file formats.
//!
//! Architecture data is threaded in by reference from [`fabric_arch`];
//! nothing here is global. Site assignments are the only state that
//! mutates after construction.

#![warn(missing_docs)]

pub mod block;
pub mod circuit;
pub mod error;
pub mod grid;
pub mod ids;
pub mod net;
pub mod netfile;
pub mod placefile;
pub mod site;

pub use block::{Block, Pin, SiteRef};
pub use circuit::{Circuit, CircuitBuilder};
pub use error::CircuitError;
pub use grid::Grid;
pub use ids::{BlockId, NetId, PinId};
pub use net::{bounding_box_cost, crossing_count, BoundingBox, Net};
pub use netfile::{parse_net_file, parse_net_text};
pub use placefile::{apply_place_file, format_placement, read_array_size, write_place_file};
pub use site::Site;
