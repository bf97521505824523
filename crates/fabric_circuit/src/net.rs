//! Nets and the bounding-box wire-length cost model.
//!
//! The per-net cost is the half-perimeter of the net's bounding box scaled
//! by the classic VPR crossing-count factor `q`, which compensates for the
//! half-perimeter underestimating the wiring of high-fanout nets.

use crate::ids::{NetId, PinId};
use serde::{Deserialize, Serialize};

/// A signal net: one driver pin and a set of sink pins.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Net {
    /// The unique ID of this net.
    pub id: NetId,
    /// Netlist name of the net.
    pub name: String,
    /// The pin driving this net.
    pub driver: PinId,
    /// The pins reading this net.
    pub sinks: Vec<PinId>,
}

impl Net {
    /// Number of sink pins.
    pub fn fanout(&self) -> usize {
        self.sinks.len()
    }

    /// Number of terminals (driver plus sinks).
    pub fn num_terminals(&self) -> usize {
        1 + self.sinks.len()
    }

    /// Iterates over all pins of the net, driver first.
    pub fn pins(&self) -> impl Iterator<Item = PinId> + '_ {
        std::iter::once(self.driver).chain(self.sinks.iter().copied())
    }
}

/// The bounding box of a net over its blocks' site coordinates.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Smallest x over the net's blocks.
    pub x_min: u32,
    /// Largest x over the net's blocks.
    pub x_max: u32,
    /// Smallest y over the net's blocks.
    pub y_min: u32,
    /// Largest y over the net's blocks.
    pub y_max: u32,
}

impl BoundingBox {
    /// A degenerate box covering a single point.
    pub fn at(x: u32, y: u32) -> Self {
        Self {
            x_min: x,
            x_max: x,
            y_min: y,
            y_max: y,
        }
    }

    /// Extends the box to cover `(x, y)`.
    pub fn expand(&mut self, x: u32, y: u32) {
        self.x_min = self.x_min.min(x);
        self.x_max = self.x_max.max(x);
        self.y_min = self.y_min.min(y);
        self.y_max = self.y_max.max(y);
    }

    /// The half-perimeter wire length of the box.
    pub fn half_perimeter(&self) -> u32 {
        (self.x_max - self.x_min) + (self.y_max - self.y_min)
    }

    /// The geometric center of the box.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.x_min + self.x_max) as f64 / 2.0,
            (self.y_min + self.y_max) as f64 / 2.0,
        )
    }

    /// Whether `(x, y)` lies inside the box inflated by `margin` on all
    /// sides (saturating at the device origin).
    pub fn contains_with_margin(&self, x: u32, y: u32, margin: u32) -> bool {
        x + margin >= self.x_min
            && x <= self.x_max + margin
            && y + margin >= self.y_min
            && y <= self.y_max + margin
    }
}

/// Crossing-count factors for terminal counts 1 through 50.
const CROSSING_COUNT: [f64; 50] = [
    1.0, 1.0, 1.0, 1.0828, 1.1536, 1.2206, 1.2823, 1.3385, 1.3991, 1.4493, //
    1.4974, 1.5455, 1.5937, 1.6418, 1.6899, 1.7304, 1.7709, 1.8114, 1.8519, 1.8924, //
    1.9288, 1.9652, 2.0015, 2.0379, 2.0743, 2.1061, 2.1379, 2.1698, 2.2016, 2.2334, //
    2.2646, 2.2958, 2.3271, 2.3583, 2.3895, 2.4187, 2.4479, 2.4772, 2.5064, 2.5356, //
    2.5610, 2.5864, 2.6117, 2.6371, 2.6625, 2.6887, 2.7148, 2.7410, 2.7671, 2.7933,
];

/// The crossing-count factor `q` for a net with `num_terminals` pins.
///
/// Tabulated up to 50 terminals, linear beyond.
pub fn crossing_count(num_terminals: usize) -> f64 {
    if num_terminals == 0 {
        return 1.0;
    }
    if num_terminals <= CROSSING_COUNT.len() {
        CROSSING_COUNT[num_terminals - 1]
    } else {
        0.02013 * (num_terminals - 50) as f64 + 2.79
    }
}

/// The bounding-box cost of one net: `(bb_x + bb_y + 2) * q(terminals)`.
pub fn bounding_box_cost(bb: &BoundingBox, num_terminals: usize) -> f64 {
    (bb.half_perimeter() + 2) as f64 * crossing_count(num_terminals)
}
