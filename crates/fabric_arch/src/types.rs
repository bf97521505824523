//! Data types of the architecture registries.
//!
//! A device architecture is a set of block types (IO pads, CLBs, hardblocks
//! and the internal intermediate/leaf types reachable through modes) and a
//! set of port types carrying the delay tables. All delays are picoseconds.

use crate::ids::{BlockTypeId, PortTypeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The category of a block type.
///
/// Global categories (`Io`, `Clb`, `HardBlock`) occupy device sites;
/// `Intermediate` and `Leaf` types only appear inside modes of other types.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum BlockCategory {
    /// An I/O pad block on the device perimeter.
    Io,
    /// A configurable logic block in the general columns.
    Clb,
    /// A hard block (multiplier, memory) in a patterned column.
    HardBlock,
    /// An internal non-leaf decomposition level.
    Intermediate,
    /// A primitive block with no further decomposition.
    Leaf,
}

impl BlockCategory {
    /// Returns `true` for categories that occupy device sites.
    pub fn is_global(self) -> bool {
        matches!(
            self,
            BlockCategory::Io | BlockCategory::Clb | BlockCategory::HardBlock
        )
    }
}

impl fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockCategory::Io => "IO",
            BlockCategory::Clb => "CLB",
            BlockCategory::HardBlock => "hardblock",
            BlockCategory::Intermediate => "intermediate",
            BlockCategory::Leaf => "leaf",
        };
        write!(f, "{name}")
    }
}

/// The direction of a port relative to its block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum PortDirection {
    /// Data flows into the block through this port.
    Input,
    /// Data flows out of the block through this port.
    Output,
}

/// One mode of a block type: a named choice of internal decomposition.
///
/// Leaf types have a single unnamed mode with no children.
#[derive(Clone, Debug)]
pub struct Mode {
    /// The mode name ("" for the unnamed leaf mode).
    pub name: String,
    /// Child block types and their instance counts.
    pub children: Vec<(BlockTypeId, u32)>,
}

/// A block type in the architecture registry.
#[derive(Clone, Debug)]
pub struct BlockTypeData {
    /// The type name from the architecture file.
    pub name: String,
    /// The category of this type.
    pub category: BlockCategory,
    /// Height in grid rows (hardblocks may span several).
    pub height: u32,
    /// First interior column offset of this type's column pattern.
    pub start: u32,
    /// Column pattern period.
    pub repeat: u32,
    /// Whether this type latches its inputs on a clock edge. For non-leaf
    /// types this is derived: set if any child type is clocked.
    pub clocked: bool,
    /// Input port types, in declaration order.
    pub inputs: Vec<PortTypeId>,
    /// Output port types, in declaration order.
    pub outputs: Vec<PortTypeId>,
    /// The modes of this type (exactly one, unnamed, for leaves).
    pub modes: Vec<Mode>,
}

impl BlockTypeData {
    /// Returns all port types of this block, inputs first.
    pub fn ports(&self) -> impl Iterator<Item = PortTypeId> + '_ {
        self.inputs.iter().chain(self.outputs.iter()).copied()
    }
}

/// A port type: a (block type, port name) pair with its delay data.
#[derive(Clone, Debug)]
pub struct PortTypeData {
    /// The block type this port belongs to.
    pub block_type: BlockTypeId,
    /// The port name.
    pub name: String,
    /// Number of pins in this port.
    pub width: u32,
    /// Direction relative to the owning block.
    pub direction: PortDirection,
    /// Setup time at this port: the sink setup for inputs of clocked
    /// blocks, the clock-to-output delay for their outputs.
    pub setup_time: f64,
    /// Sparse delay table: sink port type to propagation delay.
    pub delays: HashMap<PortTypeId, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_categories() {
        assert!(BlockCategory::Io.is_global());
        assert!(BlockCategory::Clb.is_global());
        assert!(BlockCategory::HardBlock.is_global());
        assert!(!BlockCategory::Intermediate.is_global());
        assert!(!BlockCategory::Leaf.is_global());
    }

    #[test]
    fn category_display() {
        assert_eq!(format!("{}", BlockCategory::Io), "IO");
        assert_eq!(format!("{}", BlockCategory::HardBlock), "hardblock");
    }

    #[test]
    fn ports_iterates_inputs_first() {
        let data = BlockTypeData {
            name: "clb".into(),
            category: BlockCategory::Clb,
            height: 1,
            start: 0,
            repeat: 1,
            clocked: true,
            inputs: vec![PortTypeId::from_raw(0)],
            outputs: vec![PortTypeId::from_raw(1)],
            modes: vec![],
        };
        let ports: Vec<_> = data.ports().collect();
        assert_eq!(ports, vec![PortTypeId::from_raw(0), PortTypeId::from_raw(1)]);
    }
}
