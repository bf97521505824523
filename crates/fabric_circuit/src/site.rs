//! Physical sites of the device grid.

use crate::ids::BlockId;
use fabric_arch::BlockTypeId;
use serde::{Deserialize, Serialize};

/// A placement location on the device grid.
///
/// CLB and hardblock sites hold a single block; I/O sites hold up to
/// `io_capacity` blocks in separate sub-slots. A hardblock site of height h
/// occupies rows `y .. y + h` of its column but is stored once, at its
/// lowest row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Site {
    /// Column of the site.
    pub x: u32,
    /// Lowest row of the site.
    pub y: u32,
    /// The block type this site accepts.
    pub block_type: BlockTypeId,
    /// Current occupant of each sub-slot.
    pub occupants: Vec<Option<BlockId>>,
}

impl Site {
    /// Creates an empty site with the given capacity.
    pub fn new(x: u32, y: u32, block_type: BlockTypeId, capacity: u32) -> Self {
        Self {
            x,
            y,
            block_type,
            occupants: vec![None; capacity as usize],
        }
    }

    /// The number of sub-slots.
    pub fn capacity(&self) -> u32 {
        self.occupants.len() as u32
    }

    /// The number of occupied sub-slots.
    pub fn occupation(&self) -> u32 {
        self.occupants.iter().filter(|slot| slot.is_some()).count() as u32
    }

    /// The lowest free sub-slot, if any.
    pub fn free_subblock(&self) -> Option<u32> {
        self.occupants
            .iter()
            .position(|slot| slot.is_none())
            .map(|index| index as u32)
    }

    /// The occupant of `subblock`, if any.
    pub fn occupant(&self, subblock: u32) -> Option<BlockId> {
        self.occupants[subblock as usize]
    }
}
