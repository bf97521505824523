//! Blocks, pins, and site references.
//!
//! The deep block/pin hierarchies of classic academic packers collapse here
//! into flat records keyed by arena indices: a [`Block`] is a global block
//! (I/O pad, CLB, or hardblock), a [`Pin`] is one bit of one of its ports.

use crate::ids::{BlockId, NetId, PinId};
use fabric_arch::{BlockTypeId, PortDirection, PortTypeId};
use serde::{Deserialize, Serialize};

/// A site assignment: grid coordinates plus the sub-slot index.
///
/// `subblock` is only meaningful on I/O sites with capacity > 1; it is 0
/// everywhere else.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct SiteRef {
    /// Column of the site.
    pub x: u32,
    /// Row of the site (top row of a multi-row hardblock site).
    pub y: u32,
    /// Sub-slot within the site.
    pub subblock: u32,
}

impl SiteRef {
    /// Creates a site reference with sub-slot 0.
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y, subblock: 0 }
    }

    /// Creates a site reference with an explicit sub-slot.
    pub fn with_subblock(x: u32, y: u32, subblock: u32) -> Self {
        Self { x, y, subblock }
    }
}

/// A global block of the circuit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    /// The unique ID of this block.
    pub id: BlockId,
    /// Netlist name of the block.
    pub name: String,
    /// The architecture block type.
    pub block_type: BlockTypeId,
    /// Index of the chosen mode in the type's mode list.
    pub mode: usize,
    /// All pins of this block, in port order.
    pub pins: Vec<PinId>,
    /// Current site assignment (`None` = unplaced).
    pub site: Option<SiteRef>,
}

impl Block {
    /// The x coordinate of the assigned site. Panics if unplaced.
    pub fn x(&self) -> u32 {
        self.site.expect("block is not placed").x
    }

    /// The y coordinate of the assigned site. Panics if unplaced.
    pub fn y(&self) -> u32 {
        self.site.expect("block is not placed").y
    }
}

/// One bit of one port of a block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pin {
    /// The unique ID of this pin.
    pub id: PinId,
    /// The block this pin belongs to.
    pub block: BlockId,
    /// The architecture port type.
    pub port_type: PortTypeId,
    /// Bit index within the port.
    pub bit: u32,
    /// Direction relative to the block.
    pub direction: PortDirection,
    /// The net this pin is connected to (`None` = unconnected).
    pub net: Option<NetId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_ref_constructors() {
        let plain = SiteRef::new(3, 4);
        assert_eq!(plain.subblock, 0);
        let sub = SiteRef::with_subblock(0, 2, 1);
        assert_eq!((sub.x, sub.y, sub.subblock), (0, 2, 1));
    }

    #[test]
    fn block_coordinates() {
        let block = Block {
            id: BlockId::from_raw(0),
            name: "b".into(),
            block_type: BlockTypeId::from_raw(0),
            mode: 0,
            pins: vec![],
            site: Some(SiteRef::new(5, 7)),
        };
        assert_eq!(block.x(), 5);
        assert_eq!(block.y(), 7);
    }

    #[test]
    #[should_panic(expected = "not placed")]
    fn unplaced_block_panics() {
        let block = Block {
            id: BlockId::from_raw(0),
            name: "b".into(),
            block_type: BlockTypeId::from_raw(0),
            mode: 0,
            pins: vec![],
            site: None,
        };
        let _ = block.x();
    }

    #[test]
    fn serde_roundtrip() {
        let pin = Pin {
            id: PinId::from_raw(1),
            block: BlockId::from_raw(2),
            port_type: PortTypeId::from_raw(3),
            bit: 0,
            direction: PortDirection::Input,
            net: Some(NetId::from_raw(4)),
        };
        let json = serde_json::to_string(&pin).unwrap();
        let back: Pin = serde_json::from_str(&json).unwrap();
        assert_eq!(back.block, pin.block);
        assert_eq!(back.net, pin.net);
    }
}
