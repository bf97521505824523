//! The circuit: block/pin/net arenas plus the device grid.
//!
//! Built once from a netlist through [`CircuitBuilder`]; site assignments
//! mutate during placement, everything else is fixed. All cross-references
//! are arena indices.

use crate::block::{Block, Pin, SiteRef};
use crate::error::CircuitError;
use crate::grid::Grid;
use crate::ids::{BlockId, NetId, PinId};
use crate::net::{self, BoundingBox, Net};
use fabric_arch::{Architecture, BlockCategory, BlockTypeId, PortDirection, PortTypeId};
use rand::Rng;
use std::collections::HashMap;

/// Incremental construction of a [`Circuit`].
///
/// Parsers add blocks, pins, and nets in any order; [`finish`](Self::finish)
/// wires the driver/sink lists, sizes the device, and produces the circuit.
#[derive(Debug, Default)]
pub struct CircuitBuilder {
    name: String,
    blocks: Vec<Block>,
    pins: Vec<Pin>,
    nets: Vec<Net>,
    block_by_name: HashMap<String, BlockId>,
    net_by_name: HashMap<String, NetId>,
}

impl CircuitBuilder {
    /// Creates an empty builder for a circuit called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a block and returns its ID.
    pub fn add_block(&mut self, name: impl Into<String>, block_type: BlockTypeId) -> BlockId {
        let id = BlockId::from_raw(self.blocks.len() as u32);
        let name = name.into();
        self.block_by_name.insert(name.clone(), id);
        self.blocks.push(Block {
            id,
            name,
            block_type,
            mode: 0,
            pins: Vec::new(),
            site: None,
        });
        id
    }

    /// Looks up a previously added block by name.
    pub fn block_named(&self, name: &str) -> Option<BlockId> {
        self.block_by_name.get(name).copied()
    }

    /// The type of a previously added block.
    pub fn block_type_of(&self, block: BlockId) -> BlockTypeId {
        self.blocks[block.index()].block_type
    }

    /// Adds a pin to `block` and connects it to the net called `net_name`
    /// (creating the net on first use).
    pub fn add_pin(
        &mut self,
        block: BlockId,
        port_type: PortTypeId,
        bit: u32,
        direction: PortDirection,
        net_name: &str,
    ) -> PinId {
        let net = self.net_named_or_new(net_name);
        let pin = PinId::from_raw(self.pins.len() as u32);
        self.pins.push(Pin {
            id: pin,
            block,
            port_type,
            bit,
            direction,
            net: Some(net),
        });
        self.blocks[block.index()].pins.push(pin);
        pin
    }

    fn net_named_or_new(&mut self, name: &str) -> NetId {
        if let Some(&id) = self.net_by_name.get(name) {
            return id;
        }
        let id = NetId::from_raw(self.nets.len() as u32);
        self.net_by_name.insert(name.to_string(), id);
        self.nets.push(Net {
            id,
            name: name.to_string(),
            driver: PinId::from_raw(u32::MAX),
            sinks: Vec::new(),
        });
        id
    }

    /// Finalizes the circuit: resolves net drivers/sinks, checks single
    /// drivers, and builds the device grid (auto-sized unless `fixed_size`).
    pub fn finish(
        mut self,
        arch: &Architecture,
        fixed_size: Option<u32>,
    ) -> Result<Circuit, CircuitError> {
        let mut seen_driver = vec![false; self.nets.len()];
        for pin in &self.pins {
            let Some(net) = pin.net else { continue };
            match pin.direction {
                PortDirection::Output => {
                    if seen_driver[net.index()] {
                        return Err(CircuitError::MultipleDrivers {
                            net: self.nets[net.index()].name.clone(),
                        });
                    }
                    seen_driver[net.index()] = true;
                    self.nets[net.index()].driver = pin.id;
                }
                PortDirection::Input => {
                    self.nets[net.index()].sinks.push(pin.id);
                }
            }
        }
        for (net, &has_driver) in self.nets.iter().zip(&seen_driver) {
            if !has_driver {
                return Err(CircuitError::NoDriver {
                    net: net.name.clone(),
                });
            }
        }

        let mut counts: HashMap<BlockTypeId, usize> = HashMap::new();
        for block in &self.blocks {
            *counts.entry(block.block_type).or_insert(0) += 1;
        }
        let grid = Grid::build(arch, &counts, fixed_size)?;

        Ok(Circuit {
            name: self.name,
            blocks: self.blocks,
            pins: self.pins,
            nets: self.nets,
            block_by_name: self.block_by_name,
            net_by_name: self.net_by_name,
            grid,
        })
    }
}

/// A circuit with its device grid.
#[derive(Debug)]
pub struct Circuit {
    name: String,
    /// All global blocks.
    pub blocks: Vec<Block>,
    /// All pins.
    pub pins: Vec<Pin>,
    /// All nets.
    pub nets: Vec<Net>,
    block_by_name: HashMap<String, BlockId>,
    net_by_name: HashMap<String, NetId>,
    grid: Grid,
}

impl Circuit {
    /// The circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The device grid.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Returns the block with the given ID.
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// Returns the pin with the given ID.
    pub fn pin(&self, id: PinId) -> &Pin {
        &self.pins[id.index()]
    }

    /// Returns the net with the given ID.
    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.index()]
    }

    /// Looks up a block by name.
    pub fn block_named(&self, name: &str) -> Option<BlockId> {
        self.block_by_name.get(name).copied()
    }

    /// Looks up a net by name.
    pub fn net_named(&self, name: &str) -> Option<NetId> {
        self.net_by_name.get(name).copied()
    }

    /// The number of blocks.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// The number of nets.
    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    /// Whether the circuit contains no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All blocks of the given type.
    pub fn blocks_of_type(&self, block_type: BlockTypeId) -> Vec<BlockId> {
        self.blocks
            .iter()
            .filter(|block| block.block_type == block_type)
            .map(|block| block.id)
            .collect()
    }

    /// All blocks whose category is not I/O, in arena order. These are the
    /// movable blocks of the analytical placer.
    pub fn movable_blocks(&self, arch: &Architecture) -> Vec<BlockId> {
        self.blocks
            .iter()
            .filter(|block| arch.block_type(block.block_type).category != BlockCategory::Io)
            .map(|block| block.id)
            .collect()
    }

    /// Whether every block has a site assignment.
    pub fn is_fully_placed(&self) -> bool {
        self.blocks.iter().all(|block| block.site.is_some())
    }

    /// Assigns `block` to `site`, updating grid occupancy.
    ///
    /// The new slot is claimed before the old one is released, so a
    /// rejected move leaves the placement untouched.
    pub fn place(&mut self, block: BlockId, site: SiteRef) -> Result<(), CircuitError> {
        let current = self.blocks[block.index()].site;
        if current == Some(site) {
            return Ok(());
        }
        let block_type = self.blocks[block.index()].block_type;
        self.grid
            .occupy(block, block_type, site.x, site.y, site.subblock)?;
        if let Some(old) = current {
            self.grid.vacate(old.x, old.y, old.subblock);
        }
        self.blocks[block.index()].site = Some(site);
        Ok(())
    }

    /// Clears the site assignment of `block`.
    pub fn unplace(&mut self, block: BlockId) {
        if let Some(site) = self.blocks[block.index()].site.take() {
            self.grid.vacate(site.x, site.y, site.subblock);
        }
    }

    /// Clears every site assignment.
    pub fn clear_placement(&mut self) {
        for index in 0..self.blocks.len() {
            self.unplace(BlockId::from_raw(index as u32));
        }
    }

    /// Swaps the site assignments of two placed blocks of the same type.
    pub fn swap(&mut self, a: BlockId, b: BlockId) -> Result<(), CircuitError> {
        let site_a = self.blocks[a.index()].site;
        let site_b = self.blocks[b.index()].site;
        let (Some(site_a), Some(site_b)) = (site_a, site_b) else {
            return Err(CircuitError::IllegalPlacement {
                block: self.blocks[a.index()].name.clone(),
                x: 0,
                y: 0,
                subblock: 0,
                message: "cannot swap unplaced blocks".into(),
            });
        };
        self.unplace(a);
        self.unplace(b);
        self.place(a, site_b)?;
        self.place(b, site_a)?;
        Ok(())
    }

    /// The occupant of `(x, y, subblock)`, if any.
    pub fn block_at(&self, x: u32, y: u32, subblock: u32) -> Option<BlockId> {
        self.grid.occupant(x, y, subblock)
    }

    /// The site coordinates of a block as continuous values.
    pub fn block_position(&self, block: BlockId) -> Option<(f64, f64)> {
        self.blocks[block.index()]
            .site
            .map(|site| (site.x as f64, site.y as f64))
    }

    /// The bounding box of a net over its placed blocks, or `None` when no
    /// pin of the net sits on a placed block.
    pub fn net_bounding_box(&self, net: NetId) -> Option<BoundingBox> {
        let mut bb: Option<BoundingBox> = None;
        for pin in self.nets[net.index()].pins() {
            let block = &self.blocks[self.pins[pin.index()].block.index()];
            let Some(site) = block.site else { continue };
            match &mut bb {
                Some(bb) => bb.expand(site.x, site.y),
                None => bb = Some(BoundingBox::at(site.x, site.y)),
            }
        }
        bb
    }

    /// The bounding-box cost of one net.
    pub fn net_cost(&self, net: NetId) -> f64 {
        match self.net_bounding_box(net) {
            Some(bb) => net::bounding_box_cost(&bb, self.nets[net.index()].num_terminals()),
            None => 0.0,
        }
    }

    /// Total bounding-box cost over all nets.
    pub fn total_cost(&self) -> f64 {
        (0..self.nets.len())
            .map(|index| self.net_cost(NetId::from_raw(index as u32)))
            .sum()
    }

    /// All driver-to-sink pin pairs, net by net.
    pub fn connections(&self) -> Vec<(PinId, PinId)> {
        let mut pairs = Vec::new();
        for net in &self.nets {
            for &sink in &net.sinks {
                pairs.push((net.driver, sink));
            }
        }
        pairs
    }

    /// A uniformly random block.
    pub fn random_block(&self, rng: &mut impl Rng) -> Option<BlockId> {
        if self.blocks.is_empty() {
            return None;
        }
        Some(BlockId::from_raw(rng.gen_range(0..self.blocks.len()) as u32))
    }

    /// A random site of `block_type` within Chebyshev distance `distance`
    /// of `(x, y)`.
    ///
    /// Sampling is rejection-based over the window with a retry budget of
    /// four times the window area; `None` means no compatible site was
    /// found within the budget.
    pub fn random_site_near(
        &self,
        block_type: BlockTypeId,
        x: u32,
        y: u32,
        distance: u32,
        rng: &mut impl Rng,
    ) -> Option<SiteRef> {
        if self.grid.columns_of_type(block_type).is_empty() {
            return None;
        }

        let min_x = x.saturating_sub(distance);
        let max_x = (x + distance).min(self.grid.width() - 1);
        let min_y = y.saturating_sub(distance);
        let max_y = (y + distance).min(self.grid.height() - 1);

        let area = ((max_x - min_x + 1) * (max_y - min_y + 1)) as usize;
        for _ in 0..4 * area {
            let cx = rng.gen_range(min_x..=max_x);
            let cy = rng.gen_range(min_y..=max_y);
            if let Some(site) = self.grid.site_at_exact(cx, cy) {
                if site.block_type == block_type {
                    let subblock = rng.gen_range(0..site.capacity());
                    return Some(SiteRef::with_subblock(cx, cy, subblock));
                }
            }
        }
        None
    }
}
