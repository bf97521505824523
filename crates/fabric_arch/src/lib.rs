//! FPGA architecture model for the Fabric place-and-route engine.
//!
//! The [`Architecture`] is an immutable context built once from a JSON
//! description (a built-in preset or a file) and threaded by reference
//! through the circuit, timing, placement, and routing subsystems. It owns
//! the block-type and port-type registries, so type identity checks are
//! integer index comparisons.
//!
//! # Usage
//!
//! ```
//! use fabric_arch::load_architecture;
//!
//! let arch = load_architecture("basic").unwrap();
//! assert_eq!(arch.io_capacity(), 2);
//! assert_eq!(arch.block_type(arch.clb_type()).name, "clb");
//! ```

#![warn(missing_docs)]

pub mod ids;
pub mod loader;
pub mod presets;
pub mod types;

pub use ids::{BlockTypeId, PortTypeId};
pub use loader::ArchError;
pub use types::{BlockCategory, BlockTypeData, Mode, PortDirection, PortTypeData};

use std::collections::HashMap;
use std::path::Path;

/// The immutable architecture context.
///
/// Holds the block-type and port-type registries, the device I/O capacity,
/// and the global clock setup time. Built by [`load_architecture`] or the
/// [`loader`] functions and never mutated afterwards.
#[derive(Debug)]
pub struct Architecture {
    io_capacity: u32,
    clock_setup_time: f64,
    block_types: Vec<BlockTypeData>,
    block_type_by_name: HashMap<String, BlockTypeId>,
    port_types: Vec<PortTypeData>,
    port_by_key: HashMap<(BlockTypeId, String), PortTypeId>,
    sequential: Vec<bool>,
    io_type: BlockTypeId,
    clb_type: BlockTypeId,
    hardblock_types: Vec<BlockTypeId>,
}

impl Architecture {
    /// Assembles the context from loader output, checking global-type
    /// constraints and deriving the per-type sequential flags.
    pub(crate) fn assemble(
        io_capacity: u32,
        clock_setup_time: f64,
        block_types: Vec<BlockTypeData>,
        block_type_by_name: HashMap<String, BlockTypeId>,
        port_types: Vec<PortTypeData>,
        port_by_key: HashMap<(BlockTypeId, String), PortTypeId>,
    ) -> Result<Self, ArchError> {
        let pick_unique = |category: BlockCategory| -> Result<BlockTypeId, ArchError> {
            let mut found = None;
            for (i, data) in block_types.iter().enumerate() {
                if data.category == category {
                    if found.is_some() {
                        return Err(ArchError::Inconsistent {
                            message: format!("more than one {category} block type defined"),
                        });
                    }
                    found = Some(BlockTypeId::from_raw(i as u32));
                }
            }
            found.ok_or_else(|| ArchError::Inconsistent {
                message: format!("no {category} block type defined"),
            })
        };

        let io_type = pick_unique(BlockCategory::Io)?;
        let clb_type = pick_unique(BlockCategory::Clb)?;
        let hardblock_types = block_types
            .iter()
            .enumerate()
            .filter(|(_, data)| data.category == BlockCategory::HardBlock)
            .map(|(i, _)| BlockTypeId::from_raw(i as u32))
            .collect();

        let sequential = derive_sequential(&block_types)?;

        Ok(Self {
            io_capacity,
            clock_setup_time,
            block_types,
            block_type_by_name,
            port_types,
            port_by_key,
            sequential,
            io_type,
            clb_type,
            hardblock_types,
        })
    }

    /// Number of blocks sharing one I/O site.
    pub fn io_capacity(&self) -> u32 {
        self.io_capacity
    }

    /// The global clock setup time in picoseconds.
    pub fn clock_setup_time(&self) -> f64 {
        self.clock_setup_time
    }

    /// The I/O pad block type.
    pub fn io_type(&self) -> BlockTypeId {
        self.io_type
    }

    /// The CLB block type.
    pub fn clb_type(&self) -> BlockTypeId {
        self.clb_type
    }

    /// All hardblock types, in registry order.
    pub fn hardblock_types(&self) -> &[BlockTypeId] {
        &self.hardblock_types
    }

    /// All site-occupying block types: I/O, CLB, then hardblocks.
    pub fn global_types(&self) -> Vec<BlockTypeId> {
        let mut types = vec![self.io_type, self.clb_type];
        types.extend_from_slice(&self.hardblock_types);
        types
    }

    /// Returns the block type data for `id`.
    pub fn block_type(&self, id: BlockTypeId) -> &BlockTypeData {
        &self.block_types[id.index()]
    }

    /// Resolves a block type by name.
    pub fn block_type_named(&self, name: &str) -> Option<BlockTypeId> {
        self.block_type_by_name.get(name).copied()
    }

    /// The number of registered block types.
    pub fn num_block_types(&self) -> usize {
        self.block_types.len()
    }

    /// Returns the port type data for `id`.
    pub fn port_type(&self, id: PortTypeId) -> &PortTypeData {
        &self.port_types[id.index()]
    }

    /// Resolves a port of a block type by name.
    pub fn port_named(&self, block_type: BlockTypeId, name: &str) -> Option<PortTypeId> {
        self.port_by_key.get(&(block_type, name.to_string())).copied()
    }

    /// The number of registered port types.
    pub fn num_port_types(&self) -> usize {
        self.port_types.len()
    }

    /// The propagation delay from `source` to `sink`, or 0 if the sparse
    /// table has no entry.
    pub fn delay(&self, source: PortTypeId, sink: PortTypeId) -> f64 {
        self.port_types[source.index()]
            .delays
            .get(&sink)
            .copied()
            .unwrap_or(0.0)
    }

    /// Whether blocks of this type latch state on a clock edge, directly
    /// (leaf `clocked` flag) or through any child type of any mode.
    pub fn is_sequential(&self, block_type: BlockTypeId) -> bool {
        self.sequential[block_type.index()]
    }

    /// Display name `block.port` for a port type.
    pub fn port_display(&self, port: PortTypeId) -> String {
        let data = self.port_type(port);
        format!("{}.{}", self.block_type(data.block_type).name, data.name)
    }
}

/// Computes the transitive clocked flag for every block type.
fn derive_sequential(block_types: &[BlockTypeData]) -> Result<Vec<bool>, ArchError> {
    fn visit(
        id: usize,
        block_types: &[BlockTypeData],
        memo: &mut [Option<bool>],
        on_stack: &mut [bool],
    ) -> Result<bool, ArchError> {
        if let Some(known) = memo[id] {
            return Ok(known);
        }
        if on_stack[id] {
            return Err(ArchError::Inconsistent {
                message: format!("block type `{}` contains itself", block_types[id].name),
            });
        }
        on_stack[id] = true;
        let mut clocked = block_types[id].clocked;
        for mode in &block_types[id].modes {
            for &(child, _) in &mode.children {
                clocked |= visit(child.index(), block_types, memo, on_stack)?;
            }
        }
        on_stack[id] = false;
        memo[id] = Some(clocked);
        Ok(clocked)
    }

    let mut memo = vec![None; block_types.len()];
    let mut on_stack = vec![false; block_types.len()];
    for id in 0..block_types.len() {
        visit(id, block_types, &mut memo, &mut on_stack)?;
    }
    Ok(memo.into_iter().map(|flag| flag.unwrap_or(false)).collect())
}

/// Loads an architecture by preset name or file path.
///
/// Preset names are tried first; anything else is treated as a path.
pub fn load_architecture(name: &str) -> Result<Architecture, ArchError> {
    if let Some(json) = presets::by_name(name) {
        return loader::parse(json, name);
    }
    let path = Path::new(name);
    if path.exists() {
        return loader::load_file(path);
    }
    Err(ArchError::UnknownPreset {
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic() -> Architecture {
        load_architecture("basic").unwrap()
    }

    #[test]
    fn load_by_preset_name() {
        let arch = basic();
        assert_eq!(arch.block_type(arch.io_type()).name, "io");
        assert_eq!(arch.block_type(arch.clb_type()).name, "clb");
    }

    #[test]
    fn unknown_name_is_error() {
        let err = load_architecture("no_such_arch").unwrap_err();
        assert!(matches!(err, ArchError::UnknownPreset { .. }));
    }

    #[test]
    fn global_types_order() {
        let arch = basic();
        let globals = arch.global_types();
        assert_eq!(globals[0], arch.io_type());
        assert_eq!(globals[1], arch.clb_type());
        assert_eq!(globals.len(), 2 + arch.hardblock_types().len());
    }

    #[test]
    fn io_and_clb_are_unit_sized() {
        let arch = basic();
        for id in [arch.io_type(), arch.clb_type()] {
            let data = arch.block_type(id);
            assert_eq!(data.height, 1);
            assert_eq!(data.repeat, 1);
        }
    }

    #[test]
    fn sequential_propagates_through_children() {
        let arch = basic();
        // clb is not a leaf, but contains the clocked ble.
        assert!(arch.is_sequential(arch.clb_type()));
        let ble = arch.block_type_named("ble").unwrap();
        assert!(arch.is_sequential(ble));
        assert!(!arch.is_sequential(arch.io_type()));
    }

    #[test]
    fn port_lookup() {
        let arch = basic();
        let clb = arch.clb_type();
        let input = arch.port_named(clb, "in").unwrap();
        assert_eq!(arch.port_type(input).width, 4);
        assert_eq!(arch.port_type(input).direction, PortDirection::Input);
        assert!(arch.port_named(clb, "bogus").is_none());
    }

    #[test]
    fn port_display_name() {
        let arch = basic();
        let clb = arch.clb_type();
        let output = arch.port_named(clb, "out").unwrap();
        assert_eq!(arch.port_display(output), "clb.out");
    }

    #[test]
    fn hardblock_delay_table() {
        let arch = basic();
        let mult = arch.hardblock_types()[0];
        let a = arch.port_named(mult, "a").unwrap();
        let out = arch.port_named(mult, "out").unwrap();
        assert_eq!(arch.delay(a, out), 1667.0);
        // Missing entries read as zero.
        assert_eq!(arch.delay(out, a), 0.0);
    }

    #[test]
    fn self_containing_type_rejected() {
        let json = r#"{
            "io_capacity": 1,
            "blocks": {
                "io": { "leaf": true, "clocked": false, "globalCategory": "IO",
                        "ports": { "input": {}, "output": {} } },
                "clb": { "leaf": false, "globalCategory": "CLB",
                         "ports": { "input": {}, "output": {} },
                         "children": { "clb": 1 } }
            },
            "delays": {}
        }"#;
        let err = loader::parse(json, "test").unwrap_err();
        assert!(matches!(err, ArchError::Inconsistent { .. }));
    }

    #[test]
    fn missing_io_type_rejected() {
        let json = r#"{
            "io_capacity": 1,
            "blocks": {
                "clb": { "leaf": true, "clocked": true, "globalCategory": "CLB",
                         "ports": { "input": {}, "output": {} } }
            },
            "delays": {}
        }"#;
        let err = loader::parse(json, "test").unwrap_err();
        assert!(matches!(err, ArchError::Inconsistent { .. }));
    }
}
