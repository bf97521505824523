//! Errors of the circuit model and its file formats.

use fabric_arch::BlockTypeId;

/// Errors produced while building a circuit or reading/writing its files.
#[derive(Debug, thiserror::Error)]
pub enum CircuitError {
    /// A netlist or placement file could not be read or written.
    #[error("could not access {path}: {source}")]
    Io {
        /// Path of the offending file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A netlist or placement file has a malformed line.
    #[error("{path}:{line}: {message}")]
    Parse {
        /// Path of the offending file.
        path: String,
        /// 1-based line number.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// The netlist references a block type the architecture does not define.
    #[error("unknown block type `{name}`")]
    UnknownBlockType {
        /// The missing type name.
        name: String,
    },

    /// A net has more than one driving pin.
    #[error("net `{net}` has multiple drivers")]
    MultipleDrivers {
        /// The net name.
        net: String,
    },

    /// A net has sink pins but no driving pin.
    #[error("net `{net}` has no driver")]
    NoDriver {
        /// The net name.
        net: String,
    },

    /// The requested fixed device size cannot hold the circuit.
    #[error("device of size {size} x {size} is too small: {message}")]
    DeviceTooSmall {
        /// The requested width/height.
        size: u32,
        /// Which capacity was exceeded.
        message: String,
    },

    /// A placement assigns a block to a site it cannot occupy.
    #[error("illegal placement of block `{block}` at ({x}, {y}, {subblock}): {message}")]
    IllegalPlacement {
        /// The block name.
        block: String,
        /// Site column.
        x: u32,
        /// Site row.
        y: u32,
        /// Site sub-slot.
        subblock: u32,
        /// Description of the violation.
        message: String,
    },

    /// A placement file names a block the circuit does not contain.
    #[error("placement file names unknown block `{name}`")]
    UnknownBlock {
        /// The unknown block name.
        name: String,
    },

    /// Internal bookkeeping error: a site lookup fell off the grid.
    #[error("no site of type {block_type} at ({x}, {y})")]
    NoSuchSite {
        /// Expected block type.
        block_type: BlockTypeId,
        /// Site column.
        x: u32,
        /// Site row.
        y: u32,
    },
}
