//! The placement file format.
//!
//! A header records the device size, then one line per global block:
//!
//! ```text
//! Netlist: adder
//! Array size: 6 x 6 logic blocks
//!
//! #block name   x  y  subblk  block number
//! #----------   -- -- ------  ------------
//! pad_a         0  1  0       #0
//! sum           1  1  0       #2
//! ```

use crate::block::SiteRef;
use crate::circuit::Circuit;
use crate::error::CircuitError;
use std::io::Write;
use std::path::Path;

/// Renders the placement of `circuit` as text.
pub fn format_placement(circuit: &Circuit) -> String {
    let mut out = String::new();
    out.push_str(&format!("Netlist: {}\n", circuit.name()));
    out.push_str(&format!(
        "Array size: {} x {} logic blocks\n\n",
        circuit.grid().width(),
        circuit.grid().height()
    ));
    out.push_str("#block name   x  y  subblk  block number\n");
    out.push_str("#----------   -- -- ------  ------------\n");
    for (index, block) in circuit.blocks.iter().enumerate() {
        if let Some(site) = block.site {
            out.push_str(&format!(
                "{:<13} {:<2} {:<2} {:<7} #{}\n",
                block.name, site.x, site.y, site.subblock, index
            ));
        }
    }
    out
}

/// Writes the placement of `circuit` to `path`.
pub fn write_place_file(circuit: &Circuit, path: &Path) -> Result<(), CircuitError> {
    let io_error = |source| CircuitError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut file = std::fs::File::create(path).map_err(io_error)?;
    file.write_all(format_placement(circuit).as_bytes())
        .map_err(io_error)
}

/// Reads only the `Array size` header of a placement file.
///
/// Used to size the device before the netlist is loaded.
pub fn read_array_size(path: &Path) -> Result<u32, CircuitError> {
    let text = std::fs::read_to_string(path).map_err(|source| CircuitError::Io {
        path: path.display().to_string(),
        source,
    })?;
    for (number, line) in text.lines().enumerate() {
        if let Some(rest) = line.strip_prefix("Array size:") {
            let mut parts = rest.split_whitespace();
            let width: u32 = parts
                .next()
                .and_then(|token| token.parse().ok())
                .ok_or_else(|| CircuitError::Parse {
                    path: path.display().to_string(),
                    line: number + 1,
                    message: "bad array size".into(),
                })?;
            return Ok(width);
        }
    }
    Err(CircuitError::Parse {
        path: path.display().to_string(),
        line: 1,
        message: "missing `Array size` header".into(),
    })
}

/// Applies a placement file to an already-built circuit.
///
/// Every named block must exist, its site must match its type, and no two
/// blocks may share a sub-slot.
pub fn apply_place_file(circuit: &mut Circuit, path: &Path) -> Result<(), CircuitError> {
    let text = std::fs::read_to_string(path).map_err(|source| CircuitError::Io {
        path: path.display().to_string(),
        source,
    })?;
    apply_place_text(circuit, &text, &path.display().to_string())
}

/// Applies placement text; `origin` is used in error messages.
pub fn apply_place_text(
    circuit: &mut Circuit,
    text: &str,
    origin: &str,
) -> Result<(), CircuitError> {
    for (number, raw) in text.lines().enumerate() {
        let line = number + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        if content.is_empty()
            || content.starts_with("Netlist:")
            || content.starts_with("Array size:")
        {
            continue;
        }
        let tokens: Vec<&str> = content.split_whitespace().collect();
        if tokens.len() != 4 {
            return Err(CircuitError::Parse {
                path: origin.to_string(),
                line,
                message: "expected `<name> <x> <y> <subblock>`".into(),
            });
        }
        let block = circuit
            .block_named(tokens[0])
            .ok_or_else(|| CircuitError::UnknownBlock {
                name: tokens[0].to_string(),
            })?;
        let coordinate = |token: &str| -> Result<u32, CircuitError> {
            token.parse().map_err(|_| CircuitError::Parse {
                path: origin.to_string(),
                line,
                message: format!("bad coordinate `{token}`"),
            })
        };
        let site = SiteRef::with_subblock(
            coordinate(tokens[1])?,
            coordinate(tokens[2])?,
            coordinate(tokens[3])?,
        );
        circuit.place(block, site)?;
    }
    Ok(())
}
