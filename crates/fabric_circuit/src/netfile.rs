//! The flat netlist file format.
//!
//! A line-based text format describing global blocks and their net
//! connections:
//!
//! ```text
//! # full adder bit
//! block pad_a io
//!   out inpad[0] net_a
//! block sum clb
//!   in in[0] net_a
//!   in in[1] net_b
//!   out out[0] net_sum
//! ```
//!
//! `block <name> <type>` opens a block; `in`/`out` lines connect one bit of
//! one port of the open block to a net, creating the net on first mention.
//! Blank lines and `#` comments are ignored.

use crate::circuit::{Circuit, CircuitBuilder};
use crate::error::CircuitError;
use fabric_arch::{Architecture, PortDirection};
use std::path::Path;

/// Parses a netlist file into a circuit.
///
/// The device auto-sizes unless `fixed_size` is given.
pub fn parse_net_file(
    path: &Path,
    arch: &Architecture,
    fixed_size: Option<u32>,
) -> Result<Circuit, CircuitError> {
    let text = std::fs::read_to_string(path).map_err(|source| CircuitError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "netlist".to_string());
    parse_net_text(&text, &name, &path.display().to_string(), arch, fixed_size)
}

/// Parses netlist text; `origin` is used in error messages.
pub fn parse_net_text(
    text: &str,
    name: &str,
    origin: &str,
    arch: &Architecture,
    fixed_size: Option<u32>,
) -> Result<Circuit, CircuitError> {
    let mut builder = CircuitBuilder::new(name);
    let mut open_block = None;

    let parse_error = |line: usize, message: String| CircuitError::Parse {
        path: origin.to_string(),
        line,
        message,
    };

    for (number, raw) in text.lines().enumerate() {
        let line = number + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = content.split_whitespace().collect();

        match tokens[0] {
            "block" => {
                if tokens.len() != 3 {
                    return Err(parse_error(line, "expected `block <name> <type>`".into()));
                }
                let block_type = arch.block_type_named(tokens[2]).ok_or_else(|| {
                    CircuitError::UnknownBlockType {
                        name: tokens[2].to_string(),
                    }
                })?;
                if !arch.block_type(block_type).category.is_global() {
                    return Err(parse_error(
                        line,
                        format!("block type `{}` is not a global type", tokens[2]),
                    ));
                }
                if builder.block_named(tokens[1]).is_some() {
                    return Err(parse_error(
                        line,
                        format!("duplicate block name `{}`", tokens[1]),
                    ));
                }
                open_block = Some(builder.add_block(tokens[1], block_type));
            }
            "in" | "out" => {
                if tokens.len() != 3 {
                    return Err(parse_error(
                        line,
                        format!("expected `{} <port>[bit] <net>`", tokens[0]),
                    ));
                }
                let block = open_block
                    .ok_or_else(|| parse_error(line, "pin line before any `block`".into()))?;
                let direction = if tokens[0] == "in" {
                    PortDirection::Input
                } else {
                    PortDirection::Output
                };

                let (port_name, bit) = parse_port_ref(tokens[1])
                    .ok_or_else(|| parse_error(line, format!("bad port `{}`", tokens[1])))?;
                let block_type = builder.block_type_of(block);
                let port = arch.port_named(block_type, port_name).ok_or_else(|| {
                    parse_error(line, format!("block type has no port `{port_name}`"))
                })?;
                let data = arch.port_type(port);
                if data.direction != direction {
                    return Err(parse_error(
                        line,
                        format!("port `{port_name}` direction mismatch"),
                    ));
                }
                if bit >= data.width {
                    return Err(parse_error(
                        line,
                        format!("bit {bit} out of range for port `{port_name}`"),
                    ));
                }
                builder.add_pin(block, port, bit, direction, tokens[2]);
            }
            other => {
                return Err(parse_error(line, format!("unknown directive `{other}`")));
            }
        }
    }

    builder.finish(arch, fixed_size)
}

/// Splits `port[bit]` into name and bit index; a bare `port` is bit 0.
fn parse_port_ref(token: &str) -> Option<(&str, u32)> {
    match token.split_once('[') {
        None => Some((token, 0)),
        Some((name, rest)) => {
            let bit = rest.strip_suffix(']')?.parse().ok()?;
            Some((name, bit))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_arch::load_architecture;

    const ADDER: &str = "\
# two pads into a clb and back out
block pad_a io
  out inpad[0] net_a
block pad_b io
  out inpad[0] net_b
block sum clb
  in in[0] net_a
  in in[1] net_b
  out out[0] net_sum
block pad_sum io
  in outpad[0] net_sum
";

    #[test]
    fn parse_small_netlist() {
        let arch = load_architecture("basic").unwrap();
        let circuit = parse_net_text(ADDER, "adder", "adder.net", &arch, None).unwrap();
        assert_eq!(circuit.num_blocks(), 4);
        assert_eq!(circuit.num_nets(), 3);
        let sum = circuit.net(circuit.net_named("net_sum").unwrap());
        assert_eq!(sum.fanout(), 1);
    }

    #[test]
    fn empty_netlist_parses() {
        let arch = load_architecture("basic").unwrap();
        let circuit = parse_net_text("", "empty", "empty.net", &arch, None).unwrap();
        assert!(circuit.is_empty());
        assert_eq!(circuit.grid().width(), 2);
    }

    #[test]
    fn comments_and_blanks_ignored() {
        let arch = load_architecture("basic").unwrap();
        let text = "\n# nothing\n\nblock p io # trailing comment\n  out inpad p_net\n";
        let circuit = parse_net_text(text, "c", "c.net", &arch, None).unwrap();
        assert_eq!(circuit.num_blocks(), 1);
    }

    #[test]
    fn bare_port_is_bit_zero() {
        assert_eq!(parse_port_ref("in"), Some(("in", 0)));
        assert_eq!(parse_port_ref("in[3]"), Some(("in", 3)));
        assert_eq!(parse_port_ref("in[x]"), None);
        assert_eq!(parse_port_ref("in[3"), None);
    }

    #[test]
    fn unknown_type_rejected() {
        let arch = load_architecture("basic").unwrap();
        let err =
            parse_net_text("block a gizmo\n", "c", "c.net", &arch, None).unwrap_err();
        assert!(matches!(err, CircuitError::UnknownBlockType { .. }));
    }

    #[test]
    fn non_global_type_rejected() {
        let arch = load_architecture("basic").unwrap();
        let err = parse_net_text("block a ble\n", "c", "c.net", &arch, None).unwrap_err();
        assert!(matches!(err, CircuitError::Parse { line: 1, .. }));
    }

    #[test]
    fn pin_before_block_rejected() {
        let arch = load_architecture("basic").unwrap();
        let err = parse_net_text("in in[0] net\n", "c", "c.net", &arch, None).unwrap_err();
        assert!(matches!(err, CircuitError::Parse { line: 1, .. }));
    }

    #[test]
    fn direction_mismatch_rejected() {
        let arch = load_architecture("basic").unwrap();
        let text = "block a clb\n  out in[0] net\n";
        let err = parse_net_text(text, "c", "c.net", &arch, None).unwrap_err();
        assert!(matches!(err, CircuitError::Parse { line: 2, .. }));
    }

    #[test]
    fn bit_out_of_range_rejected() {
        let arch = load_architecture("basic").unwrap();
        let text = "block a clb\n  in in[9] net\n";
        let err = parse_net_text(text, "c", "c.net", &arch, None).unwrap_err();
        assert!(matches!(err, CircuitError::Parse { line: 2, .. }));
    }

    #[test]
    fn duplicate_block_rejected() {
        let arch = load_architecture("basic").unwrap();
        let text = "block a io\nblock a io\n";
        let err = parse_net_text(text, "c", "c.net", &arch, None).unwrap_err();
        assert!(matches!(err, CircuitError::Parse { line: 2, .. }));
    }

    #[test]
    fn parse_from_file() {
        use std::io::Write;
        let arch = load_architecture("basic").unwrap();
        let mut file = tempfile::NamedTempFile::with_suffix(".net").unwrap();
        file.write_all(ADDER.as_bytes()).unwrap();
        let circuit = parse_net_file(file.path(), &arch, None).unwrap();
        assert_eq!(circuit.num_blocks(), 4);
    }

    #[test]
    fn missing_file_is_io_error() {
        let arch = load_architecture("basic").unwrap();
        let err = parse_net_file(Path::new("/nonexistent.net"), &arch, None).unwrap_err();
        assert!(matches!(err, CircuitError::Io { .. }));
    }
}
