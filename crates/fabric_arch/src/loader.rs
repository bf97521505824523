//! Architecture JSON loader.
//!
//! Parses the architecture description format:
//!
//! ```json
//! {
//!   "io_capacity": 2,
//!   "blocks": {
//!     "clb": {
//!       "leaf": true, "clocked": true, "globalCategory": "CLB",
//!       "ports": { "input": { "in": 4 }, "output": { "out": 1 } }
//!     }
//!   },
//!   "delays": { "clock_setup_time": 93.0, "clb.in-clb.out": 460.0 }
//! }
//! ```
//!
//! Delay keys come in four shapes: `clock_setup_time`, the full
//! `block.port-block.port` propagation delay, the sink setup
//! `block-block.port`, and the source setup (clock-to-output)
//! `block.port-block`.

use crate::ids::{BlockTypeId, PortTypeId};
use crate::types::{BlockCategory, BlockTypeData, Mode, PortDirection, PortTypeData};
use crate::Architecture;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Errors produced while loading an architecture description.
#[derive(Debug, thiserror::Error)]
pub enum ArchError {
    /// The architecture file could not be read.
    #[error("could not read architecture file {path}: {source}")]
    Io {
        /// Path of the offending file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The architecture file is not valid JSON for the expected schema.
    #[error("malformed architecture file {path}: {source}")]
    Json {
        /// Path of the offending file.
        path: String,
        /// Underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },

    /// A mode or delay key references a block type that is not defined.
    #[error("unknown block type `{name}` referenced by {referrer}")]
    UnknownBlockType {
        /// The missing type name.
        name: String,
        /// What referenced it (a mode, a delay key).
        referrer: String,
    },

    /// A delay key references a port that the named block does not declare.
    #[error("unknown port `{block}.{port}` in delay key `{key}`")]
    UnknownPort {
        /// Block type name from the key.
        block: String,
        /// Port name from the key.
        port: String,
        /// The full delay key.
        key: String,
    },

    /// A delay key does not match any of the recognized shapes.
    #[error("malformed delay key `{key}`")]
    BadDelayKey {
        /// The offending key.
        key: String,
    },

    /// A structural constraint of the architecture model is violated.
    #[error("inconsistent architecture: {message}")]
    Inconsistent {
        /// Description of the violation.
        message: String,
    },

    /// The requested preset name is not known.
    #[error("unknown architecture `{name}` (not a preset and not a readable file)")]
    UnknownPreset {
        /// The requested name.
        name: String,
    },
}

#[derive(Debug, Deserialize)]
struct ArchFile {
    io_capacity: u32,
    blocks: BTreeMap<String, BlockDef>,
    #[serde(default)]
    delays: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct BlockDef {
    leaf: bool,
    #[serde(default)]
    clocked: Option<bool>,
    #[serde(rename = "globalCategory")]
    #[serde(default)]
    global_category: Option<String>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    start: Option<u32>,
    #[serde(default)]
    repeat: Option<u32>,
    ports: PortsDef,
    #[serde(default)]
    modes: Option<BTreeMap<String, ModeDef>>,
    #[serde(default)]
    children: Option<BTreeMap<String, u32>>,
}

#[derive(Debug, Deserialize)]
struct PortsDef {
    #[serde(default)]
    input: BTreeMap<String, u32>,
    #[serde(default)]
    output: BTreeMap<String, u32>,
}

#[derive(Debug, Deserialize)]
struct ModeDef {
    children: BTreeMap<String, u32>,
}

/// Parses an architecture from JSON text.
///
/// `origin` is used in error messages only (a path or a preset name).
pub fn parse(json: &str, origin: &str) -> Result<Architecture, ArchError> {
    let file: ArchFile = serde_json::from_str(json).map_err(|source| ArchError::Json {
        path: origin.to_string(),
        source,
    })?;
    build(file)
}

/// Loads an architecture from a file on disk.
pub fn load_file(path: &Path) -> Result<Architecture, ArchError> {
    let text = std::fs::read_to_string(path).map_err(|source| ArchError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse(&text, &path.display().to_string())
}

fn category_of(def: &BlockDef, name: &str) -> Result<BlockCategory, ArchError> {
    match def.global_category.as_deref() {
        Some("IO") => Ok(BlockCategory::Io),
        Some("CLB") => Ok(BlockCategory::Clb),
        Some("hardblock") => Ok(BlockCategory::HardBlock),
        Some(other) => Err(ArchError::Inconsistent {
            message: format!("block `{name}` has unknown globalCategory `{other}`"),
        }),
        None if def.leaf => Ok(BlockCategory::Leaf),
        None => Ok(BlockCategory::Intermediate),
    }
}

fn build(file: ArchFile) -> Result<Architecture, ArchError> {
    let mut block_types: Vec<BlockTypeData> = Vec::new();
    let mut block_type_by_name: HashMap<String, BlockTypeId> = HashMap::new();
    let mut port_types: Vec<PortTypeData> = Vec::new();
    let mut port_by_key: HashMap<(BlockTypeId, String), PortTypeId> = HashMap::new();

    // First pass: allocate block type ids so modes can reference forward.
    for name in file.blocks.keys() {
        let id = BlockTypeId::from_raw(block_types.len() as u32);
        block_type_by_name.insert(name.clone(), id);
        block_types.push(BlockTypeData {
            name: name.clone(),
            category: BlockCategory::Leaf,
            height: 1,
            start: 1,
            repeat: 1,
            clocked: false,
            inputs: Vec::new(),
            outputs: Vec::new(),
            modes: Vec::new(),
        });
    }

    // Second pass: fill in the definitions.
    for (name, def) in &file.blocks {
        let id = block_type_by_name[name];
        let category = category_of(def, name)?;

        let (height, start, repeat) = if category == BlockCategory::HardBlock {
            let missing = |field: &str| ArchError::Inconsistent {
                message: format!("hardblock `{name}` is missing `{field}`"),
            };
            (
                def.height.ok_or_else(|| missing("height"))?,
                def.start.ok_or_else(|| missing("start"))?,
                def.repeat.ok_or_else(|| missing("repeat"))?,
            )
        } else {
            (1, 1, 1)
        };
        if category.is_global() && (height < 1 || repeat < 1) {
            return Err(ArchError::Inconsistent {
                message: format!("global block `{name}` must have height >= 1 and repeat >= 1"),
            });
        }

        let mut inputs = Vec::new();
        for (port_name, &width) in &def.ports.input {
            let pid = PortTypeId::from_raw(port_types.len() as u32);
            port_by_key.insert((id, port_name.clone()), pid);
            port_types.push(PortTypeData {
                block_type: id,
                name: port_name.clone(),
                width,
                direction: PortDirection::Input,
                setup_time: 0.0,
                delays: HashMap::new(),
            });
            inputs.push(pid);
        }
        let mut outputs = Vec::new();
        for (port_name, &width) in &def.ports.output {
            let pid = PortTypeId::from_raw(port_types.len() as u32);
            port_by_key.insert((id, port_name.clone()), pid);
            port_types.push(PortTypeData {
                block_type: id,
                name: port_name.clone(),
                width,
                direction: PortDirection::Output,
                setup_time: 0.0,
                delays: HashMap::new(),
            });
            outputs.push(pid);
        }

        let mut modes = Vec::new();
        let resolve_children =
            |children: &BTreeMap<String, u32>, mode: &str| -> Result<Vec<(BlockTypeId, u32)>, ArchError> {
                children
                    .iter()
                    .map(|(child, &count)| {
                        block_type_by_name
                            .get(child)
                            .copied()
                            .map(|cid| (cid, count))
                            .ok_or_else(|| ArchError::UnknownBlockType {
                                name: child.clone(),
                                referrer: format!("mode `{mode}` of block `{name}`"),
                            })
                    })
                    .collect()
            };

        if def.leaf {
            // Leaf types have a single unnamed mode.
            modes.push(Mode {
                name: String::new(),
                children: Vec::new(),
            });
        } else if let Some(mode_defs) = &def.modes {
            for (mode_name, mode_def) in mode_defs {
                modes.push(Mode {
                    name: mode_name.clone(),
                    children: resolve_children(&mode_def.children, mode_name)?,
                });
            }
        } else if let Some(children) = &def.children {
            // Single implicit mode, named after the block.
            modes.push(Mode {
                name: name.clone(),
                children: resolve_children(children, name)?,
            });
        } else {
            return Err(ArchError::Inconsistent {
                message: format!("non-leaf block `{name}` declares neither modes nor children"),
            });
        }

        let data = &mut block_types[id.index()];
        data.category = category;
        data.height = height;
        data.start = start;
        data.repeat = repeat;
        data.clocked = def.leaf && def.clocked.unwrap_or(false);
        data.inputs = inputs;
        data.outputs = outputs;
        data.modes = modes;
    }

    // Delays.
    let mut clock_setup_time = 0.0;
    for (key, &delay) in &file.delays {
        if key == "clock_setup_time" {
            clock_setup_time = delay;
            continue;
        }
        apply_delay(key, delay, &block_type_by_name, &port_by_key, &mut port_types)?;
    }

    Architecture::assemble(
        file.io_capacity,
        clock_setup_time,
        block_types,
        block_type_by_name,
        port_types,
        port_by_key,
    )
}

/// Parses one `source-sink` delay key and records it in the port tables.
fn apply_delay(
    key: &str,
    delay: f64,
    blocks: &HashMap<String, BlockTypeId>,
    ports: &HashMap<(BlockTypeId, String), PortTypeId>,
    port_types: &mut [PortTypeData],
) -> Result<(), ArchError> {
    let bad = || ArchError::BadDelayKey {
        key: key.to_string(),
    };
    let (source, sink) = key.split_once('-').ok_or_else(bad)?;
    if source.is_empty() || sink.is_empty() || sink.contains('-') {
        return Err(bad());
    }

    let lookup_block = |name: &str| {
        blocks
            .get(name)
            .copied()
            .ok_or_else(|| ArchError::UnknownBlockType {
                name: name.to_string(),
                referrer: format!("delay key `{key}`"),
            })
    };
    let lookup_port = |block: &str, port: &str| -> Result<PortTypeId, ArchError> {
        let bt = lookup_block(block)?;
        ports
            .get(&(bt, port.to_string()))
            .copied()
            .ok_or_else(|| ArchError::UnknownPort {
                block: block.to_string(),
                port: port.to_string(),
                key: key.to_string(),
            })
    };

    match (source.split_once('.'), sink.split_once('.')) {
        // block.port-block.port: a propagation delay.
        (Some((src_block, src_port)), Some((sink_block, sink_port))) => {
            let src = lookup_port(src_block, src_port)?;
            let dst = lookup_port(sink_block, sink_port)?;
            port_types[src.index()].delays.insert(dst, delay);
        }
        // block.port-block: source setup (clock-to-output).
        (Some((src_block, src_port)), None) => {
            lookup_block(sink)?;
            let src = lookup_port(src_block, src_port)?;
            port_types[src.index()].setup_time = delay;
        }
        // block-block.port: sink setup.
        (None, Some((sink_block, sink_port))) => {
            lookup_block(source)?;
            let dst = lookup_port(sink_block, sink_port)?;
            port_types[dst.index()].setup_time = delay;
        }
        (None, None) => return Err(bad()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;

    #[test]
    fn parse_basic_preset() {
        let arch = parse(presets::BASIC, "basic").unwrap();
        assert_eq!(arch.io_capacity(), 2);
        assert!(arch.clock_setup_time() > 0.0);
        let clb = arch.clb_type();
        assert_eq!(arch.block_type(clb).name, "clb");
        assert_eq!(arch.block_type(clb).height, 1);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse("{ not json", "test").unwrap_err();
        assert!(matches!(err, ArchError::Json { .. }));
    }

    #[test]
    fn rejects_unknown_child_type() {
        let json = r#"{
            "io_capacity": 1,
            "blocks": {
                "io": { "leaf": true, "clocked": false, "globalCategory": "IO",
                        "ports": { "input": {}, "output": {} } },
                "clb": { "leaf": false, "globalCategory": "CLB",
                         "ports": { "input": {}, "output": {} },
                         "children": { "missing": 2 } }
            },
            "delays": {}
        }"#;
        let err = parse(json, "test").unwrap_err();
        assert!(matches!(err, ArchError::UnknownBlockType { .. }));
    }

    #[test]
    fn rejects_hardblock_without_pattern() {
        let json = r#"{
            "io_capacity": 1,
            "blocks": {
                "io": { "leaf": true, "clocked": false, "globalCategory": "IO",
                        "ports": { "input": {}, "output": {} } },
                "clb": { "leaf": true, "clocked": true, "globalCategory": "CLB",
                         "ports": { "input": {}, "output": {} } },
                "mult": { "leaf": true, "clocked": false, "globalCategory": "hardblock",
                          "ports": { "input": {}, "output": {} } }
            },
            "delays": {}
        }"#;
        let err = parse(json, "test").unwrap_err();
        assert!(matches!(err, ArchError::Inconsistent { .. }));
    }

    #[test]
    fn rejects_bad_delay_key() {
        let json = r#"{
            "io_capacity": 1,
            "blocks": {
                "io": { "leaf": true, "clocked": false, "globalCategory": "IO",
                        "ports": { "input": {}, "output": {} } },
                "clb": { "leaf": true, "clocked": true, "globalCategory": "CLB",
                         "ports": { "input": {}, "output": {} } }
            },
            "delays": { "nonsense": 1.0 }
        }"#;
        let err = parse(json, "test").unwrap_err();
        assert!(matches!(err, ArchError::BadDelayKey { .. }));
    }

    #[test]
    fn rejects_delay_on_unknown_port() {
        let json = r#"{
            "io_capacity": 1,
            "blocks": {
                "io": { "leaf": true, "clocked": false, "globalCategory": "IO",
                        "ports": { "input": {}, "output": {} } },
                "clb": { "leaf": true, "clocked": true, "globalCategory": "CLB",
                         "ports": { "input": { "in": 4 }, "output": { "out": 1 } } }
            },
            "delays": { "clb.in-clb.nope": 10.0 }
        }"#;
        let err = parse(json, "test").unwrap_err();
        assert!(matches!(err, ArchError::UnknownPort { .. }));
    }

    #[test]
    fn full_delay_recorded() {
        let arch = parse(presets::BASIC, "basic").unwrap();
        let mult = arch.hardblock_types()[0];
        let a = arch.port_named(mult, "a").unwrap();
        let out = arch.port_named(mult, "out").unwrap();
        assert!(arch.delay(a, out) > 0.0);
    }

    #[test]
    fn setup_keys_recorded() {
        let arch = parse(presets::BASIC, "basic").unwrap();
        let clb = arch.clb_type();
        let input = arch.port_named(clb, "in").unwrap();
        let output = arch.port_named(clb, "out").unwrap();
        // "clb-clb.in" is the sink setup, "clb.out-clb" the clock-to-output.
        assert_eq!(arch.port_type(input).setup_time, 93.0);
        assert_eq!(arch.port_type(output).setup_time, 235.0);
    }

    #[test]
    fn load_file_roundtrip() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(presets::BASIC.as_bytes()).unwrap();
        let arch = load_file(file.path()).unwrap();
        assert_eq!(arch.io_capacity(), 2);
    }

    #[test]
    fn load_file_missing_path() {
        let err = load_file(Path::new("/nonexistent/arch.json")).unwrap_err();
        assert!(matches!(err, ArchError::Io { .. }));
    }
}
