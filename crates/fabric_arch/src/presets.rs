//! Built-in architecture presets.
//!
//! Presets are complete architecture files embedded as JSON so the CLI works
//! without an external description. `basic` is a classic island-style
//! 4-input-LUT fabric with one registered CLB per site, height-4 multiplier
//! columns every 8 columns, and dual-capacity I/O sites.

/// The default island-style 4-LUT architecture.
pub const BASIC: &str = r#"{
    "io_capacity": 2,
    "blocks": {
        "io": {
            "leaf": true,
            "clocked": false,
            "globalCategory": "IO",
            "ports": {
                "input": { "outpad": 1 },
                "output": { "inpad": 1 }
            }
        },
        "clb": {
            "leaf": false,
            "globalCategory": "CLB",
            "ports": {
                "input": { "in": 4 },
                "output": { "out": 1 }
            },
            "children": { "ble": 1 }
        },
        "ble": {
            "leaf": true,
            "clocked": true,
            "ports": {
                "input": { "in": 4 },
                "output": { "out": 1 }
            }
        },
        "mult_4": {
            "leaf": true,
            "clocked": false,
            "globalCategory": "hardblock",
            "height": 4,
            "start": 4,
            "repeat": 8,
            "ports": {
                "input": { "a": 4, "b": 4 },
                "output": { "out": 8 }
            }
        }
    },
    "delays": {
        "clock_setup_time": 93.0,
        "clb-clb.in": 93.0,
        "clb.out-clb": 235.0,
        "ble-ble.in": 93.0,
        "ble.out-ble": 235.0,
        "io.inpad-io": 0.0,
        "io-io.outpad": 0.0,
        "mult_4.a-mult_4.out": 1667.0,
        "mult_4.b-mult_4.out": 1667.0
    }
}"#;

/// Returns the preset JSON for `name`, if it is a known preset.
pub fn by_name(name: &str) -> Option<&'static str> {
    match name {
        "basic" => Some(BASIC),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_is_known() {
        assert!(by_name("basic").is_some());
        assert!(by_name("exotic").is_none());
    }

    #[test]
    fn basic_parses() {
        let arch = crate::loader::parse(BASIC, "basic").unwrap();
        assert_eq!(arch.hardblock_types().len(), 1);
        let mult = arch.hardblock_types()[0];
        assert_eq!(arch.block_type(mult).height, 4);
        assert_eq!(arch.block_type(mult).start, 4);
        assert_eq!(arch.block_type(mult).repeat, 8);
    }
}
