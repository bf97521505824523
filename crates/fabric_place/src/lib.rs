//! Placers for the Fabric engine.
//!
//! Three placers share the circuit/timing data model:
//!
//! - `random` — seeded random initial placement ([`random::place_random`]).
//! - `analytical` — B2B quadratic wire-length minimization with an
//!   area-spreading legalizer ([`analytical::place_analytical`]).
//! - `sa` — simulated-annealing refinement, optionally timing-driven
//!   ([`anneal::place_anneal`]).
//!
//! The CLI selects placers with repeatable `--placer name,opt=value,...`
//! flags; [`PlacerSpec`] parses one such value and [`run_placer`] dispatches
//! it.

#![warn(missing_docs)]

pub mod analytical;
pub mod anneal;
pub mod cost;
pub mod random;

pub use analytical::{place_analytical, AnalyticalOptions};
pub use anneal::{place_anneal, AnnealOptions};
pub use cost::BoundingBoxCost;
pub use random::place_random;

use fabric_arch::Architecture;
use fabric_circuit::Circuit;
use fabric_timing::TimingGraph;
use rand::rngs::StdRng;
use std::collections::BTreeMap;

/// Errors produced by the placers.
#[derive(Debug, thiserror::Error)]
pub enum PlaceError {
    /// The circuit cannot be placed on the device.
    #[error("placement infeasible: {message}")]
    Infeasible {
        /// Description of the violated capacity or precondition.
        message: String,
    },

    /// A site-assignment operation failed.
    #[error(transparent)]
    Circuit(#[from] fabric_circuit::CircuitError),

    /// A `--placer` value names an unknown placer.
    #[error("unknown placer `{name}` (expected random, analytical, or sa)")]
    UnknownPlacer {
        /// The requested name.
        name: String,
    },

    /// A `--placer` value carries an unusable option.
    #[error("placer `{placer}`: bad option `{option}`")]
    BadOption {
        /// The placer the option was passed to.
        placer: String,
        /// The offending `key=value` text.
        option: String,
    },

    /// An engine invariant was violated.
    #[error(transparent)]
    Internal(#[from] fabric_common::InternalError),
}

/// One parsed `--placer` value: a name plus `key=value` options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacerSpec {
    /// The placer name.
    pub name: String,
    /// Options in declaration order.
    pub options: BTreeMap<String, String>,
}

impl PlacerSpec {
    /// Parses `name[,key=value,...]`.
    pub fn parse(text: &str) -> Result<Self, PlaceError> {
        let mut parts = text.split(',');
        let name = parts.next().unwrap_or("").trim().to_string();
        if name.is_empty() {
            return Err(PlaceError::UnknownPlacer { name });
        }
        let mut options = BTreeMap::new();
        for part in parts {
            let Some((key, value)) = part.split_once('=') else {
                return Err(PlaceError::BadOption {
                    placer: name,
                    option: part.to_string(),
                });
            };
            options.insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(Self { name, options })
    }

    fn float(&self, key: &str, default: f64) -> Result<f64, PlaceError> {
        match self.options.get(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| PlaceError::BadOption {
                placer: self.name.clone(),
                option: format!("{key}={value}"),
            }),
        }
    }

    fn integer(&self, key: &str, default: usize) -> Result<usize, PlaceError> {
        match self.options.get(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| PlaceError::BadOption {
                placer: self.name.clone(),
                option: format!("{key}={value}"),
            }),
        }
    }

    fn reject_unknown(&self, known: &[&str]) -> Result<(), PlaceError> {
        for key in self.options.keys() {
            if !known.contains(&key.as_str()) {
                return Err(PlaceError::BadOption {
                    placer: self.name.clone(),
                    option: key.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Runs one placer over the circuit.
pub fn run_placer(
    spec: &PlacerSpec,
    circuit: &mut Circuit,
    arch: &Architecture,
    timing: &mut TimingGraph,
    rng: &mut StdRng,
) -> Result<(), PlaceError> {
    match spec.name.as_str() {
        "random" => {
            spec.reject_unknown(&[])?;
            random::place_random(circuit, arch, rng)
        }
        "analytical" => {
            spec.reject_unknown(&["anchor_weight", "epsilon", "stop_ratio", "max_iterations"])?;
            let options = AnalyticalOptions {
                anchor_weight: spec.float("anchor_weight", 0.3)?,
                epsilon: spec.float("epsilon", 1e-4)?,
                stop_ratio: spec.float("stop_ratio", 1.02)?,
                max_iterations: spec.integer("max_iterations", 30)?,
            };
            analytical::place_analytical(circuit, arch, &options)
        }
        "sa" | "SA" => {
            spec.reject_unknown(&["lambda", "inner_num", "max_outer_iterations"])?;
            let options = AnnealOptions {
                lambda: spec.float("lambda", 0.0)?,
                inner_num: spec.float("inner_num", 1.0)?,
                max_outer_iterations: spec.integer("max_outer_iterations", 1000)?,
            };
            anneal::place_anneal(circuit, timing, &options, rng)
        }
        _ => Err(PlaceError::UnknownPlacer {
            name: spec.name.clone(),
        }),
    }
}
