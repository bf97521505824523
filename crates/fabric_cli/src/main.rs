//! Fabric CLI — place and route a flat netlist onto an FPGA device.
//!
//! The pipeline runs netlist parsing, an optional seeded random initial
//! placement, any sequence of `--placer` stages, placement output, and
//! negotiated-congestion routing. Statistics are printed after every
//! stage; warnings and errors go to stderr.

#![warn(missing_docs)]

mod pipeline;

use clap::Parser;
use std::path::PathBuf;
use std::process;

/// Fabric — an FPGA place-and-route engine.
#[derive(Parser, Debug)]
#[command(name = "fabric", version, about = "Fabric FPGA place and route")]
pub struct Cli {
    /// Architecture preset name or architecture JSON file path.
    #[arg(long, default_value = "basic")]
    pub architecture: String,

    /// Start from a BLIF netlist (requires the external packer).
    #[arg(long)]
    pub blif: Option<PathBuf>,

    /// The flat netlist to place and route.
    #[arg(long)]
    pub net: Option<PathBuf>,

    /// Start from an existing placement file.
    #[arg(long)]
    pub place: Option<PathBuf>,

    /// Randomize the initial placement (seeded; see --seed).
    #[arg(long)]
    pub random: bool,

    /// A placer stage to run: `name[,key=value,...]`. Repeatable;
    /// recognized names are `random`, `analytical`, and `sa`.
    #[arg(long = "placer")]
    pub placers: Vec<String>,

    /// Placement output file.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Skip routing after placement.
    #[arg(long)]
    pub no_route: bool,

    /// Timing-driven routing.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub timing_driven: bool,

    /// Maximum router iterations before reporting congestion.
    #[arg(long, default_value_t = 100)]
    pub max_trials: usize,

    /// Wire tracks per routing channel.
    #[arg(long, default_value_t = 8)]
    pub channel_width: u32,

    /// Seed of the stochastic placers.
    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// Fixed device size (width = height); auto-sized when omitted.
    #[arg(long)]
    pub size: Option<u32>,
}

fn main() {
    let cli = Cli::parse();
    match pipeline::run(&cli) {
        Ok(()) => process::exit(0),
        Err(error) => {
            eprintln!("error: {error}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_defaults() {
        let cli = Cli::parse_from(["fabric"]);
        assert_eq!(cli.architecture, "basic");
        assert!(cli.net.is_none());
        assert!(cli.place.is_none());
        assert!(!cli.random);
        assert!(cli.placers.is_empty());
        assert!(cli.output.is_none());
        assert!(!cli.no_route);
        assert!(cli.timing_driven);
        assert_eq!(cli.max_trials, 100);
        assert_eq!(cli.channel_width, 8);
        assert_eq!(cli.seed, 1);
        assert!(cli.size.is_none());
    }

    #[test]
    fn parse_net_flow() {
        let cli = Cli::parse_from([
            "fabric",
            "--net",
            "adder.net",
            "--random",
            "--output",
            "adder.place",
        ]);
        assert_eq!(cli.net.as_deref().unwrap().to_str(), Some("adder.net"));
        assert!(cli.random);
        assert_eq!(
            cli.output.as_deref().unwrap().to_str(),
            Some("adder.place")
        );
    }

    #[test]
    fn parse_repeated_placers() {
        let cli = Cli::parse_from([
            "fabric",
            "--net",
            "c.net",
            "--placer",
            "random",
            "--placer",
            "analytical,anchor_weight=0.5",
            "--placer",
            "sa,lambda=0.5",
        ]);
        assert_eq!(
            cli.placers,
            vec!["random", "analytical,anchor_weight=0.5", "sa,lambda=0.5"]
        );
    }

    #[test]
    fn parse_place_flow() {
        let cli = Cli::parse_from(["fabric", "--net", "c.net", "--place", "c.place"]);
        assert_eq!(cli.place.as_deref().unwrap().to_str(), Some("c.place"));
    }

    #[test]
    fn parse_timing_driven_off() {
        let cli = Cli::parse_from(["fabric", "--timing-driven", "false"]);
        assert!(!cli.timing_driven);
    }

    #[test]
    fn parse_router_tuning() {
        let cli = Cli::parse_from([
            "fabric",
            "--max-trials",
            "40",
            "--channel-width",
            "12",
            "--no-route",
        ]);
        assert_eq!(cli.max_trials, 40);
        assert_eq!(cli.channel_width, 12);
        assert!(cli.no_route);
    }

    #[test]
    fn parse_seed_and_size() {
        let cli = Cli::parse_from(["fabric", "--seed", "7", "--size", "12"]);
        assert_eq!(cli.seed, 7);
        assert_eq!(cli.size, Some(12));
    }

    #[test]
    fn parse_architecture_path() {
        let cli = Cli::parse_from(["fabric", "--architecture", "arch/k4.json"]);
        assert_eq!(cli.architecture, "arch/k4.json");
    }
}
