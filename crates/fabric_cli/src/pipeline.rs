//! The place-and-route pipeline behind the CLI.
//!
//! Stage order: parse netlist, optional random initial placement,
//! optional placement file, the requested placer stages, placement
//! output, routing. Statistics are printed to stdout after every stage;
//! diagnostics are rendered to stderr at the end.

use crate::Cli;
use fabric_arch::{load_architecture, Architecture};
use fabric_circuit::{
    apply_place_file, parse_net_file, read_array_size, write_place_file, Circuit,
};
use fabric_common::Stopwatch;
use fabric_diagnostics::{render_to_stderr, DiagnosticSink};
use fabric_place::{run_placer, PlacerSpec};
use fabric_route::{ConnectionRouter, ResourceGraph, RouterOptions, RoutingResult, RrgOptions};
use fabric_timing::{TimingGraph, CRITICALITY_EXPONENT, MAX_CRITICALITY};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::error::Error;

/// Runs the full pipeline for the parsed command line.
pub fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    if cli.blif.is_some() {
        return Err("the BLIF flow requires the external packer; start from --net".into());
    }
    let Some(net_path) = &cli.net else {
        return Err("no netlist given; use --net <path>".into());
    };

    let arch = load_architecture(&cli.architecture)?;

    // A placement file fixes the device size before the netlist loads.
    let fixed_size = match (&cli.size, &cli.place) {
        (Some(size), _) => Some(*size),
        (None, Some(place_path)) => Some(read_array_size(place_path)?),
        (None, None) => None,
    };

    let mut watch = Stopwatch::started();
    let mut circuit = parse_net_file(net_path, &arch, fixed_size)?;
    watch.stop();
    println!(
        "Parsed `{}`: {} blocks, {} nets, device {} x {} ({:.3} s)",
        circuit.name(),
        circuit.num_blocks(),
        circuit.num_nets(),
        circuit.grid().width(),
        circuit.grid().height(),
        watch.seconds()
    );

    let mut timing = TimingGraph::build(&circuit, &arch)?;
    let mut rng = StdRng::seed_from_u64(cli.seed);
    let mut sink = DiagnosticSink::new();

    if cli.random {
        let mut watch = Stopwatch::started();
        fabric_place::place_random(&mut circuit, &arch, &mut rng)?;
        watch.stop();
        print_statistics("random", &watch, &circuit, &mut timing);
    }

    if let Some(place_path) = &cli.place {
        apply_place_file(&mut circuit, place_path)?;
        let watch = Stopwatch::new();
        print_statistics("place file", &watch, &circuit, &mut timing);
    }

    for placer_text in &cli.placers {
        let spec = PlacerSpec::parse(placer_text)?;
        println!("Placing with {}...", spec.name);
        let mut watch = Stopwatch::started();
        run_placer(&spec, &mut circuit, &arch, &mut timing, &mut rng)?;
        watch.stop();
        print_statistics(&spec.name, &watch, &circuit, &mut timing);
    }

    if let Some(output) = &cli.output {
        write_place_file(&circuit, output)?;
        println!("Wrote placement to {}", output.display());
    }

    if !cli.no_route && !circuit.is_empty() {
        if !circuit.is_fully_placed() {
            return Err(
                "circuit is not fully placed; use --random, --placer, or --place".into(),
            );
        }
        route(cli, &circuit, &arch, &mut timing, &mut sink)?;
    }

    let diagnostics = sink.take_all();
    render_to_stderr(&diagnostics);
    if diagnostics.iter().any(|diag| diag.severity.stops_pipeline()) {
        return Err("errors were reported".into());
    }
    Ok(())
}

/// Routes the placed circuit and prints the iteration table.
fn route(
    cli: &Cli,
    circuit: &Circuit,
    arch: &Architecture,
    timing: &mut TimingGraph,
    sink: &mut DiagnosticSink,
) -> Result<(), Box<dyn Error>> {
    let rrg_options = RrgOptions {
        channel_width: cli.channel_width,
        ..RrgOptions::default()
    };
    let router_options = RouterOptions {
        max_trials: cli.max_trials,
        timing_driven: cli.timing_driven,
        ..RouterOptions::default()
    };

    let mut watch = Stopwatch::started();
    let graph = ResourceGraph::build(circuit, arch, &rrg_options);
    let mut router = ConnectionRouter::new(&graph, router_options);
    let result = router.route(circuit, timing, sink)?;
    watch.stop();

    print_routing(&result, cli.timing_driven, watch.seconds());
    Ok(())
}

/// Prints the per-stage cost summary.
fn print_statistics(stage: &str, watch: &Stopwatch, circuit: &Circuit, timing: &mut TimingGraph) {
    timing.calculate_placement_estimated_wire_delay(circuit);
    timing.calculate_arrival_and_required_times();
    timing.calculate_criticalities(MAX_CRITICALITY, CRITICALITY_EXPONENT);

    println!();
    println!("{stage:<12} {:>15}: {:.3} s", "place time", watch.seconds());
    println!("{stage:<12} {:>15}: {:.4}", "total cost", circuit.total_cost());
    println!("{stage:<12} {:>15}: {:.4} ps", "max delay", timing.max_delay());
    println!(
        "{stage:<12} {:>15}: {:.4}",
        "timing cost",
        timing.calculate_total_cost()
    );
    println!();
}

/// Prints the router's iteration table and outcome.
fn print_routing(result: &RoutingResult, timing_driven: bool, seconds: f64) {
    println!("----------------------------------------------------------------------");
    println!("|                         CONNECTION ROUTER                          |");
    println!("----------------------------------------------------------------------");
    println!("{:<22} | {}", "Timing driven", timing_driven);
    println!("{:<22} | {}", "Num connections", result.connections.len());
    println!(
        "{:>9}  {:>17}  {:>9}  {:>11}  {:>9}",
        "Iteration", "Overused RR nodes", "Overuse %", "Wire-length", "Max delay"
    );
    for stats in &result.iterations {
        println!(
            "{:>9}  {:>17}  {:>8.2}%  {:>11}  {:>9.3}",
            stats.iteration,
            stats.overused_nodes,
            100.0 * stats.overuse_fraction,
            stats.wirelength,
            stats.max_delay
        );
    }
    if result.valid {
        println!("Routing valid after {} iterations ({seconds:.3} s)", result.iterations.len());
    } else {
        println!("Routing failed; {} overused nodes:", result.overused_report.len());
        for description in &result.overused_report {
            println!("  {description}");
        }
    }
    println!("----------------------------------------------------------------------");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    const NET: &str = "\
block pad_a io
  out inpad[0] net_a
block u0 clb
  in in[0] net_a
  out out[0] net_b
block u1 clb
  in in[0] net_b
  out out[0] net_c
block pad_c io
  in outpad[0] net_c
";

    fn write_net(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("test.net");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(NET.as_bytes()).unwrap();
        path
    }

    #[test]
    fn full_flow_random_analytical_route() {
        let dir = tempfile::tempdir().unwrap();
        let net = write_net(&dir);
        let output = dir.path().join("out.place");
        let cli = Cli::parse_from([
            "fabric",
            "--net",
            net.to_str().unwrap(),
            "--random",
            "--placer",
            "analytical",
            "--placer",
            "sa",
            "--output",
            output.to_str().unwrap(),
        ]);
        run(&cli).unwrap();
        assert!(output.exists());
    }

    #[test]
    fn seeded_runs_are_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let net = write_net(&dir);
        let mut outputs = Vec::new();
        for name in ["a.place", "b.place"] {
            let output = dir.path().join(name);
            let cli = Cli::parse_from([
                "fabric",
                "--net",
                net.to_str().unwrap(),
                "--random",
                "--no-route",
                "--output",
                output.to_str().unwrap(),
            ]);
            run(&cli).unwrap();
            outputs.push(std::fs::read(&output).unwrap());
        }
        assert_eq!(outputs[0], outputs[1]);
    }

    #[test]
    fn place_file_restarts_flow() {
        let dir = tempfile::tempdir().unwrap();
        let net = write_net(&dir);
        let place = dir.path().join("seed.place");

        let cli = Cli::parse_from([
            "fabric",
            "--net",
            net.to_str().unwrap(),
            "--random",
            "--no-route",
            "--output",
            place.to_str().unwrap(),
        ]);
        run(&cli).unwrap();

        let cli = Cli::parse_from([
            "fabric",
            "--net",
            net.to_str().unwrap(),
            "--place",
            place.to_str().unwrap(),
            "--timing-driven",
            "false",
        ]);
        run(&cli).unwrap();
    }

    #[test]
    fn empty_netlist_flows_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.net");
        std::fs::write(&path, "").unwrap();
        let cli = Cli::parse_from(["fabric", "--net", path.to_str().unwrap(), "--random"]);
        run(&cli).unwrap();
    }

    #[test]
    fn blif_flow_is_rejected() {
        let cli = Cli::parse_from(["fabric", "--blif", "x.blif", "--net", "x.net"]);
        let err = run(&cli).unwrap_err();
        assert!(err.to_string().contains("packer"));
    }

    #[test]
    fn missing_net_is_rejected() {
        let cli = Cli::parse_from(["fabric"]);
        let err = run(&cli).unwrap_err();
        assert!(err.to_string().contains("--net"));
    }

    #[test]
    fn unplaced_routing_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let net = write_net(&dir);
        let cli = Cli::parse_from(["fabric", "--net", net.to_str().unwrap()]);
        let err = run(&cli).unwrap_err();
        assert!(err.to_string().contains("not fully placed"));
    }

    #[test]
    fn unknown_architecture_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let net = write_net(&dir);
        let cli = Cli::parse_from([
            "fabric",
            "--net",
            net.to_str().unwrap(),
            "--architecture",
            "warp9",
        ]);
        assert!(run(&cli).is_err());
    }
}
