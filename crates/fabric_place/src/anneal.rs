//! Simulated-annealing placement refinement.
//!
//! Starting from a legal placement, repeatedly proposes single-block moves
//! within a shrinking window (swapping the occupant when the target slot is
//! taken) and accepts each move with the Metropolis criterion. The
//! schedule is the classic one: the initial temperature comes from the
//! standard deviation of random-move cost changes, the cooling rate adapts
//! to the acceptance rate, and the move window tracks a 44 % target
//! acceptance rate.
//!
//! The move cost blends wire length and timing:
//! `(1 - lambda) * d_bb / bb_norm + lambda * d_td / td_norm`.

use crate::cost::BoundingBoxCost;
use crate::PlaceError;
use fabric_arch::PortDirection;
use fabric_circuit::{BlockId, Circuit, SiteRef};
use fabric_timing::{TimingEdgeId, TimingGraph, CRITICALITY_EXPONENT, MAX_CRITICALITY};
use rand::rngs::StdRng;
use rand::Rng;

/// Target acceptance rate of the window-size controller.
const TARGET_ACCEPT_RATE: f64 = 0.44;

/// Stop when the temperature drops below `0.005 * cost / num_nets`.
const STOP_FRACTION: f64 = 0.005;

/// Options of the annealing refiner.
#[derive(Debug, Clone)]
pub struct AnnealOptions {
    /// Timing trade-off `lambda` in [0, 1]; 0 anneals pure wire length.
    pub lambda: f64,
    /// Multiplier on the `n^(4/3)` moves-per-temperature count.
    pub inner_num: f64,
    /// Hard cap on outer iterations.
    pub max_outer_iterations: usize,
}

impl Default for AnnealOptions {
    fn default() -> Self {
        Self {
            lambda: 0.0,
            inner_num: 1.0,
            max_outer_iterations: 1000,
        }
    }
}

/// One proposed move: either into a free slot or a swap with the occupant.
enum Move {
    Relocate { block: BlockId, from: SiteRef },
    Swap { a: BlockId, b: BlockId },
}

/// Refines the placement of `circuit` by simulated annealing.
pub fn place_anneal(
    circuit: &mut Circuit,
    timing: &mut TimingGraph,
    options: &AnnealOptions,
    rng: &mut StdRng,
) -> Result<(), PlaceError> {
    if circuit.num_blocks() < 2 || circuit.num_nets() == 0 {
        return Ok(());
    }
    if !circuit.is_fully_placed() {
        return Err(PlaceError::Infeasible {
            message: "annealing requires an initial placement".into(),
        });
    }

    let mut cache = BoundingBoxCost::new(circuit);
    let mut state = AnnealState {
        lambda: options.lambda.clamp(0.0, 1.0),
        bb_norm: cache.total().max(f64::MIN_POSITIVE),
        td_norm: 1.0,
        saved_delays: Vec::new(),
    };
    state.refresh_timing(circuit, timing);

    let num_blocks = circuit.num_blocks() as f64;
    let moves_per_temperature =
        ((options.inner_num * num_blocks.powf(4.0 / 3.0)).ceil() as usize).max(10);
    let max_dimension = circuit.grid().width().max(circuit.grid().height());
    let mut window = max_dimension;

    // Initial temperature: 20 x the standard deviation of the cost change
    // over one warmup sweep of unconditionally accepted moves.
    let mut deltas = Vec::new();
    for _ in 0..circuit.num_blocks() {
        if let Some((proposed, delta)) = propose(circuit, timing, &mut state, &cache, window, rng)? {
            deltas.push(delta);
            let nets = affected(circuit, &proposed);
            cache.commit(circuit, &nets);
            state.keep_delays();
        }
    }
    let mut temperature = 20.0 * std_deviation(&deltas);
    if temperature <= 0.0 {
        return Ok(());
    }

    for _ in 0..options.max_outer_iterations {
        let mut accepted = 0usize;
        for _ in 0..moves_per_temperature {
            let Some((proposed, delta)) =
                propose(circuit, timing, &mut state, &cache, window, rng)?
            else {
                continue;
            };
            if delta < 0.0 || rng.gen::<f64>() < (-delta / temperature).exp() {
                let nets = affected(circuit, &proposed);
                cache.commit(circuit, &nets);
                state.keep_delays();
                accepted += 1;
            } else {
                revert(circuit, timing, &proposed, &mut state)?;
            }
        }

        let accept_rate = accepted as f64 / moves_per_temperature as f64;
        temperature *= cooling_rate(accept_rate);
        window = ((window as f64 * (1.0 - TARGET_ACCEPT_RATE + accept_rate)).round() as u32)
            .clamp(1, max_dimension);

        state.refresh_timing(circuit, timing);
        state.bb_norm = cache.total().max(f64::MIN_POSITIVE);

        if temperature < STOP_FRACTION * cache.total() / circuit.num_nets() as f64 {
            break;
        }
    }
    Ok(())
}

/// Mutable annealing bookkeeping shared across helpers.
struct AnnealState {
    lambda: f64,
    bb_norm: f64,
    td_norm: f64,
    saved_delays: Vec<(TimingEdgeId, f64)>,
}

impl AnnealState {
    /// Recomputes estimated delays, slacks, and criticalities, and resets
    /// the timing normalization. Done once per temperature step.
    fn refresh_timing(&mut self, circuit: &Circuit, timing: &mut TimingGraph) {
        if self.lambda <= 0.0 {
            return;
        }
        timing.calculate_placement_estimated_wire_delay(circuit);
        timing.calculate_arrival_and_required_times();
        timing.calculate_criticalities(MAX_CRITICALITY, CRITICALITY_EXPONENT);
        self.td_norm = timing.calculate_total_cost().max(f64::MIN_POSITIVE);
    }

    fn keep_delays(&mut self) {
        self.saved_delays.clear();
    }
}

/// Proposes and applies one move, returning it with its normalized cost
/// change; `None` when no move was available this round.
fn propose(
    circuit: &mut Circuit,
    timing: &mut TimingGraph,
    state: &mut AnnealState,
    cache: &BoundingBoxCost,
    window: u32,
    rng: &mut StdRng,
) -> Result<Option<(Move, f64)>, PlaceError> {
    let Some(block) = circuit.random_block(rng) else {
        return Ok(None);
    };
    let Some(from) = circuit.block(block).site else {
        return Ok(None);
    };
    let block_type = circuit.block(block).block_type;
    let Some(target) = circuit.random_site_near(block_type, from.x, from.y, window, rng) else {
        return Ok(None);
    };
    if target == from {
        return Ok(None);
    }

    let occupant = circuit.block_at(target.x, target.y, target.subblock);
    let proposed = match occupant {
        Some(other) if other == block => return Ok(None),
        Some(other) => {
            circuit.swap(block, other)?;
            Move::Swap { a: block, b: other }
        }
        None => {
            circuit.place(block, target)?;
            Move::Relocate { block, from }
        }
    };

    let moved = moved_blocks(&proposed);
    let nets = affected(circuit, &proposed);
    let bb_delta = cache.delta(circuit, &nets);
    let td_delta = if state.lambda > 0.0 {
        timing_delta(circuit, timing, &moved, &mut state.saved_delays)
    } else {
        0.0
    };

    let delta = (1.0 - state.lambda) * bb_delta / state.bb_norm
        + state.lambda * td_delta / state.td_norm;
    Ok(Some((proposed, delta)))
}

fn moved_blocks(proposed: &Move) -> Vec<BlockId> {
    match proposed {
        Move::Relocate { block, .. } => vec![*block],
        Move::Swap { a, b } => vec![*a, *b],
    }
}

fn affected(circuit: &Circuit, proposed: &Move) -> Vec<fabric_circuit::NetId> {
    BoundingBoxCost::affected_nets(circuit, &moved_blocks(proposed))
}

/// Undoes a proposed move and restores the saved wire delays.
fn revert(
    circuit: &mut Circuit,
    timing: &mut TimingGraph,
    proposed: &Move,
    state: &mut AnnealState,
) -> Result<(), PlaceError> {
    match proposed {
        Move::Relocate { block, from } => circuit.place(*block, *from)?,
        Move::Swap { a, b } => circuit.swap(*a, *b)?,
    }
    for &(edge, delay) in state.saved_delays.iter().rev() {
        timing.set_wire_delay(edge, delay);
    }
    state.saved_delays.clear();
    Ok(())
}

/// Re-estimates the wire delays of every connection with an endpoint on a
/// moved block and returns the criticality-weighted delay change. Old
/// delays are pushed to `saved` for a possible revert.
fn timing_delta(
    circuit: &Circuit,
    timing: &mut TimingGraph,
    moved: &[BlockId],
    saved: &mut Vec<(TimingEdgeId, f64)>,
) -> f64 {
    let mut delta = 0.0;
    let mut visit = |timing: &mut TimingGraph, driver, sink| {
        let Some(edge_id) = timing.wire_edge(driver, sink) else {
            return;
        };
        let edge = timing.edge(edge_id);
        let old_delay = edge.delay;
        let criticality = edge.criticality;
        let from = circuit.block_position(circuit.pin(driver).block);
        let to = circuit.block_position(circuit.pin(sink).block);
        let new_delay = match (from, to) {
            (Some((fx, fy)), Some((tx, ty))) => {
                ((fx - tx).abs() + (fy - ty).abs()) * timing.wire_delay_per_unit
            }
            _ => 0.0,
        };
        if new_delay != old_delay {
            saved.push((edge_id, old_delay));
            timing.set_wire_delay(edge_id, new_delay);
            delta += (new_delay - old_delay) * criticality;
        }
    };

    for &block in moved {
        for &pin_id in &circuit.block(block).pins {
            let pin = circuit.pin(pin_id);
            let Some(net_id) = pin.net else { continue };
            let net = circuit.net(net_id);
            match pin.direction {
                PortDirection::Output => {
                    for &sink in &net.sinks {
                        visit(timing, net.driver, sink);
                    }
                }
                PortDirection::Input => visit(timing, net.driver, pin_id),
            }
        }
    }
    delta
}

/// Classic acceptance-rate cooling bands.
fn cooling_rate(accept_rate: f64) -> f64 {
    if accept_rate > 0.96 {
        0.5
    } else if accept_rate > 0.8 {
        0.9
    } else if accept_rate > 0.15 {
        0.95
    } else {
        0.8
    }
}

fn std_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::place_random;
    use fabric_arch::load_architecture;
    use fabric_circuit::parse_net_text;
    use rand::SeedableRng;

    fn chain(n: usize) -> String {
        let mut text = String::from("block pad_in io\n  out inpad[0] net_0\n");
        for i in 0..n {
            text.push_str(&format!(
                "block u{i} clb\n  in in[0] net_{i}\n  out out[0] net_{}\n",
                i + 1
            ));
        }
        text.push_str(&format!("block pad_out io\n  in outpad[0] net_{n}\n"));
        text
    }

    fn prepared(n: usize) -> (fabric_arch::Architecture, Circuit, TimingGraph, StdRng) {
        let arch = load_architecture("basic").unwrap();
        let mut circuit = parse_net_text(&chain(n), "c", "c.net", &arch, None).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        place_random(&mut circuit, &arch, &mut rng).unwrap();
        let timing = TimingGraph::build(&circuit, &arch).unwrap();
        (arch, circuit, timing, rng)
    }

    #[test]
    fn anneal_does_not_worsen_much() {
        let (arch, mut circuit, mut timing, mut rng) = prepared(12);
        let before = circuit.total_cost();
        let options = AnnealOptions::default();
        place_anneal(&mut circuit, &mut timing, &options, &mut rng).unwrap();
        let after = circuit.total_cost();
        assert!(after <= before * 1.05, "cost {before} -> {after}");
        assert!(circuit.is_fully_placed());
    }

    #[test]
    fn anneal_keeps_placement_legal() {
        let (arch, mut circuit, mut timing, mut rng) = prepared(10);
        let options = AnnealOptions::default();
        place_anneal(&mut circuit, &mut timing, &options, &mut rng).unwrap();

        let mut seen = std::collections::HashSet::new();
        for block in &circuit.blocks {
            let site = block.site.unwrap();
            assert!(seen.insert((site.x, site.y, site.subblock)));
            let grid_site = circuit.grid().site_at_exact(site.x, site.y).unwrap();
            assert_eq!(grid_site.block_type, block.block_type);
        }
    }

    #[test]
    fn anneal_is_deterministic_per_seed() {
        let run = || {
            let (arch, mut circuit, mut timing, mut rng) = prepared(8);
            let options = AnnealOptions::default();
            place_anneal(&mut circuit, &mut timing, &options, &mut rng).unwrap();
            circuit
                .blocks
                .iter()
                .map(|block| block.site.unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn timing_driven_anneal_runs() {
        let (arch, mut circuit, mut timing, mut rng) = prepared(8);
        let options = AnnealOptions {
            lambda: 0.5,
            ..AnnealOptions::default()
        };
        place_anneal(&mut circuit, &mut timing, &options, &mut rng).unwrap();
        assert!(circuit.is_fully_placed());
        timing.calculate_placement_estimated_wire_delay(&circuit);
        timing.calculate_arrival_and_required_times();
        assert!(timing.max_delay() > 0.0);
    }

    #[test]
    fn unplaced_circuit_rejected() {
        let arch = load_architecture("basic").unwrap();
        let mut circuit = parse_net_text(&chain(4), "c", "c.net", &arch, None).unwrap();
        let mut timing = TimingGraph::build(&circuit, &arch).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let err = place_anneal(
            &mut circuit,
            &mut timing,
            &AnnealOptions::default(),
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, PlaceError::Infeasible { .. }));
    }

    #[test]
    fn tiny_circuits_are_noops() {
        let arch = load_architecture("basic").unwrap();
        let mut circuit = parse_net_text("", "e", "e.net", &arch, None).unwrap();
        let mut timing = TimingGraph::build(&circuit, &arch).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        place_anneal(
            &mut circuit,
            &mut timing,
            &AnnealOptions::default(),
            &mut rng,
        )
        .unwrap();
    }

    #[test]
    fn cooling_bands() {
        assert_eq!(cooling_rate(0.99), 0.5);
        assert_eq!(cooling_rate(0.9), 0.9);
        assert_eq!(cooling_rate(0.5), 0.95);
        assert_eq!(cooling_rate(0.05), 0.8);
    }

    #[test]
    fn std_deviation_basics() {
        assert_eq!(std_deviation(&[]), 0.0);
        assert_eq!(std_deviation(&[3.0, 3.0, 3.0]), 0.0);
        assert!((std_deviation(&[1.0, -1.0]) - 1.0).abs() < 1e-12);
    }
}
