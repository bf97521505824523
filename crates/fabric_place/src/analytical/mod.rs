//! Analytical placement: quadratic wire length plus legalization.
//!
//! Minimizes the bound-to-bound (B2B) quadratic wire-length model over the
//! movable (non-I/O) blocks, I/O pads staying fixed. Each outer iteration
//! re-linearizes the spring weights from the current coordinates, solves X
//! and Y independently by preconditioned conjugate gradient, legalizes the
//! continuous solution with the area spreader, and anchors the next solve
//! toward the legal positions with a linearly growing pseudo weight. The
//! loop ends when the legalized wire length closes on the solved lower
//! bound, or at the iteration cap.

pub mod legalizer;
pub mod solver;

use crate::PlaceError;
use fabric_arch::{Architecture, BlockTypeId};
use fabric_circuit::{crossing_count, BlockId, Circuit, SiteRef};
use solver::DimensionSolver;
use std::collections::HashMap;

/// Options of the analytical placer.
#[derive(Debug, Clone)]
pub struct AnalyticalOptions {
    /// Pseudo-anchor weight growth per outer iteration.
    pub anchor_weight: f64,
    /// Conjugate-gradient convergence tolerance.
    pub epsilon: f64,
    /// Stop when `legal_cost <= stop_ratio * solved_cost`.
    pub stop_ratio: f64,
    /// Outer iteration cap.
    pub max_iterations: usize,
}

impl Default for AnalyticalOptions {
    fn default() -> Self {
        Self {
            anchor_weight: 0.3,
            epsilon: 1e-4,
            stop_ratio: 1.02,
            max_iterations: 30,
        }
    }
}

/// One net terminal: a movable solver unknown or a fixed position.
struct Terminal {
    movable: Option<usize>,
    fixed_x: f64,
    fixed_y: f64,
}

impl Terminal {
    fn x(&self, xs: &[f64]) -> f64 {
        match self.movable {
            Some(index) => xs[index],
            None => self.fixed_x,
        }
    }

    fn y(&self, ys: &[f64]) -> f64 {
        match self.movable {
            Some(index) => ys[index],
            None => self.fixed_y,
        }
    }
}

/// Places the movable blocks of `circuit` analytically.
///
/// Requires a fully placed starting point (the random placer provides
/// one); I/O pads keep their sites.
pub fn place_analytical(
    circuit: &mut Circuit,
    arch: &Architecture,
    options: &AnalyticalOptions,
) -> Result<(), PlaceError> {
    if !circuit.is_fully_placed() {
        return Err(PlaceError::Infeasible {
            message: "analytical placement requires an initial placement".into(),
        });
    }
    let movable = circuit.movable_blocks(arch);
    if movable.is_empty() {
        return Ok(());
    }

    let index_of: HashMap<BlockId, usize> = movable
        .iter()
        .enumerate()
        .map(|(index, &block)| (block, index))
        .collect();

    let mut xs: Vec<f64> = Vec::with_capacity(movable.len());
    let mut ys: Vec<f64> = Vec::with_capacity(movable.len());
    for &block in &movable {
        let (x, y) = circuit.block_position(block).ok_or(PlaceError::Infeasible {
            message: "movable block lost its site".into(),
        })?;
        xs.push(x);
        ys.push(y);
    }
    let mut legal_x: Vec<u32> = xs.iter().map(|&x| x as u32).collect();
    let mut legal_y: Vec<u32> = ys.iter().map(|&y| y as u32).collect();

    // Net terminal lists are stable across iterations; only positions move.
    let nets: Vec<Vec<Terminal>> = circuit
        .nets
        .iter()
        .map(|net| {
            let mut seen = Vec::new();
            let mut terminals = Vec::new();
            for pin in net.pins() {
                let block = circuit.pin(pin).block;
                if seen.contains(&block) {
                    continue;
                }
                seen.push(block);
                let (fixed_x, fixed_y) = circuit.block_position(block).unwrap_or((0.0, 0.0));
                terminals.push(Terminal {
                    movable: index_of.get(&block).copied(),
                    fixed_x,
                    fixed_y,
                });
            }
            terminals
        })
        .collect();

    // Which block types need legalization, and their member indices.
    let mut type_members: Vec<(BlockTypeId, Vec<usize>)> = Vec::new();
    for (index, &block) in movable.iter().enumerate() {
        let block_type = circuit.block(block).block_type;
        match type_members.iter_mut().find(|(t, _)| *t == block_type) {
            Some((_, members)) => members.push(index),
            None => type_members.push((block_type, vec![index])),
        }
    }

    for iteration in 1..=options.max_iterations {
        let mut solver_x = DimensionSolver::new(movable.len(), options.epsilon);
        let mut solver_y = DimensionSolver::new(movable.len(), options.epsilon);
        for terminals in &nets {
            process_net(terminals, &xs, &ys, &mut solver_x, &mut solver_y);
        }
        if iteration > 1 {
            let weight = options.anchor_weight * (iteration - 1) as f64;
            for index in 0..movable.len() {
                solver_x.add_anchor(index, legal_x[index] as f64, weight);
                solver_y.add_anchor(index, legal_y[index] as f64, weight);
            }
        }
        xs = solver_x.solve(&xs);
        ys = solver_y.solve(&ys);

        let solved_cost = wirelength(&nets, &xs, &ys);

        for (block_type, members) in &type_members {
            let member_xs: Vec<f64> = members.iter().map(|&m| xs[m]).collect();
            let member_ys: Vec<f64> = members.iter().map(|&m| ys[m]).collect();
            let data = arch.block_type(*block_type);
            let sites = legalizer::legalize_type(
                circuit.grid(),
                data.height,
                circuit.grid().columns_of_type(*block_type),
                &member_xs,
                &member_ys,
            )?;
            for (&member, &(x, y)) in members.iter().zip(&sites) {
                legal_x[member] = x;
                legal_y[member] = y;
            }
        }

        let legal_xf: Vec<f64> = legal_x.iter().map(|&x| x as f64).collect();
        let legal_yf: Vec<f64> = legal_y.iter().map(|&y| y as f64).collect();
        let legal_cost = wirelength(&nets, &legal_xf, &legal_yf);

        if solved_cost <= f64::EPSILON || legal_cost <= options.stop_ratio * solved_cost {
            break;
        }
    }

    // Commit the last legal solution.
    for &block in &movable {
        circuit.unplace(block);
    }
    for (index, &block) in movable.iter().enumerate() {
        circuit.place(block, SiteRef::new(legal_x[index], legal_y[index]))?;
    }
    Ok(())
}

/// Adds one net's B2B springs to both dimension solvers.
fn process_net(
    terminals: &[Terminal],
    xs: &[f64],
    ys: &[f64],
    solver_x: &mut DimensionSolver,
    solver_y: &mut DimensionSolver,
) {
    let n = terminals.len();
    if n < 2 {
        return;
    }
    let multiplier = crossing_count(n) / (n - 1) as f64;

    // Two-terminal nets are the common case and get a single spring.
    if n == 2 {
        let (a, b) = (&terminals[0], &terminals[1]);
        solver_x.add_connection(a.movable, a.x(xs), b.movable, b.x(xs), multiplier);
        solver_y.add_connection(a.movable, a.y(ys), b.movable, b.y(ys), multiplier);
        return;
    }

    for (solver, coord) in [
        (solver_x, Coordinate::X),
        (solver_y, Coordinate::Y),
    ] {
        let position = |t: &Terminal| match coord {
            Coordinate::X => t.x(xs),
            Coordinate::Y => t.y(ys),
        };
        let mut min_index = 0;
        let mut max_index = 0;
        for index in 1..n {
            if position(&terminals[index]) < position(&terminals[min_index]) {
                min_index = index;
            } else if position(&terminals[index]) > position(&terminals[max_index]) {
                max_index = index;
            }
        }
        let min = &terminals[min_index];
        let max = &terminals[max_index];
        for (index, terminal) in terminals.iter().enumerate() {
            if index != min_index {
                solver.add_connection(
                    min.movable,
                    position(min),
                    terminal.movable,
                    position(terminal),
                    multiplier,
                );
                if index != max_index {
                    solver.add_connection(
                        terminal.movable,
                        position(terminal),
                        max.movable,
                        position(max),
                        multiplier,
                    );
                }
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Coordinate {
    X,
    Y,
}

/// Crossing-count-weighted half-perimeter wire length over all nets.
fn wirelength(nets: &[Vec<Terminal>], xs: &[f64], ys: &[f64]) -> f64 {
    let mut total = 0.0;
    for terminals in nets {
        if terminals.len() < 2 {
            continue;
        }
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for terminal in terminals {
            min_x = min_x.min(terminal.x(xs));
            max_x = max_x.max(terminal.x(xs));
            min_y = min_y.min(terminal.y(ys));
            max_y = max_y.max(terminal.y(ys));
        }
        total += (max_x - min_x + max_y - min_y) * crossing_count(terminals.len());
    }
    total
}
