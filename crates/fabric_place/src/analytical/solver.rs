//! Per-dimension sparse linear solver for the analytical placer.
//!
//! X and Y are independent: each dimension accumulates its own symmetric
//! positive-definite system from bound-to-bound springs and pseudo-anchor
//! terms, then solves it by conjugate gradient with Jacobi (diagonal)
//! preconditioning. Spring weights are re-linearized by the current
//! separation of their endpoints, with a floor to keep coincident blocks
//! from blowing up the weight.

/// Minimum separation used when re-linearizing spring weights.
pub const MIN_SEPARATION: f64 = 0.01;

/// One dimension's linear system over the movable blocks.
#[derive(Debug, Clone)]
pub struct DimensionSolver {
    diag: Vec<f64>,
    off_diag: Vec<Vec<(usize, f64)>>,
    rhs: Vec<f64>,
    epsilon: f64,
}

impl DimensionSolver {
    /// Creates an empty system over `num_movable` unknowns.
    pub fn new(num_movable: usize, epsilon: f64) -> Self {
        Self {
            diag: vec![0.0; num_movable],
            off_diag: vec![Vec::new(); num_movable],
            rhs: vec![0.0; num_movable],
            epsilon,
        }
    }

    /// Adds a spring between two net terminals.
    ///
    /// A terminal is movable (`Some(index)`) or fixed (`None`); positions
    /// are the current coordinates used for re-linearization. A spring
    /// between two fixed terminals contributes nothing.
    pub fn add_connection(
        &mut self,
        a: Option<usize>,
        position_a: f64,
        b: Option<usize>,
        position_b: f64,
        weight_multiplier: f64,
    ) {
        let weight = weight_multiplier / (position_a - position_b).abs().max(MIN_SEPARATION);
        match (a, b) {
            (Some(i), Some(j)) => {
                self.diag[i] += weight;
                self.diag[j] += weight;
                self.off_diag[i].push((j, -weight));
                self.off_diag[j].push((i, -weight));
            }
            (Some(i), None) => {
                self.diag[i] += weight;
                self.rhs[i] += weight * position_b;
            }
            (None, Some(j)) => {
                self.diag[j] += weight;
                self.rhs[j] += weight * position_a;
            }
            (None, None) => {}
        }
    }

    /// Adds a pseudo-anchor pulling unknown `index` toward `target`.
    pub fn add_anchor(&mut self, index: usize, target: f64, weight: f64) {
        self.diag[index] += weight;
        self.rhs[index] += weight * target;
    }

    /// Solves the system by Jacobi-preconditioned conjugate gradient,
    /// warm-started from `initial`. Unconnected unknowns stay where they
    /// are.
    pub fn solve(mut self, initial: &[f64]) -> Vec<f64> {
        let n = initial.len();
        for i in 0..n {
            if self.diag[i] == 0.0 {
                self.diag[i] = 1.0;
                self.rhs[i] = initial[i];
            }
        }

        let mut x = initial.to_vec();
        let mut r = vec![0.0; n];
        let apply = |x: &[f64], out: &mut [f64]| {
            for i in 0..n {
                let mut sum = self.diag[i] * x[i];
                for &(j, w) in &self.off_diag[i] {
                    sum += w * x[j];
                }
                out[i] = sum;
            }
        };

        apply(&x, &mut r);
        for i in 0..n {
            r[i] = self.rhs[i] - r[i];
        }
        let mut z: Vec<f64> = (0..n).map(|i| r[i] / self.diag[i]).collect();
        let mut p = z.clone();
        let mut rz: f64 = dot(&r, &z);

        let b_norm = dot(&self.rhs, &self.rhs).sqrt().max(1.0);
        let mut ap = vec![0.0; n];

        for _ in 0..(2 * n + 10) {
            if dot(&r, &r).sqrt() <= self.epsilon * b_norm {
                break;
            }
            apply(&p, &mut ap);
            let p_ap = dot(&p, &ap);
            if p_ap.abs() < f64::MIN_POSITIVE {
                break;
            }
            let alpha = rz / p_ap;
            for i in 0..n {
                x[i] += alpha * p[i];
                r[i] -= alpha * ap[i];
            }
            for i in 0..n {
                z[i] = r[i] / self.diag[i];
            }
            let rz_next = dot(&r, &z);
            let beta = rz_next / rz;
            for i in 0..n {
                p[i] = z[i] + beta * p[i];
            }
            rz = rz_next;
        }
        x
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
