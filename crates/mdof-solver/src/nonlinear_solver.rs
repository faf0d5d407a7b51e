//! Newton-type equilibrium iteration for one analysis increment.
//!
//! Solves the nonlinear equilibrium equation of a single step:
//! R(x) = F_ext - F_int(x) = 0
//!
//! with an iteration matrix J ≈ -∂R/∂x:
//! 1. Solve: J * Δx = R_i
//! 2. Update: x_{i+1} = x_i + Δx
//! 3. Evaluate R_{i+1} and the convergence test
//!
//! # Algorithms
//!
//! - **RaphsonNewton**: J refreshed every iteration
//! - **ModifiedNewton**: J formed once per step
//! - **KrylovNewton**: modified Newton accelerated over a small subspace of
//!   previous corrections (Carlson-Miller)
//! - **SecantNewton**: rank-one secant update of J⁻¹
//! - **PeriodicNewton**: J refreshed every [`PERIODIC_REFRESH`] iterations
//! - **BFGS**: rank-two update of J⁻¹
//! - **Broyden**: rank-one update of J
//! - **NewtonLineSearch**: full Newton with a backtracking step length
//!
//! # Convergence Tests
//!
//! - **NormDispIncr**: ||Δx|| < tol
//! - **NormUnbalance**: ||R_{i+1}|| < tol
//! - **EnergyIncr**: ½|Δx·R_i| < tol
//! - Relative variants divide by the value at the first iteration (the
//!   starting residual for the unbalance test)

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Step lengths tried by the line search, largest first
const LINE_SEARCH_STEPS: [f64; 5] = [1.0, 0.5, 0.25, 0.125, 0.0625];

/// Number of previous corrections kept by KrylovNewton
pub const KRYLOV_MAX_DIM: usize = 3;

/// Iterations between tangent refreshes for PeriodicNewton
pub const PERIODIC_REFRESH: usize = 3;

/// Convergence criterion for equilibrium iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConvergenceTest {
    NormDispIncr,
    RelativeEnergyIncr,
    EnergyIncr,
    RelativeNormUnbalance,
    RelativeNormDispIncr,
    NormUnbalance,
}

impl ConvergenceTest {
    /// Fallback priority order
    pub const PRIORITY: [ConvergenceTest; 6] = [
        ConvergenceTest::NormDispIncr,
        ConvergenceTest::RelativeEnergyIncr,
        ConvergenceTest::EnergyIncr,
        ConvergenceTest::RelativeNormUnbalance,
        ConvergenceTest::RelativeNormDispIncr,
        ConvergenceTest::NormUnbalance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConvergenceTest::NormDispIncr => "NormDispIncr",
            ConvergenceTest::RelativeEnergyIncr => "RelativeEnergyIncr",
            ConvergenceTest::EnergyIncr => "EnergyIncr",
            ConvergenceTest::RelativeNormUnbalance => "RelativeNormUnbalance",
            ConvergenceTest::RelativeNormDispIncr => "RelativeNormDispIncr",
            ConvergenceTest::NormUnbalance => "NormUnbalance",
        }
    }
}

impl fmt::Display for ConvergenceTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Equilibrium iteration algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    KrylovNewton,
    SecantNewton,
    ModifiedNewton,
    RaphsonNewton,
    PeriodicNewton,
    Bfgs,
    Broyden,
    NewtonLineSearch,
}

impl Algorithm {
    /// Fallback priority order
    pub const PRIORITY: [Algorithm; 8] = [
        Algorithm::KrylovNewton,
        Algorithm::SecantNewton,
        Algorithm::ModifiedNewton,
        Algorithm::RaphsonNewton,
        Algorithm::PeriodicNewton,
        Algorithm::Bfgs,
        Algorithm::Broyden,
        Algorithm::NewtonLineSearch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::KrylovNewton => "KrylovNewton",
            Algorithm::SecantNewton => "SecantNewton",
            Algorithm::ModifiedNewton => "ModifiedNewton",
            Algorithm::RaphsonNewton => "RaphsonNewton",
            Algorithm::PeriodicNewton => "PeriodicNewton",
            Algorithm::Bfgs => "BFGS",
            Algorithm::Broyden => "Broyden",
            Algorithm::NewtonLineSearch => "NewtonLineSearch",
        }
    }

    /// The first four algorithms of the priority order iterate on the
    /// initial stiffness
    pub fn uses_initial_stiffness(self) -> bool {
        matches!(
            self,
            Algorithm::KrylovNewton
                | Algorithm::SecantNewton
                | Algorithm::ModifiedNewton
                | Algorithm::RaphsonNewton
        )
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One (test, algorithm) pair with its iteration limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolutionStrategy {
    pub test: ConvergenceTest,
    pub algorithm: Algorithm,
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Iterate on the initial rather than the current tangent
    pub initial_stiffness: bool,
}

impl SolutionStrategy {
    pub fn new(
        test: ConvergenceTest,
        algorithm: Algorithm,
        tolerance: f64,
        max_iterations: usize,
    ) -> Self {
        Self {
            test,
            algorithm,
            tolerance,
            max_iterations,
            initial_stiffness: algorithm.uses_initial_stiffness(),
        }
    }
}

impl fmt::Display for SolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.test, self.algorithm)?;
        if self.initial_stiffness {
            f.write_str(" (initial)")?;
        }
        Ok(())
    }
}

/// A single-step equilibrium problem in unknowns `x`
pub trait EquilibriumProblem {
    fn dimension(&self) -> usize;

    /// Residual `R(x)`; also sets the trial state at `x`
    fn residual(&mut self, x: &DVector<f64>) -> DVector<f64>;

    /// `-∂R/∂x` at the last residual evaluation
    fn tangent(&self) -> DMatrix<f64>;

    /// `-∂R/∂x` with the initial material stiffness
    fn initial_tangent(&self) -> DMatrix<f64>;

    /// Norm used by displacement-increment tests
    fn increment_norm(&self, dx: &DVector<f64>) -> f64 {
        dx.norm()
    }
}

/// Convergence status
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConvergenceStatus {
    /// Converged (met the strategy's test)
    Converged,
    /// Iteration limit reached
    NotConverged,
    /// Singular iteration matrix or non-finite values
    Diverged,
}

/// Outcome of one equilibrium solve
#[derive(Debug, Clone)]
pub struct NonlinearResults {
    /// Final iterate
    pub solution: DVector<f64>,
    pub num_iterations: usize,
    /// Final residual norm
    pub residual_norm: f64,
    pub status: ConvergenceStatus,
    /// Residual norm after each iteration
    pub iteration_history: Vec<f64>,
}

impl NonlinearResults {
    pub fn converged(&self) -> bool {
        self.status == ConvergenceStatus::Converged
    }
}

/// Equilibrium solver for a single strategy
pub struct NonlinearSolver {
    strategy: SolutionStrategy,
}

impl NonlinearSolver {
    pub fn new(strategy: SolutionStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &SolutionStrategy {
        &self.strategy
    }

    /// Iterate from `x0` until the strategy's test passes or the iteration
    /// limit is hit
    pub fn solve<P>(&self, problem: &mut P, x0: DVector<f64>) -> NonlinearResults
    where
        P: EquilibriumProblem + ?Sized,
    {
        let strategy = self.strategy;
        let mut x = x0;
        let mut r = problem.residual(&x);
        let mut history = Vec::with_capacity(strategy.max_iterations);

        if !is_finite(&r) {
            return finish(x, 0, f64::NAN, ConvergenceStatus::Diverged, history);
        }

        let mut state = IterationState::new(problem, &strategy);
        let unbalance_ref = r.norm();
        let mut disp_ref = None;
        let mut energy_ref = None;

        for iter in 0..strategy.max_iterations {
            let Some(dx) = state.direction(problem, &r, iter) else {
                return finish(x, iter, r.norm(), ConvergenceStatus::Diverged, history);
            };

            let (dx, r_new) = if strategy.algorithm == Algorithm::NewtonLineSearch {
                line_search(problem, &x, &dx, &r)
            } else {
                let r_new = problem.residual(&(&x + &dx));
                (dx, r_new)
            };
            x += &dx;

            let unbalance = r_new.norm();
            history.push(unbalance);
            if !is_finite(&dx) || !unbalance.is_finite() {
                return finish(x, iter + 1, unbalance, ConvergenceStatus::Diverged, history);
            }

            let disp = problem.increment_norm(&dx);
            let energy = 0.5 * dx.dot(&r).abs();
            let disp_0 = *disp_ref.get_or_insert(disp);
            let energy_0 = *energy_ref.get_or_insert(energy);

            let tol = strategy.tolerance;
            let converged = match strategy.test {
                ConvergenceTest::NormDispIncr => disp <= tol,
                ConvergenceTest::NormUnbalance => unbalance <= tol,
                ConvergenceTest::EnergyIncr => energy <= tol,
                ConvergenceTest::RelativeNormDispIncr => relative(disp, disp_0, tol),
                ConvergenceTest::RelativeNormUnbalance => relative(unbalance, unbalance_ref, tol),
                ConvergenceTest::RelativeEnergyIncr => relative(energy, energy_0, tol),
            };

            state.update(&dx, &r, &r_new);
            r = r_new;

            if converged {
                return finish(x, iter + 1, unbalance, ConvergenceStatus::Converged, history);
            }
        }

        let residual_norm = r.norm();
        finish(
            x,
            strategy.max_iterations,
            residual_norm,
            ConvergenceStatus::NotConverged,
            history,
        )
    }
}

fn finish(
    solution: DVector<f64>,
    num_iterations: usize,
    residual_norm: f64,
    status: ConvergenceStatus,
    iteration_history: Vec<f64>,
) -> NonlinearResults {
    NonlinearResults {
        solution,
        num_iterations,
        residual_norm,
        status,
        iteration_history,
    }
}

fn relative(value: f64, reference: f64, tol: f64) -> bool {
    value == 0.0 || value <= tol * reference
}

fn is_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

fn lu_solve(matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
    matrix.clone().lu().solve(rhs)
}

/// Backtrack along `dx` until the residual norm decreases.
/// Returns the scaled increment and the residual at the accepted point.
fn line_search<P>(
    problem: &mut P,
    x: &DVector<f64>,
    dx: &DVector<f64>,
    r0: &DVector<f64>,
) -> (DVector<f64>, DVector<f64>)
where
    P: EquilibriumProblem + ?Sized,
{
    let r0_norm = r0.norm();
    for &alpha in &LINE_SEARCH_STEPS {
        let step = dx * alpha;
        let r_trial = problem.residual(&(x + &step));
        if r_trial.norm() < r0_norm {
            return (step, r_trial);
        }
    }
    // No improvement found, use full step
    let r_full = problem.residual(&(x + dx));
    (dx.clone(), r_full)
}

/// Per-solve algorithm state: iteration matrix, inverse approximations and
/// the Krylov subspace
struct IterationState {
    algorithm: Algorithm,
    initial_stiffness: bool,
    jacobian: DMatrix<f64>,
    inverse: Option<DMatrix<f64>>,
    subspace: Vec<(DVector<f64>, DVector<f64>)>,
    prev_correction: Option<DVector<f64>>,
    prev_step: Option<DVector<f64>>,
}

impl IterationState {
    fn new<P>(problem: &P, strategy: &SolutionStrategy) -> Self
    where
        P: EquilibriumProblem + ?Sized,
    {
        let jacobian = if strategy.initial_stiffness {
            problem.initial_tangent()
        } else {
            problem.tangent()
        };
        let inverse = match strategy.algorithm {
            Algorithm::SecantNewton | Algorithm::Bfgs => jacobian.clone().try_inverse(),
            _ => None,
        };
        Self {
            algorithm: strategy.algorithm,
            initial_stiffness: strategy.initial_stiffness,
            jacobian,
            inverse,
            subspace: Vec::new(),
            prev_correction: None,
            prev_step: None,
        }
    }

    fn current_tangent<P>(&self, problem: &P) -> DMatrix<f64>
    where
        P: EquilibriumProblem + ?Sized,
    {
        if self.initial_stiffness {
            problem.initial_tangent()
        } else {
            problem.tangent()
        }
    }

    fn direction<P>(&mut self, problem: &P, r: &DVector<f64>, iter: usize) -> Option<DVector<f64>>
    where
        P: EquilibriumProblem + ?Sized,
    {
        match self.algorithm {
            Algorithm::RaphsonNewton | Algorithm::NewtonLineSearch => {
                if iter > 0 {
                    self.jacobian = self.current_tangent(problem);
                }
                lu_solve(&self.jacobian, r)
            }
            Algorithm::PeriodicNewton => {
                if iter > 0 && iter % PERIODIC_REFRESH == 0 {
                    self.jacobian = self.current_tangent(problem);
                }
                lu_solve(&self.jacobian, r)
            }
            Algorithm::ModifiedNewton | Algorithm::Broyden => lu_solve(&self.jacobian, r),
            Algorithm::SecantNewton | Algorithm::Bfgs => {
                self.inverse.as_ref().map(|h| h * r)
            }
            Algorithm::KrylovNewton => self.krylov_direction(r),
        }
    }

    /// Modified-Newton correction `g = J⁻¹R` accelerated over the stored
    /// steps `s_i` and correction differences `AV_i = g_i - g_{i+1}`:
    /// `Δx = g + Σ c_i (s_i - AV_i)` with `c = argmin ||AV c - g||`
    fn krylov_direction(&mut self, r: &DVector<f64>) -> Option<DVector<f64>> {
        let g = lu_solve(&self.jacobian, r)?;

        if let (Some(prev_g), Some(prev_s)) = (self.prev_correction.take(), self.prev_step.take()) {
            self.subspace.push((prev_s, prev_g - &g));
            if self.subspace.len() > KRYLOV_MAX_DIM {
                self.subspace.remove(0);
            }
        }

        let mut dx = g.clone();
        if !self.subspace.is_empty() {
            let n = g.len();
            let m = self.subspace.len();
            let av = DMatrix::from_fn(n, m, |i, j| self.subspace[j].1[i]);
            let svd = av.svd(true, true);
            let eps = svd.singular_values.max() * 1e-12;
            if eps > 0.0
                && let Ok(c) = svd.solve(&g, eps)
            {
                for (j, (s, a)) in self.subspace.iter().enumerate() {
                    dx += (s - a) * c[j];
                }
            }
        }

        self.prev_correction = Some(g);
        Some(dx)
    }

    /// Secant updates with `s = Δx`, `y = R_i - R_{i+1}` (so that `J s ≈ y`)
    fn update(&mut self, dx: &DVector<f64>, r_old: &DVector<f64>, r_new: &DVector<f64>) {
        let y = r_old - r_new;
        let s = dx;
        match self.algorithm {
            Algorithm::KrylovNewton => self.prev_step = Some(s.clone()),
            Algorithm::SecantNewton => {
                if let Some(h) = self.inverse.as_mut() {
                    let yy = y.dot(&y);
                    if yy > f64::MIN_POSITIVE {
                        let hy = &*h * &y;
                        *h += (s - hy) * y.transpose() / yy;
                    }
                }
            }
            Algorithm::Bfgs => {
                if let Some(h) = self.inverse.as_mut() {
                    let ys = y.dot(s);
                    if ys > f64::EPSILON * y.norm() * s.norm() {
                        let rho = 1.0 / ys;
                        let n = s.len();
                        let identity = DMatrix::<f64>::identity(n, n);
                        let left = &identity - s * y.transpose() * rho;
                        let right = &identity - &y * s.transpose() * rho;
                        *h = &left * &*h * &right + s * s.transpose() * rho;
                    }
                }
            }
            Algorithm::Broyden => {
                let ss = s.dot(s);
                if ss > f64::MIN_POSITIVE {
                    let js = &self.jacobian * s;
                    self.jacobian += (y - js) * s.transpose() / ss;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// k·x + c·x³ = f
    struct Cubic {
        k: f64,
        c: f64,
        f: f64,
        x: f64,
    }

    impl EquilibriumProblem for Cubic {
        fn dimension(&self) -> usize {
            1
        }
        fn residual(&mut self, x: &DVector<f64>) -> DVector<f64> {
            self.x = x[0];
            DVector::from_element(1, self.f - self.k * self.x - self.c * self.x.powi(3))
        }
        fn tangent(&self) -> DMatrix<f64> {
            DMatrix::from_element(1, 1, self.k + 3.0 * self.c * self.x * self.x)
        }
        fn initial_tangent(&self) -> DMatrix<f64> {
            DMatrix::from_element(1, 1, self.k)
        }
    }

    /// Linear 2-DOF spring chain
    struct Linear {
        k: DMatrix<f64>,
        f: DVector<f64>,
    }

    impl EquilibriumProblem for Linear {
        fn dimension(&self) -> usize {
            2
        }
        fn residual(&mut self, x: &DVector<f64>) -> DVector<f64> {
            &self.f - &self.k * x
        }
        fn tangent(&self) -> DMatrix<f64> {
            self.k.clone()
        }
        fn initial_tangent(&self) -> DMatrix<f64> {
            self.k.clone()
        }
    }

    fn linear() -> Linear {
        Linear {
            k: DMatrix::from_row_slice(2, 2, &[2.0, -1.0, -1.0, 1.0]),
            f: DVector::from_vec(vec![0.0, 1.0]),
        }
    }

    #[test]
    fn priority_orders_are_fixed() {
        assert_eq!(ConvergenceTest::PRIORITY[0], ConvergenceTest::NormDispIncr);
        assert_eq!(ConvergenceTest::PRIORITY[5], ConvergenceTest::NormUnbalance);
        assert_eq!(Algorithm::PRIORITY[0], Algorithm::KrylovNewton);
        assert_eq!(Algorithm::PRIORITY[7], Algorithm::NewtonLineSearch);

        let initial: Vec<bool> = Algorithm::PRIORITY
            .iter()
            .map(|a| a.uses_initial_stiffness())
            .collect();
        assert_eq!(
            initial,
            vec![true, true, true, true, false, false, false, false]
        );
    }

    #[test]
    fn every_algorithm_solves_linear_problem() {
        for algorithm in Algorithm::PRIORITY {
            for test in ConvergenceTest::PRIORITY {
                let strategy = SolutionStrategy::new(test, algorithm, 1e-8, 10);
                let mut problem = linear();
                let result = NonlinearSolver::new(strategy).solve(&mut problem, DVector::zeros(2));
                assert!(result.converged(), "{strategy} did not converge");
                assert_relative_eq!(result.solution[0], 1.0, epsilon = 1e-8);
                assert_relative_eq!(result.solution[1], 2.0, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn raphson_converges_quadratically_on_cubic() {
        let strategy = SolutionStrategy {
            initial_stiffness: false,
            ..SolutionStrategy::new(
                ConvergenceTest::NormUnbalance,
                Algorithm::RaphsonNewton,
                1e-8,
                10,
            )
        };
        let mut problem = Cubic {
            k: 1.0,
            c: 1.0,
            f: 2.0,
            x: 0.0,
        };
        let result = NonlinearSolver::new(strategy).solve(&mut problem, DVector::zeros(1));
        assert!(result.converged());
        assert_relative_eq!(result.solution[0], 1.0, epsilon = 1e-8);
        assert!(result.num_iterations <= 8);
    }

    #[test]
    fn krylov_beats_initial_stiffness_newton() {
        let problem = || Cubic {
            k: 1.0,
            c: 0.1,
            f: 1.1,
            x: 0.0,
        };
        let modified = SolutionStrategy::new(
            ConvergenceTest::NormDispIncr,
            Algorithm::ModifiedNewton,
            1e-8,
            10,
        );
        let krylov = SolutionStrategy::new(
            ConvergenceTest::NormDispIncr,
            Algorithm::KrylovNewton,
            1e-8,
            10,
        );

        let plain = NonlinearSolver::new(modified).solve(&mut problem(), DVector::zeros(1));
        let accelerated = NonlinearSolver::new(krylov).solve(&mut problem(), DVector::zeros(1));
        assert!(!plain.converged());
        assert!(accelerated.converged());
        assert_relative_eq!(accelerated.solution[0], 1.0, epsilon = 1e-7);
    }

    #[test]
    fn iteration_limit_reports_not_converged() {
        let strategy = SolutionStrategy::new(
            ConvergenceTest::NormUnbalance,
            Algorithm::ModifiedNewton,
            1e-8,
            2,
        );
        let mut problem = Cubic {
            k: 1.0,
            c: 1.0,
            f: 2.0,
            x: 0.0,
        };
        let result = NonlinearSolver::new(strategy).solve(&mut problem, DVector::zeros(1));
        assert_eq!(result.status, ConvergenceStatus::NotConverged);
        assert_eq!(result.iteration_history.len(), 2);
    }

    #[test]
    fn singular_matrix_diverges() {
        let strategy = SolutionStrategy::new(
            ConvergenceTest::NormUnbalance,
            Algorithm::RaphsonNewton,
            1e-8,
            10,
        );
        let mut problem = Linear {
            k: DMatrix::zeros(2, 2),
            f: DVector::from_vec(vec![1.0, 0.0]),
        };
        let result = NonlinearSolver::new(strategy).solve(&mut problem, DVector::zeros(2));
        assert_eq!(result.status, ConvergenceStatus::Diverged);
    }
}
